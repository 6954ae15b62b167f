//! Errors for skill-formation models (specification parsing, parameter
//! layout, data alignment, filtering, and anchoring).
//!
//! Each pipeline stage owns a small error enum so that callers can tell
//! *where* a failure happened without string matching:
//!
//! - [`SpecError`]: malformed or incomplete model specification. Always
//!   fatal and raised before any numeric work.
//! - [`LayoutError`]: normalization / time-invariance constraints that cannot
//!   be satisfied together. Fatal.
//! - [`DataError`]: dataset does not line up with the specification (missing
//!   columns, duplicated or out-of-range (id, period) keys). Fatal.
//! - [`FilterError`]: raised inside a likelihood evaluation. The
//!   [`FilterError::NumericalDegeneracy`] variant is *recoverable*: the
//!   likelihood engine turns it into `-inf`. Every other variant is fatal.
//! - [`AnchoringError`]: post-processing failures.
//! - [`ModelError`]: umbrella used by [`SkillModel`](crate::model::models::SkillModel).
//!
//! ## Conventions
//! - Periods, stages and mixture components are **0-based**.
//! - Variants carry the offending identity (factor, period, measurement,
//!   column, parameter) so messages point at the exact spot in the input.
use thiserror::Error;

/// Result alias for specification parsing.
pub type SpecResult<T> = Result<T, SpecError>;

/// Result alias for parameter layout construction.
pub type LayoutResult<T> = Result<T, LayoutError>;

/// Result alias for dataset construction and alignment.
pub type DataResult<T> = Result<T, DataError>;

/// Result alias for filter / likelihood evaluations.
pub type FilterResult<T> = Result<T, FilterError>;

/// Result alias for anchoring post-processing.
pub type AnchoringResult<T> = Result<T, AnchoringError>;

/// Result alias for model-level operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Malformed or incomplete model specification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecError {
    /// The raw document could not be read as JSON of the expected shape.
    #[error("Invalid specification document at '{path}': {reason}")]
    InvalidDocument { path: String, reason: String },

    /// A required top-level or per-factor key is absent.
    #[error("Missing required key '{key}' in '{path}'")]
    MissingKey { path: String, key: &'static str },

    /// The specification declares no factors.
    #[error("Specification declares no latent factors")]
    NoFactors,

    /// The model needs at least one period.
    #[error("Specification has no periods: the measurement list of factor '{factor}' is empty")]
    NoPeriods { factor: String },

    /// A per-period list does not have exactly one entry per period.
    #[error("List '{list}' of '{owner}' has {found} entries, expected one per period ({expected})")]
    PeriodListLength { owner: String, list: &'static str, expected: usize, found: usize },

    /// A normalization references a measurement the factor does not measure in that period.
    #[error(
        "Factor '{factor}' normalizes the {quantity} of '{measurement}' in period {period}, \
         but does not measure it there"
    )]
    UnknownNormalization {
        factor: String,
        period: usize,
        measurement: String,
        quantity: &'static str,
    },

    /// Two factors fix the intercept of the same measurement to different values.
    #[error(
        "Conflicting intercept normalizations for '{measurement}' in period {period}: {first} vs {second}"
    )]
    ConflictingNormalization { period: usize, measurement: String, first: f64, second: f64 },

    /// A normalization value is NaN or infinite.
    #[error("Normalization of '{measurement}' in period {period} must be finite, got {value}")]
    NonFiniteNormalization { period: usize, measurement: String, value: f64 },

    /// Transition equation name is not registered.
    #[error("Factor '{factor}' uses unknown transition equation '{name}'")]
    UnknownTransition { factor: String, name: String },

    /// A transition equation lists a factor that is not declared.
    #[error("Transition equation of '{factor}' includes undeclared factor '{included}'")]
    UnknownIncludedFactor { factor: String, included: String },

    /// A non-constant transition equation must depend on at least one factor.
    #[error("Transition equation '{name}' of factor '{factor}' has no included factors")]
    EmptyIncludedFactors { factor: String, name: &'static str },

    /// A factor name appears twice in the inclusion list.
    #[error("Transition equation of '{factor}' includes '{included}' more than once")]
    DuplicateIncludedFactor { factor: String, included: String },

    /// The stagemap is malformed.
    #[error("Invalid stagemap at period {period}: {reason}")]
    InvalidStagemap { period: usize, reason: &'static str },

    /// An anchored factor is not a declared factor.
    #[error("Anchoring references undeclared factor '{factor}'")]
    UnknownAnchoredFactor { factor: String },

    /// The anchoring block lists no factors.
    #[error("Anchoring block must list at least one factor")]
    EmptyAnchoring,

    /// An option key in `general` is not recognised.
    #[error("Unknown general option '{key}'")]
    UnknownOption { key: String },

    /// An option has the wrong type or an invalid value.
    #[error("Invalid value for general option '{key}': {reason}")]
    InvalidOption { key: &'static str, reason: &'static str },
}

/// Normalization and time-invariance constraints cannot be satisfied together.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    /// Aliased parameters were fixed to different values.
    #[error(
        "Aliased parameters '{first}' and '{second}' are normalized to different values \
         ({first_value} vs {second_value})"
    )]
    ConflictingNormalization { first: String, second: String, first_value: f64, second_value: f64 },

    /// Two layout entries produced the same identity.
    #[error("Parameter identity '{name}' was registered twice")]
    DuplicateParameter { name: String },
}

/// Dataset does not line up with the specification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    /// No rows.
    #[error("Dataset has no observations")]
    EmptyDataset,

    /// A column the specification needs is absent.
    #[error("Dataset is missing column '{column}' required by the specification")]
    MissingColumn { column: String },

    /// A column has a different length than the id/period keys.
    #[error("Column '{column}' has {found} rows, expected {expected}")]
    ColumnLength { column: String, expected: usize, found: usize },

    /// The same (id, period) pair occurs more than once.
    #[error("Duplicate observation for individual '{id}' in period {period}")]
    DuplicateObservation { id: String, period: usize },

    /// A row refers to a period outside `0..n_periods`.
    #[error("Individual '{id}' has period {period}, outside 0..{n_periods}")]
    PeriodOutOfRange { id: String, period: usize, n_periods: usize },

    /// A value could not be parsed from text input.
    #[error("Could not parse '{value}' in column '{column}' (row {row})")]
    ParseValue { row: usize, column: String, value: String },

    /// Error from the CSV reader.
    #[error("CSV error: {reason}")]
    Csv { reason: String },
}

impl From<csv::Error> for DataError {
    fn from(err: csv::Error) -> Self {
        DataError::Csv { reason: err.to_string() }
    }
}

/// Failures inside a likelihood evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// Non-positive-definite covariance, invalid derived weight, or overflow in a
    /// transition. Recoverable: signals a rejected trial parameter vector.
    #[error("Numerical degeneracy: {reason}")]
    NumericalDegeneracy { reason: &'static str },

    /// NaN or another non-finite value where none may occur. Fatal.
    #[error("Non-finite value in {context}: {value}")]
    NonFiniteValue { context: &'static str, value: f64 },

    /// The parameter vector has the wrong length for the layout.
    #[error("Parameter vector has length {found}, layout expects {expected}")]
    ParamLengthMismatch { expected: usize, found: usize },
}

impl FilterError {
    /// `true` for errors the likelihood engine absorbs into `-inf`.
    pub fn is_degeneracy(&self) -> bool {
        matches!(self, FilterError::NumericalDegeneracy { .. })
    }
}

/// Anchoring post-processing failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnchoringError {
    /// The specification has no anchoring block.
    #[error("Model has no anchoring specification")]
    NotConfigured,

    /// Not enough complete rows for the side regression.
    #[error("Anchoring regression needs more than {n_regressors} complete rows, found {n_obs}")]
    InsufficientObservations { n_obs: usize, n_regressors: usize },

    /// `X'X` of the side regression is singular.
    #[error("Anchoring regression design matrix is singular")]
    SingularDesign,

    /// Array shapes do not match the specification.
    #[error("Shape mismatch in {context}: expected {expected:?}, found {found:?}")]
    ShapeMismatch { context: &'static str, expected: Vec<usize>, found: Vec<usize> },

    /// An anchoring loading is zero, so anchored states cannot be mapped back.
    #[error("Anchoring loading of factor '{factor}' is zero")]
    ZeroLoading { factor: String },
}

/// Umbrella error for model-level operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Anchoring(#[from] AnchoringError),

    /// An operation needs a fitted model.
    #[error("Model has not been fitted")]
    NotFitted,

    /// Error from a sampling distribution during simulation.
    #[error("Simulation error: {reason}")]
    Simulation { reason: String },
}
