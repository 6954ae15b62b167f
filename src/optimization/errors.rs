//! errors — error surface of the optimization layer.
//!
//! `OptError` covers optimizer configuration, derivative checks, solver
//! failures reported by argmin and failures of the model being optimized
//! (wrapped as [`ModelError`]).
use crate::model::errors::{FilterError, LayoutError, ModelError};
use argmin::core::{ArgminError, Error};
use thiserror::Error;

/// Result alias for optimizer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptError {
    // ---- Gradient ----
    /// No analytic gradient; finite differences are used instead.
    #[error("Analytic gradient not implemented")]
    GradientNotImplemented,

    #[error("Gradient dimension mismatch: expected {expected}, found {found}")]
    GradientDimMismatch { expected: usize, found: usize },

    #[error("Invalid gradient at index {index}: {value}: {reason}")]
    InvalidGradient { index: usize, value: f64, reason: &'static str },

    // ---- MLEOptions ----
    #[error("Invalid gradient tolerance {tol}: {reason}")]
    InvalidTolGrad { tol: f64, reason: &'static str },

    #[error("Invalid cost change tolerance {tol}: {reason}")]
    InvalidTolCost { tol: f64, reason: &'static str },

    #[error("Invalid maximum iterations {max_iter}: {reason}")]
    InvalidMaxIter { max_iter: usize, reason: &'static str },

    #[error("No tolerances provided")]
    NoTolerancesProvided,

    #[error("Invalid line searcher '{name}': {reason}")]
    InvalidLineSearch { name: String, reason: &'static str },

    #[error("Invalid L-BFGS memory {mem}: {reason}")]
    InvalidLBFGSMem { mem: usize, reason: &'static str },

    // ---- Objective ----
    #[error("Non-finite cost value: {value}")]
    NonFiniteCost { value: f64 },

    #[error("Parameter vector length mismatch: expected {expected}, found {found}")]
    ThetaLengthMismatch { expected: usize, found: usize },

    #[error("Invalid optimizer input at index {index}: {value}, must be finite")]
    InvalidThetaInput { index: usize, value: f64 },

    // ---- Optimizer outcome ----
    #[error("Invalid estimated parameter at index {index}: {value}: {reason}")]
    InvalidThetaHat { index: usize, value: f64, reason: &'static str },

    #[error("Solver returned no parameter estimate")]
    MissingThetaHat,

    // ---- Finite differences ----
    #[error("Hessian dimension mismatch: expected ({expected}, {expected}), found {found:?}")]
    HessianDimMismatch { expected: usize, found: (usize, usize) },

    #[error("Invalid Hessian at ({row}, {col}): {value}, must be finite")]
    InvalidHessian { row: usize, col: usize, value: f64 },

    #[error("Invalid score of observation {observation} at index {index}: {value}, must be finite")]
    InvalidScore { observation: usize, index: usize, value: f64 },

    // ---- Backend ----
    /// An argmin error; `kind` names the argmin variant.
    #[error("Solver error ({kind}): {text}")]
    Backend { kind: &'static str, text: String },

    // ---- Model ----
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<Error> for OptError {
    fn from(err: Error) -> Self {
        let err = match err.downcast::<OptError>() {
            Ok(opt) => return opt,
            Err(err) => err,
        };
        match err.downcast::<ArgminError>() {
            Ok(argmin_err) => {
                let (kind, text) = match argmin_err {
                    ArgminError::InvalidParameter { text } => ("InvalidParameter", text),
                    ArgminError::NotImplemented { text } => ("NotImplemented", text),
                    ArgminError::NotInitialized { text } => ("NotInitialized", text),
                    ArgminError::ConditionViolated { text } => ("ConditionViolated", text),
                    ArgminError::CheckpointNotFound { text } => ("CheckpointNotFound", text),
                    ArgminError::PotentialBug { text } => ("PotentialBug", text),
                    ArgminError::ImpossibleError { text } => ("ImpossibleError", text),
                    other => ("Other", other.to_string()),
                };
                OptError::Backend { kind, text }
            }
            Err(err) => OptError::Backend { kind: "Other", text: err.to_string() },
        }
    }
}

impl From<FilterError> for OptError {
    fn from(err: FilterError) -> Self {
        OptError::Model(ModelError::Filter(err))
    }
}

impl From<LayoutError> for OptError {
    fn from(err: LayoutError) -> Self {
        OptError::Model(ModelError::Layout(err))
    }
}
