//! core — specification, parameter layout, filter and likelihood of the
//! skill-formation model.
//!
//! Purpose
//! -------
//! Collect the building blocks of nonlinear latent-factor models: the
//! normalized model specification, the mapping between a flat parameter
//! vector and structured parameters, the transition registry, the
//! sigma-point filter over a mixture-of-normals belief, the likelihood
//! engine and the anchoring post-processor. [`crate::model::models`] wires
//! these into an estimable model.
//!
//! Key behaviors
//! -------------
//! - [`ModelSpec`] parses the JSON specification, applies defaults and
//!   rejects inconsistent input with a typed [`SpecError`](crate::model::errors::SpecError).
//! - [`ParamLayout`] assigns every model parameter a stable name and a
//!   slot (free index, fixed value or mixture complement), honoring
//!   normalizations and time invariance of the measurement system.
//! - [`ModelParams`] reads a parameter vector through the layout;
//!   [`ParamTransform`] maps bounded parameters to an unconstrained θ.
//! - [`TransitionEquation`] evaluates `linear`, `log_ces`, `translog` and
//!   `constant` transitions and rescales their coefficients.
//! - [`filter`] runs the per-individual recursion; [`log_likelihood`] and
//!   [`filtered_states`] aggregate it over a [`Panel`].
//! - [`anchoring`] re-expresses estimates on an anchoring outcome's scale;
//!   [`simulate_dataset`] draws data from known parameters.
//!
//! Invariants & assumptions
//! ------------------------
//! - The specification, layout and panel are immutable once built and are
//!   shared read-only across rayon workers.
//! - Beliefs are values: each filter step returns a new [`Belief`].
//! - Missing observations are `NaN` and only ever mean "not observed".
//!
//! Conventions
//! -----------
//! - Periods, stages, factors and mixture components are 0-based.
//! - Factors are ordered as declared in the specification (JSON key order).
//! - The transition out of period `t` uses stage `stagemap[t]`.
//!
//! Testing notes
//! -------------
//! - Each submodule carries unit tests; specification fixtures shared by
//!   those tests live in `fixtures`.

pub mod anchoring;
pub mod belief;
pub mod data;
pub mod equivalence;
pub mod filter;
pub mod layout;
pub mod likelihood;
pub mod linalg;
pub mod options;
pub mod params;
pub mod sigma;
pub mod simulate;
pub mod spec;
pub mod transition;

#[cfg(test)]
pub(crate) mod fixtures;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::anchoring::{
    AnchoringRegression, AnchoringReport, AnchoringScale, ScaleSource, postprocess,
};
pub use self::belief::{Belief, Component};
pub use self::data::{Dataset, IndividualData, Panel};
pub use self::filter::{StateScaling, filter_individual};
pub use self::layout::{Block, LayoutEntry, ParamId, ParamLayout, Slot};
pub use self::likelihood::{
    DEGENERATE_LOGLIK_PENALTY, filtered_states, log_likelihood, log_likelihood_contributions,
};
pub use self::options::{AnchoringMode, EstimationOptions, GeneralOptions};
pub use self::params::{ModelParams, ParamTransform};
pub use self::sigma::SigmaWeights;
pub use self::simulate::{SimulatedData, SimulationOptions, simulate_dataset};
pub use self::spec::{AnchoringSpec, FactorSpec, MeasurementEquation, ModelSpec};
pub use self::transition::{Affine, TransitionEquation};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use skill_formation::model::core::prelude::*;
//
// to import the main model-core surface in a single line.

pub mod prelude {
    pub use super::data::{Dataset, Panel};
    pub use super::layout::ParamLayout;
    pub use super::likelihood::{filtered_states, log_likelihood, log_likelihood_contributions};
    pub use super::options::{AnchoringMode, EstimationOptions, GeneralOptions};
    pub use super::params::{ModelParams, ParamTransform};
    pub use super::simulate::{SimulationOptions, simulate_dataset};
    pub use super::spec::ModelSpec;
}
