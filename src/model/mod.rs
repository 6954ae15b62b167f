//! model — the skill-formation model stack: core numerics, models, errors.
//!
//! Purpose
//! -------
//! Estimate nonlinear dynamic latent-factor models of skill formation: a
//! JSON specification is normalized, laid out as a flat parameter vector and
//! evaluated by a sigma-point filter over a panel of individuals.
//!
//! Key behaviors
//! -------------
//! - [`core`]: specification parser, parameter layout, transition registry,
//!   filter, likelihood engine, anchoring, data and simulation.
//! - [`models`]: [`SkillModel`], the estimation boundary.
//! - [`errors`]: component errors and the [`ModelError`] umbrella.
//!
//! Downstream usage
//! ----------------
//! - Parse a [`ModelSpec`], load a [`Dataset`], build a [`SkillModel`], then
//!   `fit` and query standard errors, filtered states and the anchoring
//!   report.

pub mod core;
pub mod errors;
pub mod models;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::core::{
    AnchoringReport, Dataset, EstimationOptions, GeneralOptions, ModelSpec, ParamLayout,
    SimulationOptions, simulate_dataset,
};
pub use self::errors::{ModelError, ModelResult};
pub use self::models::SkillModel;

pub mod prelude {
    pub use super::core::prelude::*;
    pub use super::errors::{ModelError, ModelResult};
    pub use super::models::prelude::*;
}
