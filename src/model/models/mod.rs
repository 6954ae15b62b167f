//! models — user-facing skill-formation models.
//!
//! Purpose
//! -------
//! Wire the core building blocks (specification, layout, panel, filter,
//! likelihood, anchoring) to the generic log-likelihood optimizer and the
//! inference layer.
//!
//! Key behaviors
//! -------------
//! - [`SkillModel`] implements [`LogLikelihood`] over the unconstrained
//!   vector θ and provides `fit`, `standard_errors`, `filtered_states` and
//!   `anchoring_report`.
//!
//! Conventions
//! -----------
//! - User-facing parameter vectors are in parameter space (layout order);
//!   θ is only seen by the optimizer and by `SkillModel::results`.
//!
//! [`LogLikelihood`]: crate::optimization::loglik_optimizer::LogLikelihood

pub mod skill_model;

pub use self::skill_model::SkillModel;

pub mod prelude {
    pub use super::skill_model::SkillModel;
}
