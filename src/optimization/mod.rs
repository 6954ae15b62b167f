//! optimization — likelihood maximization, stable transforms and the
//! optimizer error surface.
//!
//! Purpose
//! -------
//! Provide the estimation machinery under the skill-formation model: an
//! argmin L-BFGS maximizer for log-likelihoods, numerically stable scalar
//! transforms for bounded parameters and mixture weights, and a single
//! error type for everything that can go wrong while optimizing.
//!
//! Key behaviors
//! -------------
//! - [`loglik_optimizer`]: maximize `ℓ(θ)` given a [`LogLikelihood`]
//!   implementation, with finite-difference gradients and Hessians.
//! - [`numerical_stability`]: softplus / logistic transforms, log-sum-exp
//!   and shared tolerances.
//! - [`errors`]: [`OptError`] / [`OptResult`], including wrapped model
//!   errors.
//!
//! Conventions
//! -----------
//! - Solvers minimize `c(θ) = -ℓ(θ)`; every value reported to callers is a
//!   log-likelihood.
//! - `θ` is unconstrained. Mapping to bounded model parameters is done by
//!   the model layer (`ParamTransform`).
//!
//! [`LogLikelihood`]: loglik_optimizer::LogLikelihood
//! [`OptError`]: errors::OptError
//! [`OptResult`]: errors::OptResult

pub mod errors;
pub mod loglik_optimizer;
pub mod numerical_stability;

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use skill_formation::optimization::prelude::*;
//
// to import the main optimization surface in a single line.

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::loglik_optimizer::prelude::*;
    pub use super::numerical_stability::prelude::*;
}
