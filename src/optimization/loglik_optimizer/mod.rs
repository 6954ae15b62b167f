//! loglik_optimizer — argmin-backed maximization of log-likelihoods.
//!
//! Purpose
//! -------
//! Maximize a model log-likelihood `ℓ(θ)` over an unconstrained vector `θ`
//! with L-BFGS. Models implement [`LogLikelihood`] and call [`maximize`].
//!
//! Key behaviors
//! -------------
//! - [`adapter::ArgMinAdapter`] presents `c(θ) = -ℓ(θ)` to argmin and
//!   differentiates it numerically when the model has no analytic gradient.
//! - [`builders`] construct L-BFGS with a More–Thuente or Hager–Zhang line
//!   search; [`run::run_lbfgs`] executes it and logs the outcome.
//! - [`finite_diff::compute_hessian`] provides the numerical Hessian used for
//!   observed-information standard errors.
//! - [`validation`] holds the finiteness and shape checks.
//!
//! Invariants & assumptions
//! ------------------------
//! - A non-finite `ℓ(θ)` is an error (`OptError::NonFiniteCost`); models
//!   that need to steer the solver away from degenerate regions return a
//!   large finite penalty instead.
//! - [`Tolerances`] and [`MLEOptions`] are validated on construction.
//!
//! Conventions
//! -----------
//! - Outcomes and user-facing values are log-likelihoods, never costs.
//! - Parameter transforms between model space and `θ` belong to the model.
//!
//! Testing notes
//! -------------
//! - Unit tests cover sign conventions and the finite-difference fallback
//!   (`adapter`), solver construction (`builders`), convergence on a
//!   quadratic (`api`), Hessians (`finite_diff`) and configuration checks
//!   (`traits`, `validation`).

pub mod adapter;
pub mod api;
pub mod builders;
pub mod finite_diff;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::maximize;
pub use self::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Hessian, Theta};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use skill_formation::optimization::loglik_optimizer::prelude::*;
//
// to import the main optimizer surface in a single line.

pub mod prelude {
    pub use super::api::maximize;
    pub use super::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
