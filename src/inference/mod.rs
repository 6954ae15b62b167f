//! inference — standard errors for fitted models.
//!
//! Purpose
//! -------
//! Post-estimation uncertainty quantification from the observed information
//! matrix. Covariances are first computed in the unconstrained optimizer
//! space `θ` and then mapped to the model's bounded parameters with the
//! delta method.
//!
//! Key behaviors
//! -------------
//! - [`calc_covariance`]: pseudo-inverse of the numerical Hessian of the
//!   negative log-likelihood at `θ̂`.
//! - [`delta_method`]: `D Σ_θ D` for a diagonal transform Jacobian.
//! - [`standard_errors`]: square roots of a covariance diagonal.
//! - [`calc_opg_covariance`]: pseudo-inverse of the outer product of
//!   per-observation scores, selected by [`CovarianceMethod`].
//!
//! Conventions
//! -----------
//! - Hessians are on the **summed** log-likelihood scale.
//! - Failures are reported as `OptError`s.

pub mod hessian;
pub mod opg;

// ---- Re-exports (primary surface) -----------------------------------------

pub use self::hessian::{calc_covariance, delta_method, standard_errors};
pub use self::opg::{CovarianceMethod, calc_opg_covariance, score_matrix};

// ---- Optional convenience prelude for downstream crates ------------------
//
// Downstream crates can `use skill_formation::inference::prelude::*;` to
// import the inference surface in a single line.

pub mod prelude {
    pub use super::hessian::{calc_covariance, delta_method, standard_errors};
    pub use super::opg::{CovarianceMethod, calc_opg_covariance};
}
