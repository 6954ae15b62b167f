//! inference::opg — outer-product-of-gradients covariance.
//!
//! Estimates the information matrix by `Σ_i s_i s_iᵀ`, where `s_i` is the
//! score of observation `i` (the gradient of its log-likelihood
//! contribution at `θ̂`). Scores come from a central-difference Jacobian of
//! the contribution vector, so one evaluation of all contributions per
//! perturbed coordinate is enough.
//!
//! The covariance is the truncated pseudo-inverse of that matrix, exactly
//! as for the Hessian-based estimate.
use crate::{
    inference::hessian::pseudo_inverse,
    optimization::{
        errors::{OptError, OptResult},
        loglik_optimizer::types::Theta,
    },
};
use finitediff::FiniteDiff;
use ndarray::{Array1, Array2};

/// Covariance estimator used for standard errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CovarianceMethod {
    /// Pseudo-inverse of the observed information (numerical Hessian).
    #[default]
    HessianInverse,
    /// Pseudo-inverse of the outer product of per-observation scores.
    OuterProductOfGradients,
}

/// Per-observation scores at `theta_hat`, `n_params × n_obs`.
///
/// Errors
/// ------
/// - `OptError::InvalidScore` for a non-finite score entry.
pub fn score_matrix<F: Fn(&Theta) -> Array1<f64>>(
    contributions: &F, theta_hat: &Theta,
) -> OptResult<Array2<f64>> {
    let scores = theta_hat.central_jacobian(contributions);
    if let Some(((index, observation), &value)) =
        scores.indexed_iter().find(|(_, v)| !v.is_finite())
    {
        return Err(OptError::InvalidScore { observation, index, value });
    }
    Ok(scores)
}

/// OPG covariance of `θ̂`.
///
/// Parameters
/// ----------
/// - `contributions`: `θ ↦` vector of per-observation log-likelihood
///   contributions. Failed evaluations should return non-finite entries.
/// - `theta_hat`: the optimizer-space estimate.
///
/// Errors
/// ------
/// - Any error of [`score_matrix`].
pub fn calc_opg_covariance<F: Fn(&Theta) -> Array1<f64>>(
    contributions: &F, theta_hat: &Theta,
) -> OptResult<Array2<f64>> {
    let scores = score_matrix(contributions, theta_hat)?;
    let information = scores.dot(&scores.t());
    Ok(pseudo_inverse(information.view()))
}
