//! inference::hessian — observed-information covariance and the delta method.
//!
//! Purpose
//! -------
//! Turn the numerical Hessian of the negative log-likelihood at `θ̂` into a
//! covariance matrix in optimizer space, then carry it over to the model's
//! bounded parameter space through the diagonal Jacobian of the bound
//! transform.
//!
//! Key behaviors
//! -------------
//! - [`calc_covariance`] differentiates a cost gradient with
//!   [`compute_hessian`] and inverts the resulting observed information
//!   `J(θ̂)` through a truncated symmetric eigendecomposition.
//! - [`delta_method`] maps `Σ_θ` to `D Σ_θ D` with `D = diag(∂p/∂θ)`.
//! - [`standard_errors`] reads square roots off a covariance diagonal.
//!
//! Invariants & assumptions
//! ------------------------
//! - The gradient passed to [`calc_covariance`] is the gradient of the
//!   **summed negative** log-likelihood, so `J(θ̂)` is positive
//!   semi-definite near a maximum and the covariance needs no rescaling.
//! - Eigenvalues at most [`EIGEN_EPS`] are dropped. Weakly identified
//!   directions therefore get zero variance rather than a blow-up; the
//!   count of dropped directions is logged.
//!
//! Conventions
//! -----------
//! - No explicit inverse is formed.
//! - Errors are reported via [`OptResult<T>`].
use crate::{
    model::core::linalg::to_dmatrix,
    optimization::{
        errors::OptResult,
        loglik_optimizer::{
            finite_diff::compute_hessian,
            types::{Grad, Theta},
        },
        numerical_stability::transformations::EIGEN_EPS,
    },
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use tracing::warn;

/// Covariance of `θ̂` from the observed information.
///
/// Parameters
/// ----------
/// - `grad`: gradient of the summed negative log-likelihood, `θ ↦ ∇c(θ)`.
///   Failed evaluations should return non-finite entries, which surface
///   as `OptError::InvalidHessian`.
/// - `theta_hat`: the optimizer-space estimate.
///
/// Returns
/// -------
/// `OptResult<Array2<f64>>`
///   The symmetric `n×n` pseudo-inverse `J(θ̂)⁺`.
///
/// Errors
/// ------
/// - Any error of [`compute_hessian`].
pub fn calc_covariance<F: Fn(&Theta) -> Grad>(
    grad: &F, theta_hat: &Theta,
) -> OptResult<Array2<f64>> {
    let obs_info = compute_hessian(grad, theta_hat)?;
    Ok(pseudo_inverse(obs_info.view()))
}

/// `D Σ D` for diagonal `D = diag(jac_diag)`.
///
/// Panics
/// ------
/// - If `jac_diag.len()` differs from the dimension of `cov`.
pub fn delta_method(cov: ArrayView2<f64>, jac_diag: ArrayView1<f64>) -> Array2<f64> {
    Array2::from_shape_fn(cov.raw_dim(), |(i, j)| jac_diag[i] * cov[[i, j]] * jac_diag[j])
}

/// Square roots of the covariance diagonal. Tiny negative variances from
/// round-off are clamped to zero.
pub fn standard_errors(cov: ArrayView2<f64>) -> Array1<f64> {
    cov.diag().mapv(|v| v.max(0.0).sqrt())
}

// ---- Helper methods ----

/// `Σ_{k: λ_k > EIGEN_EPS} q_k q_kᵀ / λ_k` from `J = Q Λ Qᵀ`.
pub(crate) fn pseudo_inverse(obs_info: ArrayView2<f64>) -> Array2<f64> {
    let n = obs_info.nrows();
    let eigen = to_dmatrix(obs_info).symmetric_eigen();
    let q = &eigen.eigenvectors;
    let kept: Vec<(usize, f64)> = eigen
        .eigenvalues
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, lambda)| *lambda > EIGEN_EPS)
        .collect();
    if kept.len() < n {
        warn!(
            dropped = n - kept.len(),
            n_params = n,
            "observed information is not positive definite; using pseudo-inverse"
        );
    }
    Array2::from_shape_fn((n, n), |(i, j)| {
        kept.iter().map(|&(k, lambda)| q[(i, k)] * q[(j, k)] / lambda).sum()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Covariance of a quadratic objective with known information matrix.
    // - Truncation of a singular direction.
    // - The delta method and SE extraction.
    //
    // They intentionally DO NOT cover:
    // - Model-level standard errors (see `SkillModel::standard_errors`).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // For c(θ) = ½ θᵀAθ the covariance is A⁻¹.
    //
    // Given
    // -----
    // - A = [[4, 1], [1, 2]] encoded via the gradient Aθ.
    //
    // Expect
    // ------
    // - Σ ≈ A⁻¹ = [[2, -1], [-1, 4]] / 7.
    fn covariance_of_quadratic_is_inverse_information() {
        // Arrange
        let a = array![[4.0, 1.0], [1.0, 2.0]];
        let grad = |t: &Theta| a.dot(t);

        // Act
        let cov = calc_covariance(&grad, &array![0.5, -0.5]).expect("finite Hessian");

        // Assert
        let expected = array![[2.0, -1.0], [-1.0, 4.0]] / 7.0;
        for ((i, j), v) in expected.indexed_iter() {
            assert_abs_diff_eq!(cov[[i, j]], *v, epsilon = 1e-6);
        }
    }

    #[test]
    // Purpose
    // -------
    // A flat direction gets zero variance instead of an infinite one.
    //
    // Given
    // -----
    // - J = diag(2, 0).
    //
    // Expect
    // ------
    // - Σ = diag(0.5, 0).
    fn singular_direction_is_truncated() {
        let cov = pseudo_inverse(array![[2.0, 0.0], [0.0, 0.0]].view());
        assert_abs_diff_eq!(cov[[0, 0]], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[[1, 1]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cov[[0, 1]], 0.0, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // The delta method scales rows and columns by the Jacobian.
    //
    // Given
    // -----
    // - Σ = [[1, 0.5], [0.5, 4]] and D = diag(2, 0.5).
    //
    // Expect
    // ------
    // - D Σ D = [[4, 0.5], [0.5, 1]] and SEs [2, 1].
    fn delta_method_scales_by_jacobian() {
        // Arrange
        let cov = array![[1.0, 0.5], [0.5, 4.0]];
        let jac = array![2.0, 0.5];

        // Act
        let mapped = delta_method(cov.view(), jac.view());
        let se = standard_errors(mapped.view());

        // Assert
        assert_abs_diff_eq!(mapped[[0, 0]], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mapped[[0, 1]], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(mapped[[1, 1]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(se[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(se[1], 1.0, epsilon = 1e-12);
    }
}
