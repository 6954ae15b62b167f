//! linalg — small dense linear-algebra helpers for the filter.
//!
//! Beliefs and parameters live in `ndarray`; factorizations go through
//! `nalgebra`. Matrices here are tiny (factor count or observed
//! measurements per period), so conversion cost is negligible.
//!
//! - [`CholeskyFactor`] gives the log-determinant, solves and the Gaussian
//!   log-density through a Cholesky factor, never an explicit inverse.
//! - [`psd_sqrt`] returns a square root `S` with `S Sᵀ = P` for positive
//!   semi-definite `P`, falling back to a symmetric eigendecomposition when
//!   `P` is singular (e.g. a constant factor with zero variance).
use crate::{
    model::errors::{FilterError, FilterResult},
    optimization::numerical_stability::EIGEN_EPS,
};
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::f64::consts::PI;

pub(crate) fn to_dmatrix(a: ArrayView2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

fn to_dvector(v: ArrayView1<f64>) -> DVector<f64> {
    DVector::from_iterator(v.len(), v.iter().copied())
}

fn from_dmatrix(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Cholesky factorization of a symmetric positive-definite matrix.
#[derive(Debug, Clone)]
pub struct CholeskyFactor {
    chol: Cholesky<f64, Dyn>,
    dim: usize,
    log_det: f64,
}

impl CholeskyFactor {
    /// Factor `cov`.
    ///
    /// Errors
    /// ------
    /// - `FilterError::NumericalDegeneracy` if `cov` has non-finite entries
    ///   or is not positive definite.
    pub fn new(cov: ArrayView2<f64>) -> FilterResult<Self> {
        if cov.iter().any(|v| !v.is_finite()) {
            return Err(FilterError::NumericalDegeneracy { reason: "non-finite covariance" });
        }
        let dim = cov.nrows();
        let chol = Cholesky::new(to_dmatrix(cov)).ok_or(FilterError::NumericalDegeneracy {
            reason: "covariance is not positive definite",
        })?;
        let l = chol.l_dirty();
        let log_det = 2.0 * (0..dim).map(|i| l[(i, i)].ln()).sum::<f64>();
        if !log_det.is_finite() {
            return Err(FilterError::NumericalDegeneracy { reason: "singular covariance" });
        }
        Ok(Self { chol, dim, log_det })
    }

    pub fn log_det(&self) -> f64 {
        self.log_det
    }

    /// `P⁻¹ b`.
    pub fn solve(&self, b: ArrayView1<f64>) -> Array1<f64> {
        let x = self.chol.solve(&to_dvector(b));
        Array1::from_iter(x.iter().copied())
    }

    /// `P⁻¹ B` for a matrix right-hand side.
    pub fn solve_matrix(&self, b: ArrayView2<f64>) -> Array2<f64> {
        from_dmatrix(&self.chol.solve(&to_dmatrix(b)))
    }

    /// `ln N(r; 0, P)`.
    pub fn log_density(&self, residual: ArrayView1<f64>) -> f64 {
        let quad = residual.dot(&self.solve(residual));
        -0.5 * (self.dim as f64 * (2.0 * PI).ln() + self.log_det + quad)
    }
}

/// Square root `S` (lower factor) with `S Sᵀ = cov` for positive semi-definite `cov`.
///
/// Errors
/// ------
/// - `FilterError::NumericalDegeneracy` if `cov` has non-finite entries or
///   an eigenvalue below `−EIGEN_EPS · max(1, max |λ|)`.
pub fn psd_sqrt(cov: ArrayView2<f64>) -> FilterResult<Array2<f64>> {
    if cov.iter().any(|v| !v.is_finite()) {
        return Err(FilterError::NumericalDegeneracy { reason: "non-finite covariance" });
    }
    let m = to_dmatrix(cov);
    if let Some(chol) = Cholesky::new(m.clone()) {
        return Ok(from_dmatrix(&chol.l()));
    }
    let eigen = m.symmetric_eigen();
    let scale = eigen.eigenvalues.iter().fold(1.0_f64, |acc, l| acc.max(l.abs()));
    if eigen.eigenvalues.iter().any(|&l| l < -EIGEN_EPS * scale) {
        return Err(FilterError::NumericalDegeneracy {
            reason: "covariance is not positive semi-definite",
        });
    }
    let n = cov.nrows();
    let q = &eigen.eigenvectors;
    Ok(Array2::from_shape_fn((n, n), |(i, k)| q[(i, k)] * eigen.eigenvalues[k].max(0.0).sqrt()))
}
