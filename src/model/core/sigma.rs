//! Julier sigma points.
//!
//! For an `n`-dimensional normal `N(m, P)` and scale `κ`, the `2n + 1`
//! points are `m`, `m ± √(n + κ) · S_i` (columns of `S`, `S Sᵀ = P`), with
//! weights `w_0 = κ / (n + κ)` and `w_i = 1 / (2 (n + κ))`. The weights sum
//! to one and reproduce the mean and covariance exactly for linear maps.
use crate::model::{core::linalg::psd_sqrt, errors::FilterResult};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Weights of the `2n + 1` Julier sigma points.
#[derive(Debug, Clone, PartialEq)]
pub struct SigmaWeights {
    pub n: usize,
    pub kappa: f64,
    pub weights: Array1<f64>,
}

impl SigmaWeights {
    pub fn julier(n: usize, kappa: f64) -> Self {
        let denom = n as f64 + kappa;
        let mut weights = Array1::from_elem(2 * n + 1, 0.5 / denom);
        weights[0] = kappa / denom;
        Self { n, kappa, weights }
    }

    pub fn n_points(&self) -> usize {
        2 * self.n + 1
    }

    /// Sigma points of `N(mean, cov)` as rows of a `(2n + 1) × n` matrix.
    ///
    /// Errors
    /// ------
    /// - `FilterError::NumericalDegeneracy` if `cov` has no real square root.
    pub fn points(&self, mean: ArrayView1<f64>, cov: ArrayView2<f64>) -> FilterResult<Array2<f64>> {
        let n = self.n;
        let root = psd_sqrt(cov)?;
        let scale = (n as f64 + self.kappa).sqrt();
        let mut points = Array2::zeros((self.n_points(), n));
        points.row_mut(0).assign(&mean);
        for i in 0..n {
            let offset = root.column(i).mapv(|v| v * scale);
            points.row_mut(1 + i).assign(&(&mean + &offset));
            points.row_mut(1 + n + i).assign(&(&mean - &offset));
        }
        Ok(points)
    }

    /// Weighted mean and covariance of (transformed) points given as rows.
    pub fn moments(&self, points: ArrayView2<f64>) -> (Array1<f64>, Array2<f64>) {
        let mean = self.weights.dot(&points);
        let centered = &points - &mean;
        let weighted = &centered * &self.weights.view().insert_axis(ndarray::Axis(1));
        let cov = weighted.t().dot(&centered);
        (mean, cov)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Weights sum to one and points reproduce the input moments.
    //
    // Given
    // -----
    // - n = 2, κ = 2, m = [1, -1], P = [[1, 0.3], [0.3, 0.5]].
    //
    // Expect
    // ------
    // - Σw = 1, w_0 = 0.5 and moments(points) = (m, P).
    fn points_reproduce_moments() {
        // Arrange
        let sigma = SigmaWeights::julier(2, 2.0);
        let mean = array![1.0, -1.0];
        let cov = array![[1.0, 0.3], [0.3, 0.5]];

        // Act
        let points = sigma.points(mean.view(), cov.view()).expect("PD covariance");
        let (m, p) = sigma.moments(points.view());

        // Assert
        assert_abs_diff_eq!(sigma.weights.sum(), 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(sigma.weights[0], 0.5, epsilon = 1e-15);
        for (a, b) in m.iter().zip(mean.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
        for (a, b) in p.iter().zip(cov.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }
}
