//! Numerical stability utilities.
//!
//! Provides safe implementations of common nonlinear transforms
//! that are prone to overflow/underflow in naïve form.
//! The functions here follow guarded strategies similar to those
//! in major ML libraries, using explicit cutoffs (`x > 20.0`) to keep
//! `f64` arithmetic in a well-conditioned regime.
//!
//! # Provided items
//! - [`safe_softplus`] / [`safe_softplus_inv`]: ℝ ↔ (0, ∞).
//! - [`safe_logistic`] / [`safe_logit`]: ℝ ↔ (0, 1).
//! - [`log_sum_exp`]: max-shifted `ln Σ exp(a_i)`.
//! - [`EIGEN_EPS`], [`GENERAL_TOL`], [`LOGIT_EPS`]: shared tolerances.

/// Eigenvalues with magnitude below this are treated as zero.
pub const EIGEN_EPS: f64 = 1e-10;

/// Generic tolerance for clamping and equality checks.
pub const GENERAL_TOL: f64 = 1e-12;

/// Small value to keep logit arguments away from 0 and 1.
pub const LOGIT_EPS: f64 = 1e-15;

/// Numerically stable softplus: `softplus(x) = ln(1 + exp(x))`.
///
/// - For sufficiently large `x`, `softplus(x) ≈ x`.
/// - Otherwise, it falls back to `ln1p(exp(x))`.
///
/// # Parameters
/// - `x`: real input
///
/// # Returns
/// - `softplus(x)` as `f64`.
pub fn safe_softplus(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp().ln_1p() }
}

/// Stable inverse of softplus on `(0, ∞)`: `t = ln(exp(x) - 1)`.
///
/// For `x > 20` returns `x`; otherwise `ln(expm1(x))`. Non-positive inputs
/// are clamped to `LOGIT_EPS` so the result stays finite.
pub fn safe_softplus_inv(x: f64) -> f64 {
    let x = x.max(LOGIT_EPS);
    if x > 20.0 { x } else { x.exp_m1().ln() }
}

/// Logistic function `1 / (1 + exp(-x))` without overflow in either tail.
pub fn safe_logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Inverse of [`safe_logistic`], with `p` clamped to `[LOGIT_EPS, 1 − LOGIT_EPS]`.
pub fn safe_logit(p: f64) -> f64 {
    let p = p.clamp(LOGIT_EPS, 1.0 - LOGIT_EPS);
    p.ln() - (-p).ln_1p()
}

/// `ln Σ exp(a_i)` with a max-shift.
///
/// Returns `-∞` for an empty slice or when every entry is `-∞`.
pub fn log_sum_exp(a: &[f64]) -> f64 {
    let max = a.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + a.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    // Purpose
    // -------
    // Stable transforms agree with naïve formulas on a safe grid and invert.
    //
    // Given
    // -----
    // - x in {-5, -0.3, 0, 0.7, 4}.
    //
    // Expect
    // ------
    // - softplus / logistic match closed forms; inverses recover x.
    fn transforms_match_naive_formulas_and_invert() {
        for x in [-5.0, -0.3, 0.0, 0.7, 4.0] {
            let sp = safe_softplus(x);
            assert_abs_diff_eq!(sp, (1.0 + f64::exp(x)).ln(), epsilon = 1e-12);
            assert_abs_diff_eq!(safe_softplus_inv(sp), x, epsilon = 1e-9);
            let p = safe_logistic(x);
            assert_abs_diff_eq!(p, 1.0 / (1.0 + f64::exp(-x)), epsilon = 1e-12);
            assert_abs_diff_eq!(safe_logit(p), x, epsilon = 1e-9);
        }
    }

    #[test]
    // Purpose
    // -------
    // Tails do not overflow.
    //
    // Given
    // -----
    // - Inputs ±800 and log-sum-exp of [1000, 1000].
    //
    // Expect
    // ------
    // - Finite results; log-sum-exp equals 1000 + ln 2.
    fn tails_are_finite() {
        assert_eq!(safe_softplus(800.0), 800.0);
        assert_eq!(safe_logistic(-800.0), 0.0);
        assert_eq!(safe_logistic(800.0), 1.0);
        assert_abs_diff_eq!(log_sum_exp(&[1000.0, 1000.0]), 1000.0 + 2f64.ln(), epsilon = 1e-9);
        assert_eq!(log_sum_exp(&[]), f64::NEG_INFINITY);
    }
}
