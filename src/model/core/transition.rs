//! transition — registry of transition equations.
//!
//! Purpose
//! -------
//! Map a factor vector at period `t` to the expected value of one factor at
//! `t + 1`. Every supported functional form is one variant of the closed
//! enum [`TransitionEquation`]; the variant carries its coefficient-count
//! formula, coefficient names, bounds, start values and evaluation rule, so
//! dispatch by name happens exactly once (when the specification is parsed).
//!
//! Key behaviors
//! -------------
//! - `linear`: `c + Σ b_i x_i`; coefficients `[b_1, …, b_n, c]`.
//! - `log_ces`: `(1/φ) ln Σ γ_i exp(φ x_i)` with `γ` on the simplex. Only
//!   `n − 1` gammas are free; the last is `1 − Σ others`. Evaluated with a
//!   max-shift so `exp` never overflows; `|φ| < PHI_EPS` falls back to the
//!   limit `Σ γ_i x_i`.
//! - `constant`: the factor carries over unchanged; no coefficients.
//! - `translog`: linear terms, then squares / interactions for `i ≤ j` in
//!   inclusion order, then a `TFP` constant.
//! - [`TransitionEquation::anchored_coefficients`] re-expresses coefficients
//!   when inputs and output go through affine maps `s x + c` (used by
//!   anchoring).
//!
//! Invariants & assumptions
//! ------------------------
//! - Coefficient slices passed to [`TransitionEquation::evaluate`] are in
//!   *long* form (see [`TransitionEquation::expand_coeffs`]).
//! - `x` holds the included factors' values in inclusion order.
//!
//! Conventions
//! -----------
//! - Coefficient names follow `{kind}__{stage}__{factor}__{term}`.
//!
//! Testing notes
//! -------------
//! - Reference values: `log_ces([3, 7.5]; γ = [0.4, 0.6], φ = 2) =
//!   7.244628323025` and the translog grid with `f1, f2, f4` included.
use crate::model::errors::{FilterError, FilterResult};
use std::fmt;

/// `|φ|` below this uses the Cobb–Douglas-like limit of log-CES.
pub const PHI_EPS: f64 = 1e-12;

/// Affine map `x ↦ scale · x + shift` of one factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub scale: f64,
    pub shift: f64,
}

impl Affine {
    pub const IDENTITY: Affine = Affine { scale: 1.0, shift: 0.0 };

    pub fn apply(&self, x: f64) -> f64 {
        self.scale * x + self.shift
    }
}

/// Supported transition equations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionEquation {
    Linear,
    LogCes,
    Constant,
    Translog,
}

impl fmt::Display for TransitionEquation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TransitionEquation {
    /// Look up an equation by its specification name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "linear" => Some(TransitionEquation::Linear),
            "log_ces" => Some(TransitionEquation::LogCes),
            "constant" => Some(TransitionEquation::Constant),
            "translog" => Some(TransitionEquation::Translog),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransitionEquation::Linear => "linear",
            TransitionEquation::LogCes => "log_ces",
            TransitionEquation::Constant => "constant",
            TransitionEquation::Translog => "translog",
        }
    }

    /// `true` if the factor has no shock (its shock variance is fixed at 0).
    pub fn is_constant(&self) -> bool {
        matches!(self, TransitionEquation::Constant)
    }

    /// Number of *free* coefficients for `n` included factors.
    pub fn n_coeffs(&self, n: usize) -> usize {
        match self {
            TransitionEquation::Linear => n + 1,
            TransitionEquation::LogCes => n,
            TransitionEquation::Constant => 0,
            TransitionEquation::Translog => n + n * (n + 1) / 2 + 1,
        }
    }

    /// Number of coefficients in long form (log-CES includes the derived gamma).
    pub fn n_long_coeffs(&self, n: usize) -> usize {
        match self {
            TransitionEquation::LogCes => n + 1,
            _ => self.n_coeffs(n),
        }
    }

    /// Names of the free coefficients.
    ///
    /// Parameters
    /// ----------
    /// - `included`: names of the included factors, in inclusion order.
    /// - `factor`: name of the factor the equation belongs to.
    /// - `stage`: stage index.
    ///
    /// Returns
    /// -------
    /// `Vec<String>` of length `n_coeffs(included.len())`.
    pub fn coeff_names(&self, included: &[String], factor: &str, stage: usize) -> Vec<String> {
        match self {
            TransitionEquation::Linear => included
                .iter()
                .map(|inc| format!("lincoeff__{stage}__{factor}__{inc}"))
                .chain(std::iter::once(format!("lincoeff__{stage}__{factor}__constant")))
                .collect(),
            TransitionEquation::LogCes => {
                let n_gammas = included.len().saturating_sub(1);
                included[..n_gammas]
                    .iter()
                    .map(|inc| format!("gamma__{stage}__{factor}__{inc}"))
                    .chain(std::iter::once(format!("phi__{stage}__{factor}__Phi")))
                    .collect()
            }
            TransitionEquation::Constant => Vec::new(),
            TransitionEquation::Translog => {
                let mut names: Vec<String> = included
                    .iter()
                    .map(|inc| format!("translog__{stage}__{factor}__{inc}"))
                    .collect();
                for (i, fi) in included.iter().enumerate() {
                    for fj in &included[i..] {
                        let term =
                            if fi == fj { format!("{fi}-squared") } else { format!("{fi}-{fj}") };
                        names.push(format!("translog__{stage}__{factor}__{term}"));
                    }
                }
                names.push(format!("translog__{stage}__{factor}__TFP"));
                names
            }
        }
    }

    /// Bounds `(lower, upper)` of the free coefficients.
    pub fn coeff_bounds(&self, n: usize) -> Vec<(f64, f64)> {
        match self {
            TransitionEquation::LogCes => {
                let mut bounds = vec![(0.0, 1.0); n.saturating_sub(1)];
                bounds.push((f64::NEG_INFINITY, f64::INFINITY));
                bounds
            }
            _ => vec![(f64::NEG_INFINITY, f64::INFINITY); self.n_coeffs(n)],
        }
    }

    /// Start values of the free coefficients.
    ///
    /// `own` is the position of the equation's own factor among the included
    /// factors, if it is included; linear and translog start from persistence
    /// of the own factor.
    pub fn start_values(&self, n: usize, own: Option<usize>) -> Vec<f64> {
        match self {
            TransitionEquation::Linear | TransitionEquation::Translog => {
                let mut start = vec![0.0; self.n_coeffs(n)];
                match own {
                    Some(pos) => start[pos] = 1.0,
                    None => {
                        for v in start.iter_mut().take(n) {
                            *v = 1.0 / n as f64;
                        }
                    }
                }
                start
            }
            TransitionEquation::LogCes => {
                let mut start = vec![1.0 / n as f64; n.saturating_sub(1)];
                start.push(1.0);
                start
            }
            TransitionEquation::Constant => Vec::new(),
        }
    }

    /// Expand free coefficients into long form.
    ///
    /// For log-CES the last gamma is derived as `1 − Σ others` and inserted
    /// before `φ`. Other equations are returned unchanged.
    ///
    /// Errors
    /// ------
    /// - `FilterError::NumericalDegeneracy` if the derived gamma is negative
    ///   (the free gammas sum to more than one).
    pub fn expand_coeffs(&self, free: &[f64]) -> FilterResult<Vec<f64>> {
        match self {
            TransitionEquation::LogCes => {
                let (gammas, phi) = free.split_at(free.len() - 1);
                let last = 1.0 - gammas.iter().sum::<f64>();
                if last < 0.0 {
                    return Err(FilterError::NumericalDegeneracy {
                        reason: "log_ces gammas sum to more than one",
                    });
                }
                let mut long = gammas.to_vec();
                long.push(last);
                long.extend_from_slice(phi);
                Ok(long)
            }
            _ => Ok(free.to_vec()),
        }
    }

    /// Evaluate the equation at included-factor values `x`.
    ///
    /// Parameters
    /// ----------
    /// - `x`: included factors' values in inclusion order.
    /// - `own`: current value of the equation's own factor (used by `constant`).
    /// - `coeffs`: long-form coefficients.
    ///
    /// Returns
    /// -------
    /// Expected next-period value. May be non-finite for extreme inputs; the
    /// filter treats that as a numerical degeneracy.
    pub fn evaluate(&self, x: &[f64], own: f64, coeffs: &[f64]) -> f64 {
        match self {
            TransitionEquation::Linear => {
                let n = x.len();
                x.iter().zip(&coeffs[..n]).map(|(xi, bi)| xi * bi).sum::<f64>() + coeffs[n]
            }
            TransitionEquation::LogCes => log_ces(x, &coeffs[..x.len()], coeffs[x.len()]),
            TransitionEquation::Constant => own,
            TransitionEquation::Translog => {
                let n = x.len();
                let mut value: f64 = x.iter().zip(&coeffs[..n]).map(|(xi, bi)| xi * bi).sum();
                let mut k = n;
                for i in 0..n {
                    for j in i..n {
                        value += coeffs[k] * x[i] * x[j];
                        k += 1;
                    }
                }
                value + coeffs[k]
            }
        }
    }

    /// Re-express long-form coefficients after affine maps of the factors.
    ///
    /// If the inputs are replaced by `x̃_i = inputs[i].apply(x_i)` and the
    /// output by `ỹ = output.apply(y)`, returns the coefficients `c̃` such
    /// that `ỹ = f(x̃; c̃)`.
    ///
    /// Returns
    /// -------
    /// `None` when no closed form exists: a zero input scale, or log-CES
    /// whose maps are not all equal to the output map.
    pub fn anchored_coefficients(
        &self, coeffs: &[f64], inputs: &[Affine], output: Affine,
    ) -> Option<Vec<f64>> {
        if inputs.iter().any(|a| a.scale == 0.0) {
            return None;
        }
        let n = inputs.len();
        // x_i = u_i x̃_i + v_i
        let u: Vec<f64> = inputs.iter().map(|a| 1.0 / a.scale).collect();
        let v: Vec<f64> = inputs.iter().map(|a| -a.shift / a.scale).collect();
        match self {
            TransitionEquation::Linear => {
                let mut out: Vec<f64> = (0..n).map(|i| output.scale * coeffs[i] * u[i]).collect();
                let constant = coeffs[n] + (0..n).map(|i| coeffs[i] * v[i]).sum::<f64>();
                out.push(output.apply(constant));
                Some(out)
            }
            TransitionEquation::Translog => {
                let mut linear: Vec<f64> = (0..n).map(|i| coeffs[i] * u[i]).collect();
                let mut constant = coeffs[n + n * (n + 1) / 2]
                    + (0..n).map(|i| coeffs[i] * v[i]).sum::<f64>();
                let mut quadratic = Vec::with_capacity(n * (n + 1) / 2);
                let mut k = n;
                for i in 0..n {
                    for j in i..n {
                        let d = coeffs[k];
                        quadratic.push(output.scale * d * u[i] * u[j]);
                        linear[i] += d * u[i] * v[j];
                        linear[j] += d * v[i] * u[j];
                        constant += d * v[i] * v[j];
                        k += 1;
                    }
                }
                let mut out: Vec<f64> = linear.iter().map(|b| output.scale * b).collect();
                out.extend(quadratic);
                out.push(output.apply(constant));
                Some(out)
            }
            TransitionEquation::LogCes => {
                let tol = 1e-12 * output.scale.abs().max(1.0);
                let common = inputs.iter().all(|a| {
                    (a.scale - output.scale).abs() <= tol && (a.shift - output.shift).abs() <= tol
                });
                if !common {
                    return None;
                }
                let mut out = coeffs[..n].to_vec();
                out.push(coeffs[n] / output.scale);
                Some(out)
            }
            TransitionEquation::Constant => Some(coeffs.to_vec()),
        }
    }
}

/// `(1/φ) ln Σ γ_i exp(φ x_i)` with a max-shift.
fn log_ces(x: &[f64], gammas: &[f64], phi: f64) -> f64 {
    if phi.abs() < PHI_EPS {
        return x.iter().zip(gammas).map(|(xi, g)| g * xi).sum();
    }
    let max_arg = x
        .iter()
        .zip(gammas)
        .filter(|(_, g)| **g > 0.0)
        .map(|(xi, _)| phi * xi)
        .fold(f64::NEG_INFINITY, f64::max);
    if !max_arg.is_finite() {
        return f64::NAN;
    }
    let sum: f64 = x
        .iter()
        .zip(gammas)
        .filter(|(_, g)| **g > 0.0)
        .map(|(xi, g)| g * (phi * xi - max_arg).exp())
        .sum();
    (max_arg + sum.ln()) / phi
}
