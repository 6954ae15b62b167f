//! params — structured model parameters and the optimizer reparametrization.
//!
//! Purpose
//! -------
//! Convert a flat parameter vector (in the order fixed by
//! [`ParamLayout`]) into the structured quantities the filter consumes, and
//! map bounded parameters to an unconstrained vector θ for the optimizer.
//!
//! Key behaviors
//! -------------
//! - [`ModelParams::from_vector`] reads every slot (free, fixed or
//!   complement), expands log-CES coefficients to long form and builds
//!   mixture covariances as `L Lᵀ` from the Cholesky entries.
//! - [`ParamTransform`] applies, per free index, identity (unbounded),
//!   `lb + softplus(θ)` (lower bound only), `ub − softplus(θ)` (upper bound
//!   only) or `lb + (ub − lb) · logistic(θ)` (two-sided).
//!
//! Invariants & assumptions
//! ------------------------
//! - `from_vector` never mutates the layout and allocates a fresh
//!   `ModelParams`, so concurrent evaluations are independent.
//! - Trial vectors that break a structural constraint (negative derived
//!   weight, negative variance) produce a `NumericalDegeneracy`, which the
//!   likelihood turns into `-inf`.
//!
//! Conventions
//! -----------
//! - Transition coefficients are stored in long form `[stage][factor]`;
//!   unused stages and constant factors hold empty vectors.
use crate::{
    model::{
        core::{layout::ParamLayout, spec::ModelSpec},
        errors::{FilterError, FilterResult},
    },
    optimization::numerical_stability::{
        safe_logistic, safe_logit, safe_softplus, safe_softplus_inv,
    },
};
use ndarray::{Array1, Array2, ArrayView1};

/// Parameters of one measurement equation, aligned with its factors / controls.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementParams {
    pub loadings: Vec<f64>,
    pub intercept: f64,
    pub controls: Vec<f64>,
    pub variance: f64,
}

/// Initial mixture-of-normals distribution of the factors.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureParams {
    pub weights: Vec<f64>,
    pub means: Vec<Array1<f64>>,
    pub covs: Vec<Array2<f64>>,
}

/// Parameters of the anchoring equation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchoringParams {
    /// Aligned with the anchored factors.
    pub loadings: Vec<f64>,
    pub intercept: f64,
    /// Aligned with the anchoring controls.
    pub controls: Vec<f64>,
    pub variance: f64,
}

/// Structured view of one parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    /// `measurement[t][j]`.
    pub measurement: Vec<Vec<MeasurementParams>>,
    /// Long-form transition coefficients `[stage][factor]`.
    pub transition: Vec<Vec<Vec<f64>>>,
    /// Shock variances `[stage][factor]`.
    pub shock_variance: Vec<Vec<f64>>,
    pub mixture: MixtureParams,
    pub anchoring: Option<AnchoringParams>,
}

impl ModelParams {
    /// Build structured parameters from a full-length parameter vector.
    ///
    /// Parameters
    /// ----------
    /// - `spec`: `&ModelSpec`
    ///   Normalized specification the layout was built from.
    /// - `layout`: `&ParamLayout`
    ///   Slot tables used to read each quantity.
    /// - `params`: `ArrayView1<f64>`
    ///   Vector of length `layout.n_free()`.
    ///
    /// Errors
    /// ------
    /// - `FilterError::ParamLengthMismatch` for a vector of the wrong length.
    /// - `FilterError::NonFiniteValue` if any entry is NaN or infinite.
    /// - `FilterError::NumericalDegeneracy` for a negative derived mixture
    ///   weight, a negative variance or log-CES gammas summing above one.
    pub fn from_vector(
        spec: &ModelSpec, layout: &ParamLayout, params: ArrayView1<f64>,
    ) -> FilterResult<Self> {
        if params.len() != layout.n_free() {
            return Err(FilterError::ParamLengthMismatch {
                expected: layout.n_free(),
                found: params.len(),
            });
        }
        if let Some(&value) = params.iter().find(|v| !v.is_finite()) {
            return Err(FilterError::NonFiniteValue { context: "parameter vector", value });
        }

        let measurement = layout
            .measurement
            .iter()
            .map(|period| {
                period
                    .iter()
                    .map(|slots| {
                        let variance = slots.variance.value(params);
                        check_variance(variance)?;
                        Ok(MeasurementParams {
                            loadings: slots.loadings.iter().map(|s| s.value(params)).collect(),
                            intercept: slots.intercept.value(params),
                            controls: slots.controls.iter().map(|s| s.value(params)).collect(),
                            variance,
                        })
                    })
                    .collect::<FilterResult<Vec<_>>>()
            })
            .collect::<FilterResult<Vec<_>>>()?;

        let mut transition = Vec::with_capacity(layout.transition.len());
        for stage in &layout.transition {
            let mut per_factor = Vec::with_capacity(stage.len());
            for (pos, slots) in stage.iter().enumerate() {
                if slots.is_empty() {
                    per_factor.push(Vec::new());
                    continue;
                }
                let free: Vec<f64> = slots.iter().map(|s| s.value(params)).collect();
                per_factor.push(spec.factors[pos].transition.expand_coeffs(&free)?);
            }
            transition.push(per_factor);
        }

        let shock_variance = layout
            .shock_variance
            .iter()
            .map(|stage| {
                stage
                    .iter()
                    .map(|s| {
                        let v = s.value(params);
                        check_variance(v).map(|_| v)
                    })
                    .collect::<FilterResult<Vec<_>>>()
            })
            .collect::<FilterResult<Vec<_>>>()?;

        let n_factors = spec.n_factors();
        let weights: Vec<f64> = layout.mixture.weights.iter().map(|s| s.value(params)).collect();
        if weights.iter().any(|w| *w < 0.0) {
            return Err(FilterError::NumericalDegeneracy {
                reason: "mixture weights sum to more than one",
            });
        }
        let means = layout
            .mixture
            .means
            .iter()
            .map(|row| row.iter().map(|s| s.value(params)).collect::<Array1<f64>>())
            .collect();
        let covs = layout
            .mixture
            .cholesky
            .iter()
            .map(|tri| {
                let mut l = Array2::<f64>::zeros((n_factors, n_factors));
                for (row, col, slot) in tri {
                    l[[*row, *col]] = slot.value(params);
                }
                l.dot(&l.t())
            })
            .collect();

        let anchoring = match &layout.anchoring {
            Some(slots) => {
                let variance = slots.variance.value(params);
                check_variance(variance)?;
                Some(AnchoringParams {
                    loadings: slots.loadings.iter().map(|s| s.value(params)).collect(),
                    intercept: slots.intercept.value(params),
                    controls: slots.controls.iter().map(|s| s.value(params)).collect(),
                    variance,
                })
            }
            None => None,
        };

        Ok(Self {
            measurement,
            transition,
            shock_variance,
            mixture: MixtureParams { weights, means, covs },
            anchoring,
        })
    }
}

fn check_variance(v: f64) -> FilterResult<()> {
    if v < 0.0 {
        return Err(FilterError::NumericalDegeneracy { reason: "negative variance" });
    }
    Ok(())
}

/// Per-index bound transform.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Bound {
    Free,
    Lower(f64),
    Upper(f64),
    Interval(f64, f64),
}

/// Bijection between the bounded parameter vector and unconstrained θ.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTransform {
    bounds: Vec<Bound>,
}

impl ParamTransform {
    pub fn from_layout(layout: &ParamLayout) -> Self {
        Self::from_bounds(layout.lower_bounds().view(), layout.upper_bounds().view())
    }

    pub fn from_bounds(lower: ArrayView1<f64>, upper: ArrayView1<f64>) -> Self {
        let bounds = lower
            .iter()
            .zip(upper.iter())
            .map(|(&lb, &ub)| match (lb.is_finite(), ub.is_finite()) {
                (false, false) => Bound::Free,
                (true, false) => Bound::Lower(lb),
                (false, true) => Bound::Upper(ub),
                (true, true) => Bound::Interval(lb, ub),
            })
            .collect();
        Self { bounds }
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Map bounded parameters to θ. Values on a bound are clamped inside it.
    pub fn to_theta(&self, params: ArrayView1<f64>) -> Array1<f64> {
        params
            .iter()
            .zip(&self.bounds)
            .map(|(&p, b)| match *b {
                Bound::Free => p,
                Bound::Lower(lb) => safe_softplus_inv(p - lb),
                Bound::Upper(ub) => safe_softplus_inv(ub - p),
                Bound::Interval(lb, ub) => safe_logit((p - lb) / (ub - lb)),
            })
            .collect()
    }

    /// Map θ back to bounded parameters.
    pub fn from_theta(&self, theta: ArrayView1<f64>) -> Array1<f64> {
        theta
            .iter()
            .zip(&self.bounds)
            .map(|(&t, b)| match *b {
                Bound::Free => t,
                Bound::Lower(lb) => lb + safe_softplus(t),
                Bound::Upper(ub) => ub - safe_softplus(t),
                Bound::Interval(lb, ub) => lb + (ub - lb) * safe_logistic(t),
            })
            .collect()
    }

    /// Diagonal Jacobian `∂params / ∂θ` at θ (used by the delta method).
    pub fn jacobian_diag(&self, theta: ArrayView1<f64>) -> Array1<f64> {
        theta
            .iter()
            .zip(&self.bounds)
            .map(|(&t, b)| match *b {
                Bound::Free => 1.0,
                Bound::Lower(_) => safe_logistic(t),
                Bound::Upper(_) => -safe_logistic(t),
                Bound::Interval(lb, ub) => {
                    let p = safe_logistic(t);
                    (ub - lb) * p * (1.0 - p)
                }
            })
            .collect()
    }
}
