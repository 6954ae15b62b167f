//! filter — sigma-point filter over a mixture-of-normals belief.
//!
//! Purpose
//! -------
//! Run the per-individual recursion of the latent factors: start from the
//! initial mixture, correct the belief with each period's observed
//! measurements, and propagate it through the nonlinear transition
//! equations with Julier sigma points.
//!
//! Key behaviors
//! -------------
//! - [`update`] conditions every mixture component on the *observed*
//!   measurements of one individual-period (missing entries are dropped
//!   from the observation vector, so its dimension varies by row). The
//!   measurement equations are linear, so the correction is the exact
//!   Kalman update; mixture weights are reweighted by each component's
//!   residual density with a log-sum-exp.
//! - [`predict`] maps each component's sigma points through
//!   [`transition_point`], recombines them into a mean and covariance and
//!   adds the diagonal shock covariance of the stage. Weights carry over.
//! - [`anchoring_loglik`] adds the final-period density of the anchoring
//!   outcome without changing the belief.
//! - [`filter_individual`] chains these steps over all periods and
//!   optionally records the posterior mean after each update.
//!
//! Invariants & assumptions
//! ------------------------
//! - Beliefs are never mutated; each step returns a new [`Belief`].
//! - Non-positive-definite residual covariances, covariances without a real
//!   square root and non-finite transition values are
//!   `FilterError::NumericalDegeneracy`. A NaN log-likelihood contribution
//!   is `FilterError::NonFiniteValue`.
//! - A missing control value skips the individual-period (no update, no
//!   contribution).
//!
//! Conventions
//! -----------
//! - The transition out of period `t` uses stage `stagemap[t]`.
//! - Under `truly_anchor_latent_factors`, anchored factors enter the
//!   transition on the outcome scale `λ_f x + c` and are mapped back.
//!
//! Testing notes
//! -------------
//! - Unit tests cover the zero-noise prediction, the observed-subset
//!   dimension for missing values, skipping on missing controls and the
//!   closed-form one-factor update.
use crate::{
    model::{
        core::{
            belief::{Belief, Component},
            data::IndividualData,
            linalg::CholeskyFactor,
            options::AnchoringMode,
            params::{AnchoringParams, MeasurementParams, ModelParams},
            sigma::SigmaWeights,
            spec::{AnchoringSpec, MeasurementEquation, ModelSpec},
        },
        errors::{FilterError, FilterResult},
    },
    optimization::numerical_stability::log_sum_exp,
};
use ndarray::{Array1, Array2, ArrayView1};

/// Result of one measurement update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub belief: Belief,
    /// Log-likelihood contribution (0 when nothing was observed).
    pub loglik: f64,
    /// Dimension of the observation vector actually used.
    pub n_observed: usize,
}

/// Affine map of the factors onto the scale the transitions are evaluated on.
#[derive(Debug, Clone, PartialEq)]
pub struct StateScaling {
    pub scale: Vec<f64>,
    pub shift: Vec<f64>,
}

impl StateScaling {
    pub fn identity(n: usize) -> Self {
        Self { scale: vec![1.0; n], shift: vec![0.0; n] }
    }

    /// Scaling implied by the anchoring options: identity unless the model
    /// truly anchors the latent factors.
    ///
    /// Errors
    /// ------
    /// - `FilterError::NumericalDegeneracy` for a zero anchoring loading.
    pub fn for_model(spec: &ModelSpec, params: &ModelParams) -> FilterResult<Self> {
        let mut scaling = Self::identity(spec.n_factors());
        if spec.general.anchoring_mode != AnchoringMode::TrulyAnchorLatentFactors {
            return Ok(scaling);
        }
        let (Some(a), Some(ap)) = (&spec.anchoring, &params.anchoring) else {
            return Ok(scaling);
        };
        let shift = if spec.general.ignore_intercept_in_linear_anchoring { 0.0 } else { ap.intercept };
        for (&f, &loading) in a.factors.iter().zip(&ap.loadings) {
            if loading == 0.0 {
                return Err(FilterError::NumericalDegeneracy { reason: "zero anchoring loading" });
            }
            scaling.scale[f] = loading;
            scaling.shift[f] = shift;
        }
        Ok(scaling)
    }

    fn is_identity(&self) -> bool {
        self.scale.iter().all(|s| *s == 1.0) && self.shift.iter().all(|c| *c == 0.0)
    }
}

/// Expected next-period factor vector at one point.
///
/// Parameters
/// ----------
/// - `spec`: `&ModelSpec`
/// - `coeffs`: long-form coefficients of the stage, indexed by factor.
/// - `x`: current factor values.
/// - `scaling`: scale on which transitions are evaluated.
///
/// Errors
/// ------
/// - `FilterError::NumericalDegeneracy` if any transition value is not finite.
pub fn transition_point(
    spec: &ModelSpec, coeffs: &[Vec<f64>], x: ArrayView1<f64>, scaling: &StateScaling,
) -> FilterResult<Array1<f64>> {
    let scaled: Vec<f64> = if scaling.is_identity() {
        x.to_vec()
    } else {
        x.iter()
            .enumerate()
            .map(|(f, v)| scaling.scale[f] * v + scaling.shift[f])
            .collect()
    };
    let mut out = Array1::zeros(spec.n_factors());
    let mut inputs = Vec::with_capacity(spec.n_factors());
    for (f, factor) in spec.factors.iter().enumerate() {
        inputs.clear();
        inputs.extend(factor.included.iter().map(|&p| scaled[p]));
        let value = factor.transition.evaluate(&inputs, scaled[f], &coeffs[f]);
        if !value.is_finite() {
            return Err(FilterError::NumericalDegeneracy { reason: "non-finite transition value" });
        }
        out[f] = (value - scaling.shift[f]) / scaling.scale[f];
    }
    Ok(out)
}

/// Propagate the belief from period `t` to `t + 1` with stage `stage`.
pub fn predict(
    belief: &Belief, spec: &ModelSpec, params: &ModelParams, stage: usize,
    sigma: &SigmaWeights, scaling: &StateScaling,
) -> FilterResult<Belief> {
    let coeffs = &params.transition[stage];
    let shocks = &params.shock_variance[stage];
    let mut components = Vec::with_capacity(belief.components().len());
    for c in belief.components() {
        let points = sigma.points(c.mean.view(), c.cov.view())?;
        let mut mapped = Array2::zeros(points.raw_dim());
        for (i, row) in points.rows().into_iter().enumerate() {
            mapped.row_mut(i).assign(&transition_point(spec, coeffs, row, scaling)?);
        }
        let (mean, mut cov) = sigma.moments(mapped.view());
        for (f, q) in shocks.iter().enumerate() {
            cov[[f, f]] += q;
        }
        components.push(Component { log_weight: c.log_weight, mean, cov });
    }
    Ok(Belief::new(components))
}

/// Condition the belief on one individual-period's measurements.
///
/// Parameters
/// ----------
/// - `belief`: prior belief for the period.
/// - `equations`: the period's measurement equations.
/// - `params`: matching measurement parameters.
/// - `y`: observed values aligned with `equations` (`NaN` = missing).
/// - `controls`: the period's control values.
///
/// Returns
/// -------
/// `FilterResult<UpdateOutcome>`: the posterior, the log-density of the
/// observed measurements and the observation dimension. With no observed
/// measurement, or a missing control, the prior is returned unchanged.
pub fn update(
    belief: &Belief, equations: &[MeasurementEquation], params: &[MeasurementParams],
    y: ArrayView1<f64>, controls: ArrayView1<f64>,
) -> FilterResult<UpdateOutcome> {
    let observed: Vec<usize> = (0..equations.len()).filter(|&j| !y[j].is_nan()).collect();
    if observed.is_empty() || controls.iter().any(|v| v.is_nan()) {
        return Ok(UpdateOutcome { belief: belief.clone(), loglik: 0.0, n_observed: 0 });
    }
    let n = belief.n_factors();
    let k = observed.len();
    let mut h = Array2::<f64>::zeros((k, n));
    let mut offset = Array1::<f64>::zeros(k);
    let mut obs = Array1::<f64>::zeros(k);
    let mut noise = Array1::<f64>::zeros(k);
    for (r, &j) in observed.iter().enumerate() {
        let (eq, p) = (&equations[j], &params[j]);
        for (&f, &loading) in eq.factors.iter().zip(&p.loadings) {
            h[[r, f]] = loading;
        }
        offset[r] = p.intercept + controls.dot(&ArrayView1::from(&p.controls[..]));
        obs[r] = y[j];
        noise[r] = p.variance;
    }
    let (components, loglik) =
        correct_components(belief, h.view(), offset.view(), obs.view(), noise.view())?;
    Ok(UpdateOutcome { belief: Belief::new(components), loglik, n_observed: k })
}

/// Kalman correction of every component and the mixture log-density.
fn correct_components(
    belief: &Belief, h: ndarray::ArrayView2<f64>, offset: ArrayView1<f64>, obs: ArrayView1<f64>,
    noise: ArrayView1<f64>,
) -> FilterResult<(Vec<Component>, f64)> {
    let prior_logs: Vec<f64> = belief.components().iter().map(|c| c.log_weight).collect();
    let prior_total = log_sum_exp(&prior_logs);
    let mut components = Vec::with_capacity(prior_logs.len());
    for c in belief.components() {
        let hp = h.dot(&c.cov);
        let mut s = hp.dot(&h.t());
        for (r, v) in noise.iter().enumerate() {
            s[[r, r]] += v;
        }
        let chol = CholeskyFactor::new(s.view())?;
        let residual = &obs - &(h.dot(&c.mean) + &offset);
        let log_density = chol.log_density(residual.view());
        let gain_t = chol.solve_matrix(hp.view());
        let mean = &c.mean + &gain_t.t().dot(&residual);
        let cov = &c.cov - &gain_t.t().dot(&hp);
        let cov = (&cov + &cov.t()) * 0.5;
        components.push(Component { log_weight: c.log_weight + log_density, mean, cov });
    }
    let post_logs: Vec<f64> = components.iter().map(|c| c.log_weight).collect();
    let post_total = log_sum_exp(&post_logs);
    let loglik = post_total - prior_total;
    if loglik.is_nan() {
        return Err(FilterError::NonFiniteValue { context: "measurement log-likelihood", value: loglik });
    }
    if !loglik.is_finite() {
        return Err(FilterError::NumericalDegeneracy { reason: "zero measurement density" });
    }
    for c in &mut components {
        c.log_weight -= post_total;
    }
    Ok((components, loglik))
}

/// Final-period log-density of the anchoring outcome.
///
/// Returns 0 when the outcome or a used control is missing. The belief is
/// not changed.
pub fn anchoring_loglik(
    belief: &Belief, anchoring: &AnchoringSpec, params: &AnchoringParams, outcome: f64,
    controls: ArrayView1<f64>,
) -> FilterResult<f64> {
    let used_controls =
        if anchoring.use_controls { controls } else { controls.slice_move(ndarray::s![..0]) };
    if outcome.is_nan() || used_controls.iter().any(|v| v.is_nan()) {
        return Ok(0.0);
    }
    let n = belief.n_factors();
    let mut h = Array2::<f64>::zeros((1, n));
    for (&f, &loading) in anchoring.factors.iter().zip(&params.loadings) {
        h[[0, f]] = loading;
    }
    let control_effect = used_controls.dot(&ArrayView1::from(&params.controls[..]));
    let offset = Array1::from_elem(1, params.intercept + control_effect);
    let obs = Array1::from_elem(1, outcome);
    let noise = Array1::from_elem(1, params.variance);
    let (_, loglik) = correct_components(belief, h.view(), offset.view(), obs.view(), noise.view())?;
    Ok(loglik)
}

/// Output of [`filter_individual`].
#[derive(Debug, Clone, PartialEq)]
pub struct IndividualFilterResult {
    pub loglik: f64,
    /// Posterior mean after each period's update (`n_periods × n_factors`),
    /// when requested.
    pub filtered_means: Option<Array2<f64>>,
}

/// Run the full recursion for one individual.
///
/// Errors
/// ------
/// - Any `FilterError` raised by the steps; degeneracies are left to the
///   caller to absorb.
pub fn filter_individual(
    spec: &ModelSpec, params: &ModelParams, sigma: &SigmaWeights, scaling: &StateScaling,
    data: &IndividualData<'_>, record: bool,
) -> FilterResult<IndividualFilterResult> {
    let n_periods = spec.n_periods;
    let mut belief = Belief::initial(&params.mixture);
    let mut loglik = 0.0;
    let mut means = record.then(|| Array2::<f64>::zeros((n_periods, spec.n_factors())));
    for t in 0..n_periods {
        let outcome = update(
            &belief,
            &spec.measurement_equations[t],
            &params.measurement[t],
            data.measurements[t],
            data.controls[t],
        )?;
        loglik += outcome.loglik;
        belief = outcome.belief;
        if let Some(m) = means.as_mut() {
            m.row_mut(t).assign(&belief.mean());
        }
        if t + 1 == n_periods {
            if let (Some(a), Some(ap), Some(q)) =
                (&spec.anchoring, &params.anchoring, data.anchoring_outcome)
            {
                loglik += anchoring_loglik(&belief, a, ap, q, data.controls[t])?;
            }
        } else {
            belief = predict(&belief, spec, params, spec.stagemap[t], sigma, scaling)?;
        }
    }
    Ok(IndividualFilterResult { loglik, filtered_means: means })
}
