//! anchoring — re-express latent factors on an anchoring outcome's scale.
//!
//! Purpose
//! -------
//! Post-process estimates and filtered states of a model with an anchoring
//! block. Nothing here runs inside the likelihood.
//!
//! Key behaviors
//! -------------
//! - [`side_regression`]: OLS of the final-period anchoring outcome on the
//!   filtered anchored factors, plus final-period controls if `use_controls`
//!   and a constant if `use_constant`. With `free_loadings = false` the
//!   loadings are fixed at 1 and the regression runs on `q − Σ θ_f`.
//! - [`anchor_states`]: `θ̃_f = λ_f θ_f + c` for anchored factors, where `c`
//!   is the anchoring intercept unless `ignore_intercept_in_linear_anchoring`.
//! - [`center_states`]: subtract each individual's outcome from its
//!   anchored factors in every period. Only well defined when the anchoring
//!   loadings are fixed and the intercept is zero; otherwise it still runs
//!   and logs a warning.
//! - [`anchored_transition_coefficients`]: transition coefficients on the
//!   anchored scale via
//!   [`TransitionEquation::anchored_coefficients`](crate::model::core::transition::TransitionEquation::anchored_coefficients).
//! - [`postprocess`] dispatches on [`AnchoringMode`]: the side regression
//!   supplies the scale in `only_estimate_anchoring_equation`; the
//!   likelihood's anchoring parameters supply it in
//!   `truly_anchor_latent_factors`, where transition coefficients are
//!   already on the outcome scale. The report carries both estimates of the
//!   anchoring equation when they exist and names the one behind the scale
//!   in [`AnchoringReport::scale_source`].
//!
//! Conventions
//! -----------
//! - States are `n_individuals × n_periods × n_factors` arrays as returned by
//!   [`filtered_states`](crate::model::core::likelihood::filtered_states).
use crate::model::{
    core::{
        data::Panel,
        options::AnchoringMode,
        params::{AnchoringParams, ModelParams},
        spec::{AnchoringSpec, ModelSpec},
        transition::Affine,
    },
    errors::{AnchoringError, AnchoringResult},
};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array3, ArrayView1, Axis, s};
use tracing::warn;

/// Result of the anchoring side regression.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchoringRegression {
    /// Aligned with the anchored factors (1 when loadings are fixed).
    pub loadings: Vec<f64>,
    /// 0 unless `use_constant`.
    pub intercept: f64,
    /// Aligned with the anchoring controls.
    pub controls: Vec<f64>,
    pub residual_variance: f64,
    pub n_obs: usize,
}

/// Anchored scale of each anchored factor.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchoringScale {
    pub loadings: Vec<f64>,
    pub intercept: f64,
}

/// Which estimate of the anchoring equation defines the anchored scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleSource {
    /// OLS on the filtered states ([`AnchoringReport::regression`]).
    SideRegression,
    /// Parameters estimated inside the likelihood
    /// ([`AnchoringReport::likelihood_equation`]).
    Likelihood,
}

/// Output of [`postprocess`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnchoringReport {
    pub mode: AnchoringMode,
    /// Side regression on filtered states; only run in
    /// `only_estimate_anchoring_equation`.
    pub regression: Option<AnchoringRegression>,
    /// Anchoring equation as estimated jointly with the measurement system.
    pub likelihood_equation: Option<AnchoringParams>,
    pub scale_source: ScaleSource,
    pub scale: AnchoringScale,
    pub anchored_states: Array3<f64>,
    /// `[stage][factor]`; `None` where no closed form exists or the stage is unused.
    pub transition: Vec<Vec<Option<Vec<f64>>>>,
}

fn check_states(spec: &ModelSpec, panel: &Panel, states: &Array3<f64>) -> AnchoringResult<()> {
    let expected = vec![panel.n_individuals(), spec.n_periods, spec.n_factors()];
    let found = states.shape().to_vec();
    if found != expected {
        return Err(AnchoringError::ShapeMismatch { context: "filtered states", expected, found });
    }
    Ok(())
}

/// OLS of the anchoring outcome on final-period filtered factors.
///
/// Errors
/// ------
/// - `AnchoringError::NotConfigured` without an anchoring block.
/// - `AnchoringError::ShapeMismatch` if `states` does not match the panel.
/// - `AnchoringError::InsufficientObservations` if complete rows do not
///   exceed the number of regressors.
/// - `AnchoringError::SingularDesign` if `XᵀX` is singular.
pub fn side_regression(
    spec: &ModelSpec, panel: &Panel, states: &Array3<f64>,
) -> AnchoringResult<AnchoringRegression> {
    let anchoring = spec.anchoring.as_ref().ok_or(AnchoringError::NotConfigured)?;
    let outcome = panel.anchoring_outcome().ok_or(AnchoringError::NotConfigured)?;
    check_states(spec, panel, states)?;
    let last = spec.n_periods - 1;
    let final_states = states.slice(s![.., last, ..]);
    let controls = panel.controls(last);
    let n_controls = if anchoring.use_controls { controls.ncols() } else { 0 };
    let n_loadings = if anchoring.free_loadings { anchoring.factors.len() } else { 0 };
    let n_regressors = n_loadings + n_controls + usize::from(anchoring.use_constant);

    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut targets: Vec<f64> = Vec::new();
    for i in 0..panel.n_individuals() {
        let q = outcome[i];
        let theta: Vec<f64> = anchoring.factors.iter().map(|&f| final_states[[i, f]]).collect();
        let ctrl = controls.row(i);
        if q.is_nan()
            || theta.iter().any(|v| v.is_nan())
            || ctrl.iter().take(n_controls).any(|v| v.is_nan())
        {
            continue;
        }
        let mut row = Vec::with_capacity(n_regressors);
        let target = if anchoring.free_loadings {
            row.extend_from_slice(&theta);
            q
        } else {
            q - theta.iter().sum::<f64>()
        };
        row.extend(ctrl.iter().take(n_controls));
        if anchoring.use_constant {
            row.push(1.0);
        }
        rows.push(row);
        targets.push(target);
    }
    let n_obs = rows.len();
    if n_obs <= n_regressors {
        return Err(AnchoringError::InsufficientObservations { n_obs, n_regressors });
    }

    let beta = if n_regressors == 0 {
        DVector::zeros(0)
    } else {
        let x = DMatrix::from_fn(n_obs, n_regressors, |r, c| rows[r][c]);
        let y = DVector::from_vec(targets.clone());
        let chol = (x.transpose() * &x).cholesky().ok_or(AnchoringError::SingularDesign)?;
        chol.solve(&(x.transpose() * y))
    };
    let fitted: Vec<f64> = rows
        .iter()
        .map(|row| row.iter().zip(beta.iter()).map(|(a, b)| a * b).sum())
        .collect();
    let ssr: f64 = targets.iter().zip(&fitted).map(|(y, f)| (y - f).powi(2)).sum();

    let coef: Vec<f64> = beta.iter().copied().collect();
    let loadings = if anchoring.free_loadings {
        coef[..n_loadings].to_vec()
    } else {
        vec![1.0; anchoring.factors.len()]
    };
    let ctrl_coef = coef[n_loadings..n_loadings + n_controls].to_vec();
    let intercept = if anchoring.use_constant { coef[n_regressors - 1] } else { 0.0 };
    Ok(AnchoringRegression {
        loadings,
        intercept,
        controls: ctrl_coef,
        residual_variance: ssr / (n_obs - n_regressors) as f64,
        n_obs,
    })
}

/// Map anchored factors onto the outcome scale (`λ_f θ_f + c`).
pub fn anchor_states(
    states: &Array3<f64>, anchoring: &AnchoringSpec, scale: &AnchoringScale,
) -> Array3<f64> {
    let mut out = states.clone();
    for (&f, &loading) in anchoring.factors.iter().zip(&scale.loadings) {
        out.index_axis_mut(Axis(2), f).mapv_inplace(|v| loading * v + scale.intercept);
    }
    out
}

/// Subtract each individual's anchoring outcome from its anchored factors.
///
/// Errors
/// ------
/// - `AnchoringError::ShapeMismatch` if `outcome` has the wrong length.
pub fn center_states(
    states: &Array3<f64>, anchoring: &AnchoringSpec, outcome: ArrayView1<f64>,
) -> AnchoringResult<Array3<f64>> {
    if outcome.len() != states.len_of(Axis(0)) {
        return Err(AnchoringError::ShapeMismatch {
            context: "anchoring outcome",
            expected: vec![states.len_of(Axis(0))],
            found: vec![outcome.len()],
        });
    }
    if anchoring.free_loadings || anchoring.use_constant {
        warn!(
            free_loadings = anchoring.free_loadings,
            use_constant = anchoring.use_constant,
            "centering anchored factors with free anchoring loadings or intercept"
        );
    }
    let mut out = states.clone();
    for (i, &q) in outcome.iter().enumerate() {
        for &f in &anchoring.factors {
            out.slice_mut(s![i, .., f]).mapv_inplace(|v| v - q);
        }
    }
    Ok(out)
}

/// Transition coefficients on the anchored scale, `[stage][factor]`.
///
/// Anchored factors are mapped to `λ_f x + c` with `c = scale.intercept`;
/// the others are left unchanged. The returned coefficients satisfy
/// `f̃(λ x + c) = λ_out f(x) + c_out`.
pub fn anchored_transition_coefficients(
    spec: &ModelSpec, params: &ModelParams, anchoring: &AnchoringSpec, scale: &AnchoringScale,
) -> Vec<Vec<Option<Vec<f64>>>> {
    let mut maps = vec![Affine::IDENTITY; spec.n_factors()];
    for (&f, &l) in anchoring.factors.iter().zip(&scale.loadings) {
        maps[f] = Affine { scale: l, shift: scale.intercept };
    }
    params
        .transition
        .iter()
        .map(|stage| {
            stage
                .iter()
                .enumerate()
                .map(|(f, coeffs)| {
                    if coeffs.is_empty() && !spec.factors[f].transition.is_constant() {
                        return None;
                    }
                    let factor = &spec.factors[f];
                    let inputs: Vec<Affine> = factor.included.iter().map(|&p| maps[p]).collect();
                    factor.transition.anchored_coefficients(coeffs, &inputs, maps[f])
                })
                .collect()
        })
        .collect()
}

/// Anchoring post-processing of estimated parameters and filtered states.
///
/// Parameters
/// ----------
/// - `spec`, `panel`: model and aligned data.
/// - `params`: structured estimates.
/// - `states`: filtered states at the estimates.
///
/// Errors
/// ------
/// - `AnchoringError::NotConfigured` without an anchoring block.
/// - `AnchoringError::ZeroLoading` if an anchored factor's scale is zero.
/// - Errors of [`side_regression`] and [`center_states`].
pub fn postprocess(
    spec: &ModelSpec, panel: &Panel, params: &ModelParams, states: &Array3<f64>,
) -> AnchoringResult<AnchoringReport> {
    let anchoring = spec.anchoring.as_ref().ok_or(AnchoringError::NotConfigured)?;
    check_states(spec, panel, states)?;
    let mode = spec.general.anchoring_mode;
    let use_intercept = !spec.general.ignore_intercept_in_linear_anchoring;
    let likelihood_equation = params.anchoring.clone();
    let (regression, scale_source, scale) = match mode {
        AnchoringMode::OnlyEstimateAnchoringEquation => {
            let reg = side_regression(spec, panel, states)?;
            let scale = AnchoringScale {
                loadings: reg.loadings.clone(),
                intercept: if use_intercept { reg.intercept } else { 0.0 },
            };
            (Some(reg), ScaleSource::SideRegression, scale)
        }
        AnchoringMode::TrulyAnchorLatentFactors => {
            let ap = likelihood_equation.as_ref().ok_or(AnchoringError::NotConfigured)?;
            let scale = AnchoringScale {
                loadings: ap.loadings.clone(),
                intercept: if use_intercept { ap.intercept } else { 0.0 },
            };
            (None, ScaleSource::Likelihood, scale)
        }
    };
    for (&f, &l) in anchoring.factors.iter().zip(&scale.loadings) {
        if l == 0.0 {
            return Err(AnchoringError::ZeroLoading { factor: spec.factors[f].name.clone() });
        }
    }

    let mut anchored_states = anchor_states(states, anchoring, &scale);
    if anchoring.center {
        let outcome = panel.anchoring_outcome().ok_or(AnchoringError::NotConfigured)?;
        anchored_states = center_states(&anchored_states, anchoring, outcome.view())?;
    }
    let transition = match mode {
        AnchoringMode::OnlyEstimateAnchoringEquation => {
            anchored_transition_coefficients(spec, params, anchoring, &scale)
        }
        AnchoringMode::TrulyAnchorLatentFactors => params
            .transition
            .iter()
            .map(|stage| stage.iter().map(|c| Some(c.clone())).collect())
            .collect(),
    };
    Ok(AnchoringReport {
        mode,
        regression,
        likelihood_equation,
        scale_source,
        scale,
        anchored_states,
        transition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::core::{
        data::Dataset, fixtures, layout::ParamLayout, transition::TransitionEquation,
    };
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;
    use serde_json::json;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Exact recovery by the side regression on noiseless data.
    // - Fixed loadings, centering and error paths.
    // - Anchored transition coefficients in the post-processor, with and
    //   without an intercept shift.
    // - Labelling of the two anchoring-equation estimates.
    //
    // They intentionally DO NOT cover:
    // - Estimation of the anchoring equation inside the likelihood.
    // -------------------------------------------------------------------------

    /// One-factor, two-period spec anchored on `q` with the given options.
    fn anchored_spec(anchoring: serde_json::Value) -> ModelSpec {
        let mut raw = fixtures::one_factor_linear_spec(2);
        raw["time_specific"] = json!({ "anchoring": anchoring });
        ModelSpec::from_value(&raw).expect("valid")
    }

    fn panel_with_outcome(spec: &ModelSpec, q: &[f64]) -> Panel {
        let n = q.len();
        let mut ids = Vec::new();
        let mut periods = Vec::new();
        for i in 0..n {
            for t in 0..2 {
                ids.push(format!("i{i}"));
                periods.push(t);
            }
        }
        let mut columns: Vec<(String, Vec<f64>)> =
            ["m1", "m2", "m3"].iter().map(|m| (m.to_string(), vec![0.0; 2 * n])).collect();
        let outcome: Vec<f64> = q.iter().flat_map(|&v| [f64::NAN, v]).collect();
        columns.push(("q".to_string(), outcome));
        let data = Dataset::new(ids, periods, columns).expect("valid dataset");
        Panel::align(spec, &data).expect("aligned")
    }

    fn states_from(final_values: &[f64]) -> Array3<f64> {
        let mut states = Array3::zeros((final_values.len(), 2, 1));
        for (i, v) in final_values.iter().enumerate() {
            states[[i, 1, 0]] = *v;
            states[[i, 0, 0]] = v - 1.0;
        }
        states
    }

    #[test]
    // Purpose
    // -------
    // The side regression recovers loading and intercept on exact data.
    //
    // Given
    // -----
    // - q = 0.5 + 2 θ for θ in {-1, 0, 1, 2}; free loadings and a constant.
    //
    // Expect
    // ------
    // - Loading 2, intercept 0.5, zero residual variance.
    fn side_regression_recovers_exact_relation() {
        // Arrange
        let spec = anchored_spec(json!({
            "outcome": "q", "factors": ["skill"], "free_loadings": true, "use_constant": true
        }));
        let theta = [-1.0, 0.0, 1.0, 2.0];
        let q: Vec<f64> = theta.iter().map(|t| 0.5 + 2.0 * t).collect();
        let panel = panel_with_outcome(&spec, &q);

        // Act
        let reg = side_regression(&spec, &panel, &states_from(&theta)).expect("regression");

        // Assert
        assert_abs_diff_eq!(reg.loadings[0], 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(reg.intercept, 0.5, epsilon = 1e-10);
        assert_abs_diff_eq!(reg.residual_variance, 0.0, epsilon = 1e-12);
        assert_eq!(reg.n_obs, 4);
    }

    #[test]
    // Purpose
    // -------
    // Fixed loadings regress the shifted outcome; too few rows are reported.
    //
    // Given
    // -----
    // - q = θ + 1 with fixed loadings and a constant; a second panel with
    //   one complete row.
    //
    // Expect
    // ------
    // - Loading 1, intercept 1; `InsufficientObservations` for one row.
    fn fixed_loadings_and_insufficient_rows() {
        // Arrange
        let spec = anchored_spec(json!({
            "outcome": "q", "factors": ["skill"], "use_constant": true
        }));
        let theta = [0.0, 1.0, 3.0];
        let q: Vec<f64> = theta.iter().map(|t| t + 1.0).collect();
        let panel = panel_with_outcome(&spec, &q);
        let sparse = panel_with_outcome(&spec, &[1.0, f64::NAN, f64::NAN]);

        // Act
        let reg = side_regression(&spec, &panel, &states_from(&theta)).expect("regression");
        let err = side_regression(&spec, &sparse, &states_from(&theta)).unwrap_err();

        // Assert
        assert_eq!(reg.loadings, vec![1.0]);
        assert_abs_diff_eq!(reg.intercept, 1.0, epsilon = 1e-10);
        assert_eq!(err, AnchoringError::InsufficientObservations { n_obs: 1, n_regressors: 1 });
    }

    #[test]
    // Purpose
    // -------
    // Centering subtracts the outcome in every period.
    //
    // Given
    // -----
    // - States θ_1 = [1, 2], θ_0 = θ_1 − 1, outcomes [1, 2].
    //
    // Expect
    // ------
    // - Final-period centered states 0, period-0 states -1.
    fn center_subtracts_outcome_in_every_period() {
        // Arrange
        let spec = anchored_spec(json!({ "outcome": "q", "factors": ["skill"], "center": true }));
        let anchoring = spec.anchoring.as_ref().expect("anchoring");
        let states = states_from(&[1.0, 2.0]);

        // Act
        let centered =
            center_states(&states, anchoring, Array1::from(vec![1.0, 2.0]).view()).expect("shape");

        // Assert
        assert_eq!(centered[[0, 1, 0]], 0.0);
        assert_eq!(centered[[1, 1, 0]], 0.0);
        assert_eq!(centered[[1, 0, 0]], -1.0);
    }

    #[test]
    // Purpose
    // -------
    // The post-processor reports transition coefficients on the anchored scale.
    //
    // Given
    // -----
    // - Linear transition x' = 0.9 x + 0.2, outcome q = 2 θ exactly.
    //
    // Expect
    // ------
    // - Scale 2 and anchored coefficients [0.9, 0.4].
    fn postprocess_rescales_linear_transition() {
        // Arrange
        let spec = anchored_spec(json!({
            "outcome": "q", "factors": ["skill"], "free_loadings": true
        }));
        let layout = ParamLayout::build(&spec).expect("layout");
        let mut params =
            ModelParams::from_vector(&spec, &layout, layout.start_params().view()).expect("valid");
        params.transition[0][0] = vec![0.9, 0.2];
        let theta = [-1.0, 0.5, 1.0, 2.0];
        let q: Vec<f64> = theta.iter().map(|t| 2.0 * t).collect();
        let panel = panel_with_outcome(&spec, &q);

        // Act
        let report = postprocess(&spec, &panel, &params, &states_from(&theta)).expect("report");

        // Assert
        assert_abs_diff_eq!(report.scale.loadings[0], 2.0, epsilon = 1e-10);
        let coeffs = report.transition[0][0].as_ref().expect("linear has a closed form");
        assert_abs_diff_eq!(coeffs[0], 0.9, epsilon = 1e-10);
        assert_abs_diff_eq!(coeffs[1], 0.4, epsilon = 1e-10);
        assert_abs_diff_eq!(report.anchored_states[[3, 1, 0]], 4.0, epsilon = 1e-10);
    }

    #[test]
    // Purpose
    // -------
    // With an anchoring intercept the anchored transition maps anchored
    // states the way the original transition maps latent states.
    //
    // Given
    // -----
    // - Linear transition x' = 0.8 x + 0.3; outcome q = 0.5 + 2 θ exactly,
    //   estimated with a constant that is kept in the anchored scale.
    //
    // Expect
    // ------
    // - Scale (2, 0.5); f̃(2 x + 0.5) = 2 f(x) + 0.5 at x = 1, i.e. 2.7.
    fn postprocess_folds_intercept_into_anchored_transition() {
        // Arrange
        let mut raw = fixtures::one_factor_linear_spec(2);
        raw["time_specific"] = json!({
            "anchoring": {
                "outcome": "q", "factors": ["skill"], "free_loadings": true, "use_constant": true
            },
            "general": { "ignore_intercept_in_linear_anchoring": false }
        });
        let spec = ModelSpec::from_value(&raw).expect("valid");
        let layout = ParamLayout::build(&spec).expect("layout");
        let mut params =
            ModelParams::from_vector(&spec, &layout, layout.start_params().view()).expect("valid");
        params.transition[0][0] = vec![0.8, 0.3];
        let theta = [-1.0, 0.5, 1.0, 2.0];
        let q: Vec<f64> = theta.iter().map(|t| 0.5 + 2.0 * t).collect();
        let panel = panel_with_outcome(&spec, &q);

        // Act
        let report = postprocess(&spec, &panel, &params, &states_from(&theta)).expect("report");

        // Assert
        assert_abs_diff_eq!(report.scale.intercept, 0.5, epsilon = 1e-10);
        let coeffs = report.transition[0][0].as_ref().expect("linear has a closed form");
        let via = TransitionEquation::Linear.evaluate(&[2.0 * 1.0 + 0.5], 0.0, coeffs);
        assert_abs_diff_eq!(via, 2.7, epsilon = 1e-9);
    }

    #[test]
    // Purpose
    // -------
    // Both estimates of the anchoring equation are reported and the one
    // behind the scale is named.
    //
    // Given
    // -----
    // - Free loadings; likelihood parameters at their start (loading 1)
    //   while the exact data imply a loading of 2.
    // - The same inputs under `truly_anchor_latent_factors`.
    //
    // Expect
    // ------
    // - Only-estimate: scale from the side regression (2); the likelihood
    //   loading 1 is kept separately.
    // - Truly anchor: no side regression, scale from the likelihood (1).
    fn report_labels_the_anchoring_estimate_in_use() {
        // Arrange
        let raw_anchoring = json!({ "outcome": "q", "factors": ["skill"], "free_loadings": true });
        let spec = anchored_spec(raw_anchoring.clone());
        let mut raw = fixtures::one_factor_linear_spec(2);
        raw["time_specific"] = json!({
            "anchoring": raw_anchoring,
            "general": { "anchoring_mode": "truly_anchor_latent_factors" }
        });
        let truly = ModelSpec::from_value(&raw).expect("valid");
        let layout = ParamLayout::build(&spec).expect("layout");
        let params =
            ModelParams::from_vector(&spec, &layout, layout.start_params().view()).expect("valid");
        let theta = [-1.0, 0.5, 1.0, 2.0];
        let q: Vec<f64> = theta.iter().map(|t| 2.0 * t).collect();
        let panel = panel_with_outcome(&spec, &q);

        // Act
        let estimate = postprocess(&spec, &panel, &params, &states_from(&theta)).expect("report");
        let anchored = postprocess(&truly, &panel, &params, &states_from(&theta)).expect("report");

        // Assert
        assert_eq!(estimate.scale_source, ScaleSource::SideRegression);
        assert_abs_diff_eq!(estimate.scale.loadings[0], 2.0, epsilon = 1e-10);
        let in_likelihood = estimate.likelihood_equation.as_ref().expect("likelihood estimate");
        assert_eq!(in_likelihood.loadings, vec![1.0]);
        assert_eq!(anchored.scale_source, ScaleSource::Likelihood);
        assert!(anchored.regression.is_none());
        assert_eq!(anchored.scale.loadings, vec![1.0]);
    }
}
