//! likelihood — total log-likelihood over a panel.
//!
//! Purpose
//! -------
//! Aggregate the per-individual filter recursions into one scalar for a
//! parameter vector, and collect filtered factor means for reporting.
//!
//! Key behaviors
//! -------------
//! - Individuals are filtered independently, on the rayon pool when
//!   `parallel` is set. Contributions are collected in individual order and
//!   summed sequentially, so the parallel and sequential paths agree
//!   bitwise.
//! - A `NumericalDegeneracy` anywhere (including when reading the
//!   parameter vector) makes the whole evaluation `-inf`. Every other
//!   `FilterError` is returned to the caller.
//! - [`log_likelihood_contributions`] keeps the per-individual terms; a
//!   degenerate individual contributes `-inf` on its own.
//!
//! Invariants & assumptions
//! ------------------------
//! - Evaluation has no side effects beyond `debug` logging; the spec,
//!   layout and panel are shared read-only.
use crate::model::{
    core::{
        data::Panel,
        filter::{IndividualFilterResult, StateScaling, filter_individual},
        layout::ParamLayout,
        params::ModelParams,
        sigma::SigmaWeights,
        spec::ModelSpec,
    },
    errors::{FilterError, FilterResult},
};
use ndarray::{Array1, Array3, ArrayView1};
use rayon::prelude::*;
use tracing::debug;

/// Finite value reported to the optimizer instead of `-inf`.
pub const DEGENERATE_LOGLIK_PENALTY: f64 = -1e10;

fn run_filters(
    spec: &ModelSpec, params: &ModelParams, panel: &Panel, parallel: bool, record: bool,
) -> FilterResult<Vec<FilterResult<IndividualFilterResult>>> {
    let sigma = SigmaWeights::julier(spec.n_factors(), spec.general.sigma_points_scale);
    let scaling = StateScaling::for_model(spec, params)?;
    let run = |i: usize| {
        filter_individual(spec, params, &sigma, &scaling, &panel.individual(i), record)
    };
    let n = panel.n_individuals();
    Ok(if parallel {
        (0..n).into_par_iter().map(run).collect()
    } else {
        (0..n).map(run).collect()
    })
}

/// Per-individual log-likelihood contributions at `params`, in panel order.
///
/// Returns
/// -------
/// `FilterResult<Array1<f64>>` of length `panel.n_individuals()`. An
/// individual whose recursion is numerically degenerate contributes `-inf`;
/// a degenerate parameter vector makes every entry `-inf`.
///
/// Errors
/// ------
/// - `FilterError::ParamLengthMismatch` / `NonFiniteValue` (fatal).
pub fn log_likelihood_contributions(
    spec: &ModelSpec, layout: &ParamLayout, panel: &Panel, params: ArrayView1<f64>, parallel: bool,
) -> FilterResult<Array1<f64>> {
    let n = panel.n_individuals();
    let absorb = |err: FilterError| -> FilterResult<Array1<f64>> {
        if err.is_degeneracy() {
            debug!(%err, "degenerate parameter vector");
            Ok(Array1::from_elem(n, f64::NEG_INFINITY))
        } else {
            Err(err)
        }
    };
    let model_params = match ModelParams::from_vector(spec, layout, params) {
        Ok(p) => p,
        Err(err) => return absorb(err),
    };
    let results = match run_filters(spec, &model_params, panel, parallel, false) {
        Ok(r) => r,
        Err(err) => return absorb(err),
    };
    let mut contributions = Array1::<f64>::zeros(n);
    for (i, result) in results.into_iter().enumerate() {
        contributions[i] = match result {
            Ok(r) => r.loglik,
            Err(err) if err.is_degeneracy() => {
                debug!(individual = i, %err, "degenerate individual recursion");
                f64::NEG_INFINITY
            }
            Err(err) => return Err(err),
        };
    }
    Ok(contributions)
}

/// Total log-likelihood at `params`.
///
/// Parameters
/// ----------
/// - `spec`, `layout`: the model structure.
/// - `panel`: aligned data.
/// - `params`: full parameter vector (length `layout.n_free()`).
/// - `parallel`: filter individuals on the rayon pool.
///
/// Returns
/// -------
/// `FilterResult<f64>`: the log-likelihood, or `-inf` when the vector is
/// numerically degenerate.
///
/// Errors
/// ------
/// - `FilterError::ParamLengthMismatch` / `NonFiniteValue` (fatal).
pub fn log_likelihood(
    spec: &ModelSpec, layout: &ParamLayout, panel: &Panel, params: ArrayView1<f64>, parallel: bool,
) -> FilterResult<f64> {
    let contributions = log_likelihood_contributions(spec, layout, panel, params, parallel)?;
    let total: f64 = contributions.iter().sum();
    debug!(loglik = total, "evaluated log-likelihood");
    Ok(total)
}

/// Posterior factor means per individual and period
/// (`n_individuals × n_periods × n_factors`).
///
/// Errors
/// ------
/// - Any `FilterError`, degeneracies included.
pub fn filtered_states(
    spec: &ModelSpec, layout: &ParamLayout, panel: &Panel, params: ArrayView1<f64>, parallel: bool,
) -> FilterResult<Array3<f64>> {
    let model_params = ModelParams::from_vector(spec, layout, params)?;
    let results = run_filters(spec, &model_params, panel, parallel, true)?;
    let mut states =
        Array3::<f64>::zeros((panel.n_individuals(), spec.n_periods, spec.n_factors()));
    for (i, result) in results.into_iter().enumerate() {
        if let Some(means) = result?.filtered_means {
            states.index_axis_mut(ndarray::Axis(0), i).assign(&means);
        }
    }
    Ok(states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::core::{
        data::Dataset,
        fixtures,
        layout::{Block, ParamId, Slot},
    };
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Agreement of the parallel and sequential paths.
    // - Absorption of degeneracies into -inf, and fatal length and
    //   non-finite input errors.
    // - Per-individual contributions and their sum.
    // - Mixture likelihood against a hand-computed density.
    // - Truly anchored evaluation versus only estimating the equation.
    //
    // They intentionally DO NOT cover:
    // - Statistical properties (integration tests use simulated data).
    // -------------------------------------------------------------------------

    fn setup() -> (ModelSpec, ParamLayout, Panel) {
        let spec = ModelSpec::from_value(&fixtures::one_factor_linear_spec(3)).expect("valid");
        let layout = ParamLayout::build(&spec).expect("layout");
        let mut ids = Vec::new();
        let mut periods = Vec::new();
        let mut cols: Vec<Vec<f64>> = vec![Vec::new(); 3];
        for i in 0..20 {
            for t in 0..3 {
                ids.push(format!("p{i}"));
                periods.push(t);
                for (k, col) in cols.iter_mut().enumerate() {
                    let v = ((i * 7 + t * 3 + k) % 11) as f64 / 5.0 - 1.0;
                    col.push(if (i + k + t) % 9 == 0 { f64::NAN } else { v });
                }
            }
        }
        let columns = ["m1", "m2", "m3"]
            .iter()
            .zip(cols)
            .map(|(n, c)| (n.to_string(), c))
            .collect();
        let data = Dataset::new(ids, periods, columns).expect("valid dataset");
        let panel = Panel::align(&spec, &data).expect("aligned");
        (spec, layout, panel)
    }

    /// The measurements of `base` plus a final-period anchoring outcome `q`.
    fn panel_with_anchoring(spec: &ModelSpec, base: &Panel, q: &[f64]) -> Panel {
        let n_periods = base.n_periods();
        let mut ids = Vec::new();
        let mut periods = Vec::new();
        let mut cols: Vec<Vec<f64>> = vec![Vec::new(); 4];
        for (i, id) in base.ids().iter().enumerate() {
            for t in 0..n_periods {
                ids.push(id.clone());
                periods.push(t);
                for (k, col) in cols.iter_mut().take(3).enumerate() {
                    col.push(base.measurements(t)[[i, k]]);
                }
                cols[3].push(if t + 1 == n_periods { q[i] } else { f64::NAN });
            }
        }
        let columns = ["m1", "m2", "m3", "q"]
            .iter()
            .zip(cols)
            .map(|(n, c)| (n.to_string(), c))
            .collect();
        let data = Dataset::new(ids, periods, columns).expect("valid dataset");
        Panel::align(spec, &data).expect("aligned")
    }

    #[test]
    // Purpose
    // -------
    // Parallel and sequential evaluation agree exactly.
    //
    // Given
    // -----
    // - 20 individuals over 3 periods with scattered missing values.
    //
    // Expect
    // ------
    // - Identical finite log-likelihoods.
    fn parallel_matches_sequential() {
        // Arrange
        let (spec, layout, panel) = setup();
        let start = layout.start_params();

        // Act
        let seq = log_likelihood(&spec, &layout, &panel, start.view(), false).expect("finite");
        let par = log_likelihood(&spec, &layout, &panel, start.view(), true).expect("finite");

        // Assert
        assert!(seq.is_finite());
        assert_eq!(seq.to_bits(), par.to_bits());
    }

    #[test]
    // Purpose
    // -------
    // Degeneracies become -inf; wrong lengths stay errors.
    //
    // Given
    // -----
    // - A zero measurement variance with a zero initial variance (singular
    //   residual covariance) and a too-short vector.
    //
    // Expect
    // ------
    // - `-inf` and `ParamLengthMismatch`.
    fn degeneracy_is_absorbed_but_length_error_is_not() {
        // Arrange
        let (spec, layout, panel) = setup();
        let mut params = layout.start_params().clone();
        for idx in layout.block_range(Block::MeasVariances) {
            params[idx] = 0.0;
        }
        for idx in layout.block_range(Block::Mixture) {
            params[idx] = 0.0;
        }
        let short = params.slice(ndarray::s![1..]).to_owned();

        // Act
        let value = log_likelihood(&spec, &layout, &panel, params.view(), false).expect("absorbed");
        let err = log_likelihood(&spec, &layout, &panel, short.view(), false).unwrap_err();

        // Assert
        assert_eq!(value, f64::NEG_INFINITY);
        assert!(matches!(err, FilterError::ParamLengthMismatch { .. }));
    }

    #[test]
    // Purpose
    // -------
    // A NaN in the parameter vector is a fatal error, not a degeneracy.
    //
    // Given
    // -----
    // - The start vector with one transition coefficient set to NaN.
    //
    // Expect
    // ------
    // - `FilterError::NonFiniteValue` from both the total and the
    //   contributions.
    fn nan_parameter_is_fatal() {
        // Arrange
        let (spec, layout, panel) = setup();
        let mut params = layout.start_params().clone();
        params[layout.block_range(Block::Transition).start] = f64::NAN;

        // Act
        let total = log_likelihood(&spec, &layout, &panel, params.view(), true).unwrap_err();
        let per_individual =
            log_likelihood_contributions(&spec, &layout, &panel, params.view(), false).unwrap_err();

        // Assert
        assert!(matches!(total, FilterError::NonFiniteValue { .. }));
        assert!(!total.is_degeneracy());
        assert!(matches!(per_individual, FilterError::NonFiniteValue { .. }));
    }

    #[test]
    // Purpose
    // -------
    // Contributions are per individual and add up to the total.
    //
    // Given
    // -----
    // - The 20 × 3 panel at the start vector, sequential and parallel.
    //
    // Expect
    // ------
    // - 20 finite, negative entries whose ordered sum is bitwise the total.
    fn contributions_sum_to_total() {
        // Arrange
        let (spec, layout, panel) = setup();
        let start = layout.start_params();

        // Act
        let contributions =
            log_likelihood_contributions(&spec, &layout, &panel, start.view(), true)
                .expect("finite");
        let total = log_likelihood(&spec, &layout, &panel, start.view(), false).expect("finite");

        // Assert
        assert_eq!(contributions.len(), 20);
        assert!(contributions.iter().all(|c| c.is_finite() && *c < 0.0));
        let summed: f64 = contributions.iter().sum();
        assert_eq!(summed.to_bits(), total.to_bits());
    }

    #[test]
    // Purpose
    // -------
    // A two-component initial mixture gives the mixture density of the
    // first-period measurement.
    //
    // Given
    // -----
    // - One factor, one period, measurement m1 only (loading 1, intercept 0,
    //   variance 1); m2 and m3 missing.
    // - Mixture weights (0.3, 0.7), means (-1, 2), variances (0.25, 1).
    // - One individual with m1 = 0.5.
    //
    // Expect
    // ------
    // - ℓ = ln(0.3 N(0.5; -1, 1.25) + 0.7 N(0.5; 2, 2)).
    fn two_component_mixture_matches_hand_density() {
        // Arrange
        let mut raw = fixtures::one_factor_linear_spec(1);
        raw["time_specific"] = json!({ "general": { "n_mixture_components": 2 } });
        let spec = ModelSpec::from_value(&raw).expect("valid");
        let layout = ParamLayout::build(&spec).expect("layout");
        let columns = vec![
            ("m1".to_string(), vec![0.5]),
            ("m2".to_string(), vec![f64::NAN]),
            ("m3".to_string(), vec![f64::NAN]),
        ];
        let data = Dataset::new(vec!["a".to_string()], vec![0], columns).expect("dataset");
        let panel = Panel::align(&spec, &data).expect("aligned");

        let mut params = layout.start_params().clone();
        let set = |params: &mut Array1<f64>, id: ParamId, value: f64| {
            let idx = layout.slot(&id).and_then(Slot::free_index).expect("free parameter");
            params[idx] = value;
        };
        let skill = || "skill".to_string();
        set(&mut params, ParamId::MixtureWeight { component: 0 }, 0.3);
        set(&mut params, ParamId::MixtureMean { component: 0, factor: skill() }, -1.0);
        set(&mut params, ParamId::MixtureMeanDiff { component: 1, factor: skill() }, 3.0);
        set(&mut params, ParamId::MixtureCholesky { component: 0, row: 0, col: 0 }, 0.5);
        set(&mut params, ParamId::MixtureCholesky { component: 1, row: 0, col: 0 }, 1.0);
        set(&mut params, ParamId::MeasVariance { period: 0, measurement: "m1".into() }, 1.0);

        // Act
        let value = log_likelihood(&spec, &layout, &panel, params.view(), false).expect("finite");

        // Assert
        let normal = |x: f64, mean: f64, var: f64| {
            (-(x - mean).powi(2) / (2.0 * var)).exp() / (2.0 * std::f64::consts::PI * var).sqrt()
        };
        let expected = (0.3 * normal(0.5, -1.0, 1.25) + 0.7 * normal(0.5, 2.0, 2.0)).ln();
        assert_abs_diff_eq!(value, expected, epsilon = 1e-10);
    }

    #[test]
    // Purpose
    // -------
    // Truly anchoring the factors changes the likelihood whenever the
    // anchoring map is not the identity.
    //
    // Given
    // -----
    // - The panel with an anchoring outcome, anchoring loading 2, intercept
    //   0.5 and a linear transition with persistence 0.7.
    // - The same vector under both anchoring modes.
    //
    // Expect
    // ------
    // - Finite log-likelihoods that differ.
    fn truly_anchoring_changes_the_likelihood() {
        // Arrange
        let anchoring = json!({
            "outcome": "q", "factors": ["skill"], "free_loadings": true, "use_constant": true
        });
        let mut raw = fixtures::one_factor_linear_spec(3);
        raw["time_specific"] = json!({
            "anchoring": anchoring,
            "general": { "ignore_intercept_in_linear_anchoring": false }
        });
        let estimate = ModelSpec::from_value(&raw).expect("valid");
        raw["time_specific"]["general"]["anchoring_mode"] = json!("truly_anchor_latent_factors");
        let truly = ModelSpec::from_value(&raw).expect("valid");
        let layout = ParamLayout::build(&estimate).expect("layout");
        let (_, _, base) = setup();
        let q: Vec<f64> = (0..20).map(|i| (i % 5) as f64 * 0.4 - 0.8).collect();
        let panel = panel_with_anchoring(&estimate, &base, &q);

        let mut params = layout.start_params().clone();
        let set = |params: &mut Array1<f64>, id: ParamId, value: f64| {
            let idx = layout.slot(&id).and_then(Slot::free_index).expect("free parameter");
            params[idx] = value;
        };
        set(&mut params, ParamId::AnchoringLoading { factor: "skill".into() }, 2.0);
        set(&mut params, ParamId::AnchoringIntercept, 0.5);
        for stage in 0..2 {
            let persistence = ParamId::Transition {
                stage,
                factor: "skill".into(),
                name: format!("lincoeff__{stage}__skill__skill"),
            };
            set(&mut params, persistence, 0.7);
        }

        // Act
        let ll_estimate =
            log_likelihood(&estimate, &layout, &panel, params.view(), false).expect("finite");
        let ll_truly =
            log_likelihood(&truly, &layout, &panel, params.view(), false).expect("finite");

        // Assert
        assert!(ll_estimate.is_finite() && ll_truly.is_finite());
        assert!((ll_estimate - ll_truly).abs() > 1e-6, "{ll_estimate} == {ll_truly}");
    }

    #[test]
    // Purpose
    // -------
    // Filtered states have one row per individual and period.
    //
    // Given
    // -----
    // - The 20 × 3 panel at the start vector.
    //
    // Expect
    // ------
    // - Shape (20, 3, 1) with finite entries.
    fn filtered_states_have_panel_shape() {
        let (spec, layout, panel) = setup();
        let states = filtered_states(&spec, &layout, &panel, layout.start_params().view(), true)
            .expect("valid");
        assert_eq!(states.dim(), (20, 3, 1));
        assert!(states.iter().all(|v| v.is_finite()));
    }
}
