//! simulate — draw a long-format dataset from known parameters.
//!
//! Purpose
//! -------
//! Generate data from the model itself for tests and Monte Carlo work. The
//! generated [`Dataset`] has the column layout [`Panel::align`] expects.
//!
//! Key behaviors
//! -------------
//! - Initial factors are drawn from the initial mixture: a component by its
//!   weight, then `mean + L z` with `L` the PSD square root of its
//!   covariance.
//! - Controls are standard normal, drawn once per individual and control
//!   name and repeated in every period the control is used.
//! - Period `t` measurements are `intercept + controls · β + Σ λ_f θ_f + ε`.
//!   Factors move with [`transition_point`] (honoring truly-anchored
//!   scaling) plus independent normal shocks of the stage.
//! - The anchoring outcome is drawn in the final period only; other rows
//!   carry `NaN`.
//! - Each measurement value is independently set missing with probability
//!   `missing_share`.
//!
//! Conventions
//! -----------
//! - Individual ids are `"0"`, `"1"`, … and every individual has one row
//!   per period, ordered by id then period.
//!
//! [`Panel::align`]: crate::model::core::data::Panel::align
use crate::model::{
    core::{
        data::Dataset,
        filter::{StateScaling, transition_point},
        layout::ParamLayout,
        linalg::psd_sqrt,
        params::ModelParams,
        spec::ModelSpec,
    },
    errors::{ModelError, ModelResult},
};
use ndarray::{Array1, Array3, ArrayView1};
use rand::{Rng, SeedableRng, rngs::StdRng};
use statrs::distribution::Normal;
use std::collections::HashMap;

/// Size, seed and missingness of a simulated dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOptions {
    pub n_individuals: usize,
    pub seed: u64,
    /// Probability in `[0, 1)` that a measurement value is dropped.
    pub missing_share: f64,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self { n_individuals: 500, seed: 42, missing_share: 0.0 }
    }
}

/// Simulated observed data plus the latent factors that produced it.
#[derive(Debug, Clone)]
pub struct SimulatedData {
    pub dataset: Dataset,
    /// True factors (`n_individuals × n_periods × n_factors`).
    pub factors: Array3<f64>,
}

/// Column store keyed by name, kept in first-use order.
struct Columns {
    names: Vec<String>,
    index: HashMap<String, usize>,
    values: Vec<Vec<f64>>,
    n_rows: usize,
}

impl Columns {
    fn new(n_rows: usize) -> Self {
        Self { names: Vec::new(), index: HashMap::new(), values: Vec::new(), n_rows }
    }

    fn set(&mut self, name: &str, row: usize, value: f64) {
        let idx = match self.index.get(name) {
            Some(&idx) => idx,
            None => {
                self.names.push(name.to_string());
                self.values.push(vec![f64::NAN; self.n_rows]);
                self.index.insert(name.to_string(), self.values.len() - 1);
                self.values.len() - 1
            }
        };
        self.values[idx][row] = value;
    }

    fn into_vec(self) -> Vec<(String, Vec<f64>)> {
        self.names.into_iter().zip(self.values).collect()
    }
}

fn draw_component(rng: &mut StdRng, weights: &[f64]) -> usize {
    let u: f64 = rng.gen();
    let mut acc = 0.0;
    for (k, w) in weights.iter().enumerate() {
        acc += w;
        if u < acc {
            return k;
        }
    }
    weights.len() - 1
}

/// Simulate a dataset from the full parameter vector `params`.
///
/// Parameters
/// ----------
/// - `spec`, `layout`: model structure.
/// - `params`: full parameter vector (length `layout.n_free()`).
/// - `options`: number of individuals, RNG seed and missing share.
///
/// Returns
/// -------
/// `ModelResult<SimulatedData>`; the same seed always yields the same data.
///
/// Errors
/// ------
/// - `ModelError::Filter` if `params` is invalid or a transition is not finite.
/// - `ModelError::Simulation` for an invalid missing share or zero individuals.
pub fn simulate_dataset(
    spec: &ModelSpec, layout: &ParamLayout, params: ArrayView1<f64>, options: &SimulationOptions,
) -> ModelResult<SimulatedData> {
    if !(0.0..1.0).contains(&options.missing_share) {
        return Err(ModelError::Simulation {
            reason: format!("missing_share must be in [0, 1), got {}", options.missing_share),
        });
    }
    if options.n_individuals == 0 {
        return Err(ModelError::Simulation { reason: "n_individuals must be positive".to_string() });
    }
    let model = ModelParams::from_vector(spec, layout, params)?;
    let scaling = StateScaling::for_model(spec, &model)?;
    let std_normal = Normal::new(0.0, 1.0)
        .map_err(|e| ModelError::Simulation { reason: e.to_string() })?;
    let mut rng = StdRng::seed_from_u64(options.seed);

    let n_ind = options.n_individuals;
    let n_periods = spec.n_periods;
    let n_factors = spec.n_factors();
    let roots = model
        .mixture
        .covs
        .iter()
        .map(|cov| psd_sqrt(cov.view()))
        .collect::<Result<Vec<_>, _>>()?;
    let control_names: Vec<&String> = {
        let mut seen: Vec<&String> = Vec::new();
        for name in spec.controls.iter().flatten() {
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    };

    let n_rows = n_ind * n_periods;
    let mut ids = Vec::with_capacity(n_rows);
    let mut periods = Vec::with_capacity(n_rows);
    let mut columns = Columns::new(n_rows);
    let mut factors = Array3::<f64>::zeros((n_ind, n_periods, n_factors));

    for i in 0..n_ind {
        let control_values: HashMap<&str, f64> =
            control_names.iter().map(|n| (n.as_str(), rng.sample(std_normal))).collect();

        let k = draw_component(&mut rng, &model.mixture.weights);
        let z: Array1<f64> = (0..n_factors).map(|_| rng.sample(std_normal)).collect();
        let mut state = &model.mixture.means[k] + &roots[k].dot(&z);

        for t in 0..n_periods {
            let row = i * n_periods + t;
            ids.push(i.to_string());
            periods.push(t);
            factors.slice_mut(ndarray::s![i, t, ..]).assign(&state);

            let ctrl: Array1<f64> =
                spec.controls[t].iter().map(|c| control_values[c.as_str()]).collect();
            for (c, name) in spec.controls[t].iter().enumerate() {
                columns.set(name, row, ctrl[c]);
            }
            for (eq, p) in spec.measurement_equations[t].iter().zip(&model.measurement[t]) {
                let mut y = p.intercept + ctrl.dot(&ArrayView1::from(&p.controls[..]));
                for (&f, loading) in eq.factors.iter().zip(&p.loadings) {
                    y += loading * state[f];
                }
                y += p.variance.sqrt() * rng.sample(std_normal);
                let missing = options.missing_share > 0.0 && rng.gen::<f64>() < options.missing_share;
                columns.set(&eq.name, row, if missing { f64::NAN } else { y });
            }

            if let (Some(a), Some(ap)) = (&spec.anchoring, &model.anchoring) {
                let q = if t + 1 == n_periods {
                    let mut q = ap.intercept;
                    for (&f, loading) in a.factors.iter().zip(&ap.loadings) {
                        q += loading * state[f];
                    }
                    if a.use_controls {
                        q += ctrl.dot(&ArrayView1::from(&ap.controls[..]));
                    }
                    q + ap.variance.sqrt() * rng.sample(std_normal)
                } else {
                    f64::NAN
                };
                columns.set(&a.outcome, row, q);
            }

            if t + 1 < n_periods {
                let stage = spec.stagemap[t];
                let mut next =
                    transition_point(spec, &model.transition[stage], state.view(), &scaling)?;
                for (f, q) in model.shock_variance[stage].iter().enumerate() {
                    if *q > 0.0 {
                        next[f] += q.sqrt() * rng.sample(std_normal);
                    }
                }
                state = next;
            }
        }
    }

    let dataset = Dataset::new(ids, periods, columns.into_vec())?;
    Ok(SimulatedData { dataset, factors })
}
