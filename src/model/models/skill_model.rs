//! SkillModel: the estimation boundary of a skill-formation model.
//!
//! Binds a normalized specification, its parameter layout and an aligned
//! panel, and exposes:
//! - `evaluate` on full parameter vectors (`-inf` for degenerate vectors),
//! - `fit` by L-BFGS in the unconstrained space θ given by [`ParamTransform`],
//! - per-individual log-likelihood contributions,
//! - standard errors from the Hessian or the outer product of per-individual
//!   scores, mapped back by the delta method,
//! - filtered states and the anchoring report at any parameter vector.
//!
//! The optimizer never sees `-inf`: [`LogLikelihood::value`] substitutes
//! [`DEGENERATE_LOGLIK_PENALTY`] so line searches can back away from
//! degenerate regions.
use crate::{
    inference::{
        hessian::{calc_covariance, delta_method, standard_errors},
        opg::{CovarianceMethod, calc_opg_covariance},
    },
    model::{
        core::{
            anchoring::{AnchoringReport, postprocess},
            data::{Dataset, Panel},
            layout::{ParamLayout, Slot},
            likelihood::{
                DEGENERATE_LOGLIK_PENALTY, filtered_states, log_likelihood,
                log_likelihood_contributions,
            },
            options::EstimationOptions,
            params::{ModelParams, ParamTransform},
            spec::ModelSpec,
        },
        errors::{ModelError, ModelResult},
    },
    optimization::{
        errors::OptResult,
        loglik_optimizer::{
            Grad, LogLikelihood, OptimOutcome, Theta, adapter::ArgMinAdapter, maximize,
            validation::validate_theta,
        },
    },
};
use ndarray::{Array1, Array2, Array3, ArrayView1};
use tracing::{info, warn};

/// Skill-formation model with its data.
///
/// [`results`](Self::results) and [`fitted_params`](Self::fitted_params)
/// are populated by [`fit`](Self::fit).
#[derive(Debug, Clone, PartialEq)]
pub struct SkillModel {
    pub spec: ModelSpec,
    pub layout: ParamLayout,
    pub panel: Panel,
    pub options: EstimationOptions,
    transform: ParamTransform,
    /// Optimizer outcome in θ-space (populated after `fit`).
    pub results: Option<OptimOutcome>,
    /// Estimates in parameter space (populated after `fit`).
    pub fitted_params: Option<Array1<f64>>,
}

impl SkillModel {
    /// Build the layout and align `data` to `spec`.
    ///
    /// Errors
    /// ------
    /// - `ModelError::Layout` for conflicting constraints.
    /// - `ModelError::Data` for missing columns or irregular indices.
    pub fn new(spec: ModelSpec, data: &Dataset, options: EstimationOptions) -> ModelResult<Self> {
        let layout = ParamLayout::build(&spec)?;
        let panel = Panel::align(&spec, data)?;
        let transform = ParamTransform::from_layout(&layout);
        info!(
            n_params = layout.n_free(),
            n_factors = spec.n_factors(),
            n_periods = spec.n_periods,
            n_individuals = panel.n_individuals(),
            "built skill formation model"
        );
        for (block, range) in layout.blocks() {
            info!(block = ?block, size = range.len(), "parameter block");
        }
        Ok(Self { spec, layout, panel, options, transform, results: None, fitted_params: None })
    }

    /// Parse a JSON specification and build the model.
    ///
    /// Errors
    /// ------
    /// - `ModelError::Spec` for an invalid specification.
    /// - Any error of [`SkillModel::new`].
    pub fn from_json_str(
        text: &str, data: &Dataset, options: EstimationOptions,
    ) -> ModelResult<Self> {
        Self::new(ModelSpec::from_json_str(text)?, data, options)
    }

    pub fn n_params(&self) -> usize {
        self.layout.n_free()
    }

    pub fn param_names(&self) -> Vec<String> {
        self.layout.names()
    }

    /// `(lower, upper)` bound vectors; ±∞ where unbounded.
    pub fn bounds(&self) -> (Array1<f64>, Array1<f64>) {
        (self.layout.lower_bounds().clone(), self.layout.upper_bounds().clone())
    }

    pub fn transform(&self) -> &ParamTransform {
        &self.transform
    }

    /// Log-likelihood at a full parameter vector.
    ///
    /// Returns `-inf` when the vector is numerically degenerate.
    ///
    /// Errors
    /// ------
    /// - `ModelError::Filter` for a vector of the wrong length or with
    ///   non-finite entries.
    pub fn evaluate(&self, params: ArrayView1<f64>) -> ModelResult<f64> {
        Ok(log_likelihood(&self.spec, &self.layout, &self.panel, params, self.options.parallel)?)
    }

    /// Per-individual log-likelihood contributions at a full parameter
    /// vector; they sum to [`evaluate`](Self::evaluate).
    ///
    /// Degenerate vectors give `-inf` for every individual, degenerate
    /// individuals `-inf` for that individual only.
    ///
    /// Errors
    /// ------
    /// - `ModelError::Filter` for a vector of the wrong length or with
    ///   non-finite entries.
    pub fn log_likelihood_contributions(
        &self, params: ArrayView1<f64>,
    ) -> ModelResult<Array1<f64>> {
        Ok(log_likelihood_contributions(
            &self.spec,
            &self.layout,
            &self.panel,
            params,
            self.options.parallel,
        )?)
    }

    /// Start vector: the layout's deterministic start, with free intercepts
    /// set to measurement means and free measurement variances to half the
    /// measurement variance. Values shared by several equations are averaged.
    pub fn start_params(&self) -> Array1<f64> {
        let mut start = self.layout.start_params().clone();
        let n = start.len();
        let mut sums = Array1::<f64>::zeros(n);
        let mut counts = vec![0usize; n];
        let mut add = |slot: &Slot, value: f64| {
            if let (Some(i), true) = (slot.free_index(), value.is_finite()) {
                sums[i] += value;
                counts[i] += 1;
            }
        };
        for (t, equations) in self.spec.measurement_equations.iter().enumerate() {
            let observed = self.panel.measurements(t);
            for (j, slots) in self.layout.measurement[t].iter().enumerate().take(equations.len()) {
                let Some((mean, var)) = moments(observed.column(j)) else { continue };
                add(&slots.intercept, mean);
                add(&slots.variance, 0.5 * var);
            }
        }
        let (lower, upper) = (self.layout.lower_bounds(), self.layout.upper_bounds());
        for i in 0..n {
            if counts[i] > 0 {
                let value = sums[i] / counts[i] as f64;
                if value > lower[i] && value < upper[i] {
                    start[i] = value;
                }
            }
        }
        start
    }

    /// Maximize the log-likelihood from `start` (parameter space), or from
    /// [`start_params`](Self::start_params) when `None`.
    ///
    /// On success `results` holds the θ-space outcome and `fitted_params`
    /// the estimates in parameter space.
    ///
    /// Errors
    /// ------
    /// - `OptError::ThetaLengthMismatch` / `InvalidThetaInput` for a bad start.
    /// - Fatal model errors and solver failures.
    pub fn fit(&mut self, start: Option<Array1<f64>>) -> OptResult<()> {
        let start = start.unwrap_or_else(|| self.start_params());
        let theta0 = self.transform.to_theta(start.view());
        info!(n_params = theta0.len(), parallel = self.options.parallel, "starting estimation");
        let outcome = maximize(&*self, theta0, &self.panel, &self.options.mle_opts)?;
        if !outcome.converged {
            warn!(status = %outcome.status, "optimizer stopped before convergence");
        }
        info!(
            loglik = outcome.value,
            iterations = outcome.iterations,
            status = %outcome.status,
            "estimation finished"
        );
        self.fitted_params = Some(self.transform.from_theta(outcome.theta_hat.view()));
        self.results = Some(outcome);
        Ok(())
    }

    /// Estimates of the last `fit`.
    ///
    /// Errors
    /// ------
    /// - `ModelError::NotFitted` before `fit`.
    pub fn fitted(&self) -> ModelResult<&Array1<f64>> {
        self.fitted_params.as_ref().ok_or(ModelError::NotFitted)
    }

    /// Covariance of the estimates in parameter space from the Hessian.
    ///
    /// Same as [`covariance_matrix_with`](Self::covariance_matrix_with)
    /// with [`CovarianceMethod::HessianInverse`].
    pub fn covariance_matrix(&self) -> OptResult<Array2<f64>> {
        self.covariance_matrix_with(CovarianceMethod::HessianInverse)
    }

    /// Covariance of the estimates in parameter space.
    ///
    /// - `HessianInverse`: the observed information is the numerical
    ///   Hessian of `-ℓ(θ)` at θ̂.
    /// - `OuterProductOfGradients`: the information is `Σ_i s_i s_iᵀ` with
    ///   `s_i` the central-difference score of individual `i` at θ̂.
    ///
    /// The pseudo-inverse is mapped to parameter space by the diagonal
    /// Jacobian of the bound transform.
    ///
    /// Errors
    /// ------
    /// - `ModelError::NotFitted` (as `OptError::Model`) before `fit`.
    /// - `OptError::InvalidHessian` if the gradient fails near θ̂.
    /// - `OptError::InvalidScore` if a contribution fails near θ̂.
    pub fn covariance_matrix_with(&self, method: CovarianceMethod) -> OptResult<Array2<f64>> {
        let theta_hat = &self.results.as_ref().ok_or(ModelError::NotFitted)?.theta_hat;
        let cov_theta = match method {
            CovarianceMethod::HessianInverse => {
                let problem = ArgMinAdapter::new(self, &self.panel);
                let grad = |theta: &Theta| -> Grad {
                    problem
                        .cost_gradient(theta)
                        .unwrap_or_else(|_| Array1::from_elem(theta.len(), f64::NAN))
                };
                calc_covariance(&grad, theta_hat)?
            }
            CovarianceMethod::OuterProductOfGradients => {
                let n_individuals = self.panel.n_individuals();
                let contributions = |theta: &Theta| -> Array1<f64> {
                    let params = self.transform.from_theta(theta.view());
                    self.log_likelihood_contributions(params.view())
                        .map(|c| c.mapv(|v| if v.is_finite() { v } else { f64::NAN }))
                        .unwrap_or_else(|_| Array1::from_elem(n_individuals, f64::NAN))
                };
                calc_opg_covariance(&contributions, theta_hat)?
            }
        };
        let jac = self.transform.jacobian_diag(theta_hat.view());
        Ok(delta_method(cov_theta.view(), jac.view()))
    }

    /// Standard errors of the estimates in parameter space from the Hessian.
    ///
    /// Errors
    /// ------
    /// - Any error of [`covariance_matrix`](Self::covariance_matrix).
    pub fn standard_errors(&self) -> OptResult<Array1<f64>> {
        self.standard_errors_with(CovarianceMethod::HessianInverse)
    }

    /// Standard errors with the chosen covariance estimator.
    ///
    /// Errors
    /// ------
    /// - Any error of [`covariance_matrix_with`](Self::covariance_matrix_with).
    pub fn standard_errors_with(&self, method: CovarianceMethod) -> OptResult<Array1<f64>> {
        Ok(standard_errors(self.covariance_matrix_with(method)?.view()))
    }

    /// Filtered factor means (`individuals × periods × factors`) at `params`.
    ///
    /// Errors
    /// ------
    /// - `ModelError::Filter` for invalid or degenerate parameters.
    pub fn filtered_states(&self, params: ArrayView1<f64>) -> ModelResult<Array3<f64>> {
        Ok(filtered_states(&self.spec, &self.layout, &self.panel, params, self.options.parallel)?)
    }

    /// Anchoring post-processing at `params`.
    ///
    /// Errors
    /// ------
    /// - `ModelError::Anchoring` when no anchoring is configured or the
    ///   side regression fails.
    /// - Errors of [`filtered_states`](Self::filtered_states).
    pub fn anchoring_report(&self, params: ArrayView1<f64>) -> ModelResult<AnchoringReport> {
        let model_params = ModelParams::from_vector(&self.spec, &self.layout, params)?;
        let states = self.filtered_states(params)?;
        Ok(postprocess(&self.spec, &self.panel, &model_params, &states)?)
    }
}

impl LogLikelihood for SkillModel {
    type Data = Panel;

    /// `ℓ(θ)` with degeneracies replaced by [`DEGENERATE_LOGLIK_PENALTY`].
    fn value(&self, theta: &Theta, data: &Panel) -> OptResult<f64> {
        let params = self.transform.from_theta(theta.view());
        let value =
            log_likelihood(&self.spec, &self.layout, data, params.view(), self.options.parallel)?;
        Ok(if value == f64::NEG_INFINITY { DEGENERATE_LOGLIK_PENALTY } else { value })
    }

    fn check(&self, theta: &Theta, _data: &Panel) -> OptResult<()> {
        validate_theta(theta, self.layout.n_free())
    }
}

/// Mean and sample variance of the non-missing entries (at least two).
fn moments(values: ArrayView1<f64>) -> Option<(f64, f64)> {
    let observed: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if observed.len() < 2 {
        return None;
    }
    let n = observed.len() as f64;
    let mean = observed.iter().sum::<f64>() / n;
    let var = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, var))
}
