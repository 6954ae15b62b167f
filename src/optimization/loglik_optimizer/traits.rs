//! traits — the log-likelihood interface and optimizer configuration.
//!
//! - [`LogLikelihood`]: implemented by models to be maximized.
//! - [`Tolerances`], [`LineSearcher`], [`MLEOptions`]: solver configuration.
//! - [`OptimOutcome`]: validated result of [`maximize`](super::maximize).
//!
//! The optimizer maximizes `ℓ(θ)` by minimizing `c(θ) = -ℓ(θ)`. An analytic
//! gradient, when provided, is `∇ℓ(θ)`; the adapter negates it.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        types::{Cost, FnEvalMap, Grad, Theta},
        validation::{validate_theta_hat, validate_value, verify_tol_cost, verify_tol_grad},
    },
};
use argmin::core::TerminationStatus;
use argmin_math::ArgminL2Norm;
use std::str::FromStr;

/// Objective maximized by [`maximize`](super::maximize).
///
/// - `value` returns `ℓ(θ)`. Recoverable model failures are `OptError`s; a
///   non-finite return value is rejected by the adapter.
/// - `check` runs once on the starting vector.
/// - `grad` is optional; finite differences of the cost are used when it
///   returns `OptError::GradientNotImplemented`.
pub trait LogLikelihood {
    type Data: 'static;

    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<Cost>;
    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()>;

    fn grad(&self, _theta: &Theta, _data: &Self::Data) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }
}

/// Line search used inside L-BFGS. Parses case-insensitively from
/// `"MoreThuente"` / `"HagerZhang"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearcher {
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "morethuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(OptError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'MoreThuente' or 'HagerZhang'.",
            }),
        }
    }
}

/// Stopping rules. At least one must be set; tolerances are finite and
/// positive, `max_iter > 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub tol_grad: Option<f64>,
    pub tol_cost: Option<f64>,
    pub max_iter: Option<usize>,
}

impl Tolerances {
    /// Validated tolerances.
    ///
    /// Errors
    /// ------
    /// - `OptError::NoTolerancesProvided` if all three are `None`.
    /// - `OptError::InvalidTolGrad` / `InvalidTolCost` / `InvalidMaxIter`.
    pub fn new(
        tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    ) -> OptResult<Self> {
        if tol_grad.is_none() && tol_cost.is_none() && max_iter.is_none() {
            return Err(OptError::NoTolerancesProvided);
        }
        verify_tol_grad(tol_grad)?;
        verify_tol_cost(tol_cost)?;
        if max_iter == Some(0) {
            return Err(OptError::InvalidMaxIter {
                max_iter: 0,
                reason: "Maximum iterations must be greater than zero.",
            });
        }
        Ok(Self { tol_grad, tol_cost, max_iter })
    }
}

impl Default for Tolerances {
    /// `tol_grad = 1e-5`, `tol_cost = 1e-9`, `max_iter = 500`.
    fn default() -> Self {
        Self { tol_grad: Some(1e-5), tol_cost: Some(1e-9), max_iter: Some(500) }
    }
}

/// Optimizer configuration.
///
/// `verbose` attaches argmin's terminal observer when the `obs_slog`
/// feature is enabled; `lbfgs_mem = None` uses
/// [`DEFAULT_LBFGS_MEM`](super::DEFAULT_LBFGS_MEM).
#[derive(Debug, Clone, PartialEq)]
pub struct MLEOptions {
    pub tols: Tolerances,
    pub line_searcher: LineSearcher,
    pub verbose: bool,
    pub lbfgs_mem: Option<usize>,
}

impl MLEOptions {
    /// Errors
    /// ------
    /// - `OptError::InvalidLBFGSMem` for a zero history size.
    pub fn new(
        tols: Tolerances, line_searcher: LineSearcher, verbose: bool, lbfgs_mem: Option<usize>,
    ) -> OptResult<Self> {
        if lbfgs_mem == Some(0) {
            return Err(OptError::InvalidLBFGSMem {
                mem: 0,
                reason: "L-BFGS memory must be greater than zero.",
            });
        }
        Ok(Self { tols, line_searcher, verbose, lbfgs_mem })
    }
}

impl Default for MLEOptions {
    fn default() -> Self {
        Self {
            tols: Tolerances::default(),
            line_searcher: LineSearcher::MoreThuente,
            verbose: false,
            lbfgs_mem: None,
        }
    }
}

/// Result of a maximization.
///
/// `value` is the best log-likelihood `ℓ(θ̂)` (not the cost). `converged` is
/// `true` for any termination status other than `NotTerminated`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimOutcome {
    pub theta_hat: Theta,
    pub value: f64,
    pub converged: bool,
    pub status: String,
    pub iterations: usize,
    pub fn_evals: FnEvalMap,
    pub grad_norm: Option<f64>,
}

impl OptimOutcome {
    /// Validate raw solver state into an outcome.
    ///
    /// Errors
    /// ------
    /// - `OptError::MissingThetaHat` / `InvalidThetaHat` / `NonFiniteCost`.
    pub fn new(
        theta_hat: Option<Theta>, value: f64, termination: TerminationStatus, iterations: u64,
        fn_evals: FnEvalMap, grad: Option<Grad>,
    ) -> OptResult<Self> {
        let theta_hat = validate_theta_hat(theta_hat)?;
        validate_value(value)?;
        let (converged, status) = match termination {
            TerminationStatus::NotTerminated => (false, "Not terminated".to_string()),
            other => (true, format!("{other:?}")),
        };
        Ok(Self {
            theta_hat,
            value,
            converged,
            status,
            iterations: iterations as usize,
            fn_evals,
            grad_norm: grad.map(|g| g.l2_norm()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argmin::core::TerminationReason;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Tolerance and option validation, line-search parsing.
    // - Outcome construction from solver state.
    //
    // They intentionally DO NOT cover:
    // - Running a solver (see `api`).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Configuration constructors reject invalid values.
    //
    // Given
    // -----
    // - No tolerances; max_iter 0; L-BFGS memory 0; an unknown line search.
    //
    // Expect
    // ------
    // - The matching `OptError` variants; defaults are valid.
    fn configuration_is_validated() {
        assert_eq!(Tolerances::new(None, None, None), Err(OptError::NoTolerancesProvided));
        assert!(matches!(
            Tolerances::new(None, None, Some(0)),
            Err(OptError::InvalidMaxIter { .. })
        ));
        assert!(matches!(
            MLEOptions::new(Tolerances::default(), LineSearcher::HagerZhang, false, Some(0)),
            Err(OptError::InvalidLBFGSMem { .. })
        ));
        assert!(matches!(
            "bisection".parse::<LineSearcher>(),
            Err(OptError::InvalidLineSearch { .. })
        ));
        assert_eq!("HAGERZHANG".parse::<LineSearcher>(), Ok(LineSearcher::HagerZhang));
        let defaults = MLEOptions::default();
        assert_eq!(
            Tolerances::new(defaults.tols.tol_grad, defaults.tols.tol_cost, defaults.tols.max_iter),
            Ok(defaults.tols)
        );
    }

    #[test]
    // Purpose
    // -------
    // Outcomes map termination status and gradient norm.
    //
    // Given
    // -----
    // - θ̂ = [1, 2], ℓ = -3, a solver-converged status and gradient [3, 4].
    //
    // Expect
    // ------
    // - converged, grad_norm 5; `NotTerminated` is reported as not converged.
    fn outcome_maps_termination_and_gradient() {
        // Arrange
        let done = TerminationStatus::Terminated(TerminationReason::SolverConverged);

        // Act
        let outcome = OptimOutcome::new(
            Some(array![1.0, 2.0]),
            -3.0,
            done,
            12,
            FnEvalMap::new(),
            Some(array![3.0, 4.0]),
        )
        .expect("valid outcome");
        let open = OptimOutcome::new(
            Some(array![1.0]),
            -1.0,
            TerminationStatus::NotTerminated,
            1,
            FnEvalMap::new(),
            None,
        )
        .expect("valid outcome");

        // Assert
        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 12);
        assert_eq!(outcome.grad_norm, Some(5.0));
        assert!(!open.converged);
        assert_eq!(open.status, "Not terminated");
    }
}
