//! run — execute an argmin solver and normalize its final state.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        adapter::ArgMinAdapter,
        traits::{LogLikelihood, MLEOptions, OptimOutcome},
        types::{Grad, Theta},
    },
};
use argmin::core::{Executor, IterState, Solver, State};
use tracing::{Level, debug, info};

/// Run `solver` on `problem` from `theta0`.
///
/// Applies `opts.tols.max_iter`, logs `ℓ(θ₀)` at debug level and the
/// termination status at info level, and attaches argmin's slog observer
/// when `opts.verbose` is set and the `obs_slog` feature is enabled.
///
/// Errors
/// ------
/// - Any solver error (line-search failure, model error raised inside the
///   cost) converted into `OptError`.
/// - Validation errors of [`OptimOutcome::new`].
pub fn run_lbfgs<'a, F, S>(
    theta0: Theta, opts: &MLEOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<OptimOutcome>
where
    F: LogLikelihood,
    S: Solver<ArgMinAdapter<'a, F>, IterState<Theta, Grad, (), (), (), f64>> + Send + 'static,
{
    if tracing::enabled!(Level::DEBUG) {
        if let Ok(cost0) = problem.neg_loglik(&theta0) {
            debug!(loglik = -cost0, n_params = theta0.len(), "starting L-BFGS");
        }
    }
    let executor = Executor::new(problem, solver).configure(|state| {
        let state = state.param(theta0);
        match opts.tols.max_iter {
            Some(max_iter) => state.max_iters(max_iter as u64),
            None => state,
        }
    });
    #[cfg(feature = "obs_slog")]
    let executor = if opts.verbose {
        executor.add_observer(
            argmin_observer_slog::SlogLogger::term_noblock(),
            argmin::core::observers::ObserverMode::Always,
        )
    } else {
        executor
    };

    let mut state = executor.run()?.state().clone();
    let termination = state.get_termination_status().clone();
    let iterations = state.get_iter();
    let fn_evals = state.get_func_counts().clone();
    let grad = state.take_gradient();
    let outcome = OptimOutcome::new(
        state.take_best_param(),
        -state.get_best_cost(),
        termination,
        iterations,
        fn_evals,
        grad,
    )?;
    info!(
        loglik = outcome.value,
        iterations = outcome.iterations,
        status = %outcome.status,
        "L-BFGS finished"
    );
    Ok(outcome)
}
