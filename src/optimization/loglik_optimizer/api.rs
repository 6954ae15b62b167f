//! api — [`maximize`], the single entry point of the optimizer.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        adapter::ArgMinAdapter,
        builders::{build_optimizer_hager_zhang, build_optimizer_more_thuente},
        run::run_lbfgs,
        traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome},
        types::Theta,
    },
};

/// Maximize `ℓ(θ)` with L-BFGS.
///
/// Parameters
/// ----------
/// - `f`: the objective.
/// - `theta0`: starting vector (validated by `f.check`).
/// - `data`: payload passed to every evaluation.
/// - `opts`: tolerances, line search, memory and verbosity.
///
/// Returns
/// -------
/// `OptResult<OptimOutcome>` with `θ̂`, `ℓ(θ̂)` and solver diagnostics.
///
/// Errors
/// ------
/// - Errors of `f.check`, of the solver builders and of the run.
pub fn maximize<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            run_lbfgs(theta0, opts, problem, build_optimizer_more_thuente(opts)?)
        }
        LineSearcher::HagerZhang => {
            run_lbfgs(theta0, opts, problem, build_optimizer_hager_zhang(opts)?)
        }
    }
}
