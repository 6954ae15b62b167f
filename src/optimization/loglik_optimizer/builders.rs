//! builders — L-BFGS construction from [`MLEOptions`].
//!
//! Builders apply the history size and the gradient / cost tolerances. The
//! starting point and the iteration cap are set by the runner.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        traits::MLEOptions,
        types::{
            Cost, DEFAULT_LBFGS_MEM, Grad, HagerZhangLS, LbfgsHagerZhang, LbfgsMoreThuente,
            MoreThuenteLS, Theta,
        },
    },
};
use argmin::solver::quasinewton::LBFGS;

/// L-BFGS with Hager–Zhang line search.
pub fn build_optimizer_hager_zhang(opts: &MLEOptions) -> OptResult<LbfgsHagerZhang> {
    build_lbfgs(HagerZhangLS::new(), opts)
}

/// L-BFGS with More–Thuente line search.
pub fn build_optimizer_more_thuente(opts: &MLEOptions) -> OptResult<LbfgsMoreThuente> {
    build_lbfgs(MoreThuenteLS::new(), opts)
}

/// L-BFGS over any line search, with the tolerances of `opts`.
///
/// Errors
/// ------
/// - `OptError::Backend` if argmin rejects a tolerance.
pub fn build_lbfgs<L>(line_search: L, opts: &MLEOptions) -> OptResult<LBFGS<L, Theta, Grad, Cost>> {
    let mut solver = LBFGS::new(line_search, opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM));
    if let Some(g) = opts.tols.tol_grad {
        solver = solver.with_tolerance_grad(g)?;
    }
    if let Some(c) = opts.tols.tol_cost {
        solver = solver.with_tolerance_cost(c)?;
    }
    Ok(solver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::loglik_optimizer::traits::{LineSearcher, Tolerances};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Construction of both line-search variants with default and explicit
    //   memory, with and without tolerances.
    //
    // They intentionally DO NOT cover:
    // - Running the solver (see `api`).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Both builders succeed for valid options.
    //
    // Given
    // -----
    // - Default options, and options with memory 11 and no gradient tolerance.
    //
    // Expect
    // ------
    // - `Ok` from every builder call.
    fn builders_accept_valid_options() {
        // Arrange
        let defaults = MLEOptions::default();
        let tols = Tolerances::new(None, Some(1e-8), Some(40)).expect("valid tolerances");
        let custom = MLEOptions::new(tols, LineSearcher::HagerZhang, false, Some(11))
            .expect("valid options");

        // Act / Assert
        assert!(build_optimizer_more_thuente(&defaults).is_ok());
        assert!(build_optimizer_hager_zhang(&defaults).is_ok());
        assert!(build_optimizer_hager_zhang(&custom).is_ok());
        assert!(build_optimizer_more_thuente(&custom).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // Absent tolerances leave argmin's defaults in place.
    //
    // Given
    // -----
    // - Only an iteration cap.
    //
    // Expect
    // ------
    // - `build_lbfgs` returns `Ok`.
    fn iteration_cap_alone_is_enough() {
        let tols = Tolerances::new(None, None, Some(10)).expect("valid tolerances");
        let opts = MLEOptions::new(tols, LineSearcher::MoreThuente, false, None).expect("valid");
        assert!(build_lbfgs(MoreThuenteLS::new(), &opts).is_ok());
    }
}
