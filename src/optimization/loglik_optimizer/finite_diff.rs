//! finite_diff — numerical Hessians for observed-information inference.
//!
//! [`compute_hessian`] differentiates a gradient function with `finitediff`,
//! using central differences and falling back to forward differences when
//! the central result is not finite. The result is symmetrized.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        types::{Grad, Hessian, Theta},
        validation::validate_hessian,
    },
};
use finitediff::FiniteDiff;

/// Hessian of the function whose gradient is `grad` at `theta`.
///
/// Errors
/// ------
/// - `OptError::InvalidHessian` / `HessianDimMismatch` if neither scheme
///   yields a finite `n × n` matrix.
pub fn compute_hessian<F: Fn(&Theta) -> Grad>(grad: &F, theta: &Theta) -> OptResult<Hessian> {
    let dim = theta.len();
    let mut hessian = theta.central_hessian(grad);
    if validate_hessian(&hessian, dim).is_err() {
        hessian = theta.forward_hessian(grad);
        validate_hessian(&hessian, dim)?;
    }
    symmetrize(&mut hessian);
    Ok(hessian)
}

fn symmetrize(h: &mut Hessian) {
    for i in 0..h.nrows() {
        for j in 0..i {
            let avg = 0.5 * (h[[i, j]] + h[[j, i]]);
            h[[i, j]] = avg;
            h[[j, i]] = avg;
        }
    }
}
