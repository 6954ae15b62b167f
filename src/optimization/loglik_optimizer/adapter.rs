//! adapter — expose a [`LogLikelihood`] as an argmin minimization problem.
//!
//! The cost is `c(θ) = -ℓ(θ)`. Without an analytic gradient the adapter
//! differentiates the cost numerically (central differences, then forward
//! differences if an evaluation fails or the result is not finite).
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        traits::LogLikelihood,
        types::{Cost, Grad, Theta},
        validation::validate_grad,
    },
};
use argmin::core::{CostFunction, Error, Gradient};
use finitediff::FiniteDiff;
use std::cell::RefCell;

/// `(model, data)` pair seen by argmin.
#[derive(Debug, Clone)]
pub struct ArgMinAdapter<'a, F: LogLikelihood> {
    pub f: &'a F,
    pub data: &'a F::Data,
}

impl<'a, F: LogLikelihood> ArgMinAdapter<'a, F> {
    pub fn new(f: &'a F, data: &'a F::Data) -> Self {
        Self { f, data }
    }

    /// `-ℓ(θ)`, rejecting non-finite values.
    pub fn neg_loglik(&self, theta: &Theta) -> OptResult<Cost> {
        let value = self.f.value(theta, self.data)?;
        if !value.is_finite() {
            return Err(OptError::NonFiniteCost { value });
        }
        Ok(-value)
    }

    /// Gradient of the cost, analytic when available.
    pub fn cost_gradient(&self, theta: &Theta) -> OptResult<Grad> {
        match self.f.grad(theta, self.data) {
            Ok(g) => {
                validate_grad(&g, theta.len())?;
                Ok(-g)
            }
            Err(OptError::GradientNotImplemented) => self.numerical_gradient(theta),
            Err(e) => Err(e),
        }
    }

    fn numerical_gradient(&self, theta: &Theta) -> OptResult<Grad> {
        // finitediff closures return plain f64; the first failure is kept here.
        let failure: RefCell<Option<OptError>> = RefCell::new(None);
        let cost = |x: &Theta| -> f64 {
            self.neg_loglik(x).unwrap_or_else(|e| {
                failure.borrow_mut().get_or_insert(e);
                f64::NAN
            })
        };
        let central = theta.central_diff(&cost);
        if failure.borrow().is_none() && validate_grad(&central, theta.len()).is_ok() {
            return Ok(central);
        }
        failure.replace(None);
        let forward = theta.forward_diff(&cost);
        if let Some(err) = failure.take() {
            return Err(err);
        }
        validate_grad(&forward, theta.len())?;
        Ok(forward)
    }
}

impl<'a, F: LogLikelihood> CostFunction for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Output = Cost;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.neg_loglik(theta)?)
    }
}

impl<'a, F: LogLikelihood> Gradient for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Gradient = Grad;

    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        Ok(self.cost_gradient(theta)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Sign conventions for cost and gradient.
    // - The finite-difference fallback and its error capture.
    //
    // They intentionally DO NOT cover:
    // - Solver runs (see `api`).
    // -------------------------------------------------------------------------

    /// ℓ(θ) = -Σ (θ_i - 1)², no analytic gradient.
    struct Bowl;

    impl LogLikelihood for Bowl {
        type Data = ();
        fn value(&self, theta: &Theta, _: &()) -> OptResult<Cost> {
            Ok(-theta.mapv(|t| (t - 1.0).powi(2)).sum())
        }
        fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
            Ok(())
        }
    }

    /// Finite only for θ_0 < 0.5.
    struct Cliff;

    impl LogLikelihood for Cliff {
        type Data = ();
        fn value(&self, theta: &Theta, _: &()) -> OptResult<Cost> {
            if theta[0] < 0.5 { Ok(-theta[0].powi(2)) } else { Ok(f64::NEG_INFINITY) }
        }
        fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
            Ok(())
        }
    }

    #[test]
    // Purpose
    // -------
    // Cost and numerical gradient carry the flipped sign.
    //
    // Given
    // -----
    // - The bowl at θ = [0, 3].
    //
    // Expect
    // ------
    // - Cost 5 and cost gradient 2(θ - 1) = [-2, 4].
    fn cost_and_gradient_flip_sign() {
        // Arrange
        let adapter = ArgMinAdapter::new(&Bowl, &());
        let theta = array![0.0, 3.0];

        // Act
        let cost = adapter.cost(&theta).expect("finite cost");
        let grad = adapter.gradient(&theta).expect("finite gradient");

        // Assert
        assert_abs_diff_eq!(cost, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(grad[0], -2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(grad[1], 4.0, epsilon = 1e-5);
    }

    #[test]
    // Purpose
    // -------
    // Non-finite values surface as `NonFiniteCost`.
    //
    // Given
    // -----
    // - The cliff at θ = 1 (value -inf).
    //
    // Expect
    // ------
    // - `NonFiniteCost` from both cost and gradient.
    fn non_finite_value_is_an_error() {
        let adapter = ArgMinAdapter::new(&Cliff, &());
        let theta = array![1.0];
        assert!(matches!(adapter.neg_loglik(&theta), Err(OptError::NonFiniteCost { .. })));
        assert!(matches!(adapter.cost_gradient(&theta), Err(OptError::NonFiniteCost { .. })));
    }
}
