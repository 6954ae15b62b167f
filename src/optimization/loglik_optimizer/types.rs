//! types — numeric aliases and L-BFGS solver aliases used by the optimizer.
//!
//! Parameters, gradients and Hessians are `ndarray` containers over `f64`.
//! `Theta` is always the unconstrained optimizer vector; the model layer
//! maps it to bounded model parameters.
use argmin::solver::{
    linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch},
    quasinewton::LBFGS,
};
use ndarray::{Array1, Array2};
use std::collections::HashMap;

/// Unconstrained parameter vector `θ`.
pub type Theta = Array1<f64>;

/// Gradient with the shape of [`Theta`].
pub type Grad = Array1<f64>;

/// Dense `n × n` Hessian.
pub type Hessian = Array2<f64>;

/// Scalar cost `c(θ) = -ℓ(θ)`.
pub type Cost = f64;

/// argmin's evaluation counters (`"cost_count"`, `"gradient_count"`, …).
pub type FnEvalMap = HashMap<String, u64>;

/// L-BFGS history size when `MLEOptions::lbfgs_mem` is `None`.
pub const DEFAULT_LBFGS_MEM: usize = 7;

pub type HagerZhangLS = HagerZhangLineSearch<Theta, Grad, Cost>;
pub type MoreThuenteLS = MoreThuenteLineSearch<Theta, Grad, Cost>;
pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Theta, Grad, Cost>;
pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Theta, Grad, Cost>;
