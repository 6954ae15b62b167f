//! numerical_stability — numerically robust scalar transforms and tolerances.
//!
//! Purpose
//! -------
//! Collect numerically stable scalar transforms used to map between the
//! bounded parameter vector of a skill-formation model and the
//! unconstrained space the optimizer searches, plus the log-sum-exp used
//! to weight mixture components. Small tolerances live here so every layer
//! shares the same guards.
//!
//! Key behaviors
//! -------------
//! - `safe_softplus` / `safe_softplus_inv` map ℝ ↔ (0, ∞) without overflow.
//! - `safe_logistic` / `safe_logit` map ℝ ↔ (0, 1) with clamping at the
//!   boundary.
//! - `log_sum_exp` combines log-weights with a max-shift.
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs are finite `f64` unless documented otherwise; shape and domain
//!   validation happen in the model and optimizer layers.
//!
//! Conventions
//! -----------
//! - Pure functions: no logging, no I/O, no global state. Suitable for
//!   tight inner loops.
//!
//! Downstream usage
//! ----------------
//! - `model::core::params::ParamTransform` builds its bound transforms on
//!   top of these helpers.
//! - The sigma-point filter uses `log_sum_exp`; the linear-algebra helpers
//!   and standard errors use `EIGEN_EPS`.
//!
//! Testing notes
//! -------------
//! - Unit tests in [`transformations`] cover agreement with naïve formulas on
//!   safe grids, invertibility and tail behavior.

pub mod transformations;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::transformations::{
    EIGEN_EPS, GENERAL_TOL, LOGIT_EPS, log_sum_exp, safe_logistic, safe_logit, safe_softplus,
    safe_softplus_inv,
};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use skill_formation::optimization::numerical_stability::prelude::*;
//
// to import the main numerical-stability surface in a single line.

pub mod prelude {
    pub use super::transformations::{
        EIGEN_EPS, GENERAL_TOL, log_sum_exp, safe_logistic, safe_logit, safe_softplus,
        safe_softplus_inv,
    };
}
