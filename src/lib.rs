//! skill_formation — nonlinear latent-factor models of skill formation.
//!
//! Purpose
//! -------
//! Estimate dynamic models in which several unobserved skills evolve through
//! (possibly nonlinear) production functions and are measured with error by
//! observed variables. Parameters are estimated by maximum likelihood, with
//! the likelihood of each individual computed by an unscented (sigma-point)
//! Kalman filter over a mixture-of-normals belief.
//!
//! Key behaviors
//! -------------
//! - [`model`]: specification parsing and normalization, parameter layout,
//!   transition equations, the filter and likelihood engine, anchoring,
//!   datasets and simulation, and the [`SkillModel`](model::SkillModel)
//!   estimation boundary.
//! - [`optimization`]: argmin-backed L-BFGS maximization of log-likelihoods
//!   with finite-difference derivatives and stable bound transforms.
//! - [`inference`]: observed-information standard errors and the delta
//!   method.
//! - [`logging`]: an opt-in `tracing` subscriber.
//!
//! Conventions
//! -----------
//! - Arrays are `ndarray` types; small factorizations go through `nalgebra`.
//! - Every fallible public operation returns a typed `Result` alias.
//! - The library emits `tracing` events and never installs a subscriber on
//!   its own.
//!
//! Testing notes
//! -------------
//! - Unit tests live next to each module; `tests/` holds end-to-end runs on
//!   simulated data.

pub mod inference;
pub mod logging;
pub mod model;
pub mod optimization;
