//! Model and estimation options.
//!
//! Purpose
//! -------
//! Hold the `general` block of a model specification as an explicit,
//! fully-defaulted configuration struct ([`GeneralOptions`]) and bundle the
//! optimizer configuration used by [`SkillModel`](crate::model::models::SkillModel)
//! ([`EstimationOptions`]).
//!
//! Key behaviors
//! -------------
//! - [`GeneralOptions::from_map`] starts from [`GeneralOptions::default`],
//!   overrides each recognised key, rejects unknown keys and validates
//!   every value. Nothing is mutated after construction.
//! - [`AnchoringMode`] parses the two documented anchoring modes.
//!
//! Conventions
//! -----------
//! - Option keys use the snake_case names of the JSON specification.
//! - Defaults: `n_mixture_components = 1`, `sigma_points_scale = 2`,
//!   `robust_bounds = false`, `bounds_distance = 1e-6`,
//!   `ignore_intercept_in_linear_anchoring = true`,
//!   `anchoring_mode = only_estimate_anchoring_equation`,
//!   `time_invariant_measurement_system = false`.
use crate::{
    model::errors::{SpecError, SpecResult},
    optimization::loglik_optimizer::MLEOptions,
};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Recognised keys of the `general` block.
pub const GENERAL_OPTION_KEYS: [&str; 7] = [
    "n_mixture_components",
    "sigma_points_scale",
    "robust_bounds",
    "bounds_distance",
    "ignore_intercept_in_linear_anchoring",
    "anchoring_mode",
    "time_invariant_measurement_system",
];

/// How anchoring enters estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchoringMode {
    /// Estimate the anchoring equation alongside the model; the latent
    /// recursion stays on its own scale.
    #[default]
    OnlyEstimateAnchoringEquation,
    /// Express the transition recursion on the anchoring outcome's scale.
    TrulyAnchorLatentFactors,
}

impl FromStr for AnchoringMode {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "only_estimate_anchoring_equation" => Ok(AnchoringMode::OnlyEstimateAnchoringEquation),
            "truly_anchor_latent_factors" => Ok(AnchoringMode::TrulyAnchorLatentFactors),
            _ => Err(SpecError::InvalidOption {
                key: "anchoring_mode",
                reason: "expected 'only_estimate_anchoring_equation' or 'truly_anchor_latent_factors'",
            }),
        }
    }
}

/// Fully-defaulted `general` options of a model specification.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralOptions {
    pub n_mixture_components: usize,
    pub sigma_points_scale: f64,
    pub robust_bounds: bool,
    pub bounds_distance: f64,
    pub ignore_intercept_in_linear_anchoring: bool,
    pub anchoring_mode: AnchoringMode,
    pub time_invariant_measurement_system: bool,
}

impl Default for GeneralOptions {
    fn default() -> Self {
        Self {
            n_mixture_components: 1,
            sigma_points_scale: 2.0,
            robust_bounds: false,
            bounds_distance: 1e-6,
            ignore_intercept_in_linear_anchoring: true,
            anchoring_mode: AnchoringMode::OnlyEstimateAnchoringEquation,
            time_invariant_measurement_system: false,
        }
    }
}

impl GeneralOptions {
    /// Build options from the `general` mapping of a specification.
    ///
    /// Parameters
    /// ----------
    /// - `map`: `&Map<String, Value>`
    ///   User-supplied options. Any subset of [`GENERAL_OPTION_KEYS`].
    ///
    /// Returns
    /// -------
    /// `SpecResult<GeneralOptions>`
    ///   Defaults overridden by the supplied values.
    ///
    /// Errors
    /// ------
    /// - `SpecError::UnknownOption` for a key outside [`GENERAL_OPTION_KEYS`].
    /// - `SpecError::InvalidOption` for a value of the wrong type or out of
    ///   range (`n_mixture_components ≥ 1`, `sigma_points_scale` finite and
    ///   `≥ 0`, `bounds_distance` finite and `> 0`).
    pub fn from_map(map: &Map<String, Value>) -> SpecResult<Self> {
        let mut opts = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "n_mixture_components" => {
                    opts.n_mixture_components = value
                        .as_u64()
                        .filter(|&m| m >= 1)
                        .ok_or(SpecError::InvalidOption {
                            key: "n_mixture_components",
                            reason: "must be an integer >= 1",
                        })? as usize;
                }
                "sigma_points_scale" => {
                    opts.sigma_points_scale = value
                        .as_f64()
                        .filter(|k| k.is_finite() && *k >= 0.0)
                        .ok_or(SpecError::InvalidOption {
                            key: "sigma_points_scale",
                            reason: "must be a finite number >= 0",
                        })?;
                }
                "robust_bounds" => {
                    opts.robust_bounds = as_bool(value, "robust_bounds")?;
                }
                "bounds_distance" => {
                    opts.bounds_distance = value
                        .as_f64()
                        .filter(|d| d.is_finite() && *d > 0.0)
                        .ok_or(SpecError::InvalidOption {
                            key: "bounds_distance",
                            reason: "must be a finite number > 0",
                        })?;
                }
                "ignore_intercept_in_linear_anchoring" => {
                    opts.ignore_intercept_in_linear_anchoring =
                        as_bool(value, "ignore_intercept_in_linear_anchoring")?;
                }
                "anchoring_mode" => {
                    let name = value.as_str().ok_or(SpecError::InvalidOption {
                        key: "anchoring_mode",
                        reason: "must be a string",
                    })?;
                    opts.anchoring_mode = name.parse()?;
                }
                "time_invariant_measurement_system" => {
                    opts.time_invariant_measurement_system =
                        as_bool(value, "time_invariant_measurement_system")?;
                }
                other => return Err(SpecError::UnknownOption { key: other.to_string() }),
            }
        }
        Ok(opts)
    }

    /// Lower bound applied to variances and Cholesky diagonals.
    pub fn variance_lower_bound(&self) -> f64 {
        if self.robust_bounds { self.bounds_distance } else { 0.0 }
    }
}

fn as_bool(value: &Value, key: &'static str) -> SpecResult<bool> {
    value.as_bool().ok_or(SpecError::InvalidOption { key, reason: "must be a boolean" })
}

/// Estimation-run configuration.
///
/// - `mle_opts`: tolerances, line search and L-BFGS memory for `fit`.
/// - `parallel`: filter individuals on the rayon pool. Results are identical
///   to the sequential path because contributions are summed in individual
///   order.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationOptions {
    pub mle_opts: MLEOptions,
    pub parallel: bool,
}

impl EstimationOptions {
    pub fn new(mle_opts: MLEOptions, parallel: bool) -> Self {
        Self { mle_opts, parallel }
    }
}

impl Default for EstimationOptions {
    fn default() -> Self {
        Self { mle_opts: MLEOptions::default(), parallel: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Defaults when the `general` block is empty.
    // - Overrides, unknown keys and invalid values.
    //
    // They intentionally DO NOT cover:
    // - How the options are consumed by the layout and filter.
    // -------------------------------------------------------------------------

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    // Purpose
    // -------
    // An empty `general` block yields the documented defaults.
    //
    // Given
    // -----
    // - `{}`.
    //
    // Expect
    // ------
    // - `GeneralOptions::default()`.
    fn empty_map_gives_defaults() {
        // Arrange
        let map = as_map(json!({}));

        // Act
        let opts = GeneralOptions::from_map(&map).expect("empty map should parse");

        // Assert
        assert_eq!(opts, GeneralOptions::default());
        assert_eq!(opts.n_mixture_components, 1);
        assert_eq!(opts.sigma_points_scale, 2.0);
        assert_eq!(opts.anchoring_mode, AnchoringMode::OnlyEstimateAnchoringEquation);
    }

    #[test]
    // Purpose
    // -------
    // Supplied values override defaults.
    //
    // Given
    // -----
    // - Two mixture components, robust bounds and truly-anchoring mode.
    //
    // Expect
    // ------
    // - Overridden fields changed, others default.
    fn supplied_values_override_defaults() {
        // Arrange
        let map = as_map(json!({
            "n_mixture_components": 2,
            "robust_bounds": true,
            "bounds_distance": 0.001,
            "anchoring_mode": "truly_anchor_latent_factors"
        }));

        // Act
        let opts = GeneralOptions::from_map(&map).expect("valid options should parse");

        // Assert
        assert_eq!(opts.n_mixture_components, 2);
        assert!(opts.robust_bounds);
        assert_eq!(opts.variance_lower_bound(), 0.001);
        assert_eq!(opts.anchoring_mode, AnchoringMode::TrulyAnchorLatentFactors);
        assert!(opts.ignore_intercept_in_linear_anchoring);
    }

    #[test]
    // Purpose
    // -------
    // Unknown keys are rejected rather than ignored.
    //
    // Given
    // -----
    // - A misspelled key.
    //
    // Expect
    // ------
    // - `SpecError::UnknownOption` naming the key.
    fn unknown_key_is_rejected() {
        // Arrange
        let map = as_map(json!({ "n_mixture_component": 2 }));

        // Act
        let err = GeneralOptions::from_map(&map).unwrap_err();

        // Assert
        match err {
            SpecError::UnknownOption { key } => assert_eq!(key, "n_mixture_component"),
            other => panic!("expected UnknownOption, got {other:?}"),
        }
    }

    #[test]
    // Purpose
    // -------
    // Out-of-range values are rejected.
    //
    // Given
    // -----
    // - A negative sigma point scale and zero mixture components.
    //
    // Expect
    // ------
    // - `SpecError::InvalidOption` for each.
    fn invalid_values_are_rejected() {
        // Arrange
        let scale = as_map(json!({ "sigma_points_scale": -1.0 }));
        let mixtures = as_map(json!({ "n_mixture_components": 0 }));

        // Act
        let scale_err = GeneralOptions::from_map(&scale).unwrap_err();
        let mixture_err = GeneralOptions::from_map(&mixtures).unwrap_err();

        // Assert
        assert!(matches!(scale_err, SpecError::InvalidOption { key: "sigma_points_scale", .. }));
        assert!(matches!(
            mixture_err,
            SpecError::InvalidOption { key: "n_mixture_components", .. }
        ));
    }
}
