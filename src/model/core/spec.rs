//! spec — parse and normalize a declarative model specification.
//!
//! Purpose
//! -------
//! Turn the raw JSON specification (`factor_specific` + `time_specific`)
//! into a validated [`ModelSpec`] in which every default has been applied,
//! every per-period list has exactly one entry per period, every factor
//! reference is resolved to a position, and the per-period measurement
//! equations are assembled. After [`ModelSpec::from_value`] succeeds no
//! implicit value remains.
//!
//! Key behaviors
//! -------------
//! - The number of periods `T` is the length of the first factor's
//!   measurement list; every other per-period list must match it.
//! - Factor declaration order is the key order of `factor_specific`.
//! - Measurement equations of a period are the distinct measurement names in
//!   order of first appearance, walking factors in declaration order. A
//!   measurement listed by several factors loads on all of them.
//! - A control literally named `constant` is dropped; every measurement
//!   equation has an intercept.
//! - The default stagemap is `t ↦ min(t, T − 2)` (one stage per transition).
//!
//! Invariants & assumptions
//! ------------------------
//! - Parsing is pure: no I/O beyond reading the given value, no randomness.
//! - Violations are reported as [`SpecError`] naming the offending key,
//!   factor or period; nothing is silently repaired.
//!
//! Conventions
//! -----------
//! - Factor positions (`usize`) index [`ModelSpec::factors`].
//! - The transition from period `t` to `t + 1` uses stage `stagemap[t]`.
//!
//! Testing notes
//! -------------
//! - Unit tests cover list-length checks, reference checks, normalization
//!   placement, stagemap validation and measurement-equation assembly.
use crate::model::{
    core::{options::GeneralOptions, transition::TransitionEquation},
    errors::{SpecError, SpecResult},
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Name of the control that stands for the always-present intercept.
pub const CONSTANT_CONTROL: &str = "constant";

// ---- Raw (serde) shapes ----

#[derive(Debug, Deserialize)]
struct RawFactor {
    measurements: Option<Vec<Vec<String>>>,
    normalizations: Option<RawNormalizations>,
    trans_eq: Option<RawTransEq>,
}

#[derive(Debug, Deserialize)]
struct RawNormalizations {
    loadings: Option<Vec<BTreeMap<String, f64>>>,
    intercepts: Option<Vec<BTreeMap<String, f64>>>,
}

#[derive(Debug, Deserialize)]
struct RawTransEq {
    name: String,
    #[serde(default)]
    included_factors: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTimeSpecific {
    controls: Option<Vec<Vec<String>>>,
    stagemap: Option<Vec<usize>>,
    anchoring: Option<RawAnchoring>,
    #[serde(default)]
    general: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawAnchoring {
    outcome: String,
    factors: Vec<String>,
    #[serde(default)]
    center: bool,
    #[serde(default)]
    use_controls: bool,
    #[serde(default)]
    use_constant: bool,
    #[serde(default)]
    free_loadings: bool,
}

// ---- Normalized shapes ----

/// A latent factor after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorSpec {
    pub name: String,
    /// Measurement names per period (possibly empty).
    pub measurements: Vec<Vec<String>>,
    /// Loading normalizations per period: measurement → fixed value.
    pub loading_norms: Vec<BTreeMap<String, f64>>,
    /// Intercept normalizations per period: measurement → fixed value.
    pub intercept_norms: Vec<BTreeMap<String, f64>>,
    pub transition: TransitionEquation,
    /// Positions of the factors the transition depends on (empty for `constant`).
    pub included: Vec<usize>,
    pub anchored: bool,
}

impl FactorSpec {
    /// Position of the factor's own value among its included factors.
    pub fn own_included_position(&self, own: usize) -> Option<usize> {
        self.included.iter().position(|&p| p == own)
    }
}

/// One observed variable in one period.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementEquation {
    pub name: String,
    pub period: usize,
    /// Positions of the measured factors, in declaration order.
    pub factors: Vec<usize>,
    /// Loading normalization per measured factor.
    pub loading_norms: Vec<Option<f64>>,
    pub intercept_norm: Option<f64>,
    /// Controls of the period (without `constant`).
    pub controls: Vec<String>,
}

/// Identity used to alias measurement equations across periods.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeasurementIdentity {
    pub name: String,
    pub factors: BTreeSet<usize>,
    pub controls: BTreeSet<String>,
}

impl MeasurementEquation {
    pub fn identity(&self) -> MeasurementIdentity {
        MeasurementIdentity {
            name: self.name.clone(),
            factors: self.factors.iter().copied().collect(),
            controls: self.controls.iter().cloned().collect(),
        }
    }
}

/// Anchoring configuration after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchoringSpec {
    pub outcome: String,
    /// Anchored factor positions in declaration order.
    pub factors: Vec<usize>,
    pub center: bool,
    pub use_controls: bool,
    pub use_constant: bool,
    pub free_loadings: bool,
}

/// Fully resolved model specification.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub factors: Vec<FactorSpec>,
    pub n_periods: usize,
    pub stagemap: Vec<usize>,
    /// Controls per period (without `constant`).
    pub controls: Vec<Vec<String>>,
    pub anchoring: Option<AnchoringSpec>,
    pub general: GeneralOptions,
    /// Measurement equations per period.
    pub measurement_equations: Vec<Vec<MeasurementEquation>>,
}

impl ModelSpec {
    /// Parse a specification from JSON text.
    ///
    /// Errors
    /// ------
    /// - `SpecError::InvalidDocument` if the text is not valid JSON.
    /// - Any error of [`ModelSpec::from_value`].
    pub fn from_json_str(text: &str) -> SpecResult<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| SpecError::InvalidDocument {
            path: "$".to_string(),
            reason: e.to_string(),
        })?;
        Self::from_value(&value)
    }

    /// Parse and normalize a specification value.
    ///
    /// Parameters
    /// ----------
    /// - `raw`: `&Value`
    ///   Object with `factor_specific` (required) and `time_specific`
    ///   (optional; defaults to no controls, default stagemap, no anchoring
    ///   and default general options).
    ///
    /// Returns
    /// -------
    /// `SpecResult<ModelSpec>` with every default applied.
    ///
    /// Errors
    /// ------
    /// - `SpecError::MissingKey` for absent `factor_specific`, `measurements`,
    ///   `normalizations`, `loadings`, `intercepts` or `trans_eq`.
    /// - `SpecError::PeriodListLength` for any per-period list whose length
    ///   differs from the number of periods.
    /// - `SpecError::UnknownTransition`, `UnknownIncludedFactor`,
    ///   `EmptyIncludedFactors`, `DuplicateIncludedFactor`.
    /// - `SpecError::UnknownNormalization` / `ConflictingNormalization`.
    /// - `SpecError::InvalidStagemap`, `UnknownAnchoredFactor`,
    ///   `EmptyAnchoring`, `UnknownOption`, `InvalidOption`.
    pub fn from_value(raw: &Value) -> SpecResult<Self> {
        let root = raw.as_object().ok_or_else(|| SpecError::InvalidDocument {
            path: "$".to_string(),
            reason: "specification must be a JSON object".to_string(),
        })?;
        let factor_map = root
            .get("factor_specific")
            .ok_or(SpecError::MissingKey { path: "$".to_string(), key: "factor_specific" })?
            .as_object()
            .ok_or_else(|| SpecError::InvalidDocument {
                path: "$.factor_specific".to_string(),
                reason: "must be an object mapping factor names to factor blocks".to_string(),
            })?;
        if factor_map.is_empty() {
            return Err(SpecError::NoFactors);
        }
        let time_specific: RawTimeSpecific = match root.get("time_specific") {
            Some(v) => serde_json::from_value(v.clone()).map_err(|e| {
                SpecError::InvalidDocument {
                    path: "$.time_specific".to_string(),
                    reason: e.to_string(),
                }
            })?,
            None => RawTimeSpecific::default(),
        };

        let mut raw_factors = Vec::with_capacity(factor_map.len());
        for (name, value) in factor_map {
            let rf: RawFactor =
                serde_json::from_value(value.clone()).map_err(|e| SpecError::InvalidDocument {
                    path: format!("$.factor_specific.{name}"),
                    reason: e.to_string(),
                })?;
            raw_factors.push((name.clone(), rf));
        }
        let names: Vec<String> = raw_factors.iter().map(|(n, _)| n.clone()).collect();

        let n_periods = {
            let (first_name, first) = &raw_factors[0];
            let meas = first.measurements.as_ref().ok_or_else(|| SpecError::MissingKey {
                path: format!("$.factor_specific.{first_name}"),
                key: "measurements",
            })?;
            if meas.is_empty() {
                return Err(SpecError::NoPeriods { factor: first_name.clone() });
            }
            meas.len()
        };

        let general = GeneralOptions::from_map(&time_specific.general)?;
        let anchoring = match &time_specific.anchoring {
            Some(ra) => Some(resolve_anchoring(ra, &names)?),
            None => None,
        };

        let mut factors = Vec::with_capacity(raw_factors.len());
        for (pos, (name, rf)) in raw_factors.into_iter().enumerate() {
            let anchored = anchoring.as_ref().is_some_and(|a| a.factors.contains(&pos));
            factors.push(resolve_factor(name, rf, &names, n_periods, anchored)?);
        }

        let controls = resolve_controls(time_specific.controls, n_periods)?;
        let stagemap = resolve_stagemap(time_specific.stagemap, n_periods)?;
        let measurement_equations = assemble_measurements(&factors, &controls, n_periods)?;

        Ok(Self { factors, n_periods, stagemap, controls, anchoring, general, measurement_equations })
    }

    pub fn n_factors(&self) -> usize {
        self.factors.len()
    }

    pub fn factor_names(&self) -> Vec<String> {
        self.factors.iter().map(|f| f.name.clone()).collect()
    }

    /// Number of stages (`max(stagemap) + 1`).
    pub fn n_stages(&self) -> usize {
        self.stagemap.iter().copied().max().map_or(0, |s| s + 1)
    }

    /// Stages used by at least one transition `t → t + 1`, ascending.
    pub fn transition_stages(&self) -> Vec<usize> {
        let used: BTreeSet<usize> =
            self.stagemap[..self.n_periods.saturating_sub(1)].iter().copied().collect();
        used.into_iter().collect()
    }

    /// Controls entering the anchoring equation (final-period controls when
    /// `use_controls` is set).
    pub fn anchoring_controls(&self) -> &[String] {
        match &self.anchoring {
            Some(a) if a.use_controls => &self.controls[self.n_periods - 1],
            _ => &[],
        }
    }

    /// Every dataset column referenced by the specification, sorted.
    pub fn required_columns(&self) -> Vec<String> {
        let mut cols: BTreeSet<String> = BTreeSet::new();
        for period in &self.measurement_equations {
            for eq in period {
                cols.insert(eq.name.clone());
            }
        }
        for period in &self.controls {
            cols.extend(period.iter().cloned());
        }
        if let Some(a) = &self.anchoring {
            cols.insert(a.outcome.clone());
        }
        cols.into_iter().collect()
    }
}

// ---- Helper methods ----

fn check_len(owner: &str, list: &'static str, expected: usize, found: usize) -> SpecResult<()> {
    if found != expected {
        return Err(SpecError::PeriodListLength {
            owner: owner.to_string(),
            list,
            expected,
            found,
        });
    }
    Ok(())
}

fn resolve_factor(
    name: String, rf: RawFactor, names: &[String], n_periods: usize, anchored: bool,
) -> SpecResult<FactorSpec> {
    let path = format!("$.factor_specific.{name}");
    let measurements = rf
        .measurements
        .ok_or_else(|| SpecError::MissingKey { path: path.clone(), key: "measurements" })?;
    check_len(&name, "measurements", n_periods, measurements.len())?;

    let norms = rf
        .normalizations
        .ok_or_else(|| SpecError::MissingKey { path: path.clone(), key: "normalizations" })?;
    let loading_norms = norms.loadings.ok_or_else(|| SpecError::MissingKey {
        path: format!("{path}.normalizations"),
        key: "loadings",
    })?;
    check_len(&name, "normalizations.loadings", n_periods, loading_norms.len())?;
    let intercept_norms = norms.intercepts.ok_or_else(|| SpecError::MissingKey {
        path: format!("{path}.normalizations"),
        key: "intercepts",
    })?;
    check_len(&name, "normalizations.intercepts", n_periods, intercept_norms.len())?;

    for (quantity, per_period) in [("loading", &loading_norms), ("intercept", &intercept_norms)] {
        for (t, norm) in per_period.iter().enumerate() {
            for (meas, &value) in norm {
                if !measurements[t].contains(meas) {
                    return Err(SpecError::UnknownNormalization {
                        factor: name.clone(),
                        period: t,
                        measurement: meas.clone(),
                        quantity,
                    });
                }
                if !value.is_finite() {
                    return Err(SpecError::NonFiniteNormalization {
                        period: t,
                        measurement: meas.clone(),
                        value,
                    });
                }
            }
        }
    }

    let trans_eq =
        rf.trans_eq.ok_or_else(|| SpecError::MissingKey { path: path.clone(), key: "trans_eq" })?;
    let transition = TransitionEquation::from_name(&trans_eq.name).ok_or_else(|| {
        SpecError::UnknownTransition { factor: name.clone(), name: trans_eq.name.clone() }
    })?;
    let mut included = Vec::with_capacity(trans_eq.included_factors.len());
    if !transition.is_constant() {
        for inc in &trans_eq.included_factors {
            let pos = names.iter().position(|n| n == inc).ok_or_else(|| {
                SpecError::UnknownIncludedFactor { factor: name.clone(), included: inc.clone() }
            })?;
            if included.contains(&pos) {
                return Err(SpecError::DuplicateIncludedFactor {
                    factor: name.clone(),
                    included: inc.clone(),
                });
            }
            included.push(pos);
        }
        if included.is_empty() {
            return Err(SpecError::EmptyIncludedFactors {
                factor: name.clone(),
                name: transition.name(),
            });
        }
    } else if !trans_eq.included_factors.is_empty() {
        warn!(
            factor = %name,
            included = ?trans_eq.included_factors,
            "constant transition ignores its included factors"
        );
    }

    Ok(FactorSpec {
        name,
        measurements,
        loading_norms,
        intercept_norms,
        transition,
        included,
        anchored,
    })
}

fn resolve_anchoring(ra: &RawAnchoring, names: &[String]) -> SpecResult<AnchoringSpec> {
    if ra.factors.is_empty() {
        return Err(SpecError::EmptyAnchoring);
    }
    let mut positions = BTreeSet::new();
    for f in &ra.factors {
        let pos = names
            .iter()
            .position(|n| n == f)
            .ok_or_else(|| SpecError::UnknownAnchoredFactor { factor: f.clone() })?;
        positions.insert(pos);
    }
    Ok(AnchoringSpec {
        outcome: ra.outcome.clone(),
        factors: positions.into_iter().collect(),
        center: ra.center,
        use_controls: ra.use_controls,
        use_constant: ra.use_constant,
        free_loadings: ra.free_loadings,
    })
}

fn resolve_controls(raw: Option<Vec<Vec<String>>>, n_periods: usize) -> SpecResult<Vec<Vec<String>>> {
    match raw {
        Some(controls) => {
            check_len("time_specific", "controls", n_periods, controls.len())?;
            Ok(controls
                .into_iter()
                .map(|period| {
                    let mut seen = BTreeSet::new();
                    period
                        .into_iter()
                        .filter(|c| c != CONSTANT_CONTROL && seen.insert(c.clone()))
                        .collect()
                })
                .collect())
        }
        None => Ok(vec![Vec::new(); n_periods]),
    }
}

fn resolve_stagemap(raw: Option<Vec<usize>>, n_periods: usize) -> SpecResult<Vec<usize>> {
    let stagemap = match raw {
        Some(map) => {
            check_len("time_specific", "stagemap", n_periods, map.len())?;
            map
        }
        None => {
            let last = n_periods.saturating_sub(2);
            (0..n_periods).map(|t| t.min(last)).collect()
        }
    };
    if stagemap[0] != 0 {
        return Err(SpecError::InvalidStagemap { period: 0, reason: "first stage must be 0" });
    }
    for t in 1..n_periods {
        let step = stagemap[t] as i64 - stagemap[t - 1] as i64;
        if step < 0 {
            return Err(SpecError::InvalidStagemap { period: t, reason: "stages must not decrease" });
        }
        if step > 1 {
            return Err(SpecError::InvalidStagemap {
                period: t,
                reason: "stages must be contiguous (increase by at most one)",
            });
        }
    }
    Ok(stagemap)
}

fn assemble_measurements(
    factors: &[FactorSpec], controls: &[Vec<String>], n_periods: usize,
) -> SpecResult<Vec<Vec<MeasurementEquation>>> {
    let mut periods = Vec::with_capacity(n_periods);
    for t in 0..n_periods {
        let mut equations: Vec<MeasurementEquation> = Vec::new();
        for (pos, factor) in factors.iter().enumerate() {
            for meas in &factor.measurements[t] {
                let loading = factor.loading_norms[t].get(meas).copied();
                let intercept = factor.intercept_norms[t].get(meas).copied();
                match equations.iter_mut().find(|eq| &eq.name == meas) {
                    Some(eq) => {
                        if eq.factors.contains(&pos) {
                            continue;
                        }
                        eq.factors.push(pos);
                        eq.loading_norms.push(loading);
                        match (eq.intercept_norm, intercept) {
                            (Some(first), Some(second)) if first != second => {
                                return Err(SpecError::ConflictingNormalization {
                                    period: t,
                                    measurement: meas.clone(),
                                    first,
                                    second,
                                });
                            }
                            (None, Some(v)) => eq.intercept_norm = Some(v),
                            _ => {}
                        }
                    }
                    None => equations.push(MeasurementEquation {
                        name: meas.clone(),
                        period: t,
                        factors: vec![pos],
                        loading_norms: vec![loading],
                        intercept_norm: intercept,
                        controls: controls[t].clone(),
                    }),
                }
            }
        }
        periods.push(equations);
    }
    Ok(periods)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::core::{fixtures, options::AnchoringMode};
    use serde_json::json;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Successful normalization of a small two-factor specification.
    // - List-length, reference and stagemap validation errors.
    // - Measurement equation assembly (shared measurements, controls).
    // - Constant transitions with listed included factors.
    //
    // They intentionally DO NOT cover:
    // - Parameter allocation (layout tests) or dataset alignment.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // A valid specification parses with defaults applied.
    //
    // Given
    // -----
    // - The two-factor fixture (3 periods, one control, no general block).
    //
    // Expect
    // ------
    // - 3 periods, default stagemap [0, 1, 1], measurement equations in
    //   declaration order and `constant` dropped from controls.
    fn two_factor_spec_parses_with_defaults() {
        // Arrange
        let raw = fixtures::two_factor_spec();

        // Act
        let spec = ModelSpec::from_value(&raw).expect("fixture should parse");

        // Assert
        assert_eq!(spec.n_periods, 3);
        assert_eq!(spec.stagemap, vec![0, 1, 1]);
        assert_eq!(spec.transition_stages(), vec![0, 1]);
        assert_eq!(spec.factor_names(), vec!["fac1", "fac2"]);
        assert_eq!(spec.controls[0], vec!["x1"]);
        let names: Vec<&str> =
            spec.measurement_equations[0].iter().map(|eq| eq.name.as_str()).collect();
        assert_eq!(names, vec!["y1", "y2", "y3", "y4", "y5", "y6"]);
        assert_eq!(spec.measurement_equations[0][0].loading_norms, vec![Some(1.0)]);
        assert_eq!(spec.measurement_equations[0][0].intercept_norm, Some(0.0));
        assert_eq!(spec.general.anchoring_mode, AnchoringMode::OnlyEstimateAnchoringEquation);
    }

    #[test]
    // Purpose
    // -------
    // A short per-period list is rejected, not padded.
    //
    // Given
    // -----
    // - fac2's loadings normalization list has two entries for three periods.
    //
    // Expect
    // ------
    // - `SpecError::PeriodListLength` naming fac2 and the list.
    fn short_normalization_list_is_rejected() {
        // Arrange
        let mut raw = fixtures::two_factor_spec();
        raw["factor_specific"]["fac2"]["normalizations"]["loadings"] = json!([{}, {}]);

        // Act
        let err = ModelSpec::from_value(&raw).unwrap_err();

        // Assert
        match err {
            SpecError::PeriodListLength { owner, list, expected, found } => {
                assert_eq!(owner, "fac2");
                assert_eq!(list, "normalizations.loadings");
                assert_eq!((expected, found), (3, 2));
            }
            other => panic!("expected PeriodListLength, got {other:?}"),
        }
    }

    #[test]
    // Purpose
    // -------
    // A missing measurement list is a specification error.
    //
    // Given
    // -----
    // - fac2 without `measurements`.
    //
    // Expect
    // ------
    // - `SpecError::MissingKey { key: "measurements" }`.
    fn missing_measurement_list_is_rejected() {
        // Arrange
        let mut raw = fixtures::two_factor_spec();
        raw["factor_specific"]["fac2"]
            .as_object_mut()
            .expect("factor block is an object")
            .remove("measurements");

        // Act
        let err = ModelSpec::from_value(&raw).unwrap_err();

        // Assert
        assert!(matches!(err, SpecError::MissingKey { key: "measurements", .. }));
    }

    #[test]
    // Purpose
    // -------
    // Transition inclusion lists must reference declared factors.
    //
    // Given
    // -----
    // - fac1's transition includes "fac9".
    //
    // Expect
    // ------
    // - `SpecError::UnknownIncludedFactor`.
    fn undeclared_included_factor_is_rejected() {
        // Arrange
        let mut raw = fixtures::two_factor_spec();
        raw["factor_specific"]["fac1"]["trans_eq"]["included_factors"] = json!(["fac1", "fac9"]);

        // Act
        let err = ModelSpec::from_value(&raw).unwrap_err();

        // Assert
        match err {
            SpecError::UnknownIncludedFactor { factor, included } => {
                assert_eq!(factor, "fac1");
                assert_eq!(included, "fac9");
            }
            other => panic!("expected UnknownIncludedFactor, got {other:?}"),
        }
    }

    #[test]
    // Purpose
    // -------
    // A constant transition keeps no included factors, even when some are
    // listed (a warning is logged).
    //
    // Given
    // -----
    // - fac2 switched to `constant` with `included_factors = ["fac1"]`.
    //
    // Expect
    // ------
    // - The specification parses; fac2's inclusion list is empty.
    fn constant_transition_drops_included_factors() {
        // Arrange
        let mut raw = fixtures::two_factor_spec();
        raw["factor_specific"]["fac2"]["trans_eq"] =
            json!({ "name": "constant", "included_factors": ["fac1"] });

        // Act
        let spec = ModelSpec::from_value(&raw).expect("constant transition should parse");

        // Assert
        assert!(spec.factors[1].transition.is_constant());
        assert!(spec.factors[1].included.is_empty());
    }

    #[test]
    // Purpose
    // -------
    // Anchored factors must be declared and unknown options rejected.
    //
    // Given
    // -----
    // - Anchoring on "fac7"; separately an unknown general key.
    //
    // Expect
    // ------
    // - `UnknownAnchoredFactor` and `UnknownOption`.
    fn anchoring_and_general_keys_are_validated() {
        // Arrange
        let mut bad_anchor = fixtures::two_factor_spec();
        bad_anchor["time_specific"]["anchoring"] = json!({ "outcome": "q1", "factors": ["fac7"] });
        let mut bad_option = fixtures::two_factor_spec();
        bad_option["time_specific"]["general"] = json!({ "nmixtures": 2 });

        // Act
        let anchor_err = ModelSpec::from_value(&bad_anchor).unwrap_err();
        let option_err = ModelSpec::from_value(&bad_option).unwrap_err();

        // Assert
        assert!(matches!(anchor_err, SpecError::UnknownAnchoredFactor { .. }));
        assert!(matches!(option_err, SpecError::UnknownOption { .. }));
    }

    #[test]
    // Purpose
    // -------
    // Stagemaps must start at zero and grow by at most one per period.
    //
    // Given
    // -----
    // - [0, 2, 2] and [0, 1, 0].
    //
    // Expect
    // ------
    // - `InvalidStagemap` at period 1 and period 2 respectively.
    fn malformed_stagemap_is_rejected() {
        // Arrange
        let mut jump = fixtures::two_factor_spec();
        jump["time_specific"]["stagemap"] = json!([0, 2, 2]);
        let mut decrease = fixtures::two_factor_spec();
        decrease["time_specific"]["stagemap"] = json!([0, 1, 0]);

        // Act
        let jump_err = ModelSpec::from_value(&jump).unwrap_err();
        let decrease_err = ModelSpec::from_value(&decrease).unwrap_err();

        // Assert
        assert!(matches!(jump_err, SpecError::InvalidStagemap { period: 1, .. }));
        assert!(matches!(decrease_err, SpecError::InvalidStagemap { period: 2, .. }));
    }

    #[test]
    // Purpose
    // -------
    // Normalizing a measurement the factor does not measure is an error.
    //
    // Given
    // -----
    // - fac1 normalizes the loading of "y9" in period 0.
    //
    // Expect
    // ------
    // - `SpecError::UnknownNormalization` for period 0.
    fn normalization_of_unmeasured_variable_is_rejected() {
        // Arrange
        let mut raw = fixtures::two_factor_spec();
        raw["factor_specific"]["fac1"]["normalizations"]["loadings"][0] = json!({ "y9": 1.0 });

        // Act
        let err = ModelSpec::from_value(&raw).unwrap_err();

        // Assert
        match err {
            SpecError::UnknownNormalization { factor, period, measurement, quantity } => {
                assert_eq!(factor, "fac1");
                assert_eq!(period, 0);
                assert_eq!(measurement, "y9");
                assert_eq!(quantity, "loading");
            }
            other => panic!("expected UnknownNormalization, got {other:?}"),
        }
    }

    #[test]
    // Purpose
    // -------
    // A measurement listed under two factors is one equation loading on both.
    //
    // Given
    // -----
    // - fac2 also measures "y1" in period 1.
    //
    // Expect
    // ------
    // - A single "y1" equation in period 1 with factors [0, 1].
    fn shared_measurement_loads_on_both_factors() {
        // Arrange
        let mut raw = fixtures::two_factor_spec();
        raw["factor_specific"]["fac2"]["measurements"][1] = json!(["y4", "y5", "y6", "y1"]);

        // Act
        let spec = ModelSpec::from_value(&raw).expect("shared measurement is valid");

        // Assert
        let y1: Vec<&MeasurementEquation> =
            spec.measurement_equations[1].iter().filter(|eq| eq.name == "y1").collect();
        assert_eq!(y1.len(), 1);
        assert_eq!(y1[0].factors, vec![0, 1]);
        assert_eq!(y1[0].loading_norms.len(), 2);
    }

    #[test]
    // Purpose
    // -------
    // Required columns collect measurements, controls and the anchoring outcome.
    //
    // Given
    // -----
    // - The two-factor fixture with anchoring on fac1 by "q1".
    //
    // Expect
    // ------
    // - Sorted list including "q1" and "x1".
    fn required_columns_cover_all_references() {
        // Arrange
        let mut raw = fixtures::two_factor_spec();
        raw["time_specific"]["anchoring"] = json!({ "outcome": "q1", "factors": ["fac1"] });

        // Act
        let spec = ModelSpec::from_value(&raw).expect("anchored fixture should parse");
        let cols = spec.required_columns();

        // Assert
        assert!(cols.contains(&"q1".to_string()));
        assert!(cols.contains(&"x1".to_string()));
        assert!(cols.contains(&"y6".to_string()));
        assert!(spec.factors[0].anchored);
        assert!(!spec.factors[1].anchored);
    }
}
