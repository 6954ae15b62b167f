//! Shared specification fixtures for unit tests.
use serde_json::{json, Value};

/// Two factors, three periods, three measurements each, one control.
///
/// - fac1: `log_ces` on (fac1, fac2), loading of y1 fixed to 1, intercept 0.
/// - fac2: `linear` on (fac1, fac2), loading of y4 fixed to 1, intercept 0.
pub fn two_factor_spec() -> Value {
    let norm_loadings_1: Vec<Value> = (0..3).map(|_| json!({ "y1": 1.0 })).collect();
    let norm_intercepts_1: Vec<Value> = (0..3).map(|_| json!({ "y1": 0.0 })).collect();
    let norm_loadings_2: Vec<Value> = (0..3).map(|_| json!({ "y4": 1.0 })).collect();
    let norm_intercepts_2: Vec<Value> = (0..3).map(|_| json!({ "y4": 0.0 })).collect();
    json!({
        "factor_specific": {
            "fac1": {
                "measurements": [["y1", "y2", "y3"], ["y1", "y2", "y3"], ["y1", "y2", "y3"]],
                "normalizations": { "loadings": norm_loadings_1, "intercepts": norm_intercepts_1 },
                "trans_eq": { "name": "log_ces", "included_factors": ["fac1", "fac2"] }
            },
            "fac2": {
                "measurements": [["y4", "y5", "y6"], ["y4", "y5", "y6"], ["y4", "y5", "y6"]],
                "normalizations": { "loadings": norm_loadings_2, "intercepts": norm_intercepts_2 },
                "trans_eq": { "name": "linear", "included_factors": ["fac1", "fac2"] }
            }
        },
        "time_specific": {
            "controls": [["x1", "constant"], ["x1", "constant"], ["x1", "constant"]]
        }
    })
}

/// One linear factor measured by three variables over `n_periods` periods,
/// without controls.
pub fn one_factor_linear_spec(n_periods: usize) -> Value {
    let measurements: Vec<Value> = (0..n_periods).map(|_| json!(["m1", "m2", "m3"])).collect();
    let loadings: Vec<Value> = (0..n_periods).map(|_| json!({ "m1": 1.0 })).collect();
    let intercepts: Vec<Value> = (0..n_periods).map(|_| json!({ "m1": 0.0 })).collect();
    json!({
        "factor_specific": {
            "skill": {
                "measurements": measurements,
                "normalizations": { "loadings": loadings, "intercepts": intercepts },
                "trans_eq": { "name": "linear", "included_factors": ["skill"] }
            }
        }
    })
}

/// Three factors over eight periods; `fac3` is constant and only measured in
/// periods 0 and 1. Linear anchoring of fac1 and fac2 on `q1`.
pub fn three_factor_anchored_spec() -> Value {
    let t = 8;
    let per = |names: &[&str]| -> Vec<Value> { (0..t).map(|_| json!(names)).collect() };
    let fixed = |name: &str, value: f64| -> Vec<Value> {
        (0..t).map(|_| json!({ name: value })).collect()
    };
    let fac3_meas: Vec<Value> =
        (0..t).map(|p| if p < 2 { json!(["z1", "z2"]) } else { json!([]) }).collect();
    let fac3_loadings: Vec<Value> =
        (0..t).map(|p| if p < 2 { json!({ "z1": 1.0 }) } else { json!({}) }).collect();
    let fac3_intercepts: Vec<Value> =
        (0..t).map(|p| if p < 2 { json!({ "z1": 0.0 }) } else { json!({}) }).collect();
    json!({
        "factor_specific": {
            "fac1": {
                "measurements": per(&["y1", "y2", "y3"]),
                "normalizations": { "loadings": fixed("y1", 1.0), "intercepts": fixed("y1", 0.0) },
                "trans_eq": { "name": "linear", "included_factors": ["fac1", "fac2", "fac3"] }
            },
            "fac2": {
                "measurements": per(&["y4", "y5", "y6"]),
                "normalizations": { "loadings": fixed("y4", 1.0), "intercepts": fixed("y4", 0.0) },
                "trans_eq": { "name": "linear", "included_factors": ["fac1", "fac2"] }
            },
            "fac3": {
                "measurements": fac3_meas,
                "normalizations": { "loadings": fac3_loadings, "intercepts": fac3_intercepts },
                "trans_eq": { "name": "constant", "included_factors": [] }
            }
        },
        "time_specific": {
            "anchoring": {
                "outcome": "q1",
                "factors": ["fac1", "fac2"],
                "center": false,
                "use_controls": false,
                "use_constant": false,
                "free_loadings": true
            }
        }
    })
}
