//! Generation metadata echoed back in the response `info` string

use serde::Serialize;
use serde_json::Value;

const DEFAULT_SEED: i64 = -1;
const DEFAULT_SIZE: i64 = 1024;
const DEFAULT_STEPS: i64 = 20;
const DEFAULT_CFG_SCALE: f64 = 7.0;
const DEFAULT_SAMPLER: &str = "Euler";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationInfo {
    pub prompt: String,
    pub negative_prompt: String,
    pub seed: i64,
    pub width: i64,
    pub height: i64,
    pub steps: i64,
    pub cfg_scale: f64,
    pub sampler_name: String,
}

impl GenerationInfo {
    pub fn from_parameters(parameters: &Value) -> Self {
        let text = |key: &str, default: &str| {
            parameters
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or(default)
                .to_string()
        };

        Self {
            prompt: text("prompt", ""),
            negative_prompt: text("negative_prompt", ""),
            seed: coerce_int(parameters.get("seed"), DEFAULT_SEED),
            width: coerce_int(parameters.get("width"), DEFAULT_SIZE),
            height: coerce_int(parameters.get("height"), DEFAULT_SIZE),
            steps: coerce_int(parameters.get("steps"), DEFAULT_STEPS),
            cfg_scale: coerce_float(parameters.get("cfg_scale"), DEFAULT_CFG_SCALE),
            sampler_name: text("sampler_name", DEFAULT_SAMPLER),
        }
    }
}

/// Integer from a number, numeric string or bool; `default` for anything else.
/// Floats are truncated toward zero.
pub fn coerce_int(value: Option<&Value>, default: i64) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        Some(Value::Bool(b)) => i64::from(*b),
        _ => default,
    }
}

/// Float from a number, numeric string or bool; `default` for anything else
/// and for non-finite results.
pub fn coerce_float(value: Option<&Value>, default: f64) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|f: &f64| f.is_finite()).unwrap_or(default)
}
