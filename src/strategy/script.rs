//! Page-script extraction for content the serialized DOM does not show
//! (shadow roots, framework state).

use serde::Deserialize;
use serde_json::Value;

use super::lookup;
use crate::error::StrategyError;
use crate::record::RawHit;

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptSpec {
    /// Script body; its `return` value must serialize to JSON.
    pub script: String,
    /// Dotted path to the hit array inside the returned value.
    #[serde(default)]
    pub items_path: String,
}

pub fn hits_from_value(spec: &ScriptSpec, value: &Value) -> Result<Vec<RawHit>, StrategyError> {
    // Scripts commonly hand back JSON.stringify(...) output.
    let decoded;
    let root = match value {
        Value::String(s) => {
            decoded = serde_json::from_str::<Value>(s)
                .map_err(|e| StrategyError::Malformed(format!("script returned non-JSON string: {}", e)))?;
            &decoded
        }
        other => other,
    };
    match lookup(root, &spec.items_path) {
        Some(Value::Array(items)) => Ok(items.iter().filter_map(RawHit::from_json).collect()),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(other) => Err(StrategyError::Malformed(format!(
            "expected an array at {:?}, got {}",
            spec.items_path,
            kind(other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
