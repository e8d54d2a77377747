use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{operation, walk};
use crate::errors::PipelineError;

/// Bounds applied to graph walks during path discovery and feature matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkConfig {
    /// Max number of steps a walk may take.
    pub max_steps: usize,
    /// Max outgoing steps a node may have before it is skipped as too
    /// high-degree to expand.
    pub max_fan_out: usize,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            max_steps: walk::DEFAULT_MAX_STEPS,
            max_fan_out: walk::DEFAULT_MAX_FAN_OUT,
        }
    }
}

impl WalkConfig {
    /// Replace the walk-length bound.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Replace the fan-out cap.
    #[must_use]
    pub fn with_max_fan_out(mut self, max_fan_out: usize) -> Self {
        self.max_fan_out = max_fan_out;
        self
    }
}

/// Which dataset halves an operation works on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSelection {
    /// Training data only.
    Training,
    /// Testing data only.
    Testing,
    /// Both halves; operations needing one dataset merge them.
    Both,
}

impl DataSelection {
    /// Resolve a configuration value into a selection.
    pub fn from_tag(tag: &str) -> Result<Self, PipelineError> {
        match tag {
            operation::DATA_TRAINING => Ok(Self::Training),
            operation::DATA_TESTING => Ok(Self::Testing),
            operation::DATA_BOTH => Ok(Self::Both),
            other => Err(PipelineError::Configuration(format!(
                "unrecognized data selection '{other}' (expected '{}', '{}', or '{}')",
                operation::DATA_TRAINING,
                operation::DATA_TESTING,
                operation::DATA_BOTH,
            ))),
        }
    }

    /// The configuration value naming this selection.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Training => operation::DATA_TRAINING,
            Self::Testing => operation::DATA_TESTING,
            Self::Both => operation::DATA_BOTH,
        }
    }
}

/// View operation parameters as an object. Absent parameters (JSON null) act
/// as an empty object; any other non-object value is rejected.
fn as_object<'a>(
    params: &'a Value,
    context: &str,
) -> Result<Option<&'a Map<String, Value>>, PipelineError> {
    match params {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => Err(PipelineError::Configuration(format!(
            "{context} parameters must be a JSON object, got {other}"
        ))),
    }
}

/// Reject parameter keys outside the operation's whitelist, naming the
/// offending keys and the operation they were passed to.
pub fn ensure_no_extra_keys(
    params: &Value,
    context: &str,
    allowed: &[&str],
) -> Result<(), PipelineError> {
    let Some(map) = as_object(params, context)? else {
        return Ok(());
    };
    let extras: Vec<&str> = map
        .keys()
        .map(String::as_str)
        .filter(|key| !allowed.contains(key))
        .collect();
    if extras.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Configuration(format!(
            "unexpected key(s) in {context} parameters: {}",
            extras.join(", ")
        )))
    }
}

/// Read an optional string parameter, falling back to `default` when the key
/// (or the whole object) is absent.
pub fn string_with_default(
    params: &Value,
    key: &str,
    default: &str,
) -> Result<String, PipelineError> {
    let Some(map) = as_object(params, "operation")? else {
        return Ok(default.to_string());
    };
    match map.get(key) {
        None => Ok(default.to_string()),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(other) => Err(PipelineError::Configuration(format!(
            "parameter '{key}' must be a string, got {other}"
        ))),
    }
}

/// Read an optional boolean parameter, falling back to `default` when the key
/// (or the whole object) is absent.
pub fn bool_with_default(
    params: &Value,
    key: &str,
    default: bool,
) -> Result<bool, PipelineError> {
    let Some(map) = as_object(params, "operation")? else {
        return Ok(default);
    };
    match map.get(key) {
        None => Ok(default),
        Some(Value::Bool(value)) => Ok(*value),
        Some(other) => Err(PipelineError::Configuration(format!(
            "parameter '{key}' must be a boolean, got {other}"
        ))),
    }
}

/// Read the `data` parameter, defaulting to `both`.
pub fn data_selection(params: &Value) -> Result<DataSelection, PipelineError> {
    let tag = string_with_default(params, operation::KEY_DATA, operation::DATA_BOTH)?;
    DataSelection::from_tag(&tag)
}
