//! JSON and YAML model files.

use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{DenseModel, ModelError, Result, ValueType};

/// On-disk model description.
///
/// Matrices are indexed `transitions[a][s][s']`, `observation_probs[a][s'][z]`
/// and `rewards[a][s]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ModelSpec {
    pub discount: f64,
    #[serde(default)]
    pub values: ValueType,
    pub states: usize,
    pub actions: usize,
    pub observations: usize,
    pub transitions: Vec<Vec<Vec<f64>>>,
    pub observation_probs: Vec<Vec<Vec<f64>>>,
    pub rewards: Vec<Vec<f64>>,
    /// Optional initial belief.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Vec<f64>>,
}

impl ModelSpec {
    /// Parse model text as JSON for `.json` paths and YAML otherwise.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str(content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(content).map_err(|e| e.to_string())
        };
        parsed.map_err(|message| ModelError::Parse {
            path: path.display().to_string(),
            message,
        })
    }
}

/// Load a model file, returning the model and the raw text for hashing.
pub fn load_model(path: &Path, require_non_negative: bool) -> Result<(DenseModel, String)> {
    let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let spec = ModelSpec::parse(&content, path)?;
    let model = DenseModel::from_spec(&spec, require_non_negative).map_err(|e| match e {
        ModelError::Parse { message, .. } => ModelError::Parse {
            path: path.display().to_string(),
            message,
        },
        other => other,
    })?;
    Ok((model, content))
}
