//! Parameter snapshots for reproducible solver runs.
//!
//! A snapshot captures the exact parameters and input hashes at the start of
//! a solve, so a value function on disk can be traced back to what made it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::resolve::ResolvedParams;

/// A frozen snapshot of the parameters used for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamsSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the parameters.
    pub schema_version: String,

    /// SHA-256 of the params file content.
    #[serde(default)]
    pub params_hash: Option<String>,

    #[serde(default)]
    pub params_path: Option<String>,

    pub params_source: String,

    /// SHA-256 of the model file content.
    #[serde(default)]
    pub model_hash: Option<String>,

    #[serde(default)]
    pub model_path: Option<String>,

    /// Hash over the effective parameters and the model hash.
    pub combined_hash: String,

    pub summary: ParamsSummary,
}

/// Key parameter values for quick reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamsSummary {
    pub method: String,
    pub stop_criteria: String,
    pub horizon: Option<usize>,
    pub epsilon: f64,
    pub lp_engine: String,
    pub region_lp: String,
    pub proj_purge: String,
    pub q_purge: String,
}

impl ParamsSnapshot {
    pub fn new(
        resolved: &ResolvedParams,
        model_path: Option<&str>,
        model_content: Option<&str>,
    ) -> Self {
        let p = &resolved.params;
        let params_hash = resolved.raw.as_deref().map(hash_content);
        let model_hash = model_content.map(hash_content);

        // Effective params rather than the file, so CLI overrides change the hash
        let effective = serde_json::to_string(p).unwrap_or_default();
        let combined = format!(
            "{}:{}",
            hash_content(&effective),
            model_hash.as_deref().unwrap_or("none")
        );

        ParamsSnapshot {
            timestamp: Utc::now(),
            schema_version: p.schema_version.clone(),
            params_hash,
            params_path: resolved.path.as_ref().map(|p| p.display().to_string()),
            params_source: resolved.source.to_string(),
            model_hash,
            model_path: model_path.map(str::to_string),
            combined_hash: hash_content(&combined),
            summary: ParamsSummary {
                method: p.method.to_string(),
                stop_criteria: p.stop_criteria.to_string(),
                horizon: p.horizon,
                epsilon: p.epsilon,
                lp_engine: p.lp_engine.to_string(),
                region_lp: p.region_lp.to_string(),
                proj_purge: p.proj_purge.to_string(),
                q_purge: p.q_purge.to_string(),
            },
        }
    }

    /// Serialize snapshot to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check if this snapshot matches another (same effective inputs).
    pub fn matches(&self, other: &ParamsSnapshot) -> bool {
        self.combined_hash == other.combined_hash
    }

    /// Short identifier for this snapshot (first 12 chars of hash).
    pub fn short_id(&self) -> &str {
        &self.combined_hash[..12.min(self.combined_hash.len())]
    }
}

/// Hex SHA-256 of a string.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SolverParams;
    use crate::resolve::ConfigSource;

    fn resolved(params: SolverParams) -> ResolvedParams {
        ResolvedParams {
            params,
            source: ConfigSource::BuiltinDefault,
            path: None,
            raw: None,
        }
    }

    #[test]
    fn test_hash_content_known_value() {
        assert_eq!(
            hash_content(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_snapshot_matches_same_inputs() {
        let a = ParamsSnapshot::new(&resolved(SolverParams::default()), None, Some("model"));
        let b = ParamsSnapshot::new(&resolved(SolverParams::default()), None, Some("model"));
        assert!(a.matches(&b));
        assert_eq!(a.short_id().len(), 12);
        assert_eq!(a.params_source, "builtin default");
    }

    #[test]
    fn test_snapshot_differs_on_override() {
        let a = ParamsSnapshot::new(&resolved(SolverParams::default()), None, None);
        let mut p = SolverParams::default();
        p.horizon = Some(4);
        let b = ParamsSnapshot::new(&resolved(p), None, None);
        assert!(!a.matches(&b));
        assert_eq!(b.summary.horizon, Some(4));
    }

    #[test]
    fn test_snapshot_json() {
        let s = ParamsSnapshot::new(&resolved(SolverParams::default()), Some("m.json"), Some("{}"));
        let json = s.to_json().unwrap();
        assert!(json.contains("\"model_path\": \"m.json\""));
        assert!(json.contains("\"method\": \"incprune\""));
    }
}
