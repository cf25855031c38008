//! Solver parameters.
//!
//! Every field has a default, so an empty params file (or none at all) yields
//! a usable configuration. Files may be TOML or JSON.

use std::path::Path;

use pv_math::LpEngineKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::validate::{ValidationError, ValidationResult};

/// How a vector set is reduced after it is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum PurgeOption {
    /// Keep everything.
    #[serde(rename = "none")]
    None,
    /// Pointwise domination only.
    #[serde(rename = "dom")]
    Domination,
    /// Domination, then LP-based parsimonious pruning.
    #[default]
    #[serde(rename = "prune")]
    Prune,
    /// Domination, then epsilon-approximate pruning.
    #[serde(rename = "epsilon_prune")]
    EpsilonPrune,
}

impl std::fmt::Display for PurgeOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurgeOption::None => write!(f, "none"),
            PurgeOption::Domination => write!(f, "dom"),
            PurgeOption::Prune => write!(f, "prune"),
            PurgeOption::EpsilonPrune => write!(f, "epsilon_prune"),
        }
    }
}

impl std::str::FromStr for PurgeOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(PurgeOption::None),
            "dom" | "domination" => Ok(PurgeOption::Domination),
            "prune" => Ok(PurgeOption::Prune),
            "epsilon_prune" | "epsilon-prune" => Ok(PurgeOption::EpsilonPrune),
            other => Err(format!(
                "unknown purge option '{other}' (expected none, dom, prune, epsilon_prune)"
            )),
        }
    }
}

/// When value iteration is considered converged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StopCriterion {
    /// Same vectors in the same order.
    Exact,
    /// Same vectors in any order.
    #[default]
    Weak,
    /// Bellman residual below `stop_delta`.
    Bellman,
}

impl std::fmt::Display for StopCriterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopCriterion::Exact => write!(f, "exact"),
            StopCriterion::Weak => write!(f, "weak"),
            StopCriterion::Bellman => write!(f, "bellman"),
        }
    }
}

impl std::str::FromStr for StopCriterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Ok(StopCriterion::Exact),
            "weak" => Ok(StopCriterion::Weak),
            "bellman" => Ok(StopCriterion::Bellman),
            other => Err(format!(
                "unknown stop criterion '{other}' (expected exact, weak, bellman)"
            )),
        }
    }
}

/// Backup strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum Method {
    /// Purge after every cross-sum step.
    #[default]
    #[serde(rename = "incprune")]
    IncPrune,
    /// Cross-sum everything, purge once.
    #[serde(rename = "enum")]
    Enum,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::IncPrune => write!(f, "incprune"),
            Method::Enum => write!(f, "enum"),
        }
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "incprune" => Ok(Method::IncPrune),
            "enum" => Ok(Method::Enum),
            other => Err(format!("unknown method '{other}' (expected incprune, enum)")),
        }
    }
}

/// Region LP formulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RegionLp {
    /// Value-split formulation with auxiliary variables.
    #[default]
    New,
    /// Difference-vector formulation.
    Old,
}

impl std::fmt::Display for RegionLp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionLp::New => write!(f, "new"),
            RegionLp::Old => write!(f, "old"),
        }
    }
}

impl std::str::FromStr for RegionLp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "new" => Ok(RegionLp::New),
            "old" => Ok(RegionLp::Old),
            other => Err(format!("unknown region LP '{other}' (expected new, old)")),
        }
    }
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

/// Full solver parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct SolverParams {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Fixed number of epochs; infinite when absent.
    pub horizon: Option<usize>,
    /// Overrides the model's discount factor.
    pub discount: Option<f64>,
    pub method: Method,
    pub stop_criteria: StopCriterion,
    pub stop_delta: f64,
    pub proj_purge: PurgeOption,
    pub q_purge: PurgeOption,
    /// Purge applied to the final union when `method` is `enum`.
    pub enum_purge: PurgeOption,

    /// Minimum region margin for a vector to count as useful.
    pub epsilon: f64,
    pub alpha_epsilon: f64,
    pub lp_epsilon: f64,
    pub sparse_epsilon: f64,
    pub impossible_obs_epsilon: f64,
    pub prune_epsilon: f64,

    pub prune_init_rand_points: usize,
    pub alg_init_rand_points: usize,
    pub use_witness_points: bool,
    pub domination_check: bool,

    #[schemars(with = "String")]
    pub lp_engine: LpEngineKind,
    pub region_lp: RegionLp,
    pub lp_max_iterations: usize,

    /// Wall-clock budget in seconds.
    pub max_secs: Option<f64>,
    pub save_all: bool,
    pub prefix: String,
    pub rand_seed: Option<u64>,
    pub require_non_negative_rewards: bool,
    /// Decimal places written to alpha files.
    pub alpha_precision: usize,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            horizon: None,
            discount: None,
            method: Method::IncPrune,
            stop_criteria: StopCriterion::Weak,
            stop_delta: 1e-9,
            proj_purge: PurgeOption::Prune,
            q_purge: PurgeOption::Prune,
            enum_purge: PurgeOption::Prune,
            epsilon: 1e-9,
            alpha_epsilon: 1e-9,
            lp_epsilon: 1e-9,
            sparse_epsilon: 1e-9,
            impossible_obs_epsilon: 1e-9,
            prune_epsilon: 1e-9,
            prune_init_rand_points: 0,
            alg_init_rand_points: 0,
            use_witness_points: false,
            domination_check: true,
            lp_engine: LpEngineKind::Dantzig,
            region_lp: RegionLp::New,
            lp_max_iterations: 0,
            max_secs: None,
            save_all: false,
            prefix: "solution".to_string(),
            rand_seed: None,
            require_non_negative_rewards: false,
            alpha_precision: 25,
        }
    }
}

impl SolverParams {
    /// Load parameters from a TOML or JSON file, chosen by extension.
    pub fn from_file(path: &Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::parse_json(&content),
            _ => Self::parse_toml(&content),
        }
    }

    pub fn parse_json(json: &str) -> ValidationResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    pub fn parse_toml(text: &str) -> ValidationResult<Self> {
        toml::from_str(text)
            .map_err(|e| ValidationError::ParseError(format!("Invalid TOML: {}", e)))
    }

    pub fn to_toml(&self) -> ValidationResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ValidationError::ParseError(format!("TOML encode failed: {}", e)))
    }

    /// JSON schema describing the parameter file.
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(SolverParams)).unwrap_or_default()
    }
}

/// Command-line overrides; `None` leaves the resolved value alone.
#[derive(Debug, Clone, Default)]
pub struct ParamOverrides {
    pub horizon: Option<usize>,
    pub discount: Option<f64>,
    pub method: Option<Method>,
    pub stop_criteria: Option<StopCriterion>,
    pub stop_delta: Option<f64>,
    pub proj_purge: Option<PurgeOption>,
    pub q_purge: Option<PurgeOption>,
    pub epsilon: Option<f64>,
    pub lp_engine: Option<LpEngineKind>,
    pub region_lp: Option<RegionLp>,
    pub max_secs: Option<f64>,
    pub save_all: bool,
    pub prefix: Option<String>,
    pub rand_seed: Option<u64>,
    pub use_witness_points: bool,
}

impl ParamOverrides {
    pub fn apply(&self, params: &mut SolverParams) {
        if let Some(h) = self.horizon {
            params.horizon = Some(h);
        }
        if let Some(d) = self.discount {
            params.discount = Some(d);
        }
        if let Some(m) = self.method {
            params.method = m;
        }
        if let Some(s) = self.stop_criteria {
            params.stop_criteria = s;
        }
        if let Some(d) = self.stop_delta {
            params.stop_delta = d;
        }
        if let Some(p) = self.proj_purge {
            params.proj_purge = p;
        }
        if let Some(p) = self.q_purge {
            params.q_purge = p;
        }
        if let Some(e) = self.epsilon {
            params.epsilon = e;
        }
        if let Some(e) = self.lp_engine {
            params.lp_engine = e;
        }
        if let Some(r) = self.region_lp {
            params.region_lp = r;
        }
        if let Some(s) = self.max_secs {
            params.max_secs = Some(s);
        }
        if self.save_all {
            params.save_all = true;
        }
        if let Some(ref p) = self.prefix {
            params.prefix = p.clone();
        }
        if let Some(seed) = self.rand_seed {
            params.rand_seed = Some(seed);
        }
        if self.use_witness_points {
            params.use_witness_points = true;
        }
    }
}
