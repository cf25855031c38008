//! Structured event vocabulary for logging.
//!
//! Every solver event carries a run id and a stage so JSONL output can be
//! grouped per run and per phase of an epoch.

use serde::{Deserialize, Serialize};

/// Log levels as they appear in JSONL output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Phases of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup, parameter and model loading.
    Init,
    /// Building the projection table.
    Project,
    /// Incremental cross-sums.
    CrossSum,
    /// Domination checks and LP pruning.
    Prune,
    /// Whole-epoch Bellman backup.
    Backup,
    /// Convergence tests.
    Stop,
    /// Reading and writing alpha and policy-graph files.
    Io,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Project => "project",
            Stage::CrossSum => "cross_sum",
            Stage::Prune => "prune",
            Stage::Backup => "backup",
            Stage::Stop => "stop",
            Stage::Io => "io",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used as tracing targets.
pub mod event_names {
    pub const SOLVE_STARTED: &str = "solve.started";
    pub const SOLVE_FINISHED: &str = "solve.finished";
    pub const SOLVE_FAILED: &str = "solve.failed";

    pub const EPOCH_STARTED: &str = "epoch.started";
    pub const EPOCH_FINISHED: &str = "epoch.finished";
    pub const EPOCH_INTERRUPTED: &str = "epoch.interrupted";

    pub const PROJECTION_BUILT: &str = "projection.built";
    pub const CROSS_SUM_STEP: &str = "cross_sum.step";
    pub const PRUNE_FINISHED: &str = "prune.finished";

    pub const LP_UNBOUNDED: &str = "lp.unbounded";
    pub const LP_ABORT_DUMPED: &str = "lp.abort_dumped";

    pub const STOP_CHECKED: &str = "stop.checked";

    pub const ALPHA_WRITTEN: &str = "alpha.written";
    pub const POLICY_GRAPH_WRITTEN: &str = "policy_graph.written";
    pub const POLICY_GRAPH_RELINK: &str = "policy_graph.relink";

    pub const CONFIG_LOADED: &str = "config.loaded";
}

/// Correlation data attached to every solver event.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    /// Model file name, when solving from a file.
    pub model: Option<String>,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display_matches_serde() {
        for stage in [
            Stage::Init,
            Stage::Project,
            Stage::CrossSum,
            Stage::Prune,
            Stage::Backup,
            Stage::Stop,
            Stage::Io,
        ] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{stage}\""));
        }
    }

    #[test]
    fn test_level_from_tracing() {
        assert_eq!(Level::from(tracing::Level::WARN), Level::Warn);
        assert_eq!(Level::from(tracing::Level::TRACE), Level::Trace);
    }

    #[test]
    fn test_log_context() {
        let ctx = LogContext::new("run-abc").with_model("tiger.json");
        assert_eq!(ctx.run_id, "run-abc");
        assert_eq!(ctx.model.as_deref(), Some("tiger.json"));
    }

    #[test]
    fn test_event_names() {
        assert_eq!(event_names::EPOCH_FINISHED, "epoch.finished");
        assert_eq!(event_names::LP_UNBOUNDED, "lp.unbounded");
    }
}
