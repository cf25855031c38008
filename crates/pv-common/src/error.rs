//! Error types for POMDP value iteration.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Malformed Alpha File
//!   Reason: alpha file line 7: expected 3 values, found 2
//!   Fix: Each record is an action line followed by one value per state.
//! ```
//!
//! # Machine-Facing Output
//!
//! ```json
//! {
//!   "code": 50,
//!   "category": "format",
//!   "message": "alpha file line 7: expected 3 values, found 2",
//!   "recoverable": true,
//!   "suggested_action": "fix_input",
//!   "context": { "line": 7 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for solver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Parameter files, environment, CLI overrides.
    Config,
    /// POMDP model construction and validation.
    Model,
    /// Linear programming failures.
    Lp,
    /// Value iteration invariants and budgets.
    Solver,
    /// Alpha-vector and policy-graph file syntax.
    Format,
    /// File I/O and serialization.
    Io,
    /// Bugs.
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Model => write!(f, "model"),
            ErrorCategory::Lp => write!(f, "lp"),
            ErrorCategory::Solver => write!(f, "solver"),
            ErrorCategory::Format => write!(f, "format"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::Internal => write!(f, "internal"),
        }
    }
}

/// Suggested next steps for scripts driving the solver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Fix the parameter file or CLI flags.
    FixConfig,
    /// Fix the model file.
    FixModel,
    /// Fix an alpha or policy-graph input file.
    FixInput,
    /// Try the other LP engine or a looser tolerance.
    ChangeLpEngine,
    /// Allow more time or epochs.
    IncreaseBudget,
    /// Retry the operation.
    Retry,
    /// Report as a bug.
    ReportBug,
    /// No action needed.
    None,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::FixConfig => write!(f, "fix_config"),
            SuggestedAction::FixModel => write!(f, "fix_model"),
            SuggestedAction::FixInput => write!(f, "fix_input"),
            SuggestedAction::ChangeLpEngine => write!(f, "change_lp_engine"),
            SuggestedAction::IncreaseBudget => write!(f, "increase_budget"),
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::ReportBug => write!(f, "report_bug"),
            SuggestedAction::None => write!(f, "none"),
        }
    }
}

/// Unified error type for the solver and its tools.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid parameter '{field}': {message}")]
    InvalidParameter { field: String, message: String },

    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    // Model errors (20-29)
    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("action {action} has no possible observation")]
    NoPossibleObservation { action: usize },

    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    // LP errors (30-39)
    #[error("LP solve failed with status {status}")]
    LpFailure {
        status: String,
        dump_path: Option<String>,
    },

    #[error("LP setup error: {0}")]
    LpSetup(String),

    // Solver errors (40-49)
    #[error("solver invariant violated: {0}")]
    Invariant(String),

    #[error("stale node handle: {0}")]
    StaleHandle(String),

    #[error("solve interrupted after {epochs} epochs")]
    Interrupted { epochs: usize },

    // Format errors (50-59)
    #[error("alpha file line {line}: {message}")]
    AlphaFormat { line: usize, message: String },

    #[error("policy graph line {line}: {message}")]
    PolicyGraphFormat { line: usize, message: String },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Internal errors (70-79)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Model errors
    /// - 30-39: LP errors
    /// - 40-49: Solver errors
    /// - 50-59: Format errors
    /// - 60-69: I/O errors
    /// - 70-79: Internal errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidParameter { .. } => 11,
            Error::SchemaValidation(_) => 12,
            Error::InvalidModel(_) => 20,
            Error::NoPossibleObservation { .. } => 21,
            Error::DimensionMismatch { .. } => 22,
            Error::LpFailure { .. } => 30,
            Error::LpSetup(_) => 31,
            Error::Invariant(_) => 40,
            Error::StaleHandle(_) => 41,
            Error::Interrupted { .. } => 42,
            Error::AlphaFormat { .. } => 50,
            Error::PolicyGraphFormat { .. } => 51,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::Internal(_) => 70,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidParameter { .. } | Error::SchemaValidation(_) => {
                ErrorCategory::Config
            }

            Error::InvalidModel(_)
            | Error::NoPossibleObservation { .. }
            | Error::DimensionMismatch { .. } => ErrorCategory::Model,

            Error::LpFailure { .. } | Error::LpSetup(_) => ErrorCategory::Lp,

            Error::Invariant(_) | Error::StaleHandle(_) | Error::Interrupted { .. } => {
                ErrorCategory::Solver
            }

            Error::AlphaFormat { .. } | Error::PolicyGraphFormat { .. } => ErrorCategory::Format,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,

            Error::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Returns whether this error is potentially recoverable by changing inputs.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) | Error::InvalidParameter { .. } | Error::SchemaValidation(_) => true,

            Error::InvalidModel(_) => true,
            Error::NoPossibleObservation { .. } => true,
            Error::DimensionMismatch { .. } => true,

            // A different engine or tolerance often gets past a numerically hard LP
            Error::LpFailure { .. } => true,
            Error::LpSetup(_) => false,

            Error::Invariant(_) => false,
            Error::StaleHandle(_) => false,
            Error::Interrupted { .. } => true,

            Error::AlphaFormat { .. } | Error::PolicyGraphFormat { .. } => true,

            Error::Io(_) => true,
            Error::Json(_) => true,

            Error::Internal(_) => false,
        }
    }

    /// Returns the suggested action for scripts.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) | Error::InvalidParameter { .. } | Error::SchemaValidation(_) => {
                SuggestedAction::FixConfig
            }

            Error::InvalidModel(_)
            | Error::NoPossibleObservation { .. }
            | Error::DimensionMismatch { .. } => SuggestedAction::FixModel,

            Error::LpFailure { .. } => SuggestedAction::ChangeLpEngine,
            Error::LpSetup(_) => SuggestedAction::ReportBug,

            Error::Invariant(_) | Error::StaleHandle(_) => SuggestedAction::ReportBug,
            Error::Interrupted { .. } => SuggestedAction::IncreaseBudget,

            Error::AlphaFormat { .. } | Error::PolicyGraphFormat { .. } => {
                SuggestedAction::FixInput
            }

            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::FixInput,

            Error::Internal(_) => SuggestedAction::ReportBug,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => {
                "Run 'pv-core config show' to see the resolved parameters and where they came from."
            }
            Error::InvalidParameter { .. } => {
                "Fix the named parameter in the params file or on the command line."
            }
            Error::SchemaValidation(_) => {
                "Compare the params file against 'pv-core config schema'."
            }

            Error::InvalidModel(_) => {
                "Check that every probability row sums to 1 and dimensions match the declared sizes."
            }
            Error::NoPossibleObservation { .. } => {
                "Every action needs at least one observation with non-zero probability."
            }
            Error::DimensionMismatch { .. } => {
                "Vector lengths must equal the model's state count."
            }

            Error::LpFailure { .. } => {
                "Retry with '--lp-engine bland' or a larger lp_epsilon. The failing LP was written to abort.lp."
            }
            Error::LpSetup(_) => "Malformed LP construction. Report as a bug.",

            Error::Invariant(_) => "Internal consistency check failed. Report as a bug with the model file.",
            Error::StaleHandle(_) => {
                "A provenance link outlived its list. Report as a bug with the model file."
            }
            Error::Interrupted { .. } => {
                "Raise '--max-secs' or '--horizon'. The last complete value function was kept."
            }

            Error::AlphaFormat { .. } => {
                "Each record is an action line followed by one value per state and a blank line."
            }
            Error::PolicyGraphFormat { .. } => {
                "Each line is '<id> <action> <next per observation>' using X or - for missing links."
            }

            Error::Io(_) => "Check paths, permissions and disk space, then retry.",
            Error::Json(_) => "Invalid JSON. Check the file syntax.",

            Error::Internal(_) => "Report as a bug.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidParameter { .. } => "Invalid Parameter",
            Error::SchemaValidation(_) => "Schema Validation Failed",

            Error::InvalidModel(_) => "Invalid Model",
            Error::NoPossibleObservation { .. } => "Action Without Observations",
            Error::DimensionMismatch { .. } => "Dimension Mismatch",

            Error::LpFailure { .. } => "LP Solve Failed",
            Error::LpSetup(_) => "LP Setup Error",

            Error::Invariant(_) => "Solver Invariant Violated",
            Error::StaleHandle(_) => "Stale Node Handle",
            Error::Interrupted { .. } => "Solve Interrupted",

            Error::AlphaFormat { .. } => "Malformed Alpha File",
            Error::PolicyGraphFormat { .. } => "Malformed Policy Graph",

            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",

            Error::Internal(_) => "Internal Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested next step.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (line numbers, paths).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::InvalidParameter { field, .. } => {
                context.insert("field".to_string(), serde_json::json!(field));
            }
            Error::NoPossibleObservation { action } => {
                context.insert("action".to_string(), serde_json::json!(action));
            }
            Error::DimensionMismatch { expected, found } => {
                context.insert("expected".to_string(), serde_json::json!(expected));
                context.insert("found".to_string(), serde_json::json!(found));
            }
            Error::LpFailure { status, dump_path } => {
                context.insert("lp_status".to_string(), serde_json::json!(status));
                if let Some(path) = dump_path {
                    context.insert("dump_path".to_string(), serde_json::json!(path));
                }
            }
            Error::Interrupted { epochs } => {
                context.insert("epochs".to_string(), serde_json::json!(epochs));
            }
            Error::AlphaFormat { line, .. } | Error::PolicyGraphFormat { line, .. } => {
                context.insert("line".to_string(), serde_json::json!(line));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }

    /// Serialize to pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_json())
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(Error::Config("test".into()).code(), 10);
        assert_eq!(Error::NoPossibleObservation { action: 2 }.code(), 21);
        assert_eq!(
            Error::AlphaFormat {
                line: 3,
                message: "x".into()
            }
            .code(),
            50
        );
        assert_eq!(Error::Internal("x".into()).code(), 70);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(Error::Config("test".into()).category(), ErrorCategory::Config);
        assert_eq!(
            Error::LpFailure {
                status: "iteration_limit".into(),
                dump_path: None
            }
            .category(),
            ErrorCategory::Lp
        );
        assert_eq!(Error::Interrupted { epochs: 4 }.category(), ErrorCategory::Solver);
    }

    #[test]
    fn test_error_recoverable() {
        assert!(Error::InvalidModel("rows".into()).is_recoverable());
        assert!(!Error::Invariant("overlap".into()).is_recoverable());
        assert!(Error::Interrupted { epochs: 1 }.is_recoverable());
    }

    #[test]
    fn test_suggested_action() {
        assert_eq!(
            Error::LpFailure {
                status: "numerical_failure".into(),
                dump_path: Some("abort.lp".into())
            }
            .suggested_action(),
            SuggestedAction::ChangeLpEngine
        );
        assert_eq!(
            Error::PolicyGraphFormat {
                line: 1,
                message: "x".into()
            }
            .suggested_action(),
            SuggestedAction::FixInput
        );
    }

    #[test]
    fn test_structured_error_from_error() {
        let err = Error::AlphaFormat {
            line: 7,
            message: "expected 3 values, found 2".into(),
        };
        let structured = StructuredError::from(&err);

        assert_eq!(structured.code, 50);
        assert_eq!(structured.category, ErrorCategory::Format);
        assert!(structured.recoverable);
        assert_eq!(structured.context.get("line"), Some(&serde_json::json!(7)));
    }

    #[test]
    fn test_structured_error_json() {
        let err = Error::LpFailure {
            status: "iteration_limit".into(),
            dump_path: Some("abort.lp".into()),
        };
        let json = StructuredError::from(&err)
            .with_context("epoch", 3)
            .to_json();

        assert!(json.contains(r#""code":30"#));
        assert!(json.contains(r#""category":"lp""#));
        assert!(json.contains(r#""suggested_action":"change_lp_engine""#));
        assert!(json.contains(r#""dump_path":"abort.lp""#));
        assert!(json.contains(r#""epoch":3"#));
    }

    #[test]
    fn test_format_error_human() {
        let err = Error::NoPossibleObservation { action: 1 };
        let formatted = format_error_human(&err, false);

        assert!(formatted.contains("Action Without Observations"));
        assert!(formatted.contains("action 1 has no possible observation"));
        assert!(formatted.contains("Fix:"));
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Lp.to_string(), "lp");
        assert_eq!(ErrorCategory::Format.to_string(), "format");
    }

    #[test]
    fn test_suggested_action_display() {
        assert_eq!(SuggestedAction::IncreaseBudget.to_string(), "increase_budget");
        assert_eq!(SuggestedAction::FixInput.to_string(), "fix_input");
    }
}
