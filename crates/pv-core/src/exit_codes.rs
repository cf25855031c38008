//! Exit codes for the pv-core CLI.
//!
//! Exit codes communicate how a solve ended without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-9: Operational outcomes (the value function on disk is usable)
//! - 10-19: User/input errors (recoverable by fixing inputs)
//! - 20-29: Internal errors (LP failures, invariant violations, bugs)

use pv_common::{Error, ErrorCategory};

/// Exit codes for pv-core operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Operational Outcomes (0-9)
    // ========================================================================
    /// Value iteration converged (or the command succeeded)
    Converged = 0,

    /// Finite horizon reached
    HorizonReached = 1,

    /// Time budget exhausted; the last complete epoch was saved
    TimeLimit = 2,

    /// Policy graph verification found problems
    VerifyFailed = 3,

    // ========================================================================
    // User / Input Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Parameter file or override rejected
    ConfigError = 11,

    /// Model file missing, malformed, or inconsistent
    ModelError = 12,

    /// Alpha or policy-graph input malformed
    InputFormatError = 13,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,

    /// LP engine returned an unusable status
    LpError = 22,

    /// Solver invariant violated
    InvariantError = 23,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code leaves a usable value function (codes 0-2).
    pub fn is_success(self) -> bool {
        matches!(
            self,
            ExitCode::Converged | ExitCode::HorizonReached | ExitCode::TimeLimit
        )
    }

    /// Check if this exit code is a user/input error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        let code = self as i32;
        (10..20).contains(&code)
    }

    /// Check if this exit code is an internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Converged => "OK_CONVERGED",
            ExitCode::HorizonReached => "OK_HORIZON",
            ExitCode::TimeLimit => "OK_TIME_LIMIT",
            ExitCode::VerifyFailed => "ERR_VERIFY",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::ModelError => "ERR_MODEL",
            ExitCode::InputFormatError => "ERR_INPUT_FORMAT",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
            ExitCode::LpError => "ERR_LP",
            ExitCode::InvariantError => "ERR_INVARIANT",
        }
    }

    /// Map a solver error onto its exit code.
    pub fn for_error(error: &Error) -> Self {
        match error.category() {
            ErrorCategory::Config => ExitCode::ConfigError,
            ErrorCategory::Model => ExitCode::ModelError,
            ErrorCategory::Format => ExitCode::InputFormatError,
            ErrorCategory::Io => ExitCode::IoError,
            ErrorCategory::Lp => ExitCode::LpError,
            ErrorCategory::Solver => match error {
                Error::Interrupted { .. } => ExitCode::TimeLimit,
                _ => ExitCode::InvariantError,
            },
            ErrorCategory::Internal => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Converged.as_i32(), 0);
        assert_eq!(ExitCode::HorizonReached.as_i32(), 1);
        assert_eq!(ExitCode::TimeLimit.as_i32(), 2);
        assert_eq!(ExitCode::ArgsError.as_i32(), 10);
        assert_eq!(ExitCode::InternalError.as_i32(), 20);
    }

    #[test]
    fn test_success_codes() {
        assert!(ExitCode::Converged.is_success());
        assert!(ExitCode::TimeLimit.is_success());
        assert!(!ExitCode::VerifyFailed.is_success());
        assert!(!ExitCode::ModelError.is_success());
    }

    #[test]
    fn test_error_ranges() {
        assert!(ExitCode::ConfigError.is_user_error());
        assert!(!ExitCode::ConfigError.is_internal_error());
        assert!(ExitCode::LpError.is_internal_error());
        assert!(!ExitCode::Converged.is_user_error());
    }

    #[test]
    fn test_for_error() {
        assert_eq!(
            ExitCode::for_error(&Error::InvalidModel("x".into())),
            ExitCode::ModelError
        );
        assert_eq!(
            ExitCode::for_error(&Error::Interrupted { epochs: 3 }),
            ExitCode::TimeLimit
        );
        assert_eq!(
            ExitCode::for_error(&Error::Invariant("x".into())),
            ExitCode::InvariantError
        );
        assert_eq!(
            ExitCode::for_error(&Error::LpFailure {
                status: "numerical_failure".into(),
                dump_path: None
            }),
            ExitCode::LpError
        );
    }

    #[test]
    fn test_code_names_unique() {
        let codes = [
            ExitCode::Converged,
            ExitCode::HorizonReached,
            ExitCode::TimeLimit,
            ExitCode::VerifyFailed,
            ExitCode::ArgsError,
            ExitCode::ConfigError,
            ExitCode::ModelError,
            ExitCode::InputFormatError,
            ExitCode::InternalError,
            ExitCode::IoError,
            ExitCode::LpError,
            ExitCode::InvariantError,
        ];
        let mut names: Vec<_> = codes.iter().map(|c| c.code_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), codes.len());
    }
}
