//! Parameter validation errors and semantic validation.

use thiserror::Error;

use crate::params::{SolverParams, StopCriterion};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Parameter validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

fn non_negative(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("Must be a finite non-negative number, got {}", value),
        });
    }
    Ok(())
}

/// Validate solver parameters semantically.
pub fn validate_params(params: &SolverParams) -> ValidationResult<()> {
    if params.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: params.schema_version.clone(),
        });
    }

    for (field, value) in [
        ("epsilon", params.epsilon),
        ("alpha_epsilon", params.alpha_epsilon),
        ("lp_epsilon", params.lp_epsilon),
        ("sparse_epsilon", params.sparse_epsilon),
        ("impossible_obs_epsilon", params.impossible_obs_epsilon),
        ("prune_epsilon", params.prune_epsilon),
        ("stop_delta", params.stop_delta),
    ] {
        non_negative(field, value)?;
    }

    if params.stop_criteria == StopCriterion::Bellman && params.stop_delta <= 0.0 {
        return Err(ValidationError::InvalidValue {
            field: "stop_delta".to_string(),
            message: "Must be positive with the bellman stop criterion".to_string(),
        });
    }

    if let Some(d) = params.discount {
        if !(0.0..=1.0).contains(&d) {
            return Err(ValidationError::InvalidValue {
                field: "discount".to_string(),
                message: format!("Must be in [0, 1], got {}", d),
            });
        }
    }

    if params.horizon == Some(0) {
        return Err(ValidationError::InvalidValue {
            field: "horizon".to_string(),
            message: "Must be at least 1 when set".to_string(),
        });
    }

    if let Some(secs) = params.max_secs {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "max_secs".to_string(),
                message: format!("Must be positive, got {}", secs),
            });
        }
    }

    if params.prefix.trim().is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "prefix".to_string(),
            message: "Must not be empty".to_string(),
        });
    }

    if params.alpha_precision > 30 {
        return Err(ValidationError::InvalidValue {
            field: "alpha_precision".to_string(),
            message: format!("At most 30 decimals, got {}", params.alpha_precision),
        });
    }

    Ok(())
}
