//! POMDP value iteration parameter loading and validation.
//!
//! This crate provides:
//! - Typed solver parameters with defaults and a JSON schema
//! - Parameter resolution (CLI → env → XDG → defaults)
//! - Semantic validation
//! - Parameter snapshots for reproducible runs

pub mod params;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use params::{Method, ParamOverrides, PurgeOption, RegionLp, SolverParams, StopCriterion};
pub use resolve::{resolve_params, ConfigSource, ResolvedParams};
pub use snapshot::ParamsSnapshot;
pub use validate::{validate_params, ValidationError, ValidationResult};

/// Schema version for parameter files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
