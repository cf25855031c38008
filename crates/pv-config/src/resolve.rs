//! Parameter resolution and path discovery.
//!
//! Resolution order: CLI arguments → environment variables → XDG paths → defaults.
//! CLI overrides are applied last, on top of whichever file was found.

use std::path::{Path, PathBuf};

use crate::params::{ParamOverrides, SolverParams};
use crate::validate::{validate_params, ValidationResult};

/// Where the parameter file was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Found in /etc/pomdp-vi/.
    SystemConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable names.
const ENV_PARAMS_PATH: &str = "PV_PARAMS";
const ENV_CONFIG_DIR: &str = "PV_CONFIG_DIR";

/// Standard params file name.
const PARAMS_FILENAME: &str = "params.toml";

/// Application name for XDG directories.
const APP_NAME: &str = "pomdp-vi";

/// Parameters after resolution, with provenance for diagnostics and snapshots.
#[derive(Debug, Clone)]
pub struct ResolvedParams {
    pub params: SolverParams,
    pub source: ConfigSource,
    pub path: Option<PathBuf>,
    /// Raw file content, kept for hashing.
    pub raw: Option<String>,
}

/// Locate the params file.
///
/// 1. Explicit CLI path (must exist)
/// 2. PV_PARAMS
/// 3. PV_CONFIG_DIR + params.toml
/// 4. XDG config directory (~/.config/pomdp-vi/)
/// 5. System config (/etc/pomdp-vi/)
/// 6. Built-in defaults (None)
pub fn find_params_file(cli_path: Option<&Path>) -> (Option<PathBuf>, ConfigSource) {
    if let Some(path) = cli_path {
        return (Some(path.to_path_buf()), ConfigSource::CliArgument);
    }

    if let Ok(env_path) = std::env::var(ENV_PARAMS_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return (Some(path), ConfigSource::Environment);
        }
    }

    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(PARAMS_FILENAME);
        if path.exists() {
            return (Some(path), ConfigSource::Environment);
        }
    }

    if let Some(dir) = xdg_config_dir() {
        let path = dir.join(PARAMS_FILENAME);
        if path.exists() {
            return (Some(path), ConfigSource::XdgConfig);
        }
    }

    let system_path = system_config_dir().join(PARAMS_FILENAME);
    if system_path.exists() {
        return (Some(system_path), ConfigSource::SystemConfig);
    }

    (None, ConfigSource::BuiltinDefault)
}

/// Resolve, override, and validate solver parameters.
pub fn resolve_params(
    cli_path: Option<&Path>,
    overrides: &ParamOverrides,
) -> ValidationResult<ResolvedParams> {
    let (path, source) = find_params_file(cli_path);

    let (mut params, raw) = match &path {
        Some(p) => {
            let raw = std::fs::read_to_string(p).map_err(|e| {
                crate::validate::ValidationError::IoError(format!(
                    "Failed to read {}: {}",
                    p.display(),
                    e
                ))
            })?;
            let params = match p.extension().and_then(|e| e.to_str()) {
                Some("json") => SolverParams::parse_json(&raw)?,
                _ => SolverParams::parse_toml(&raw)?,
            };
            (params, Some(raw))
        }
        None => (SolverParams::default(), None),
    };

    overrides.apply(&mut params);
    validate_params(&params)?;

    Ok(ResolvedParams {
        params,
        source,
        path,
        raw,
    })
}

/// Get the XDG config directory for the solver.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the system config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}
