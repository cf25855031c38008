//! Parameter loading and resolution tests against real files.
//!
//! Covers:
//! - TOML and JSON params files
//! - Resolution order (CLI > PV_PARAMS > PV_CONFIG_DIR)
//! - CLI overrides on top of file values

use pv_config::resolve::{resolve_params, ConfigSource};
use pv_config::{
    validate_params, Method, ParamOverrides, PurgeOption, SolverParams, StopCriterion,
    ValidationError,
};
use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

struct EnvGuard {
    keys: Vec<String>,
    saved: Vec<Option<String>>,
}

impl EnvGuard {
    fn new(keys: &[&str]) -> Self {
        let mut saved = Vec::with_capacity(keys.len());
        for key in keys {
            saved.push(env::var(key).ok());
        }
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            saved,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (idx, key) in self.keys.iter().enumerate() {
            match self.saved.get(idx).and_then(|v| v.as_ref()) {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

fn with_env_lock<T>(f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .expect("env lock poisoned");
    f()
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, content).expect("write params file");
}

#[test]
fn test_load_toml_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("params.toml");
    write(
        &path,
        "method = \"enum\"\nstop_criteria = \"bellman\"\nstop_delta = 1e-6\n",
    );
    let p = SolverParams::from_file(&path).unwrap();
    assert_eq!(p.method, Method::Enum);
    assert_eq!(p.stop_criteria, StopCriterion::Bellman);
    assert_eq!(p.stop_delta, 1e-6);
    validate_params(&p).unwrap();
}

#[test]
fn test_load_json_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("params.json");
    write(&path, r#"{"proj_purge": "dom", "horizon": 7}"#);
    let p = SolverParams::from_file(&path).unwrap();
    assert_eq!(p.proj_purge, PurgeOption::Domination);
    assert_eq!(p.horizon, Some(7));
}

#[test]
fn test_malformed_file_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("params.toml");
    write(&path, "horizon = \"many\"\n");
    let err = SolverParams::from_file(&path).unwrap_err();
    assert!(matches!(err, ValidationError::ParseError(_)));
}

#[test]
fn test_resolve_cli_over_env() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(&["PV_PARAMS", "PV_CONFIG_DIR"]);
        let dir = TempDir::new().unwrap();
        let cli = dir.path().join("cli.toml");
        let envp = dir.path().join("env.toml");
        write(&cli, "horizon = 2\n");
        write(&envp, "horizon = 9\n");
        env::set_var("PV_PARAMS", &envp);

        let r = resolve_params(Some(&cli), &ParamOverrides::default()).unwrap();
        assert_eq!(r.source, ConfigSource::CliArgument);
        assert_eq!(r.params.horizon, Some(2));
        assert!(r.raw.is_some());
    });
}

#[test]
fn test_resolve_env_path_then_config_dir() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(&["PV_PARAMS", "PV_CONFIG_DIR"]);
        let dir = TempDir::new().unwrap();
        let cfg_dir = dir.path().join("cfg");
        write(&cfg_dir.join("params.toml"), "q_purge = \"none\"\n");
        env::remove_var("PV_PARAMS");
        env::set_var("PV_CONFIG_DIR", &cfg_dir);

        let r = resolve_params(None, &ParamOverrides::default()).unwrap();
        assert_eq!(r.source, ConfigSource::Environment);
        assert_eq!(r.params.q_purge, PurgeOption::None);

        let envp = dir.path().join("direct.toml");
        write(&envp, "q_purge = \"dom\"\n");
        env::set_var("PV_PARAMS", &envp);
        let r = resolve_params(None, &ParamOverrides::default()).unwrap();
        assert_eq!(r.params.q_purge, PurgeOption::Domination);
    });
}

#[test]
fn test_overrides_win_and_are_validated() {
    with_env_lock(|| {
        let _guard = EnvGuard::new(&["PV_PARAMS", "PV_CONFIG_DIR"]);
        let dir = TempDir::new().unwrap();
        let cli = dir.path().join("p.toml");
        write(&cli, "horizon = 2\n");

        let overrides = ParamOverrides {
            horizon: Some(5),
            ..Default::default()
        };
        let r = resolve_params(Some(&cli), &overrides).unwrap();
        assert_eq!(r.params.horizon, Some(5));

        let bad = ParamOverrides {
            discount: Some(2.0),
            ..Default::default()
        };
        let err = resolve_params(Some(&cli), &bad).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    });
}
