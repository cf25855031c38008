//! POMDP Value Iteration - exact solver CLI
//!
//! The main entry point for pv-core, handling:
//! - Solving a model file to a value function and policy graph
//! - Pruning and evaluating existing alpha files
//! - Verifying policy graphs
//! - Parameter inspection

use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use pv_common::{format_error_human, Error, OutputFormat, StructuredError};
use pv_config::{
    resolve_params, Method, ParamOverrides, ParamsSnapshot, PurgeOption, RegionLp,
    ResolvedParams, SolverParams, StopCriterion, ValidationError,
};
use pv_core::alpha::{load_alpha_file, save_alpha_file, AlphaList};
use pv_core::exit_codes::ExitCode;
use pv_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage,
};
use pv_core::model::{load_model, DenseModel, PomdpModel};
use pv_core::policy_graph::{PolicyGraph, PolicyGraphError};
use pv_core::prune::{PruneSettings, Pruner};
use pv_core::solver::{SolveFailure, SolveOutcome, Solver, StopReason};
use pv_core::log_event;
use pv_math::LpEngineKind;
use serde_json::json;

/// POMDP Value Iteration - exact solutions by incremental pruning
#[derive(Parser)]
#[command(name = "pv-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Solver parameter file (TOML or JSON)
    #[arg(long, global = true)]
    params: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Log format on stderr (human or jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a POMDP model by exact value iteration
    Solve(SolveArgs),

    /// Purge an alpha file down to its useful vectors
    Prune(PruneArgs),

    /// Value and best action of an alpha file at a belief
    Evaluate(EvaluateArgs),

    /// Policy graph utilities
    Pg(PgArgs),

    /// Parameter inspection
    Config(ConfigArgs),

    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Command argument structs
// ============================================================================

#[derive(Args, Debug)]
struct SolveArgs {
    /// Model file (JSON or YAML)
    model: PathBuf,

    /// Stop after this many epochs
    #[arg(long)]
    horizon: Option<usize>,

    /// Override the model's discount factor
    #[arg(long)]
    discount: Option<f64>,

    /// Convergence test: exact, weak or bellman
    #[arg(long)]
    stop_criteria: Option<StopCriterion>,

    /// Bellman residual tolerance
    #[arg(long)]
    stop_delta: Option<f64>,

    /// Backup method: incprune or enum
    #[arg(long)]
    method: Option<Method>,

    /// Purge option for projections
    #[arg(long)]
    proj_purge: Option<PurgeOption>,

    /// Purge option for Q-sets
    #[arg(long)]
    q_purge: Option<PurgeOption>,

    /// Region margin threshold
    #[arg(long)]
    epsilon: Option<f64>,

    /// Wall-clock budget in seconds
    #[arg(long)]
    max_secs: Option<f64>,

    /// Output file prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Start from this alpha file instead of a zero vector
    #[arg(long)]
    initial: Option<PathBuf>,

    /// Write every epoch's value function
    #[arg(long)]
    save_all: bool,

    /// LP engine: dantzig or bland
    #[arg(long)]
    lp_engine: Option<LpEngineKind>,

    /// Region LP formulation: new or old
    #[arg(long)]
    region_lp: Option<RegionLp>,

    /// Seed for random belief points
    #[arg(long)]
    rand_seed: Option<u64>,

    /// Store witness beliefs on vectors
    #[arg(long)]
    witness_points: bool,
}

impl SolveArgs {
    fn overrides(&self) -> ParamOverrides {
        ParamOverrides {
            horizon: self.horizon,
            discount: self.discount,
            method: self.method,
            stop_criteria: self.stop_criteria,
            stop_delta: self.stop_delta,
            proj_purge: self.proj_purge,
            q_purge: self.q_purge,
            epsilon: self.epsilon,
            lp_engine: self.lp_engine,
            region_lp: self.region_lp,
            max_secs: self.max_secs,
            save_all: self.save_all,
            prefix: self.prefix.clone(),
            rand_seed: self.rand_seed,
            use_witness_points: self.witness_points,
        }
    }
}

#[derive(Args, Debug)]
struct PruneArgs {
    /// Alpha file to purge
    alpha_file: PathBuf,

    /// Number of states; inferred from the file when omitted
    #[arg(long)]
    states: Option<usize>,

    /// Purge option (defaults to q_purge from the parameters)
    #[arg(long)]
    purge: Option<PurgeOption>,

    /// Where to write the result (defaults to <prefix>.alpha)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Model file the alpha file was computed for
    model: PathBuf,

    /// Alpha file
    alpha_file: PathBuf,

    /// Belief as comma-separated probabilities (defaults to the model's start)
    #[arg(long, value_delimiter = ',')]
    belief: Option<Vec<f64>>,
}

#[derive(Args, Debug)]
struct PgArgs {
    #[command(subcommand)]
    command: PgCommands,
}

#[derive(Subcommand, Debug)]
enum PgCommands {
    /// Check syntax, action range and successor ids of a policy graph
    Verify {
        /// Policy graph file
        pg_file: PathBuf,

        /// Number of actions
        #[arg(long)]
        actions: usize,

        /// Number of observations
        #[arg(long)]
        observations: usize,
    },
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the resolved parameters and where they came from
    Show,
    /// Print the JSON schema of the parameter file
    Schema,
}

fn main() {
    let cli = Cli::parse();

    let cli_level = (cli.global.quiet || cli.global.verbose > 0)
        .then(|| LogLevel::from_verbosity(cli.global.verbose, cli.global.quiet));
    init_logging(&LogConfig::from_env(cli_level, cli.global.log_format));

    let exit_code = match &cli.command {
        Commands::Solve(args) => run_solve(&cli.global, args),
        Commands::Prune(args) => run_prune(&cli.global, args),
        Commands::Evaluate(args) => run_evaluate(&cli.global, args),
        Commands::Pg(args) => match &args.command {
            PgCommands::Verify {
                pg_file,
                actions,
                observations,
            } => run_pg_verify(&cli.global, pg_file, *actions, *observations),
        },
        Commands::Config(args) => match args.command {
            ConfigCommands::Show => run_config_show(&cli.global),
            ConfigCommands::Schema => run_config_schema(&cli.global),
        },
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "pv-core", &mut std::io::stdout());
            ExitCode::Converged
        }
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Parameter validation errors in the unified error vocabulary.
fn config_error(err: ValidationError) -> Error {
    match err {
        ValidationError::InvalidValue { field, message } => {
            Error::InvalidParameter { field, message }
        }
        ValidationError::IoError(msg) | ValidationError::ParseError(msg) => Error::Config(msg),
        ValidationError::VersionMismatch { .. } => Error::SchemaValidation(err.to_string()),
    }
}

fn print_payload(global: &GlobalOpts, payload: &serde_json::Value, text: impl FnOnce() -> String) {
    match global.format {
        OutputFormat::Json => match serde_json::to_string_pretty(payload) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("failed to encode output: {e}"),
        },
        OutputFormat::Text | OutputFormat::Summary => println!("{}", text()),
    }
}

/// Report an error on stderr and pick its exit code.
fn output_error(global: &GlobalOpts, error: &Error) -> ExitCode {
    emit_error(global, error, None);
    ExitCode::for_error(error)
}

fn emit_error(global: &GlobalOpts, error: &Error, extra: Option<(&str, serde_json::Value)>) {
    match global.format {
        OutputFormat::Json => {
            let mut structured = StructuredError::from(error);
            if let Some((key, value)) = extra {
                structured = structured.with_context(key, value);
            }
            eprintln!("{}", structured.to_json_pretty());
        }
        OutputFormat::Summary => eprintln!("[{}] {}", error.code(), error),
        OutputFormat::Text => {
            eprintln!("{}", format_error_human(error, !global.no_color));
        }
    }
}

fn args_error(global: &GlobalOpts, field: &str, message: String) -> ExitCode {
    let error = Error::InvalidParameter {
        field: field.to_string(),
        message,
    };
    emit_error(global, &error, None);
    ExitCode::ArgsError
}

fn resolve(global: &GlobalOpts, overrides: &ParamOverrides) -> Result<ResolvedParams, Error> {
    resolve_params(global.params.as_deref(), overrides).map_err(config_error)
}

fn load_model_with_params(
    path: &Path,
    params: &SolverParams,
) -> Result<(DenseModel, String), Error> {
    let (model, content) = load_model(path, params.require_non_negative_rewards)?;
    let model = match params.discount {
        Some(discount) => model.with_discount(discount)?,
        None => model,
    };
    Ok((model, content))
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// solve
// ============================================================================

fn run_solve(global: &GlobalOpts, args: &SolveArgs) -> ExitCode {
    let resolved = match resolve(global, &args.overrides()) {
        Ok(r) => r,
        Err(e) => return output_error(global, &e),
    };
    let params = resolved.params.clone();

    let (model, content) = match load_model_with_params(&args.model, &params) {
        Ok(m) => m,
        Err(e) => return output_error(global, &e),
    };

    let initial = match &args.initial {
        Some(path) => match load_alpha_file(path, Some(model.num_states()), 0) {
            Ok(list) => Some(list),
            Err(e) => return output_error(global, &e.into()),
        },
        None => None,
    };

    let run_id = generate_run_id();
    let ctx = LogContext::new(run_id.clone()).with_model(file_label(&args.model));
    let model_path = args.model.display().to_string();
    let snapshot = ParamsSnapshot::new(&resolved, Some(model_path.as_str()), Some(content.as_str()));
    log_event!(
        ctx,
        INFO,
        event_names::CONFIG_LOADED,
        Stage::Init,
        "parameters resolved",
        source = %resolved.source,
        snapshot = snapshot.short_id()
    );

    let solver = Solver::new(&model, params.clone(), ctx.clone());
    match solver.solve(initial) {
        Ok(outcome) => finish_solve(global, &params, &model, &snapshot, &run_id, &ctx, outcome),
        Err(failure) => fail_solve(global, &params, &model, &run_id, failure),
    }
}

fn finish_solve(
    global: &GlobalOpts,
    params: &SolverParams,
    model: &DenseModel,
    snapshot: &ParamsSnapshot,
    run_id: &str,
    ctx: &LogContext,
    outcome: SolveOutcome,
) -> ExitCode {
    let alpha_path = PathBuf::from(format!("{}.alpha", params.prefix));
    let pg_path = PathBuf::from(format!("{}.pg", params.prefix));

    if let Err(e) = save_alpha_file(&outcome.value_function, &alpha_path, params.alpha_precision) {
        return output_error(global, &e.into());
    }
    log_event!(
        ctx,
        DEBUG,
        event_names::ALPHA_WRITTEN,
        Stage::Io,
        "value function written",
        path = %alpha_path.display()
    );
    if let Err(e) = outcome.policy_graph.save(&pg_path) {
        return output_error(global, &e.into());
    }
    log_event!(
        ctx,
        DEBUG,
        event_names::POLICY_GRAPH_WRITTEN,
        Stage::Io,
        "policy graph written",
        path = %pg_path.display()
    );

    let start_value = model.start().and_then(|belief| {
        let (best, value) =
            outcome
                .value_function
                .best_vector(belief, f64::NEG_INFINITY, params.alpha_epsilon);
        best.and_then(|h| outcome.value_function.get(h))
            .map(|node| json!({ "action": node.action, "value": value }))
    });

    let exit_code = match outcome.stop_reason {
        StopReason::Converged => ExitCode::Converged,
        StopReason::HorizonReached => ExitCode::HorizonReached,
        StopReason::TimeLimit => ExitCode::TimeLimit,
    };

    let payload = json!({
        "status": "ok",
        "code": exit_code.code_name(),
        "run_id": run_id,
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "stop_reason": outcome.stop_reason,
        "epochs": outcome.epochs,
        "vectors": outcome.value_function.len(),
        "residual": outcome.residual,
        "elapsed_secs": outcome.elapsed_secs,
        "start_value": start_value,
        "files": {
            "alpha": alpha_path.display().to_string(),
            "policy_graph": pg_path.display().to_string(),
        },
        "params": {
            "source": snapshot.params_source,
            "snapshot_id": snapshot.short_id(),
            "summary": snapshot.summary,
        },
        "lp": outcome.region_stats,
        "prune": outcome.prune_stats,
        "epoch_log": outcome.epoch_log,
    });
    print_payload(global, &payload, || {
        format!(
            "{}: {} epochs, {} vectors, {:.3}s\nwrote {} and {}",
            outcome.stop_reason,
            outcome.epochs,
            outcome.value_function.len(),
            outcome.elapsed_secs,
            alpha_path.display(),
            pg_path.display()
        )
    });
    exit_code
}

fn fail_solve(
    global: &GlobalOpts,
    params: &SolverParams,
    model: &DenseModel,
    run_id: &str,
    failure: SolveFailure,
) -> ExitCode {
    let prev_path = PathBuf::from(format!("{}.prev.alpha", params.prefix));
    let scale = model
        .reward_adjustment()
        .value_scale_factor(failure.epochs, model.discount());
    let saved = save_alpha_file(
        &failure.last_complete.scaled(scale),
        &prev_path,
        params.alpha_precision,
    )
    .is_ok();

    let epochs = failure.epochs;
    let error: Error = failure.into();
    let context = json!({
        "run_id": run_id,
        "completed_epochs": epochs,
        "saved": saved.then(|| prev_path.display().to_string()),
    });
    emit_error(global, &error, Some(("solve", context)));
    ExitCode::for_error(&error)
}

// ============================================================================
// prune
// ============================================================================

fn run_prune(global: &GlobalOpts, args: &PruneArgs) -> ExitCode {
    let resolved = match resolve(global, &ParamOverrides::default()) {
        Ok(r) => r,
        Err(e) => return output_error(global, &e),
    };
    let params = resolved.params;
    let option = args.purge.unwrap_or(params.q_purge);

    let mut list = match load_alpha_file(&args.alpha_file, args.states, 0) {
        Ok(list) => list,
        Err(e) => return output_error(global, &e.into()),
    };
    let before = list.len();

    let ctx = LogContext::new(generate_run_id());
    let oracle = Solver::build_oracle(&params, ctx.clone());
    let mut pruner = Pruner::new(
        oracle,
        PruneSettings::from_params(&params),
        params.rand_seed,
        ctx,
    );
    if let Err(e) = pruner.purge(&mut list, option) {
        return output_error(global, &e.into());
    }
    list.renumber();

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.alpha", params.prefix)));
    if let Err(e) = save_alpha_file(&list, &output, params.alpha_precision) {
        return output_error(global, &e.into());
    }

    let payload = json!({
        "status": "ok",
        "input": args.alpha_file.display().to_string(),
        "output": output.display().to_string(),
        "purge": option.to_string(),
        "before": before,
        "after": list.len(),
        "prune": pruner.stats,
        "lp": pruner.oracle.stats(),
    });
    print_payload(global, &payload, || {
        format!(
            "{} -> {} vectors ({}), wrote {}",
            before,
            list.len(),
            option,
            output.display()
        )
    });
    ExitCode::Converged
}

// ============================================================================
// evaluate
// ============================================================================

fn run_evaluate(global: &GlobalOpts, args: &EvaluateArgs) -> ExitCode {
    let resolved = match resolve(global, &ParamOverrides::default()) {
        Ok(r) => r,
        Err(e) => return output_error(global, &e),
    };
    let params = resolved.params;

    let (model, _) = match load_model_with_params(&args.model, &params) {
        Ok(m) => m,
        Err(e) => return output_error(global, &e),
    };
    let list: AlphaList = match load_alpha_file(&args.alpha_file, Some(model.num_states()), 0) {
        Ok(list) => list,
        Err(e) => return output_error(global, &e.into()),
    };

    let belief = match (&args.belief, model.start()) {
        (Some(b), _) => b.clone(),
        (None, Some(start)) => start.to_vec(),
        (None, None) => {
            return args_error(
                global,
                "belief",
                "no --belief given and the model has no start belief".to_string(),
            )
        }
    };
    if belief.len() != model.num_states() {
        return args_error(
            global,
            "belief",
            format!(
                "expected {} probabilities, got {}",
                model.num_states(),
                belief.len()
            ),
        );
    }
    let total: f64 = belief.iter().sum();
    if belief.iter().any(|p| *p < 0.0) || (total - 1.0).abs() > 1e-6 {
        return args_error(
            global,
            "belief",
            format!("probabilities must be non-negative and sum to 1 (sum {total})"),
        );
    }

    let (best, value) = list.best_vector(&belief, f64::NEG_INFINITY, params.alpha_epsilon);
    let Some(node) = best.and_then(|h| list.get(h)) else {
        return output_error(
            global,
            &Error::InvalidModel("alpha file holds no vectors".to_string()),
        );
    };

    let payload = json!({
        "status": "ok",
        "belief": belief,
        "action": node.action,
        "value": value,
        "vector_id": node.id,
        "vectors": list.len(),
    });
    print_payload(global, &payload, || {
        format!("action {} value {:.6}", node.action, value)
    });
    ExitCode::Converged
}

// ============================================================================
// pg verify
// ============================================================================

fn run_pg_verify(global: &GlobalOpts, path: &Path, actions: usize, observations: usize) -> ExitCode {
    let result = PolicyGraph::load(path, observations, Some(actions)).and_then(|pg| {
        pg.verify()?;
        Ok(pg)
    });
    match result {
        Ok(pg) => {
            let payload = json!({
                "status": "ok",
                "file": path.display().to_string(),
                "nodes": pg.len(),
                "observations": observations,
            });
            print_payload(global, &payload, || {
                format!("{}: {} nodes, ok", path.display(), pg.len())
            });
            ExitCode::Converged
        }
        Err(e) => {
            let failed_check = matches!(
                e,
                PolicyGraphError::DanglingLink { .. } | PolicyGraphError::ActionOutOfRange { .. }
            );
            let error: Error = e.into();
            emit_error(global, &error, None);
            if failed_check {
                ExitCode::VerifyFailed
            } else {
                ExitCode::for_error(&error)
            }
        }
    }
}

// ============================================================================
// config
// ============================================================================

fn run_config_show(global: &GlobalOpts) -> ExitCode {
    let resolved = match resolve(global, &ParamOverrides::default()) {
        Ok(r) => r,
        Err(e) => return output_error(global, &e),
    };
    let snapshot = ParamsSnapshot::new(&resolved, None, None);

    let payload = json!({
        "schema_version": resolved.params.schema_version,
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "source": {
            "kind": resolved.source.to_string(),
            "path": resolved.path.as_ref().map(|p| p.display().to_string()),
            "hash": snapshot.params_hash,
            "using_defaults": resolved.path.is_none(),
        },
        "params": resolved.params,
    });
    print_payload(global, &payload, || {
        let body = resolved
            .params
            .to_toml()
            .unwrap_or_else(|e| format!("# {e}"));
        format!("# source: {}\n{}", resolved.source, body)
    });
    ExitCode::Converged
}

fn run_config_schema(global: &GlobalOpts) -> ExitCode {
    let schema = SolverParams::json_schema();
    match serde_json::to_string_pretty(&schema) {
        Ok(s) => {
            println!("{s}");
            ExitCode::Converged
        }
        Err(e) => output_error(global, &Error::Json(e)),
    }
}
