//! The epoch driver.
//!
//! Runs backups until the stop criterion holds, the horizon is reached, or
//! the time budget runs out. The last complete value function is kept at
//! every point, so a failing epoch never loses earlier work.

use std::path::PathBuf;

use pv_config::SolverParams;
use pv_math::SimplexOptions;
use serde::Serialize;
use thiserror::Error;

use crate::alpha::{save_alpha_file, AlphaIoError, AlphaList};
use crate::backup::{BackupEngine, BackupError, BackupSettings, BackupStats, Budget};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::model::{ModelError, ObservationSupport, PomdpModel};
use crate::policy_graph::{PolicyGraph, PolicyGraphError};
use crate::prune::{PruneSettings, PruneStats, Pruner};
use crate::region::{RegionError, RegionOracle, RegionStats};
use crate::stop::{check_convergence, StopSettings};

#[derive(Debug, Error)]
pub enum SolveError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    AlphaIo(#[from] AlphaIoError),

    #[error(transparent)]
    PolicyGraph(#[from] PolicyGraphError),

    #[error("initial value function has {found} components, model has {expected} states")]
    InitialDimension { expected: usize, found: usize },
}

impl From<SolveError> for pv_common::Error {
    fn from(err: SolveError) -> Self {
        match err {
            SolveError::Model(e) => e.into(),
            SolveError::Backup(e) => e.into(),
            SolveError::Region(e) => e.into(),
            SolveError::AlphaIo(e) => e.into(),
            SolveError::PolicyGraph(e) => e.into(),
            SolveError::InitialDimension { expected, found } => {
                pv_common::Error::DimensionMismatch { expected, found }
            }
        }
    }
}

/// A failed solve, with the last value function that was fully computed.
#[derive(Debug)]
pub struct SolveFailure {
    pub error: SolveError,
    pub last_complete: AlphaList,
    pub epochs: usize,
}

impl std::fmt::Display for SolveFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "epoch {}: {}", self.epochs + 1, self.error)
    }
}

impl std::error::Error for SolveFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<SolveFailure> for pv_common::Error {
    fn from(failure: SolveFailure) -> Self {
        failure.error.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Converged,
    HorizonReached,
    TimeLimit,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Converged => write!(f, "converged"),
            StopReason::HorizonReached => write!(f, "horizon_reached"),
            StopReason::TimeLimit => write!(f, "time_limit"),
        }
    }
}

/// Per-epoch record kept for the run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochSummary {
    pub epoch: usize,
    pub size: usize,
    pub elapsed_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub residual: Option<f64>,
    pub backup: BackupStats,
}

#[derive(Debug)]
pub struct SolveOutcome {
    /// Final value function on the model's own reward scale.
    pub value_function: AlphaList,
    /// Final value function as computed, before rescaling.
    pub current: AlphaList,
    /// The value function one epoch earlier.
    pub previous: AlphaList,
    pub policy_graph: PolicyGraph,
    pub epochs: usize,
    pub stop_reason: StopReason,
    pub residual: Option<f64>,
    pub elapsed_secs: f64,
    pub epoch_log: Vec<EpochSummary>,
    pub region_stats: RegionStats,
    pub prune_stats: PruneStats,
}

pub struct Solver<'m> {
    model: &'m dyn PomdpModel,
    params: SolverParams,
    ctx: LogContext,
}

impl<'m> Solver<'m> {
    pub fn new(model: &'m dyn PomdpModel, params: SolverParams, ctx: LogContext) -> Self {
        Solver { model, params, ctx }
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Region oracle configured from the solver parameters.
    pub fn build_oracle(params: &SolverParams, ctx: LogContext) -> RegionOracle {
        let options = SimplexOptions::default()
            .with_tolerance(params.lp_epsilon)
            .with_max_iterations(params.lp_max_iterations);
        RegionOracle::new(
            params.lp_engine.build(options),
            params.region_lp,
            params.sparse_epsilon,
            ctx,
        )
    }

    fn epoch_file(&self, epoch: usize) -> PathBuf {
        PathBuf::from(format!("{}-{}.alpha", self.params.prefix, epoch))
    }

    fn fail(&self, error: SolveError, last_complete: AlphaList, epochs: usize) -> SolveFailure {
        log_event!(
            self.ctx,
            ERROR,
            event_names::SOLVE_FAILED,
            Stage::Backup,
            "solve failed",
            epoch = (epochs + 1) as u64,
            error = %error
        );
        SolveFailure {
            error,
            last_complete,
            epochs,
        }
    }

    /// Run value iteration from `initial`, or from a single zero vector.
    pub fn solve(&self, initial: Option<AlphaList>) -> Result<SolveOutcome, SolveFailure> {
        let model = self.model;
        let params = &self.params;
        let num_states = model.num_states();
        let num_obs = model.num_observations();
        let discount = model.discount();

        let mut current = initial.unwrap_or_else(|| AlphaList::zero(num_states, 0));
        current.clear_provenance();
        current.renumber();
        let mismatched = current.iter().map(|n| n.alpha.len()).find(|&l| l != num_states);
        if let Some(found) = mismatched {
            let err = SolveError::InitialDimension {
                expected: num_states,
                found,
            };
            return Err(self.fail(err, current, 0));
        }

        let support = match ObservationSupport::compute(model, params.impossible_obs_epsilon) {
            Ok(s) => s,
            Err(e) => return Err(self.fail(e.into(), current, 0)),
        };

        let oracle = Self::build_oracle(params, self.ctx.clone());
        let mut pruner = Pruner::new(
            oracle,
            PruneSettings::from_params(params),
            params.rand_seed,
            self.ctx.clone(),
        );
        let engine = BackupEngine::new(BackupSettings::from_params(params), self.ctx.clone());
        let stop = StopSettings::from_params(params);
        let budget = Budget::new(params.max_secs);

        log_event!(
            self.ctx,
            INFO,
            event_names::SOLVE_STARTED,
            Stage::Init,
            "value iteration started",
            states = num_states as u64,
            actions = model.num_actions() as u64,
            observations = num_obs as u64,
            method = %params.method,
            stop = %params.stop_criteria,
            initial_size = current.len() as u64
        );

        let mut previous: Option<AlphaList> = None;
        let mut epochs = 0usize;
        let mut residual = None;
        let mut epoch_log = Vec::new();

        let stop_reason = loop {
            if params.horizon.is_some_and(|h| epochs >= h) {
                break StopReason::HorizonReached;
            }
            if budget.exhausted() {
                break StopReason::TimeLimit;
            }
            log_event!(
                self.ctx,
                DEBUG,
                event_names::EPOCH_STARTED,
                Stage::Backup,
                "epoch started",
                epoch = (epochs + 1) as u64,
                prev_size = current.len() as u64
            );

            let (mut next, stats) =
                match engine.backup(model, &support, &current, &mut pruner, &budget) {
                    Ok(result) => result,
                    Err(BackupError::Interrupted) => {
                        log_event!(
                            self.ctx,
                            WARN,
                            event_names::EPOCH_INTERRUPTED,
                            Stage::Backup,
                            "time budget exhausted; discarding partial epoch",
                            epoch = (epochs + 1) as u64
                        );
                        break StopReason::TimeLimit;
                    }
                    Err(e) => return Err(self.fail(e.into(), current, epochs)),
                };
            next.renumber();
            epochs += 1;

            if params.save_all {
                let path = self.epoch_file(epochs);
                let scaled = next.scaled(model.reward_adjustment().value_scale_factor(epochs, discount));
                if let Err(e) = save_alpha_file(&scaled, &path, params.alpha_precision) {
                    return Err(self.fail(e.into(), next, epochs));
                }
                log_event!(
                    self.ctx,
                    DEBUG,
                    event_names::ALPHA_WRITTEN,
                    Stage::Io,
                    "epoch value function written",
                    epoch = epochs as u64,
                    path = %path.display()
                );
            }

            let converged = if params.horizon.is_none() {
                match check_convergence(&stop, &mut pruner.oracle, &current, &next) {
                    Ok(check) => {
                        residual = check.residual;
                        check.converged
                    }
                    Err(e) => return Err(self.fail(e.into(), next, epochs)),
                }
            } else {
                false
            };

            let elapsed_secs = budget.elapsed().as_secs_f64();
            log_event!(
                self.ctx,
                INFO,
                event_names::EPOCH_FINISHED,
                Stage::Backup,
                "epoch finished",
                epoch = epochs as u64,
                size = next.len() as u64,
                elapsed_secs = elapsed_secs,
                residual = residual.unwrap_or(f64::NAN),
                max_intermediate = stats.max_intermediate as u64
            );
            epoch_log.push(EpochSummary {
                epoch: epochs,
                size: next.len(),
                elapsed_secs,
                residual,
                backup: stats,
            });

            previous = Some(std::mem::replace(&mut current, next));
            if converged {
                break StopReason::Converged;
            }
        };

        let mut policy_graph = {
            let prev = previous.as_ref().unwrap_or(&current);
            match PolicyGraph::from_lists(&current, prev, num_obs) {
                Ok(pg) => pg,
                Err(e) => return Err(self.fail(e.into(), current, epochs)),
            }
        };
        let previous = previous.unwrap_or_else(|| current.clone());
        if stop_reason == StopReason::Converged {
            policy_graph.relink(&previous, &current, params.alpha_epsilon, &self.ctx);
        }

        let value_function =
            current.scaled(model.reward_adjustment().value_scale_factor(epochs, discount));
        let elapsed_secs = budget.elapsed().as_secs_f64();
        log_event!(
            self.ctx,
            INFO,
            event_names::SOLVE_FINISHED,
            Stage::Stop,
            "value iteration finished",
            epochs = epochs as u64,
            size = current.len() as u64,
            stop_reason = %stop_reason,
            elapsed_secs = elapsed_secs
        );

        Ok(SolveOutcome {
            value_function,
            current,
            previous,
            policy_graph,
            epochs,
            stop_reason,
            residual,
            elapsed_secs,
            epoch_log,
            region_stats: pruner.oracle.stats(),
            prune_stats: pruner.stats,
        })
    }
}
