//! One exact dynamic-programming backup.
//!
//! Projections of the previous value function are cross-summed per action
//! into Q-sets, and the union of the Q-sets is purged into the next value
//! function. With incremental pruning each partial cross-sum is purged
//! before the next observation is folded in.

use std::time::{Duration, Instant};

use pv_config::{Method, PurgeOption, SolverParams};
use serde::Serialize;
use thiserror::Error;

use crate::alpha::AlphaList;
use crate::belief::{
    init_with_random_points_q, init_with_simplex_corners_q, BeliefError, BeliefScratch,
};
use crate::cross_sum::{cross_sum, relink_obs_sources, CrossSumError};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::model::{ObservationSupport, PomdpModel};
use crate::projection::ProjectionTable;
use crate::prune::{PruneError, Pruner};

#[derive(Debug, Error)]
pub enum BackupError {
    #[error(transparent)]
    Prune(#[from] PruneError),

    #[error(transparent)]
    CrossSum(#[from] CrossSumError),

    #[error(transparent)]
    Belief(#[from] BeliefError),

    #[error("no projection for action {action}, observation {obs}")]
    MissingProjection { action: usize, obs: usize },

    #[error("time budget exhausted during backup")]
    Interrupted,
}

impl From<BackupError> for pv_common::Error {
    fn from(err: BackupError) -> Self {
        match err {
            BackupError::Prune(e) => e.into(),
            BackupError::CrossSum(e) => e.into(),
            BackupError::Belief(e) => e.into(),
            BackupError::MissingProjection { .. } => pv_common::Error::Invariant(err.to_string()),
            // The solver knows the epoch count and reports it
            BackupError::Interrupted => pv_common::Error::Interrupted { epochs: 0 },
        }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;

/// Wall-clock budget for a solve.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    started: Instant,
    limit: Option<Duration>,
}

impl Budget {
    /// `max_secs` of `None` means no limit.
    pub fn new(max_secs: Option<f64>) -> Self {
        Budget {
            started: Instant::now(),
            limit: max_secs.and_then(|s| Duration::try_from_secs_f64(s).ok()),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.elapsed() >= limit)
    }
}

/// Sizes seen during one backup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupStats {
    pub projection_vectors: usize,
    /// Q-set size per action after purging.
    pub q_sizes: Vec<usize>,
    /// Largest partial cross-sum before it was purged.
    pub max_intermediate: usize,
    pub union_size: usize,
    pub result_size: usize,
}

/// Purge strengths and switches for a backup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackupSettings {
    pub method: Method,
    pub proj_purge: PurgeOption,
    pub q_purge: PurgeOption,
    pub enum_purge: PurgeOption,
    pub alg_init_rand_points: usize,
    pub use_witness_points: bool,
    pub alpha_epsilon: f64,
}

impl BackupSettings {
    pub fn from_params(params: &SolverParams) -> Self {
        BackupSettings {
            method: params.method,
            proj_purge: params.proj_purge,
            q_purge: params.q_purge,
            enum_purge: params.enum_purge,
            alg_init_rand_points: params.alg_init_rand_points,
            use_witness_points: params.use_witness_points,
            alpha_epsilon: params.alpha_epsilon,
        }
    }

    /// Purge applied to the finished Q-sets and their union.
    fn final_purge(&self) -> PurgeOption {
        match self.method {
            Method::IncPrune => self.q_purge,
            Method::Enum => self.enum_purge,
        }
    }
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self::from_params(&SolverParams::default())
    }
}

pub struct BackupEngine {
    pub settings: BackupSettings,
    ctx: LogContext,
}

impl BackupEngine {
    pub fn new(settings: BackupSettings, ctx: LogContext) -> Self {
        BackupEngine { settings, ctx }
    }

    fn check(&self, budget: &Budget) -> Result<()> {
        if budget.exhausted() {
            return Err(BackupError::Interrupted);
        }
        Ok(())
    }

    /// Compute the next value function from `prev`.
    ///
    /// Observation slots of the result point at nodes of `prev`, so `prev`
    /// must not be reshaped while the result is in use.
    pub fn backup(
        &self,
        model: &dyn PomdpModel,
        support: &ObservationSupport,
        prev: &AlphaList,
        pruner: &mut Pruner,
        budget: &Budget,
    ) -> Result<(AlphaList, BackupStats)> {
        let num_states = model.num_states();
        let num_obs = model.num_observations();
        let mut stats = BackupStats::default();

        let mut table = ProjectionTable::build(model, support, prev);
        table.purge(pruner, self.settings.proj_purge)?;
        stats.projection_vectors = table.total_vectors();
        log_event!(
            self.ctx,
            DEBUG,
            event_names::PROJECTION_BUILT,
            Stage::Project,
            "projections built",
            vectors = stats.projection_vectors as u64,
            prev_size = prev.len() as u64
        );
        self.check(budget)?;

        let mut union = AlphaList::new();
        for action in 0..model.num_actions() {
            let q = self.q_set(action, num_states, num_obs, &table, pruner, budget, &mut stats)?;
            stats.q_sizes.push(q.len());
            union.union(q);
        }
        stats.union_size = union.len();

        pruner.purge(&mut union, self.settings.final_purge())?;
        relink_obs_sources(&mut union, &table)?;
        stats.result_size = union.len();
        Ok((union, stats))
    }

    #[allow(clippy::too_many_arguments)]
    fn q_set(
        &self,
        action: usize,
        num_states: usize,
        num_obs: usize,
        table: &ProjectionTable,
        pruner: &mut Pruner,
        budget: &Budget,
        stats: &mut BackupStats,
    ) -> Result<AlphaList> {
        let mut q = AlphaList::zero(num_states, action);
        q.action = Some(action);
        for obs in 0..num_obs {
            let projection = table
                .get(action, obs)
                .ok_or(BackupError::MissingProjection { action, obs })?;
            q = cross_sum(&q, projection, num_obs)?;
            stats.max_intermediate = stats.max_intermediate.max(q.len());
            if self.settings.method == Method::IncPrune && obs > 0 {
                let before = q.len();
                pruner.purge(&mut q, self.settings.q_purge)?;
                log_event!(
                    self.ctx,
                    DEBUG,
                    event_names::CROSS_SUM_STEP,
                    Stage::CrossSum,
                    "partial cross-sum purged",
                    action = action as u64,
                    obs = obs as u64,
                    before = before as u64,
                    after = q.len() as u64
                );
            }
            self.check(budget)?;
        }

        if self.settings.alg_init_rand_points > 0 {
            let projections = table.for_action(action);
            let mut seeded = AlphaList::with_header(Some(action), None);
            let mut scratch = BeliefScratch::new(num_states, num_obs);
            let eps = self.settings.alpha_epsilon;
            let witness = self.settings.use_witness_points;
            init_with_simplex_corners_q(&mut seeded, projections, &mut scratch, witness, eps)?;
            init_with_random_points_q(
                &mut seeded,
                self.settings.alg_init_rand_points,
                &mut pruner.rng,
                projections,
                &mut scratch,
                witness,
                eps,
            )?;
            seeded.union(q);
            q = seeded;
            pruner.purge(&mut q, self.settings.final_purge())?;
            self.check(budget)?;
        }
        Ok(q)
    }
}
