//! Purging alpha lists down to their useful vectors.
//!
//! Three strengths are available:
//! - Pointwise domination only (cheap, leaves many useless vectors)
//! - Lark and White parsimonious pruning (exact, one LP per candidate)
//! - Epsilon pruning (approximate, trades vectors for bounded error)

pub mod domination;
pub mod epsilon;
pub mod parsimonious;

pub use domination::{domination_check, is_pointwise_dominated};
pub use epsilon::{epsilon_prune, is_epsilon_approximation};
pub use parsimonious::normal_prune;

use pv_config::{PurgeOption, SolverParams};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;

use crate::alpha::AlphaList;
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::region::{RegionError, RegionOracle};

#[derive(Debug, Error)]
pub enum PruneError {
    #[error(transparent)]
    Region(#[from] RegionError),

    #[error("pruning invariant violated: {0}")]
    Invariant(String),
}

impl From<PruneError> for pv_common::Error {
    fn from(err: PruneError) -> Self {
        match err {
            PruneError::Region(e) => e.into(),
            PruneError::Invariant(msg) => pv_common::Error::Invariant(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, PruneError>;

/// Tolerances and switches that shape pruning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PruneSettings {
    /// Minimum region margin for a vector to count as useful.
    pub epsilon: f64,
    /// Vector and value comparison tolerance.
    pub alpha_epsilon: f64,
    /// Error budget for epsilon pruning.
    pub prune_epsilon: f64,
    pub prune_init_rand_points: usize,
    pub use_witness_points: bool,
    /// Run a domination check before LP pruning.
    pub domination_check: bool,
}

impl PruneSettings {
    pub fn from_params(params: &SolverParams) -> Self {
        PruneSettings {
            epsilon: params.epsilon,
            alpha_epsilon: params.alpha_epsilon,
            prune_epsilon: params.prune_epsilon,
            prune_init_rand_points: params.prune_init_rand_points,
            use_witness_points: params.use_witness_points,
            domination_check: params.domination_check,
        }
    }
}

impl Default for PruneSettings {
    fn default() -> Self {
        Self::from_params(&SolverParams::default())
    }
}

/// Running totals across purges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PruneStats {
    pub purges: u64,
    pub removed_by_domination: u64,
    pub removed_by_lp: u64,
    /// Largest approximation error accepted by the last epsilon prune.
    pub epsilon_diff_of_last_prune: f64,
}

/// Owns the region oracle and the random source used while pruning.
pub struct Pruner {
    pub oracle: RegionOracle,
    pub settings: PruneSettings,
    pub stats: PruneStats,
    pub(crate) rng: StdRng,
    ctx: LogContext,
}

impl Pruner {
    /// A fixed `seed` makes random seed points reproducible.
    pub fn new(
        oracle: RegionOracle,
        settings: PruneSettings,
        seed: Option<u64>,
        ctx: LogContext,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Pruner {
            oracle,
            settings,
            stats: PruneStats::default(),
            rng,
            ctx,
        }
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Apply `option` to `list`. Returns the number of vectors removed.
    pub fn purge(&mut self, list: &mut AlphaList, option: PurgeOption) -> Result<usize> {
        let before = list.len();
        let dominated = match option {
            PurgeOption::None => return Ok(0),
            PurgeOption::Domination => domination_check(list),
            PurgeOption::Prune | PurgeOption::EpsilonPrune if self.settings.domination_check => {
                domination_check(list)
            }
            _ => 0,
        };
        let by_lp = match option {
            PurgeOption::Prune => normal_prune(self, list)?,
            PurgeOption::EpsilonPrune => epsilon_prune(self, list)?,
            _ => 0,
        };

        self.stats.purges += 1;
        self.stats.removed_by_domination += dominated as u64;
        self.stats.removed_by_lp += by_lp as u64;
        log_event!(
            self.ctx,
            DEBUG,
            event_names::PRUNE_FINISHED,
            Stage::Prune,
            "purge finished",
            option = %option,
            before = before as u64,
            after = list.len() as u64,
            dominated = dominated as u64
        );
        Ok(dominated + by_lp)
    }
}
