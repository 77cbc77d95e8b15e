//! Stale-game sweeper.
//!
//! On-demand games end by going quiet, not by a final command, so a
//! periodic pass asks the completion rules about every open on-demand game
//! and completes the ones whose time has come. `complete_game` is
//! idempotent, so overlapping sweeps and command-driven completions are
//! harmless.

use crate::coordinator::GameCoordinator;
use scrawl_types::{DomainError, GameStatus};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default sweep cadence.
pub const SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(5 * 60);

pub struct StaleCleanupJob {
    coordinator: Arc<GameCoordinator>,
}

impl StaleCleanupJob {
    pub fn new(coordinator: Arc<GameCoordinator>) -> Self {
        Self { coordinator }
    }

    /// One sweep: returns how many games this pass completed.
    pub async fn run_once(&self) -> Result<u32, DomainError> {
        let games = self
            .coordinator
            .repo
            .on_demand_games(&[GameStatus::Pending, GameStatus::Active])
            .await?;

        let mut completed = 0;
        for game in games {
            match self.coordinator.complete_game(&game.id).await {
                Ok(true) => completed += 1,
                Ok(false) => {}
                // A game racing a command can vanish or move mid-sweep.
                Err(error) if error.is_stale() => {
                    debug!(game = %game.id, "game moved during sweep");
                }
                Err(DomainError::NotFound { .. }) => {
                    debug!(game = %game.id, "game deleted during sweep");
                }
                Err(error) => {
                    warn!(game = %game.id, %error, "sweep failed for game");
                }
            }
        }
        Ok(completed)
    }

    /// Run sweeps forever at the given cadence.
    pub fn spawn(self, every: StdDuration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(error) = self.run_once().await {
                    warn!(%error, "stale-game sweep failed");
                }
            }
        })
    }
}
