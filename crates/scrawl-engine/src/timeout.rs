//! Turn deadline enforcement.
//!
//! Translates turn lifecycle events into scheduled warning and timeout jobs
//! using the plans from `scrawl_rules::deadlines`, and cancels them when a
//! turn leaves the state that needed them. The season/on-demand divergence
//! (what a claim timeout *does*) lives in the coordinator's handlers; this
//! service only owns the arming and disarming.

use crate::scheduler::{Scheduler, TurnJobPayload};
use chrono::{DateTime, Utc};
use scrawl_rules::deadlines;
use scrawl_types::{DomainError, TimeoutProfile, Turn, TurnId};
use std::sync::Arc;
use tracing::warn;

pub struct TurnTimeoutService {
    scheduler: Arc<Scheduler>,
}

impl TurnTimeoutService {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }

    /// Arm claim warning/timeout jobs for a turn that just entered
    /// `Offered`.
    ///
    /// Failing to arm the claim timeout is an error (an offered turn must
    /// always have an enforcer), while a warning that cannot be armed is
    /// logged and dropped.
    pub async fn on_offer(
        &self,
        turn: &Turn,
        profile: &TimeoutProfile,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.arm(turn, deadlines::offer_timers(turn, profile, now))
            .await
    }

    /// Swap claim jobs for submission jobs when a turn enters `Pending`.
    pub async fn on_claim(
        &self,
        turn: &Turn,
        profile: &TimeoutProfile,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.scheduler
            .cancel(&scrawl_types::JobId::claim_warning(&turn.id))
            .await?;
        self.scheduler
            .cancel(&scrawl_types::JobId::claim_timeout(&turn.id))
            .await?;
        self.arm(turn, deadlines::pending_timers(turn, profile, now))
            .await
    }

    /// Cancel every deadline job for a turn. Called on submit, skip, flag,
    /// and dismissal; also safe on a turn that never had jobs armed.
    pub async fn on_settle(&self, turn: &TurnId) -> Result<(), DomainError> {
        for job_id in deadlines::turn_job_ids(turn) {
            self.scheduler.cancel(&job_id).await?;
        }
        Ok(())
    }

    async fn arm(
        &self,
        turn: &Turn,
        specs: Vec<deadlines::TimerSpec>,
    ) -> Result<(), DomainError> {
        let payload = TurnJobPayload {
            turn_id: turn.id.clone(),
            game_id: turn.game_id.clone(),
            player_id: turn.player_id.clone(),
        };

        for spec in specs {
            let armed = self
                .scheduler
                .schedule(spec.kind, spec.job_id.clone(), spec.fire_at, &payload)
                .await;
            match armed {
                Ok(true) => {}
                Ok(false) if spec.kind.is_warning() => {
                    warn!(job = %spec.job_id, "warning job not armed; continuing");
                }
                Err(error) if spec.kind.is_warning() => {
                    warn!(job = %spec.job_id, %error, "warning job failed to arm; continuing");
                }
                Ok(false) => {
                    return Err(DomainError::Scheduler {
                        job_id: spec.job_id.as_str().to_string(),
                        reason: "deadline job was rejected by the store".to_string(),
                    });
                }
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }
}
