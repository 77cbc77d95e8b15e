//! Scheduler callbacks.
//!
//! Each deadline job resolves to one coordinator handler through the
//! registry installed by [`GameCoordinator::register_handlers`]. Every
//! handler re-reads its turn and silently stands down when the world no
//! longer matches the job: the scheduler is at-least-once, and a late or
//! duplicate firing must never push a settled turn anywhere.

use crate::coordinator::GameCoordinator;
use crate::scheduler::{JobHandler, TurnJobPayload};
use async_trait::async_trait;
use scrawl_rules::{deadlines, machine};
use scrawl_types::{
    DomainError, GameOrigin, Intent, JobKind, ScheduledJob, Turn, TurnStatus,
};
use std::sync::Arc;
use tracing::{debug, info};

struct DeadlineHandler {
    coordinator: Arc<GameCoordinator>,
    kind: JobKind,
}

#[async_trait]
impl JobHandler for DeadlineHandler {
    async fn execute(&self, job: &ScheduledJob) -> anyhow::Result<()> {
        let payload = TurnJobPayload::decode(&job.payload)?;
        match self.kind {
            JobKind::ClaimWarning => self.coordinator.handle_claim_warning(&payload).await?,
            JobKind::ClaimTimeout => self.coordinator.handle_claim_timeout(&payload).await?,
            JobKind::SubmissionWarning => {
                self.coordinator.handle_submission_warning(&payload).await?
            }
            JobKind::SubmissionTimeout => {
                self.coordinator.handle_submission_timeout(&payload).await?
            }
        }
        Ok(())
    }
}

impl GameCoordinator {
    /// Install the deadline handlers on the scheduler. Call once at
    /// startup, before `load_persisted`.
    pub fn register_handlers(self: &Arc<Self>) {
        for kind in [
            JobKind::ClaimWarning,
            JobKind::ClaimTimeout,
            JobKind::SubmissionWarning,
            JobKind::SubmissionTimeout,
        ] {
            self.scheduler.register(
                kind,
                Arc::new(DeadlineHandler {
                    coordinator: Arc::clone(self),
                    kind,
                }),
            );
        }
    }

    /// Load the turn a job refers to, or `None` when the job is moot: the
    /// turn is gone, no longer in `expected` state, or assigned to a
    /// different player than the one the job was armed for.
    async fn job_turn(
        &self,
        payload: &TurnJobPayload,
        expected: TurnStatus,
    ) -> Result<Option<Turn>, DomainError> {
        let turn = match self.repo.turn(&payload.turn_id).await {
            Ok(turn) => turn,
            Err(DomainError::NotFound { .. }) => {
                debug!(turn = %payload.turn_id, "job fired for deleted turn");
                return Ok(None);
            }
            Err(error) => return Err(error),
        };
        if turn.status != expected {
            debug!(turn = %turn.id, status = %turn.status, "job fired in unexpected state");
            return Ok(None);
        }
        if let Some(armed_for) = &payload.player_id
            && turn.player_id.as_ref() != Some(armed_for)
        {
            debug!(turn = %turn.id, "job fired for a superseded assignment");
            return Ok(None);
        }
        Ok(Some(turn))
    }

    pub(crate) async fn handle_claim_warning(
        &self,
        payload: &TurnJobPayload,
    ) -> Result<(), DomainError> {
        let Some(turn) = self.job_turn(payload, TurnStatus::Offered).await? else {
            return Ok(());
        };
        let game = self.repo.game(&turn.game_id).await?;
        let (_, profile) = self.game_rules(&game).await?;

        let Some(deadline) = deadlines::claim_deadline(&turn, &profile) else {
            return Ok(());
        };
        let Some(player_id) = turn.player_id.clone() else {
            return Ok(());
        };
        self.dispatch(vec![Intent::TurnWarning {
            player_id,
            turn_id: turn.id,
            remaining: self.remaining_until(deadline),
        }])
        .await;
        Ok(())
    }

    pub(crate) async fn handle_submission_warning(
        &self,
        payload: &TurnJobPayload,
    ) -> Result<(), DomainError> {
        let Some(turn) = self.job_turn(payload, TurnStatus::Pending).await? else {
            return Ok(());
        };
        let game = self.repo.game(&turn.game_id).await?;
        let (_, profile) = self.game_rules(&game).await?;

        let Some(deadline) = deadlines::submission_deadline(&turn, &profile) else {
            return Ok(());
        };
        let Some(player_id) = turn.player_id.clone() else {
            return Ok(());
        };
        self.dispatch(vec![Intent::TurnWarning {
            player_id,
            turn_id: turn.id,
            remaining: self.remaining_until(deadline),
        }])
        .await;
        Ok(())
    }

    /// The claim window closed. Season games withdraw the offer and pick
    /// someone else; on-demand games just release the turn back to the
    /// available pool.
    pub(crate) async fn handle_claim_timeout(
        &self,
        payload: &TurnJobPayload,
    ) -> Result<(), DomainError> {
        let Some(turn) = self.job_turn(payload, TurnStatus::Offered).await? else {
            return Ok(());
        };
        let game = self.repo.game(&turn.game_id).await?;

        let now = self.clock.now();
        let dismissed = machine::dismiss(&turn, now)?;
        match self.repo.update_turn(TurnStatus::Offered, dismissed).await {
            Ok(_) => {}
            Err(error) if error.is_stale() => return Ok(()),
            Err(error) => return Err(error),
        }
        self.timeouts.on_settle(&turn.id).await?;
        info!(turn = %turn.id, "offer dismissed after claim timeout");

        match &game.origin {
            GameOrigin::Season { .. } => {
                let mut intents = Vec::new();
                self.offer_next_turn(&game.id, turn.player_id.as_ref(), &mut intents)
                    .await?;
                self.dispatch(intents).await;
            }
            GameOrigin::OnDemand { .. } => {}
        }
        Ok(())
    }

    /// The submission window closed: skip the turn. The skip path owns the
    /// follow-up (advance, complete, or delete an on-demand game at turn
    /// one); a turn that already settled makes this a no-op.
    pub(crate) async fn handle_submission_timeout(
        &self,
        payload: &TurnJobPayload,
    ) -> Result<(), DomainError> {
        if self
            .job_turn(payload, TurnStatus::Pending)
            .await?
            .is_none()
        {
            return Ok(());
        }
        match self.skip_turn(&payload.turn_id).await {
            Ok(()) => Ok(()),
            Err(error) if error.is_stale() => Ok(()),
            Err(DomainError::NotFound { .. }) => Ok(()),
            Err(DomainError::PreconditionViolated { .. }) => Ok(()),
            Err(error) => Err(error),
        }
    }
}
