//! Durable at-least-once timer service.
//!
//! Jobs live in the repository (so they survive restarts) and are armed as
//! in-memory tokio timers. Execution goes through a handler registry keyed
//! by [`JobKind`], registered once at startup; nothing in a handler closure
//! reaches back into the scheduler.
//!
//! Delivery guarantees:
//! - a job reaches at most one terminal state, enforced by the store's
//!   conditional `finish_job`;
//! - handlers can be invoked more than once across restarts and races, so
//!   they must re-read their entities and no-op on unexpected state;
//! - jobs found past due at startup are resolved by [`MissedJobPolicy`].

use crate::clock::Clock;
use crate::repo::{JobOutcome, Repository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scrawl_types::{
    DomainError, GameId, JobId, JobKind, JobStatus, PlayerId, ScheduledJob, TurnId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Failure reason recorded for jobs that should have fired while the
/// process was down.
pub const MISSED_DOWNTIME_REASON: &str = "missed execution due to downtime";

/// What to do with jobs whose `fire_at` passed during downtime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissedJobPolicy {
    /// Mark them failed with [`MISSED_DOWNTIME_REASON`].
    #[default]
    MarkFailed,
    /// Run them immediately on startup.
    ExecuteImmediately,
}

/// Payload carried by every turn-deadline job.
///
/// `player_id` is set for claim jobs (the player the turn was offered to)
/// so the handler can verify the offer it is enforcing is still the one it
/// was armed for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnJobPayload {
    pub turn_id: TurnId,
    pub game_id: GameId,
    pub player_id: Option<PlayerId>,
}

impl TurnJobPayload {
    pub fn encode(&self) -> Result<String, DomainError> {
        serde_json::to_string(self)
            .map_err(|e| DomainError::internal(format!("payload encode failed: {e}")))
    }

    pub fn decode(raw: &str) -> Result<Self, DomainError> {
        serde_json::from_str(raw)
            .map_err(|e| DomainError::internal(format!("payload decode failed: {e}")))
    }
}

/// Executes one kind of job. Implementations must be idempotent.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn execute(&self, job: &ScheduledJob) -> anyhow::Result<()>;
}

/// Result of replaying the job table at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Jobs re-armed for the future.
    pub armed: u32,
    /// Jobs found past due and resolved per the missed policy.
    pub missed: u32,
}

pub struct Scheduler {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    missed_policy: MissedJobPolicy,
    handlers: RwLock<HashMap<JobKind, Arc<dyn JobHandler>>>,
    timers: Mutex<HashMap<JobId, JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(repo: Arc<dyn Repository>, clock: Arc<dyn Clock>) -> Arc<Self> {
        Self::with_policy(repo, clock, MissedJobPolicy::default())
    }

    pub fn with_policy(
        repo: Arc<dyn Repository>,
        clock: Arc<dyn Clock>,
        missed_policy: MissedJobPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            repo,
            clock,
            missed_policy,
            handlers: RwLock::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
        })
    }

    /// Register the handler for a job kind. Startup wiring; last write wins.
    pub fn register(&self, kind: JobKind, handler: Arc<dyn JobHandler>) {
        self.handlers
            .write()
            .expect("handler registry poisoned")
            .insert(kind, handler);
    }

    /// Record a job durably and arm its timer.
    ///
    /// Returns `Ok(false)` without side effects when a live job already
    /// exists under this id or when `fire_at` is not strictly in the
    /// future; storage failures surface as `scheduler` errors.
    pub async fn schedule(
        self: &Arc<Self>,
        kind: JobKind,
        job_id: JobId,
        fire_at: DateTime<Utc>,
        payload: &TurnJobPayload,
    ) -> Result<bool, DomainError> {
        let now = self.clock.now();
        if fire_at <= now {
            warn!(job = %job_id, %fire_at, "refusing to schedule job in the past");
            return Ok(false);
        }

        let job = ScheduledJob {
            id: job_id.clone(),
            kind,
            fire_at,
            payload: payload.encode()?,
            status: JobStatus::Scheduled,
            created_at: now,
            executed_at: None,
            failure_reason: None,
        };
        if !self.repo.insert_job(job).await? {
            debug!(job = %job_id, "job already scheduled");
            return Ok(false);
        }

        self.arm(job_id, fire_at);
        Ok(true)
    }

    /// Cancel a job: disarm its timer and seal the row. Idempotent; returns
    /// whether a live job was actually cancelled.
    pub async fn cancel(&self, job_id: &JobId) -> Result<bool, DomainError> {
        if let Some(handle) = self
            .timers
            .lock()
            .expect("timer table poisoned")
            .remove(job_id)
        {
            handle.abort();
        }
        self.repo
            .finish_job(job_id, JobOutcome::Cancelled, self.clock.now(), None)
            .await
    }

    /// Cancel every live job whose payload references `game`. Used when a
    /// game is terminated or deleted.
    pub async fn cancel_jobs_for_game(&self, game: &GameId) -> Result<u32, DomainError> {
        let mut cancelled = 0;
        for job in self.repo.scheduled_jobs().await? {
            let Ok(payload) = TurnJobPayload::decode(&job.payload) else {
                continue;
            };
            if payload.game_id == *game && self.cancel(&job.id).await? {
                cancelled += 1;
            }
        }
        debug!(game = %game, cancelled, "cancelled game jobs");
        Ok(cancelled)
    }

    /// Replay the durable job table after a restart.
    ///
    /// Future jobs are re-armed. Past-due jobs are resolved by the missed
    /// policy: marked failed with [`MISSED_DOWNTIME_REASON`], or executed
    /// immediately.
    pub async fn load_persisted(self: &Arc<Self>) -> Result<LoadReport, DomainError> {
        let now = self.clock.now();
        let mut report = LoadReport::default();

        for job in self.repo.scheduled_jobs().await? {
            if job.fire_at > now {
                self.arm(job.id, job.fire_at);
                report.armed += 1;
                continue;
            }

            report.missed += 1;
            match self.missed_policy {
                MissedJobPolicy::MarkFailed => {
                    self.repo
                        .finish_job(
                            &job.id,
                            JobOutcome::Failed(MISSED_DOWNTIME_REASON.to_string()),
                            now,
                            None,
                        )
                        .await?;
                    warn!(job = %job.id, fire_at = %job.fire_at, "missed job marked failed");
                }
                MissedJobPolicy::ExecuteImmediately => {
                    warn!(job = %job.id, fire_at = %job.fire_at, "missed job executing now");
                    self.arm(job.id, now);
                }
            }
        }
        Ok(report)
    }

    /// Abort every armed timer. The durable rows stay `Scheduled`, so a
    /// later [`Scheduler::load_persisted`] (here or in another process)
    /// picks them back up.
    pub fn shutdown(&self) {
        let mut timers = self.timers.lock().expect("timer table poisoned");
        for (_, handle) in timers.drain() {
            handle.abort();
        }
    }

    fn arm(self: &Arc<Self>, job_id: JobId, fire_at: DateTime<Utc>) {
        let delay = (fire_at - self.clock.now())
            .to_std()
            .unwrap_or(StdDuration::ZERO);
        let scheduler = Arc::clone(self);
        let run_id = job_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.run(run_id).await;
        });

        let mut timers = self.timers.lock().expect("timer table poisoned");
        if let Some(previous) = timers.insert(job_id, handle) {
            previous.abort();
        }
    }

    async fn run(self: Arc<Self>, job_id: JobId) {
        self.timers
            .lock()
            .expect("timer table poisoned")
            .remove(&job_id);

        let job = match self.repo.job(&job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                debug!(job = %job_id, "fired job no longer exists");
                return;
            }
            Err(error) => {
                warn!(job = %job_id, %error, "failed to load fired job");
                return;
            }
        };
        if job.status != JobStatus::Scheduled {
            debug!(job = %job_id, status = %job.status, "fired job already settled");
            return;
        }

        let handler = {
            self.handlers
                .read()
                .expect("handler registry poisoned")
                .get(&job.kind)
                .cloned()
        };
        let Some(handler) = handler else {
            warn!(job = %job_id, kind = %job.kind, "no handler registered");
            let _ = self
                .repo
                .finish_job(
                    &job_id,
                    JobOutcome::Failed(format!("no handler registered for {}", job.kind)),
                    self.clock.now(),
                    Some(job.created_at),
                )
                .await;
            return;
        };

        let outcome = match handler.execute(&job).await {
            Ok(()) => JobOutcome::Executed,
            Err(error) => {
                warn!(job = %job_id, kind = %job.kind, error = %format!("{error:#}"), "job handler failed");
                JobOutcome::Failed(format!("{error:#}"))
            }
        };
        // Seal only the row this invocation executed; the handler may have
        // re-scheduled the same deterministic id for a re-entered state.
        match self
            .repo
            .finish_job(&job_id, outcome, self.clock.now(), Some(job.created_at))
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!(job = %job_id, "job row superseded or settled during execution"),
            Err(error) => warn!(job = %job_id, %error, "failed to seal executed job"),
        }
    }
}
