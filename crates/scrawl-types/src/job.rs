use crate::ids::TurnId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four turn-deadline job kinds the scheduler knows how to execute.
///
/// Handlers are registered once at startup under these keys; payloads tell
/// the handler which turn to act on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    ClaimWarning,
    ClaimTimeout,
    SubmissionWarning,
    SubmissionTimeout,
}

impl JobKind {
    /// Variant name as a static string for logging and failure reasons.
    pub fn name(self) -> &'static str {
        match self {
            Self::ClaimWarning => "claim-warning",
            Self::ClaimTimeout => "claim-timeout",
            Self::SubmissionWarning => "submission-warning",
            Self::SubmissionTimeout => "submission-timeout",
        }
    }

    /// Warnings are advisory; a failure to arm one is logged and swallowed.
    /// The two deadline kinds are enforcers and must arm or the transition
    /// that needed them fails.
    pub fn is_warning(self) -> bool {
        matches!(self, Self::ClaimWarning | Self::SubmissionWarning)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Globally unique, deterministic job identifier.
///
/// Every turn-deadline job id is derived from its turn id, so any caller
/// that knows the turn can cancel the job without looking anything up.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `turn-warning-<turnId>`: warn the offered player before the claim
    /// deadline.
    pub fn claim_warning(turn: &TurnId) -> Self {
        Self(format!("turn-warning-{turn}"))
    }

    /// `turn-claim-timeout-<turnId>`: enforce the claim deadline.
    pub fn claim_timeout(turn: &TurnId) -> Self {
        Self(format!("turn-claim-timeout-{turn}"))
    }

    /// `turn-submission-warning-<turnId>`: warn the working player before
    /// the submission deadline.
    pub fn submission_warning(turn: &TurnId) -> Self {
        Self(format!("turn-submission-warning-{turn}"))
    }

    /// `turn-timeout-<turnId>`: enforce the submission deadline.
    pub fn submission_timeout(turn: &TurnId) -> Self {
        Self(format!("turn-timeout-{turn}"))
    }

    /// Derive the id for any turn-deadline job kind.
    pub fn for_turn(kind: JobKind, turn: &TurnId) -> Self {
        match kind {
            JobKind::ClaimWarning => Self::claim_warning(turn),
            JobKind::ClaimTimeout => Self::claim_timeout(turn),
            JobKind::SubmissionWarning => Self::submission_warning(turn),
            JobKind::SubmissionTimeout => Self::submission_timeout(turn),
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job store states. `Scheduled` is the only live state; the other three are
/// terminal, and a job moves to exactly one of them exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Scheduled,
    Executed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Scheduled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scheduled => "scheduled",
            Self::Executed => "executed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Persistence row for a durable timer.
///
/// `payload` is an opaque serialized record; the store never interprets it
/// beyond substring scans for cancel-by-game. `fire_at` is wall clock;
/// handlers recompute anything time-sensitive from the entity rows, never
/// from local elapsed time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: JobId,
    pub kind: JobKind,
    pub fire_at: DateTime<Utc>,
    pub payload: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_are_derivable_from_the_turn() {
        let turn = TurnId::new("t-42");
        assert_eq!(JobId::claim_warning(&turn).as_str(), "turn-warning-t-42");
        assert_eq!(
            JobId::claim_timeout(&turn).as_str(),
            "turn-claim-timeout-t-42"
        );
        assert_eq!(
            JobId::submission_warning(&turn).as_str(),
            "turn-submission-warning-t-42"
        );
        assert_eq!(JobId::submission_timeout(&turn).as_str(), "turn-timeout-t-42");
    }

    #[test]
    fn for_turn_matches_the_specific_constructors() {
        let turn = TurnId::new("t-1");
        for kind in [
            JobKind::ClaimWarning,
            JobKind::ClaimTimeout,
            JobKind::SubmissionWarning,
            JobKind::SubmissionTimeout,
        ] {
            let derived = JobId::for_turn(kind, &turn);
            assert!(derived.as_str().contains("t-1"));
        }
    }

    #[test]
    fn only_scheduled_is_live() {
        assert!(!JobStatus::Scheduled.is_terminal());
        assert!(JobStatus::Executed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }
}
