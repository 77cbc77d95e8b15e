//! Timer plans for turn deadlines.
//!
//! These functions decide *which* jobs a state entry needs and *when* they
//! fire; actually arming them is the scheduler's business. Keeping the plan
//! pure lets the deadline rules be tested without a job store.
//!
//! Per state entered:
//!
//! | State   | Warning                                  | Timeout                      |
//! |---------|------------------------------------------|------------------------------|
//! | Offered | `now + claim_warning` if set and under the claim timeout | `now + claim_timeout` |
//! | Pending | `now + submission_warning(kind)` if set  | `now + submission_timeout(kind)` |
//!
//! Job ids are derived from the turn id, so any later transition can cancel
//! the full set without knowing what was armed.

use chrono::{DateTime, Utc};
use scrawl_types::{JobId, JobKind, TimeoutProfile, Turn, TurnId, TurnStatus};
use serde::{Deserialize, Serialize};

/// One job the scheduler should arm.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSpec {
    pub job_id: JobId,
    pub kind: JobKind,
    pub fire_at: DateTime<Utc>,
}

/// Jobs to arm when a turn enters `Offered`.
///
/// The claim warning is included only when configured and strictly before
/// the claim timeout; a warning at or past the deadline would fire into a
/// turn that no longer needs one.
pub fn offer_timers(turn: &Turn, profile: &TimeoutProfile, now: DateTime<Utc>) -> Vec<TimerSpec> {
    debug_assert_eq!(turn.status, TurnStatus::Offered, "plan is for offered turns");

    let mut specs = Vec::with_capacity(2);
    if let Some(warning) = profile.claim_warning
        && warning < profile.claim_timeout
    {
        specs.push(TimerSpec {
            job_id: JobId::claim_warning(&turn.id),
            kind: JobKind::ClaimWarning,
            fire_at: now + warning.as_duration(),
        });
    }
    specs.push(TimerSpec {
        job_id: JobId::claim_timeout(&turn.id),
        kind: JobKind::ClaimTimeout,
        fire_at: now + profile.claim_timeout.as_duration(),
    });
    specs
}

/// Jobs to arm when a turn enters `Pending`.
pub fn pending_timers(turn: &Turn, profile: &TimeoutProfile, now: DateTime<Utc>) -> Vec<TimerSpec> {
    debug_assert_eq!(turn.status, TurnStatus::Pending, "plan is for pending turns");

    let mut specs = Vec::with_capacity(2);
    if let Some(warning) = profile.submission_warning(turn.kind) {
        specs.push(TimerSpec {
            job_id: JobId::submission_warning(&turn.id),
            kind: JobKind::SubmissionWarning,
            fire_at: now + warning.as_duration(),
        });
    }
    specs.push(TimerSpec {
        job_id: JobId::submission_timeout(&turn.id),
        kind: JobKind::SubmissionTimeout,
        fire_at: now + profile.submission_timeout(turn.kind).as_duration(),
    });
    specs
}

/// The full deadline-job id set for a turn, for blanket cancellation after
/// any transition out of `Offered` or `Pending`.
pub fn turn_job_ids(turn: &TurnId) -> [JobId; 4] {
    [
        JobId::claim_warning(turn),
        JobId::claim_timeout(turn),
        JobId::submission_warning(turn),
        JobId::submission_timeout(turn),
    ]
}

/// The claim deadline of an offered turn, from the persisted `offered_at`.
///
/// Handlers recompute remaining time from this rather than from local
/// elapsed time, so a late-delivered job cannot skew the arithmetic.
pub fn claim_deadline(turn: &Turn, profile: &TimeoutProfile) -> Option<DateTime<Utc>> {
    turn.offered_at
        .map(|offered_at| offered_at + profile.claim_timeout.as_duration())
}

/// The submission deadline of a pending turn, from the persisted
/// `claimed_at`.
pub fn submission_deadline(turn: &Turn, profile: &TimeoutProfile) -> Option<DateTime<Utc>> {
    turn.claimed_at
        .map(|claimed_at| claimed_at + profile.submission_timeout(turn.kind).as_duration())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use scrawl_types::{CompactDuration, ContributionKind, GameId, PlayerId};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn profile() -> TimeoutProfile {
        TimeoutProfile {
            claim_timeout: CompactDuration::minutes(10),
            writing_timeout: CompactDuration::minutes(30),
            drawing_timeout: CompactDuration::minutes(60),
            claim_warning: Some(CompactDuration::minutes(8)),
            writing_warning: Some(CompactDuration::minutes(25)),
            drawing_warning: None,
        }
    }

    fn turn(status: TurnStatus, kind: ContributionKind) -> Turn {
        let mut turn = Turn::available(
            TurnId::new("t7"),
            GameId::new("g1"),
            2,
            kind,
            None,
            at(0),
        );
        turn.status = status;
        turn.player_id = Some(PlayerId::new("alice"));
        turn
    }

    #[test]
    fn offered_turn_gets_warning_and_timeout() {
        let specs = offer_timers(
            &turn(TurnStatus::Offered, ContributionKind::Writing),
            &profile(),
            at(0),
        );

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].kind, JobKind::ClaimWarning);
        assert_eq!(specs[0].fire_at, at(8 * 60));
        assert_eq!(specs[0].job_id.as_str(), "turn-warning-t7");
        assert_eq!(specs[1].kind, JobKind::ClaimTimeout);
        assert_eq!(specs[1].fire_at, at(10 * 60));
    }

    #[test]
    fn claim_warning_at_or_past_the_timeout_is_not_armed() {
        let mut late = profile();
        late.claim_warning = Some(CompactDuration::minutes(10));

        let specs = offer_timers(
            &turn(TurnStatus::Offered, ContributionKind::Writing),
            &late,
            at(0),
        );
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].kind, JobKind::ClaimTimeout);
    }

    #[test]
    fn pending_timers_follow_the_turn_kind() {
        let writing = pending_timers(
            &turn(TurnStatus::Pending, ContributionKind::Writing),
            &profile(),
            at(0),
        );
        assert_eq!(writing.len(), 2);
        assert_eq!(writing[0].kind, JobKind::SubmissionWarning);
        assert_eq!(writing[0].fire_at, at(25 * 60));
        assert_eq!(writing[1].kind, JobKind::SubmissionTimeout);
        assert_eq!(writing[1].fire_at, at(30 * 60));

        // Drawing has no warning configured; only the timeout is armed.
        let drawing = pending_timers(
            &turn(TurnStatus::Pending, ContributionKind::Drawing),
            &profile(),
            at(0),
        );
        assert_eq!(drawing.len(), 1);
        assert_eq!(drawing[0].kind, JobKind::SubmissionTimeout);
        assert_eq!(drawing[0].fire_at, at(60 * 60));
    }

    #[test]
    fn deadlines_derive_from_persisted_timestamps() {
        let mut offered = turn(TurnStatus::Offered, ContributionKind::Writing);
        offered.offered_at = Some(at(100));
        assert_eq!(
            claim_deadline(&offered, &profile()),
            Some(at(100 + 600))
        );
        assert_eq!(submission_deadline(&offered, &profile()), None);

        let mut pending = turn(TurnStatus::Pending, ContributionKind::Drawing);
        pending.claimed_at = Some(at(40));
        assert_eq!(
            submission_deadline(&pending, &profile()),
            Some(at(40 + 3_600))
        );
    }
}
