//! Turn state machine.
//!
//! Every transition is a pure read-check-produce function: it validates the
//! current row, and returns the updated row for the caller to persist with a
//! conditional update on the prior status. The conditional update is what
//! turns a lost race into a `stale-state` error; these functions themselves
//! never touch storage.
//!
//! Legal transitions:
//!
//! ```text
//! Available --offer(player)--> Offered
//! Offered   --claim(player)--> Pending
//! Offered   --dismiss-------> Available   (clears player, offered_at)
//! Pending   --submit(content)-> Completed  (records content, completed_at)
//! Pending   --skip----------> Skipped     (records skipped_at)
//! Completed --flag----------> Flagged
//! ```
//!
//! Anything else is rejected: a wrong current status reports `stale-state`,
//! a wrong acting player reports `precondition-violated`, and malformed
//! content reports `validation`. Rejections never produce a mutated row.

use chrono::{DateTime, Utc};
use scrawl_types::{DomainError, PlayerId, Turn, TurnContent, TurnStatus};

fn wrong_status(turn: &Turn) -> DomainError {
    DomainError::stale("turn", turn.id.as_str())
}

/// Available → Offered: assign the turn to `player` with a claim deadline
/// managed by the caller.
pub fn offer(turn: &Turn, player: &PlayerId, now: DateTime<Utc>) -> Result<Turn, DomainError> {
    if turn.status != TurnStatus::Available {
        return Err(wrong_status(turn));
    }
    debug_assert!(
        turn.player_id.is_none(),
        "available turn must be unassigned"
    );

    let mut next = turn.clone();
    next.status = TurnStatus::Offered;
    next.player_id = Some(player.clone());
    next.offered_at = Some(now);
    next.updated_at = now;
    Ok(next)
}

/// Offered → Pending: the offered player accepts the turn.
pub fn claim(turn: &Turn, player: &PlayerId, now: DateTime<Utc>) -> Result<Turn, DomainError> {
    if turn.status != TurnStatus::Offered {
        return Err(wrong_status(turn));
    }
    if !turn.is_assigned_to(player) {
        return Err(DomainError::precondition("turn-not-yours"));
    }

    let mut next = turn.clone();
    next.status = TurnStatus::Pending;
    next.claimed_at = Some(now);
    next.updated_at = now;
    Ok(next)
}

/// Offered → Available: withdraw the offer so the turn can be re-offered.
///
/// Clears the assignee and the offer timestamp; this is the one path that
/// produces an unassigned turn outside of creation.
pub fn dismiss(turn: &Turn, now: DateTime<Utc>) -> Result<Turn, DomainError> {
    if turn.status != TurnStatus::Offered {
        return Err(wrong_status(turn));
    }

    let mut next = turn.clone();
    next.status = TurnStatus::Available;
    next.player_id = None;
    next.offered_at = None;
    next.updated_at = now;
    Ok(next)
}

/// Pending → Completed: record the contribution.
///
/// The content representation must match the turn's kind (writing → text,
/// drawing → image URL) and must be non-empty after trimming.
pub fn submit(
    turn: &Turn,
    player: &PlayerId,
    content: TurnContent,
    now: DateTime<Utc>,
) -> Result<Turn, DomainError> {
    if turn.status != TurnStatus::Pending {
        return Err(wrong_status(turn));
    }
    if !turn.is_assigned_to(player) {
        return Err(DomainError::precondition("turn-not-yours"));
    }
    if content.kind() != turn.kind {
        return Err(DomainError::validation(
            "content",
            format!(
                "{} content submitted for a {} turn",
                content.kind(),
                turn.kind
            ),
        ));
    }
    if content.is_empty() {
        return Err(DomainError::validation("content", "content must not be empty"));
    }

    let mut next = turn.clone();
    next.status = TurnStatus::Completed;
    next.content = Some(content);
    next.completed_at = Some(now);
    next.updated_at = now;
    Ok(next)
}

/// Pending → Skipped: terminal disposition without content.
pub fn skip(turn: &Turn, now: DateTime<Utc>) -> Result<Turn, DomainError> {
    if turn.status != TurnStatus::Pending {
        return Err(wrong_status(turn));
    }

    let mut next = turn.clone();
    next.status = TurnStatus::Skipped;
    next.skipped_at = Some(now);
    next.updated_at = now;
    Ok(next)
}

/// Completed → Flagged: mark the contribution for admin review.
///
/// Content is retained; resolving the flag is outside this engine.
pub fn flag(turn: &Turn, now: DateTime<Utc>) -> Result<Turn, DomainError> {
    if turn.status != TurnStatus::Completed {
        return Err(wrong_status(turn));
    }

    let mut next = turn.clone();
    next.status = TurnStatus::Flagged;
    next.updated_at = now;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use scrawl_types::{ContributionKind, GameId, TurnId};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn alice() -> PlayerId {
        PlayerId::new("alice")
    }

    fn bob() -> PlayerId {
        PlayerId::new("bob")
    }

    fn writing_turn(status: TurnStatus, player: Option<PlayerId>) -> Turn {
        let mut turn = Turn::available(
            TurnId::new("t1"),
            GameId::new("g1"),
            1,
            ContributionKind::Writing,
            None,
            at(0),
        );
        turn.status = status;
        turn.player_id = player;
        turn
    }

    #[test]
    fn offer_assigns_player_and_records_offered_at() {
        let turn = writing_turn(TurnStatus::Available, None);
        let offered = offer(&turn, &alice(), at(5)).unwrap();

        assert_eq!(offered.status, TurnStatus::Offered);
        assert_eq!(offered.player_id, Some(alice()));
        assert_eq!(offered.offered_at, Some(at(5)));
        assert_eq!(offered.updated_at, at(5));
    }

    #[test]
    fn claim_requires_the_offered_player() {
        let turn = writing_turn(TurnStatus::Offered, Some(alice()));

        let err = claim(&turn, &bob(), at(5)).unwrap_err();
        assert_eq!(err, DomainError::precondition("turn-not-yours"));

        let claimed = claim(&turn, &alice(), at(5)).unwrap();
        assert_eq!(claimed.status, TurnStatus::Pending);
        assert_eq!(claimed.claimed_at, Some(at(5)));
    }

    #[test]
    fn dismiss_clears_assignee_and_offer_timestamp() {
        let mut turn = writing_turn(TurnStatus::Offered, Some(alice()));
        turn.offered_at = Some(at(1));

        let dismissed = dismiss(&turn, at(10)).unwrap();
        assert_eq!(dismissed.status, TurnStatus::Available);
        assert_eq!(dismissed.player_id, None);
        assert_eq!(dismissed.offered_at, None);
    }

    #[test]
    fn submit_records_content_and_completion() {
        let turn = writing_turn(TurnStatus::Pending, Some(alice()));
        let submitted = submit(
            &turn,
            &alice(),
            TurnContent::Text("a cat in a hat".into()),
            at(9),
        )
        .unwrap();

        let mut expected = turn.clone();
        expected.status = TurnStatus::Completed;
        expected.content = Some(TurnContent::Text("a cat in a hat".into()));
        expected.completed_at = Some(at(9));
        expected.updated_at = at(9);
        similar_asserts::assert_eq!(submitted, expected);
    }

    #[test]
    fn submit_rejects_kind_mismatch_and_empty_content() {
        let turn = writing_turn(TurnStatus::Pending, Some(alice()));

        let mismatch = submit(&turn, &alice(), TurnContent::Image("https://i/u".into()), at(1));
        assert!(matches!(
            mismatch.unwrap_err(),
            DomainError::Validation { field: "content", .. }
        ));

        let empty = submit(&turn, &alice(), TurnContent::Text("   ".into()), at(1));
        assert!(matches!(
            empty.unwrap_err(),
            DomainError::Validation { field: "content", .. }
        ));
    }

    #[test]
    fn skip_is_terminal_without_content() {
        let turn = writing_turn(TurnStatus::Pending, Some(alice()));
        let skipped = skip(&turn, at(3)).unwrap();

        assert_eq!(skipped.status, TurnStatus::Skipped);
        assert_eq!(skipped.content, None);
        assert_eq!(skipped.skipped_at, Some(at(3)));
    }

    #[test]
    fn flag_only_applies_to_completed_turns() {
        let mut turn = writing_turn(TurnStatus::Completed, Some(alice()));
        turn.content = Some(TurnContent::Text("done".into()));

        let flagged = flag(&turn, at(4)).unwrap();
        assert_eq!(flagged.status, TurnStatus::Flagged);
        assert_eq!(flagged.content, Some(TurnContent::Text("done".into())));
    }

    /// Every (state, event) pair outside the transition table is rejected
    /// without mutating the turn.
    #[test]
    fn illegal_pairs_are_rejected_and_do_not_mutate() {
        use TurnStatus::*;
        let all = [Available, Offered, Pending, Completed, Skipped, Flagged];

        for status in all {
            let turn = writing_turn(status, Some(alice()));

            if status != Available {
                assert!(offer(&turn, &bob(), at(1)).is_err(), "offer from {status}");
            }
            if status != Offered {
                assert!(claim(&turn, &alice(), at(1)).is_err(), "claim from {status}");
                assert!(dismiss(&turn, at(1)).is_err(), "dismiss from {status}");
            }
            if status != Pending {
                let submitted = submit(
                    &turn,
                    &alice(),
                    TurnContent::Text("words".into()),
                    at(1),
                );
                assert!(submitted.is_err(), "submit from {status}");
                assert!(skip(&turn, at(1)).is_err(), "skip from {status}");
            }
            if status != Completed {
                assert!(flag(&turn, at(1)).is_err(), "flag from {status}");
            }
        }
    }

    #[test]
    fn rejections_report_stale_state_for_wrong_status() {
        let turn = writing_turn(TurnStatus::Completed, Some(alice()));
        assert!(skip(&turn, at(1)).unwrap_err().is_stale());
        assert!(claim(&turn, &alice(), at(1)).unwrap_err().is_stale());
    }
}
