//! Offering policy: who gets the next turn.
//!
//! Season games push turns at a chosen member; on-demand games let players
//! pull turns, gated by the return policy. Both decisions are pure functions
//! over loaded aggregates so the orderings can be tested exhaustively.

use chrono::{DateTime, Utc};
use scrawl_types::{PlayerId, Turn};
use serde::{Deserialize, Serialize};

/// One season member as seen by the selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeasonCandidate {
    pub player_id: PlayerId,
    pub banned: bool,
    /// Holds a pending turn in any game right now.
    pub has_pending_turn: bool,
    /// Terminal turns contributed across this season.
    pub completed_turns: u32,
    pub joined_at: DateTime<Utc>,
}

impl SeasonCandidate {
    fn eligible(&self) -> bool {
        !self.banned && !self.has_pending_turn
    }
}

/// Pick the member to offer a season turn to.
///
/// Eligible members are those not banned and not already working a pending
/// turn. The player of the immediately previous turn is avoided when any
/// other eligible member exists; with a single eligible member the previous
/// player is allowed back.
///
/// Ordering is deterministic: fewest terminal turns in the season first,
/// then earliest `joined_at`, then lowest player id.
pub fn select_candidate(
    candidates: &[SeasonCandidate],
    previous_player: Option<&PlayerId>,
) -> Option<PlayerId> {
    let mut eligible: Vec<&SeasonCandidate> =
        candidates.iter().filter(|c| c.eligible()).collect();

    if let Some(previous) = previous_player {
        let without_previous: Vec<&SeasonCandidate> = eligible
            .iter()
            .copied()
            .filter(|c| c.player_id != *previous)
            .collect();
        if !without_previous.is_empty() {
            eligible = without_previous;
        }
    }

    eligible
        .into_iter()
        .min_by(|a, b| {
            a.completed_turns
                .cmp(&b.completed_turns)
                .then_with(|| a.joined_at.cmp(&b.joined_at))
                .then_with(|| a.player_id.cmp(&b.player_id))
        })
        .map(|c| c.player_id.clone())
}

/// Return policy for on-demand games.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnPolicy {
    /// Turns a player may take before the cooldown applies; 0 = unlimited.
    pub return_count: u32,
    /// Other-player turns required between a player's repeat appearances.
    pub return_cooldown: u32,
}

/// Whether `player` may take the next turn of an on-demand game.
///
/// `terminal_turns` must be the game's completed and skipped turns in turn
/// order. A player under `return_count` always passes; at or over it, the
/// number of other-player turns since the player's last terminal turn must
/// reach `return_cooldown`. A cooldown of zero therefore never blocks.
pub fn return_allows(policy: ReturnPolicy, terminal_turns: &[Turn], player: &PlayerId) -> bool {
    if policy.return_count == 0 {
        return true;
    }

    let taken = terminal_turns
        .iter()
        .filter(|t| t.player_id.as_ref() == Some(player))
        .count() as u32;
    if taken < policy.return_count {
        return true;
    }

    let since_last = terminal_turns
        .iter()
        .rev()
        .take_while(|t| t.player_id.as_ref() != Some(player))
        .count() as u32;
    since_last >= policy.return_cooldown
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use scrawl_types::{ContributionKind, GameId, TurnId, TurnStatus};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn candidate(id: &str, completed: u32, joined: i64) -> SeasonCandidate {
        SeasonCandidate {
            player_id: PlayerId::new(id),
            banned: false,
            has_pending_turn: false,
            completed_turns: completed,
            joined_at: at(joined),
        }
    }

    fn terminal_turn(number: u32, player: &str) -> Turn {
        let mut turn = Turn::available(
            TurnId::new(format!("t{number}")),
            GameId::new("g1"),
            number,
            ContributionKind::Writing,
            None,
            at(0),
        );
        turn.status = TurnStatus::Completed;
        turn.player_id = Some(PlayerId::new(player));
        turn
    }

    #[test]
    fn fewest_turns_wins_then_join_order_then_id() {
        let picked = select_candidate(
            &[
                candidate("carol", 2, 0),
                candidate("bob", 1, 10),
                candidate("alice", 1, 5),
            ],
            None,
        );
        assert_eq!(picked, Some(PlayerId::new("alice")));

        // Same counts and join times fall back to id order.
        let picked = select_candidate(
            &[candidate("bob", 1, 5), candidate("alice", 1, 5)],
            None,
        );
        assert_eq!(picked, Some(PlayerId::new("alice")));
    }

    #[test]
    fn banned_and_busy_members_are_skipped() {
        let mut banned = candidate("alice", 0, 0);
        banned.banned = true;
        let mut busy = candidate("bob", 0, 1);
        busy.has_pending_turn = true;

        let picked = select_candidate(&[banned, busy, candidate("carol", 5, 9)], None);
        assert_eq!(picked, Some(PlayerId::new("carol")));
    }

    #[test]
    fn previous_player_is_avoided_when_feasible() {
        let previous = PlayerId::new("alice");
        let picked = select_candidate(
            &[candidate("alice", 0, 0), candidate("bob", 3, 1)],
            Some(&previous),
        );
        assert_eq!(picked, Some(PlayerId::new("bob")));

        // Sole eligible member: the previous player is allowed back.
        let picked = select_candidate(&[candidate("alice", 0, 0)], Some(&previous));
        assert_eq!(picked, Some(PlayerId::new("alice")));
    }

    #[test]
    fn no_eligible_member_yields_none() {
        let mut banned = candidate("alice", 0, 0);
        banned.banned = true;
        assert_eq!(select_candidate(&[banned], None), None);
        assert_eq!(select_candidate(&[], None), None);
    }

    #[test]
    fn zero_return_count_is_unlimited() {
        let policy = ReturnPolicy {
            return_count: 0,
            return_cooldown: 5,
        };
        let turns = [terminal_turn(1, "alice"), terminal_turn(2, "alice")];
        assert!(return_allows(policy, &turns, &PlayerId::new("alice")));
    }

    #[test]
    fn under_the_count_always_passes() {
        let policy = ReturnPolicy {
            return_count: 2,
            return_cooldown: 3,
        };
        let turns = [terminal_turn(1, "alice")];
        assert!(return_allows(policy, &turns, &PlayerId::new("alice")));
    }

    /// With `return_count = K` and `return_cooldown = C`, a player at K
    /// terminal turns is blocked until C other-player turns intervene.
    #[test]
    fn cooldown_counts_other_player_turns_since_last_appearance() {
        let policy = ReturnPolicy {
            return_count: 1,
            return_cooldown: 2,
        };
        let alice = PlayerId::new("alice");

        let mut turns = vec![terminal_turn(1, "alice")];
        assert!(!return_allows(policy, &turns, &alice));

        turns.push(terminal_turn(2, "bob"));
        assert!(!return_allows(policy, &turns, &alice));

        turns.push(terminal_turn(3, "carol"));
        assert!(return_allows(policy, &turns, &alice));
    }

    #[test]
    fn cooldown_resets_at_each_appearance() {
        let policy = ReturnPolicy {
            return_count: 1,
            return_cooldown: 2,
        };
        let alice = PlayerId::new("alice");

        let turns = vec![
            terminal_turn(1, "bob"),
            terminal_turn(2, "carol"),
            terminal_turn(3, "alice"),
            terminal_turn(4, "bob"),
        ];
        // Only one other-player turn since Alice's last appearance.
        assert!(!return_allows(policy, &turns, &alice));
    }

    #[test]
    fn zero_cooldown_with_nonzero_count_never_blocks() {
        let policy = ReturnPolicy {
            return_count: 1,
            return_cooldown: 0,
        };
        let turns = [terminal_turn(1, "alice")];
        assert!(return_allows(policy, &turns, &PlayerId::new("alice")));
    }

    /// Parameterized sweep over count/cooldown combinations.
    #[test]
    fn cooldown_gate_is_exact_across_parameters() {
        let alice = PlayerId::new("alice");
        for return_count in 1..=3u32 {
            for return_cooldown in 0..=3u32 {
                let policy = ReturnPolicy {
                    return_count,
                    return_cooldown,
                };

                let mut turns: Vec<Turn> = (1..=return_count)
                    .map(|n| terminal_turn(n, "alice"))
                    .collect();
                for intervening in 0..=return_cooldown {
                    let allowed = return_allows(policy, &turns, &alice);
                    let expected = intervening >= return_cooldown;
                    assert_eq!(
                        allowed, expected,
                        "count={return_count} cooldown={return_cooldown} \
                         intervening={intervening}"
                    );
                    turns.push(terminal_turn(return_count + intervening + 1, "other"));
                }
            }
        }
    }
}
