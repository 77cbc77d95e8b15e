//! Completion predicates.
//!
//! Pure functions over loaded aggregates; the coordinator loads the inputs
//! and applies the resulting decision transactionally.

use chrono::{DateTime, Utc};
use scrawl_types::{Game, GameConfig, GameStatus, PlayerId, Turn};

/// Why a game is done.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionReason {
    /// Season game: every member contributed a terminal turn.
    AllMembersContributed,
    /// On-demand game: the configured turn ceiling was reached.
    MaxTurnsReached,
    /// On-demand game: enough turns exist and the game sat idle past its
    /// stale timeout.
    WentStale,
}

/// Whether a season game is complete.
///
/// Complete iff every season member has at least one completed or skipped
/// turn in this game. A season with no members never completes a game this
/// way.
pub fn season_game_complete(
    members: &[PlayerId],
    terminal_turns: &[Turn],
) -> Option<CompletionReason> {
    if members.is_empty() {
        return None;
    }
    let done = members.iter().all(|member| {
        terminal_turns
            .iter()
            .any(|turn| turn.player_id.as_ref() == Some(member))
    });
    done.then_some(CompletionReason::AllMembersContributed)
}

/// Whether an on-demand game is complete.
///
/// Complete iff the terminal-turn count reached `max_turns` (when set), or
/// it reached `min_turns` and the game has been inactive for at least
/// `stale_timeout`.
pub fn on_demand_game_complete(
    game: &Game,
    config: &GameConfig,
    terminal_turn_count: u32,
    now: DateTime<Utc>,
) -> Option<CompletionReason> {
    if let Some(max_turns) = config.max_turns
        && terminal_turn_count >= max_turns
    {
        return Some(CompletionReason::MaxTurnsReached);
    }

    let idle = now - game.last_activity_at;
    if terminal_turn_count >= config.min_turns && idle >= config.stale_timeout.as_duration() {
        return Some(CompletionReason::WentStale);
    }

    None
}

/// Whether a season is complete: at least one game exists and every game
/// not terminated has completed.
pub fn season_complete(games: &[Game]) -> bool {
    !games.is_empty()
        && games
            .iter()
            .filter(|game| game.status != GameStatus::Terminated)
            .all(|game| game.status == GameStatus::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use scrawl_types::{
        CompactDuration, ConfigId, ContributionKind, GameId, GameOrigin, GuildId,
        TimeoutProfile, TurnId, TurnPattern, TurnStatus,
    };

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn terminal_turn(number: u32, player: &str, status: TurnStatus) -> Turn {
        let mut turn = Turn::available(
            TurnId::new(format!("t{number}")),
            GameId::new("g1"),
            number,
            ContributionKind::Writing,
            None,
            at(0),
        );
        turn.status = status;
        turn.player_id = Some(PlayerId::new(player));
        turn
    }

    fn on_demand_game(status: GameStatus, last_activity: i64) -> Game {
        Game {
            id: GameId::new("g1"),
            status,
            origin: GameOrigin::OnDemand {
                creator_id: PlayerId::new("alice"),
                guild_id: GuildId::new("guild"),
                config_id: ConfigId::new("cfg"),
            },
            created_at: at(0),
            updated_at: at(last_activity),
            last_activity_at: at(last_activity),
            completed_at: None,
        }
    }

    fn config(min_turns: u32, max_turns: Option<u32>, stale_secs: i64) -> GameConfig {
        GameConfig {
            id: ConfigId::new("cfg"),
            turn_pattern: TurnPattern::alternating(),
            min_turns,
            max_turns,
            stale_timeout: CompactDuration::seconds(stale_secs),
            return_count: 0,
            return_cooldown: 0,
            timeouts: TimeoutProfile {
                claim_timeout: CompactDuration::minutes(10),
                writing_timeout: CompactDuration::minutes(30),
                drawing_timeout: CompactDuration::minutes(60),
                claim_warning: None,
                writing_warning: None,
                drawing_warning: None,
            },
        }
    }

    #[test]
    fn season_game_completes_when_every_member_contributed() {
        let members = [PlayerId::new("alice"), PlayerId::new("bob")];

        let one = [terminal_turn(1, "alice", TurnStatus::Completed)];
        assert_eq!(season_game_complete(&members, &one), None);

        // A skipped turn counts as a contribution slot.
        let both = [
            terminal_turn(1, "alice", TurnStatus::Completed),
            terminal_turn(2, "bob", TurnStatus::Skipped),
        ];
        assert_eq!(
            season_game_complete(&members, &both),
            Some(CompletionReason::AllMembersContributed)
        );
    }

    #[test]
    fn season_game_with_no_members_never_completes() {
        assert_eq!(season_game_complete(&[], &[]), None);
    }

    #[test]
    fn max_turns_completes_regardless_of_activity() {
        let game = on_demand_game(GameStatus::Active, 100);
        assert_eq!(
            on_demand_game_complete(&game, &config(1, Some(3), 3_600), 3, at(101)),
            Some(CompletionReason::MaxTurnsReached)
        );
        assert_eq!(
            on_demand_game_complete(&game, &config(1, Some(3), 3_600), 2, at(101)),
            None
        );
    }

    #[test]
    fn staleness_requires_min_turns_and_idle_time() {
        let game = on_demand_game(GameStatus::Active, 0);
        let cfg = config(2, None, 600);

        // Idle long enough but under min turns.
        assert_eq!(on_demand_game_complete(&game, &cfg, 1, at(700)), None);
        // Enough turns but recently active.
        assert_eq!(on_demand_game_complete(&game, &cfg, 2, at(300)), None);
        // Both conditions met.
        assert_eq!(
            on_demand_game_complete(&game, &cfg, 2, at(600)),
            Some(CompletionReason::WentStale)
        );
    }

    #[test]
    fn season_completes_only_with_all_games_settled_and_at_least_one_game() {
        assert!(!season_complete(&[]));

        let mut done = on_demand_game(GameStatus::Completed, 0);
        done.completed_at = Some(at(10));
        let running = on_demand_game(GameStatus::Active, 0);
        let terminated = on_demand_game(GameStatus::Terminated, 0);

        assert!(!season_complete(&[done.clone(), running]));
        assert!(season_complete(&[done.clone()]));
        // Terminated games do not block completion.
        assert!(season_complete(&[done, terminated.clone()]));
        // A season whose only game was terminated has produced no completed
        // chain, but every remaining game is settled.
        assert!(season_complete(&[terminated]));
    }
}
