//! Next-turn orchestration.
//!
//! Invoked after every completed or skipped turn and after a dismissed
//! offer. Finds or creates the game's head turn, then either offers it to a
//! chosen season member or, for on-demand games, leaves it available for
//! the next `play` command to claim.

use crate::coordinator::GameCoordinator;
use chrono::{DateTime, Utc};
use scrawl_rules::{deadlines, machine, offering};
use scrawl_types::{
    DomainError, Game, GameId, GameOrigin, Intent, TimeoutProfile, Turn, TurnId, TurnPattern,
    TurnStatus,
};
use tracing::{debug, warn};

impl GameCoordinator {
    /// Ensure the game has a head turn and, for season games, an assignee.
    ///
    /// `avoid_player` marks whoever just let the turn go (a dismissed
    /// offeree); they are passed over where feasible, exactly like the
    /// player of the previous turn. Quiet no-op when the game no longer
    /// accepts turns, when another worker is already driving the head turn,
    /// or when no member is eligible right now (the turn stays available
    /// for the next trigger).
    pub(crate) async fn offer_next_turn(
        &self,
        game_id: &GameId,
        avoid_player: Option<&scrawl_types::PlayerId>,
        intents: &mut Vec<Intent>,
    ) -> Result<(), DomainError> {
        let game = self.repo.game(game_id).await?;
        if !game.status.accepts_turns() {
            debug!(game = %game_id, status = %game.status, "not offering; game closed to turns");
            return Ok(());
        }

        let (pattern, profile) = self.game_rules(&game).await?;
        let now = self.clock.now();

        let head = match self.repo.head_turn(game_id).await? {
            Some(head) => head,
            None => match self.create_head_turn(&game, &pattern, now).await? {
                Some(head) => head,
                // Lost a creation race; whoever won is driving the turn.
                None => return Ok(()),
            },
        };
        if head.status != TurnStatus::Available {
            debug!(turn = %head.id, status = %head.status, "head turn already in flight");
            return Ok(());
        }

        match &game.origin {
            // Pull model: the turn waits for a player to arrive.
            GameOrigin::OnDemand { .. } => Ok(()),
            GameOrigin::Season { season_id } => {
                self.offer_to_season_member(
                    &game,
                    season_id,
                    head,
                    &profile,
                    avoid_player,
                    now,
                    intents,
                )
                .await
            }
        }
    }

    async fn create_head_turn(
        &self,
        game: &Game,
        pattern: &TurnPattern,
        now: DateTime<Utc>,
    ) -> Result<Option<Turn>, DomainError> {
        let terminal = self.repo.terminal_turns(&game.id).await?;
        let turn_number = terminal.last().map(|t| t.turn_number).unwrap_or(0) + 1;
        let previous_turn_id = terminal.last().map(|t| t.id.clone());

        let turn = Turn::available(
            TurnId::new(self.ids.next()),
            game.id.clone(),
            turn_number,
            pattern.kind_at(turn_number),
            previous_turn_id,
            now,
        );
        match self.repo.insert_turn(turn.clone()).await {
            Ok(()) => Ok(Some(turn)),
            Err(error) if error.is_stale() => Ok(None),
            Err(error) => Err(error),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn offer_to_season_member(
        &self,
        game: &Game,
        season_id: &scrawl_types::SeasonId,
        head: Turn,
        profile: &TimeoutProfile,
        avoid_player: Option<&scrawl_types::PlayerId>,
        now: DateTime<Utc>,
        intents: &mut Vec<Intent>,
    ) -> Result<(), DomainError> {
        let members = self.repo.season_members(season_id).await?;
        let counts = self.repo.season_terminal_turn_counts(season_id).await?;

        let mut candidates = Vec::with_capacity(members.len());
        for member in members {
            let player = self.repo.player(&member.player_id).await?;
            let busy = self.repo.player_has_pending_turn(&member.player_id).await?;
            candidates.push(offering::SeasonCandidate {
                completed_turns: counts.get(&member.player_id).copied().unwrap_or(0),
                player_id: member.player_id,
                banned: player.is_banned(),
                has_pending_turn: busy,
                joined_at: member.joined_at,
            });
        }

        let terminal = self.repo.terminal_turns(&game.id).await?;
        let previous_player = avoid_player
            .cloned()
            .or_else(|| terminal.last().and_then(|t| t.player_id.clone()));
        let Some(chosen) = offering::select_candidate(&candidates, previous_player.as_ref())
        else {
            warn!(game = %game.id, "no eligible member to offer to; turn stays available");
            return Ok(());
        };

        let offered = machine::offer(&head, &chosen, now)?;
        let offered = match self.repo.update_turn(TurnStatus::Available, offered).await {
            Ok(offered) => offered,
            Err(error) if error.is_stale() => {
                debug!(turn = %head.id, "turn offered concurrently; leaving it be");
                return Ok(());
            }
            Err(error) => return Err(error),
        };

        if let Err(error) = self.timeouts.on_offer(&offered, profile, now).await {
            warn!(turn = %offered.id, %error, "claim timers failed to arm; withdrawing offer");
            if let Ok(dismissed) = machine::dismiss(&offered, now) {
                let _ = self.repo.update_turn(TurnStatus::Offered, dismissed).await;
            }
            return Err(error);
        }

        if let Some(deadline) = deadlines::claim_deadline(&offered, profile) {
            intents.push(Intent::TurnOffered {
                player_id: chosen,
                turn_id: offered.id,
                deadline,
            });
        }
        Ok(())
    }
}
