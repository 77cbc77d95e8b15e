//! In-memory repository.
//!
//! One mutex over the whole state gives every operation the atomicity the
//! trait contract asks for; the conditional updates behave exactly like
//! their SQL counterparts (compare on status, first writer wins). Suitable
//! for tests and single-process deployments.

use crate::repo::{JobOutcome, Repository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scrawl_types::{
    ConfigId, DomainError, Game, GameConfig, GameId, GameStatus, GuildId, JobId, JobStatus, Player,
    PlayerId, ScheduledJob, Season, SeasonConfig, SeasonId, SeasonMembership, SeasonStatus, Turn,
    TurnId, TurnStatus,
};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    players: HashMap<PlayerId, Player>,
    season_configs: HashMap<ConfigId, SeasonConfig>,
    game_configs: HashMap<ConfigId, GameConfig>,
    seasons: HashMap<SeasonId, Season>,
    memberships: Vec<SeasonMembership>,
    games: HashMap<GameId, Game>,
    turns: HashMap<TurnId, Turn>,
    jobs: HashMap<JobId, ScheduledJob>,
}

/// Mutex-guarded map store implementing [`Repository`].
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn insert_player(&self, player: Player) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        if state
            .players
            .values()
            .any(|p| p.external_user_id == player.external_user_id)
        {
            return Err(DomainError::internal(format!(
                "duplicate external user id {}",
                player.external_user_id
            )));
        }
        state.players.insert(player.id.clone(), player);
        Ok(())
    }

    async fn player(&self, id: &PlayerId) -> Result<Player, DomainError> {
        let state = self.state.lock().await;
        state
            .players
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("player", id.as_str()))
    }

    async fn player_by_external_id(&self, external: &str) -> Result<Option<Player>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .players
            .values()
            .find(|p| p.external_user_id == external)
            .cloned())
    }

    async fn update_player(&self, player: Player) -> Result<Player, DomainError> {
        let mut state = self.state.lock().await;
        if !state.players.contains_key(&player.id) {
            return Err(DomainError::not_found("player", player.id.as_str()));
        }
        state.players.insert(player.id.clone(), player.clone());
        Ok(player)
    }

    async fn upsert_season_config(&self, config: SeasonConfig) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        state.season_configs.insert(config.id.clone(), config);
        Ok(())
    }

    async fn season_config(&self, id: &ConfigId) -> Result<SeasonConfig, DomainError> {
        let state = self.state.lock().await;
        state
            .season_configs
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("season config", id.as_str()))
    }

    async fn upsert_game_config(&self, config: GameConfig) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        state.game_configs.insert(config.id.clone(), config);
        Ok(())
    }

    async fn game_config(&self, id: &ConfigId) -> Result<GameConfig, DomainError> {
        let state = self.state.lock().await;
        state
            .game_configs
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("game config", id.as_str()))
    }

    async fn insert_season(&self, season: Season) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        state.seasons.insert(season.id.clone(), season);
        Ok(())
    }

    async fn season(&self, id: &SeasonId) -> Result<Season, DomainError> {
        let state = self.state.lock().await;
        state
            .seasons
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("season", id.as_str()))
    }

    async fn update_season(
        &self,
        expected: SeasonStatus,
        season: Season,
    ) -> Result<Season, DomainError> {
        let mut state = self.state.lock().await;
        let stored = state
            .seasons
            .get(&season.id)
            .ok_or_else(|| DomainError::not_found("season", season.id.as_str()))?;
        if stored.status != expected {
            return Err(DomainError::stale("season", season.id.as_str()));
        }
        state.seasons.insert(season.id.clone(), season.clone());
        Ok(season)
    }

    async fn add_season_member(&self, membership: SeasonMembership) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        if state
            .memberships
            .iter()
            .any(|m| m.season_id == membership.season_id && m.player_id == membership.player_id)
        {
            return Err(DomainError::precondition("already-a-member"));
        }
        state.memberships.push(membership);
        Ok(())
    }

    async fn season_members(&self, id: &SeasonId) -> Result<Vec<SeasonMembership>, DomainError> {
        let state = self.state.lock().await;
        let mut members: Vec<SeasonMembership> = state
            .memberships
            .iter()
            .filter(|m| m.season_id == *id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(members)
    }

    async fn season_games(&self, id: &SeasonId) -> Result<Vec<Game>, DomainError> {
        let state = self.state.lock().await;
        let mut games: Vec<Game> = state
            .games
            .values()
            .filter(|g| g.season_id() == Some(id))
            .cloned()
            .collect();
        games.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(games)
    }

    async fn insert_game(&self, game: Game) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        state.games.insert(game.id.clone(), game);
        Ok(())
    }

    async fn game(&self, id: &GameId) -> Result<Game, DomainError> {
        let state = self.state.lock().await;
        state
            .games
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("game", id.as_str()))
    }

    async fn update_game(&self, expected: GameStatus, game: Game) -> Result<Game, DomainError> {
        let mut state = self.state.lock().await;
        let stored = state
            .games
            .get(&game.id)
            .ok_or_else(|| DomainError::not_found("game", game.id.as_str()))?;
        if stored.status != expected {
            return Err(DomainError::stale("game", game.id.as_str()));
        }
        state.games.insert(game.id.clone(), game.clone());
        Ok(game)
    }

    async fn delete_game(&self, id: &GameId) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        state.games.remove(id);
        state.turns.retain(|_, turn| turn.game_id != *id);
        Ok(())
    }

    async fn on_demand_games_in_guild(
        &self,
        guild: &GuildId,
        statuses: &[GameStatus],
    ) -> Result<Vec<Game>, DomainError> {
        let state = self.state.lock().await;
        let mut games: Vec<Game> = state
            .games
            .values()
            .filter(|g| g.guild_id() == Some(guild) && statuses.contains(&g.status))
            .cloned()
            .collect();
        games.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(games)
    }

    async fn on_demand_games(&self, statuses: &[GameStatus]) -> Result<Vec<Game>, DomainError> {
        let state = self.state.lock().await;
        let mut games: Vec<Game> = state
            .games
            .values()
            .filter(|g| g.is_on_demand() && statuses.contains(&g.status))
            .cloned()
            .collect();
        games.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(games)
    }

    async fn insert_turn(&self, turn: Turn) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        // One open turn per game: the map equivalent of the partial unique
        // index on (game_id) where status is open.
        if turn.status.is_open()
            && state
                .turns
                .values()
                .any(|t| t.game_id == turn.game_id && t.status.is_open())
        {
            return Err(DomainError::stale("game", turn.game_id.as_str()));
        }
        if state
            .turns
            .values()
            .any(|t| t.game_id == turn.game_id && t.turn_number == turn.turn_number)
        {
            return Err(DomainError::internal(format!(
                "duplicate turn number {} in game {}",
                turn.turn_number, turn.game_id
            )));
        }
        state.turns.insert(turn.id.clone(), turn);
        Ok(())
    }

    async fn turn(&self, id: &TurnId) -> Result<Turn, DomainError> {
        let state = self.state.lock().await;
        state
            .turns
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("turn", id.as_str()))
    }

    async fn update_turn(&self, expected: TurnStatus, turn: Turn) -> Result<Turn, DomainError> {
        let mut state = self.state.lock().await;
        let stored = state
            .turns
            .get(&turn.id)
            .ok_or_else(|| DomainError::not_found("turn", turn.id.as_str()))?;
        if stored.status != expected {
            return Err(DomainError::stale("turn", turn.id.as_str()));
        }
        state.turns.insert(turn.id.clone(), turn.clone());
        Ok(turn)
    }

    async fn delete_turn(&self, id: &TurnId) -> Result<(), DomainError> {
        let mut state = self.state.lock().await;
        state.turns.remove(id);
        Ok(())
    }

    async fn head_turn(&self, game: &GameId) -> Result<Option<Turn>, DomainError> {
        let state = self.state.lock().await;
        let mut open: Vec<&Turn> = state
            .turns
            .values()
            .filter(|t| t.game_id == *game && t.status.is_open())
            .collect();
        debug_assert!(
            open.len() <= 1,
            "game {game} has {} open turns, expected at most one",
            open.len()
        );
        Ok(open.pop().cloned())
    }

    async fn terminal_turns(&self, game: &GameId) -> Result<Vec<Turn>, DomainError> {
        let state = self.state.lock().await;
        let mut turns: Vec<Turn> = state
            .turns
            .values()
            .filter(|t| t.game_id == *game && t.status.is_terminal())
            .cloned()
            .collect();
        turns.sort_by_key(|t| t.turn_number);
        Ok(turns)
    }

    async fn player_has_pending_turn(&self, player: &PlayerId) -> Result<bool, DomainError> {
        let state = self.state.lock().await;
        Ok(state.turns.values().any(|t| {
            t.status == TurnStatus::Pending && t.player_id.as_ref() == Some(player)
        }))
    }

    async fn season_terminal_turn_counts(
        &self,
        season: &SeasonId,
    ) -> Result<HashMap<PlayerId, u32>, DomainError> {
        let state = self.state.lock().await;
        let season_games: Vec<&GameId> = state
            .games
            .values()
            .filter(|g| g.season_id() == Some(season))
            .map(|g| &g.id)
            .collect();

        let mut counts: HashMap<PlayerId, u32> = HashMap::new();
        for turn in state.turns.values() {
            if turn.status.is_terminal()
                && season_games.contains(&&turn.game_id)
                && let Some(player) = &turn.player_id
            {
                *counts.entry(player.clone()).or_default() += 1;
            }
        }
        Ok(counts)
    }

    async fn insert_job(&self, job: ScheduledJob) -> Result<bool, DomainError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.jobs.get(&job.id)
            && !existing.status.is_terminal()
        {
            return Ok(false);
        }
        state.jobs.insert(job.id.clone(), job);
        Ok(true)
    }

    async fn job(&self, id: &JobId) -> Result<Option<ScheduledJob>, DomainError> {
        let state = self.state.lock().await;
        Ok(state.jobs.get(id).cloned())
    }

    async fn finish_job(
        &self,
        id: &JobId,
        outcome: JobOutcome,
        at: DateTime<Utc>,
        only_if_created: Option<DateTime<Utc>>,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.lock().await;
        let Some(job) = state.jobs.get_mut(id) else {
            return Ok(false);
        };
        if job.status != JobStatus::Scheduled {
            return Ok(false);
        }
        if let Some(created_at) = only_if_created
            && job.created_at != created_at
        {
            return Ok(false);
        }
        match outcome {
            JobOutcome::Executed => {
                job.status = JobStatus::Executed;
                job.executed_at = Some(at);
            }
            JobOutcome::Failed(reason) => {
                job.status = JobStatus::Failed;
                job.failure_reason = Some(reason);
            }
            JobOutcome::Cancelled => {
                job.status = JobStatus::Cancelled;
            }
        }
        Ok(true)
    }

    async fn scheduled_jobs(&self) -> Result<Vec<ScheduledJob>, DomainError> {
        let state = self.state.lock().await;
        Ok(state
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Scheduled)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use scrawl_types::{ContributionKind, JobKind};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn turn(id: &str, game: &str, number: u32, status: TurnStatus) -> Turn {
        let mut turn = Turn::available(
            TurnId::new(id),
            GameId::new(game),
            number,
            ContributionKind::Writing,
            None,
            at(0),
        );
        turn.status = status;
        if status != TurnStatus::Available {
            turn.player_id = Some(PlayerId::new("alice"));
        }
        turn
    }

    fn job(id: &JobId, fire_at: DateTime<Utc>) -> ScheduledJob {
        ScheduledJob {
            id: id.clone(),
            kind: JobKind::ClaimTimeout,
            fire_at,
            payload: "{}".to_string(),
            status: JobStatus::Scheduled,
            created_at: at(0),
            executed_at: None,
            failure_reason: None,
        }
    }

    #[tokio::test]
    async fn second_open_turn_in_a_game_is_rejected() {
        let repo = MemoryRepository::new();
        repo.insert_turn(turn("t1", "g1", 1, TurnStatus::Pending))
            .await
            .unwrap();

        let err = repo
            .insert_turn(turn("t2", "g1", 2, TurnStatus::Available))
            .await
            .unwrap_err();
        assert!(err.is_stale());

        // A terminal turn plus a new open turn is fine.
        repo.update_turn(TurnStatus::Pending, {
            let mut t = turn("t1", "g1", 1, TurnStatus::Skipped);
            t.skipped_at = Some(at(5));
            t
        })
        .await
        .unwrap();
        repo.insert_turn(turn("t2", "g1", 2, TurnStatus::Available))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn conditional_turn_update_rejects_wrong_expected_status() {
        let repo = MemoryRepository::new();
        repo.insert_turn(turn("t1", "g1", 1, TurnStatus::Pending))
            .await
            .unwrap();

        let err = repo
            .update_turn(TurnStatus::Offered, turn("t1", "g1", 1, TurnStatus::Pending))
            .await
            .unwrap_err();
        assert!(err.is_stale());
    }

    #[tokio::test]
    async fn live_job_id_blocks_reinsert_but_terminal_is_replaced() {
        let repo = MemoryRepository::new();
        let id = JobId::new("turn-timeout-t1");

        assert!(repo.insert_job(job(&id, at(60))).await.unwrap());
        assert!(!repo.insert_job(job(&id, at(120))).await.unwrap());

        assert!(
            repo.finish_job(&id, JobOutcome::Cancelled, at(10), None)
                .await
                .unwrap()
        );
        // Second finish is a no-op: the row is already terminal.
        assert!(
            !repo
                .finish_job(&id, JobOutcome::Executed, at(11), None)
                .await
                .unwrap()
        );

        assert!(repo.insert_job(job(&id, at(120))).await.unwrap());
    }

    #[tokio::test]
    async fn delete_game_cascades_turns() {
        let repo = MemoryRepository::new();
        let game = Game {
            id: GameId::new("g1"),
            status: GameStatus::Pending,
            origin: scrawl_types::GameOrigin::OnDemand {
                creator_id: PlayerId::new("alice"),
                guild_id: GuildId::new("guild"),
                config_id: ConfigId::new("cfg"),
            },
            created_at: at(0),
            updated_at: at(0),
            last_activity_at: at(0),
            completed_at: None,
        };
        repo.insert_game(game).await.unwrap();
        repo.insert_turn(turn("t1", "g1", 1, TurnStatus::Pending))
            .await
            .unwrap();

        repo.delete_game(&GameId::new("g1")).await.unwrap();
        assert!(repo.turn(&TurnId::new("t1")).await.is_err());
        assert!(repo.head_turn(&GameId::new("g1")).await.unwrap().is_none());
    }
}
