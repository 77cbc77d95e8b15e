use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scrawl_types::{
    ConfigId, DomainError, Game, GameConfig, GameId, GameStatus, GuildId, JobId, Player, PlayerId,
    ScheduledJob, Season, SeasonConfig, SeasonId, SeasonMembership, SeasonStatus, Turn, TurnId,
    TurnStatus,
};
use std::collections::HashMap;

/// Terminal outcome applied to a scheduled job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Executed,
    Failed(String),
    Cancelled,
}

/// The persistence surface the engine requires.
///
/// Conditional updates (`update_turn`, `update_game`, `update_season`,
/// `finish_job`) compare the stored status against `expected` and fail with
/// `stale-state` (or return `false`, for jobs) when another writer got there
/// first. That compare-and-set is the engine's linearization point: the rest
/// of a coordinator operation keys off whose conditional update won.
///
/// Implementations must also enforce the structural uniqueness rules the
/// data model relies on: one open (available/offered/pending) turn per game,
/// unique `(game, turn_number)`, unique player `external_user_id`, and one
/// live job row per job id.
#[async_trait]
pub trait Repository: Send + Sync {
    // ── players ──

    async fn insert_player(&self, player: Player) -> Result<(), DomainError>;

    async fn player(&self, id: &PlayerId) -> Result<Player, DomainError>;

    async fn player_by_external_id(&self, external: &str) -> Result<Option<Player>, DomainError>;

    async fn update_player(&self, player: Player) -> Result<Player, DomainError>;

    // ── configs ──

    async fn upsert_season_config(&self, config: SeasonConfig) -> Result<(), DomainError>;

    async fn season_config(&self, id: &ConfigId) -> Result<SeasonConfig, DomainError>;

    async fn upsert_game_config(&self, config: GameConfig) -> Result<(), DomainError>;

    async fn game_config(&self, id: &ConfigId) -> Result<GameConfig, DomainError>;

    // ── seasons ──

    async fn insert_season(&self, season: Season) -> Result<(), DomainError>;

    async fn season(&self, id: &SeasonId) -> Result<Season, DomainError>;

    async fn update_season(
        &self,
        expected: SeasonStatus,
        season: Season,
    ) -> Result<Season, DomainError>;

    async fn add_season_member(&self, membership: SeasonMembership) -> Result<(), DomainError>;

    /// Memberships in join order.
    async fn season_members(&self, id: &SeasonId) -> Result<Vec<SeasonMembership>, DomainError>;

    async fn season_games(&self, id: &SeasonId) -> Result<Vec<Game>, DomainError>;

    // ── games ──

    async fn insert_game(&self, game: Game) -> Result<(), DomainError>;

    async fn game(&self, id: &GameId) -> Result<Game, DomainError>;

    async fn update_game(&self, expected: GameStatus, game: Game) -> Result<Game, DomainError>;

    /// Remove a game and its turns. Used only for on-demand games whose
    /// initial turn timed out before any content existed.
    async fn delete_game(&self, id: &GameId) -> Result<(), DomainError>;

    async fn on_demand_games_in_guild(
        &self,
        guild: &GuildId,
        statuses: &[GameStatus],
    ) -> Result<Vec<Game>, DomainError>;

    async fn on_demand_games(&self, statuses: &[GameStatus]) -> Result<Vec<Game>, DomainError>;

    // ── turns ──

    async fn insert_turn(&self, turn: Turn) -> Result<(), DomainError>;

    async fn turn(&self, id: &TurnId) -> Result<Turn, DomainError>;

    async fn update_turn(&self, expected: TurnStatus, turn: Turn) -> Result<Turn, DomainError>;

    async fn delete_turn(&self, id: &TurnId) -> Result<(), DomainError>;

    /// The game's unique open turn, if one exists.
    async fn head_turn(&self, game: &GameId) -> Result<Option<Turn>, DomainError>;

    /// Completed and skipped turns, ordered by turn number.
    async fn terminal_turns(&self, game: &GameId) -> Result<Vec<Turn>, DomainError>;

    /// Whether the player holds a pending turn in any game.
    async fn player_has_pending_turn(&self, player: &PlayerId) -> Result<bool, DomainError>;

    /// Per-player count of terminal turns across all of a season's games.
    async fn season_terminal_turn_counts(
        &self,
        season: &SeasonId,
    ) -> Result<HashMap<PlayerId, u32>, DomainError>;

    // ── scheduled jobs ──

    /// Record a job. Returns `false` without writing when a live
    /// (scheduled) row already exists under this id; a terminal row under
    /// the same id is replaced, since deterministic ids are reused when the
    /// same turn re-enters a state.
    async fn insert_job(&self, job: ScheduledJob) -> Result<bool, DomainError>;

    async fn job(&self, id: &JobId) -> Result<Option<ScheduledJob>, DomainError>;

    /// Move a job from scheduled to the given terminal outcome. Returns
    /// `false` when the job is missing or already terminal, which is how a
    /// job executes at most once.
    ///
    /// Deterministic ids are reused when a turn re-enters a state, so a
    /// handler that just executed row A must not seal a replacement row B
    /// that was scheduled under the same id while it ran. Passing
    /// `only_if_created` restricts the update to the row with that exact
    /// `created_at`; `None` seals whichever live row is present (the cancel
    /// path, which wants exactly that).
    async fn finish_job(
        &self,
        id: &JobId,
        outcome: JobOutcome,
        at: DateTime<Utc>,
        only_if_created: Option<DateTime<Utc>>,
    ) -> Result<bool, DomainError>;

    /// All live jobs, in no particular order.
    async fn scheduled_jobs(&self) -> Result<Vec<ScheduledJob>, DomainError>;
}
