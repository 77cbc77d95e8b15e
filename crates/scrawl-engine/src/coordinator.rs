//! The game coordinator: every command and scheduler callback enters here.
//!
//! Each entry point follows the same shape: load, apply a pure transition
//! from `scrawl_rules`, persist it with a conditional update, adjust timers,
//! collect intents, and only then, after everything is durable, hand the
//! intents to the notification port. A lost conditional update is retried
//! once against fresh state; losing twice surfaces as a precondition
//! violation, since the world has genuinely moved on.

use crate::channel::ChannelConfigPort;
use crate::clock::Clock;
use crate::idgen::IdGen;
use crate::notify::{ErrorBus, NotificationFailure, NotificationPort, OfferAction};
use crate::repo::Repository;
use crate::scheduler::Scheduler;
use crate::timeout::TurnTimeoutService;
use chrono::{DateTime, Utc};
use scrawl_rules::{completion, deadlines, machine};
use scrawl_types::{
    CompactDuration, DomainError, Game, GameConfig, GameId, GameOrigin, GameStatus, GuildId,
    Intent, Player, PlayerId, Season, SeasonConfig, SeasonId, SeasonMembership, SeasonStatus,
    TimeoutProfile, Turn, TurnContent, TurnId, TurnPattern, TurnStatus,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Construction-time knobs.
#[derive(Clone, Copy, Debug, Default)]
pub struct CoordinatorOptions {
    /// Let a season start below its configured `min_players`. Intended for
    /// development deployments; the host decides, the engine never reads the
    /// environment.
    pub allow_undersized_seasons: bool,
}

pub struct GameCoordinator {
    pub(crate) repo: Arc<dyn Repository>,
    pub(crate) scheduler: Arc<Scheduler>,
    pub(crate) timeouts: TurnTimeoutService,
    pub(crate) notifier: Arc<dyn NotificationPort>,
    pub(crate) channels: Arc<dyn ChannelConfigPort>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGen>,
    pub(crate) options: CoordinatorOptions,
    pub(crate) error_bus: ErrorBus,
}

impl GameCoordinator {
    pub fn new(
        repo: Arc<dyn Repository>,
        scheduler: Arc<Scheduler>,
        notifier: Arc<dyn NotificationPort>,
        channels: Arc<dyn ChannelConfigPort>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGen>,
        options: CoordinatorOptions,
    ) -> Arc<Self> {
        let (error_bus, _) = tokio::sync::broadcast::channel(64);
        Arc::new(Self {
            repo,
            timeouts: TurnTimeoutService::new(Arc::clone(&scheduler)),
            scheduler,
            notifier,
            channels,
            clock,
            ids,
            options,
            error_bus,
        })
    }

    /// Subscribe to notification delivery failures.
    pub fn subscribe_errors(&self) -> tokio::sync::broadcast::Receiver<NotificationFailure> {
        self.error_bus.subscribe()
    }

    // ── players ──

    /// Look up a player by platform identity, creating the record on first
    /// contact.
    pub async fn register_player(
        &self,
        external_user_id: &str,
        display_name: &str,
    ) -> Result<Player, DomainError> {
        if let Some(existing) = self.repo.player_by_external_id(external_user_id).await? {
            return Ok(existing);
        }
        let now = self.clock.now();
        let player = Player {
            id: PlayerId::new(self.ids.next()),
            external_user_id: external_user_id.to_string(),
            display_name: display_name.to_string(),
            banned_at: None,
            created_at: now,
        };
        self.repo.insert_player(player.clone()).await?;
        info!(player = %player.id, "registered player");
        Ok(player)
    }

    pub async fn ban_player(&self, player_id: &PlayerId) -> Result<Player, DomainError> {
        let mut player = self.repo.player(player_id).await?;
        player.banned_at = Some(self.clock.now());
        self.repo.update_player(player).await
    }

    pub async fn unban_player(&self, player_id: &PlayerId) -> Result<Player, DomainError> {
        let mut player = self.repo.player(player_id).await?;
        player.banned_at = None;
        self.repo.update_player(player).await
    }

    // ── seasons ──

    /// Open a new season with the creator as its first member.
    pub async fn create_season(
        &self,
        creator_id: &PlayerId,
        config: SeasonConfig,
        guild_id: Option<GuildId>,
    ) -> Result<Season, DomainError> {
        let creator = self.repo.player(creator_id).await?;
        if creator.is_banned() {
            return Err(DomainError::precondition("player-banned"));
        }

        let now = self.clock.now();
        self.repo.upsert_season_config(config.clone()).await?;
        let season = Season {
            id: SeasonId::new(self.ids.next()),
            status: SeasonStatus::Open,
            creator_id: creator_id.clone(),
            config_id: config.id,
            guild_id,
            created_at: now,
            updated_at: now,
        };
        self.repo.insert_season(season.clone()).await?;
        self.repo
            .add_season_member(SeasonMembership {
                season_id: season.id.clone(),
                player_id: creator_id.clone(),
                joined_at: now,
            })
            .await?;
        info!(season = %season.id, "season opened");
        Ok(season)
    }

    pub async fn join_season(
        &self,
        season_id: &SeasonId,
        player_id: &PlayerId,
    ) -> Result<(), DomainError> {
        let season = self.repo.season(season_id).await?;
        if season.status != SeasonStatus::Open {
            return Err(DomainError::precondition("season-not-open"));
        }
        let player = self.repo.player(player_id).await?;
        if player.is_banned() {
            return Err(DomainError::precondition("player-banned"));
        }

        let config = self.repo.season_config(&season.config_id).await?;
        let members = self.repo.season_members(season_id).await?;
        if members.iter().any(|m| m.player_id == *player_id) {
            return Err(DomainError::precondition("already-a-member"));
        }
        if members.len() as u32 >= config.max_players {
            return Err(DomainError::precondition("season-full"));
        }

        self.repo
            .add_season_member(SeasonMembership {
                season_id: season_id.clone(),
                player_id: player_id.clone(),
                joined_at: self.clock.now(),
            })
            .await?;
        Ok(())
    }

    /// Activate a season and seed one game per member, offering each game's
    /// first turn to the member who owns the chain.
    pub async fn start_season(
        &self,
        season_id: &SeasonId,
        caller: &PlayerId,
    ) -> Result<Vec<Game>, DomainError> {
        let season = self.repo.season(season_id).await?;
        if season.status != SeasonStatus::Open {
            return Err(DomainError::precondition("season-not-open"));
        }
        if season.creator_id != *caller {
            return Err(DomainError::precondition("not-season-creator"));
        }

        let config = self.repo.season_config(&season.config_id).await?;
        let members = self.repo.season_members(season_id).await?;
        if (members.len() as u32) < config.min_players && !self.options.allow_undersized_seasons {
            return Err(DomainError::precondition("not-enough-players"));
        }

        let now = self.clock.now();
        let mut activated = season.clone();
        activated.status = SeasonStatus::Active;
        activated.updated_at = now;
        self.repo
            .update_season(SeasonStatus::Open, activated)
            .await?;

        let mut games = Vec::with_capacity(members.len());
        let mut intents = Vec::new();
        for member in &members {
            let game = self
                .seed_season_game(&season, &config, member, now, &mut intents)
                .await?;
            games.push(game);
        }
        info!(season = %season_id, games = games.len(), "season started");

        self.dispatch(intents).await;
        Ok(games)
    }

    async fn seed_season_game(
        &self,
        season: &Season,
        config: &SeasonConfig,
        owner: &SeasonMembership,
        now: DateTime<Utc>,
        intents: &mut Vec<Intent>,
    ) -> Result<Game, DomainError> {
        let game = Game {
            id: GameId::new(self.ids.next()),
            status: GameStatus::Active,
            origin: GameOrigin::Season {
                season_id: season.id.clone(),
            },
            created_at: now,
            updated_at: now,
            last_activity_at: now,
            completed_at: None,
        };
        self.repo.insert_game(game.clone()).await?;

        let available = Turn::available(
            TurnId::new(self.ids.next()),
            game.id.clone(),
            1,
            config.turn_pattern.kind_at(1),
            None,
            now,
        );
        let offered = machine::offer(&available, &owner.player_id, now)?;
        self.repo.insert_turn(offered.clone()).await?;

        if let Err(error) = self
            .timeouts
            .on_offer(&offered, &config.timeouts, now)
            .await
        {
            // The offer must not outlive its enforcer; unwind this game.
            warn!(game = %game.id, %error, "claim timers failed to arm; unwinding seed game");
            let _ = self.repo.delete_game(&game.id).await;
            return Err(error);
        }

        if let Some(deadline) = deadlines::claim_deadline(&offered, &config.timeouts) {
            intents.push(Intent::TurnOffered {
                player_id: owner.player_id.clone(),
                turn_id: offered.id.clone(),
                deadline,
            });
        }
        Ok(game)
    }

    pub async fn terminate_season(&self, season_id: &SeasonId) -> Result<(), DomainError> {
        let season = self.repo.season(season_id).await?;
        if season.status.is_terminal() {
            return Ok(());
        }

        let mut terminated = season.clone();
        terminated.status = SeasonStatus::Terminated;
        terminated.updated_at = self.clock.now();
        self.repo
            .update_season(season.status, terminated)
            .await?;

        for game in self.repo.season_games(season_id).await? {
            if !game.status.is_terminal() {
                self.terminate_game(&game.id).await?;
            }
        }
        info!(season = %season_id, "season terminated");
        Ok(())
    }

    // ── on-demand games ──

    /// Start an on-demand game. The creator's writing turn exists
    /// immediately as pending (it is theirs, not offered) with submission
    /// timers armed.
    pub async fn create_on_demand_game(
        &self,
        creator_id: &PlayerId,
        guild_id: &GuildId,
    ) -> Result<Game, DomainError> {
        let creator = self.repo.player(creator_id).await?;
        if creator.is_banned() {
            return Err(DomainError::precondition("player-banned"));
        }

        let config = self.channels.game_config(guild_id).await?;
        self.repo.upsert_game_config(config.clone()).await?;

        let now = self.clock.now();
        let game = Game {
            id: GameId::new(self.ids.next()),
            status: GameStatus::Pending,
            origin: GameOrigin::OnDemand {
                creator_id: creator_id.clone(),
                guild_id: guild_id.clone(),
                config_id: config.id.clone(),
            },
            created_at: now,
            updated_at: now,
            last_activity_at: now,
            completed_at: None,
        };
        self.repo.insert_game(game.clone()).await?;

        // Turn 1 skips the offer/claim dance entirely.
        let mut first = Turn::available(
            TurnId::new(self.ids.next()),
            game.id.clone(),
            1,
            config.turn_pattern.kind_at(1),
            None,
            now,
        );
        first.status = TurnStatus::Pending;
        first.player_id = Some(creator_id.clone());
        first.claimed_at = Some(now);
        self.repo.insert_turn(first.clone()).await?;

        if let Err(error) = self.timeouts.on_claim(&first, &config.timeouts, now).await {
            warn!(game = %game.id, %error, "submission timers failed to arm; unwinding game");
            let _ = self.repo.delete_game(&game.id).await;
            return Err(error);
        }

        info!(game = %game.id, creator = %creator_id, "on-demand game created");
        Ok(game)
    }

    /// Take the best available turn across the guild's on-demand games.
    ///
    /// Candidate games are those with an available head turn whose return
    /// policy admits the player, ordered by nearest stale expiry and then
    /// age. The turn is claimed atomically, available straight to pending,
    /// so two joiners racing for the same turn resolve by conditional
    /// update, and the loser simply falls through to the next candidate.
    pub async fn join_on_demand_game(
        &self,
        player_id: &PlayerId,
        guild_id: &GuildId,
    ) -> Result<Turn, DomainError> {
        let player = self.repo.player(player_id).await?;
        if player.is_banned() {
            return Err(DomainError::precondition("player-banned"));
        }

        let games = self
            .repo
            .on_demand_games_in_guild(guild_id, &[GameStatus::Pending, GameStatus::Active])
            .await?;

        let now = self.clock.now();
        let mut blocked_by_policy = false;
        let mut candidates = Vec::new();
        for game in games {
            let Some(head) = self.repo.head_turn(&game.id).await? else {
                continue;
            };
            if head.status != TurnStatus::Available {
                continue;
            }
            let config = self.on_demand_config(&game).await?;
            let terminal = self.repo.terminal_turns(&game.id).await?;
            let policy = scrawl_rules::ReturnPolicy {
                return_count: config.return_count,
                return_cooldown: config.return_cooldown,
            };
            if !scrawl_rules::return_allows(policy, &terminal, player_id) {
                debug!(game = %game.id, player = %player_id, "return policy blocks join");
                blocked_by_policy = true;
                continue;
            }
            let expiry = game.last_activity_at + config.stale_timeout.as_duration();
            candidates.push((expiry, game, head, config));
        }
        candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.created_at.cmp(&b.1.created_at)));

        for (_, game, head, config) in candidates {
            let offered = machine::offer(&head, player_id, now)?;
            let claimed = machine::claim(&offered, player_id, now)?;
            match self.repo.update_turn(TurnStatus::Available, claimed).await {
                Ok(claimed) => {
                    if let Err(error) = self
                        .timeouts
                        .on_claim(&claimed, &config.timeouts, now)
                        .await
                    {
                        warn!(turn = %claimed.id, %error, "submission timers failed to arm; releasing turn");
                        let _ = self.repo.update_turn(TurnStatus::Pending, head).await;
                        return Err(error);
                    }

                    let mut updated = game.clone();
                    if updated.status == GameStatus::Pending {
                        updated.status = GameStatus::Active;
                    }
                    updated.last_activity_at = now;
                    updated.updated_at = now;
                    if let Err(error) = self.repo.update_game(game.status, updated).await {
                        debug!(game = %game.id, %error, "game row moved during join; leaving as-is");
                    }

                    info!(turn = %claimed.id, player = %player_id, "turn claimed via join");
                    return Ok(claimed);
                }
                Err(error) if error.is_stale() => continue,
                Err(error) => return Err(error),
            }
        }

        if blocked_by_policy {
            return Err(DomainError::precondition("return-cooldown"));
        }
        Err(DomainError::precondition("no-available-turn"))
    }

    // ── turn commands ──

    /// Accept an offered turn (season games).
    pub async fn claim_turn(
        &self,
        turn_id: &TurnId,
        player_id: &PlayerId,
    ) -> Result<Turn, DomainError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_claim(turn_id, player_id).await {
                Err(error) if error.is_stale() && attempt == 1 => continue,
                Err(error) if error.is_stale() => {
                    return Err(DomainError::precondition("turn-state-changed"));
                }
                other => return other,
            }
        }
    }

    async fn try_claim(
        &self,
        turn_id: &TurnId,
        player_id: &PlayerId,
    ) -> Result<Turn, DomainError> {
        let turn = self.repo.turn(turn_id).await?;
        let game = self.repo.game(&turn.game_id).await?;
        if !game.status.accepts_turns() {
            return Err(DomainError::precondition("game-not-active"));
        }

        let now = self.clock.now();
        let claimed = machine::claim(&turn, player_id, now)?;
        let claimed = self.repo.update_turn(TurnStatus::Offered, claimed).await?;

        let (_, profile) = self.game_rules(&game).await?;
        if let Err(error) = self.timeouts.on_claim(&claimed, &profile, now).await {
            warn!(turn = %turn_id, %error, "submission timers failed to arm; releasing claim");
            let _ = self.repo.update_turn(TurnStatus::Pending, turn).await;
            return Err(error);
        }

        self.touch_game(&game, now).await;
        Ok(claimed)
    }

    /// Record a contribution, then either finish the game or move it
    /// forward.
    pub async fn submit_turn(
        &self,
        turn_id: &TurnId,
        player_id: &PlayerId,
        content: TurnContent,
    ) -> Result<Turn, DomainError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_submit(turn_id, player_id, content.clone()).await {
                Err(error) if error.is_stale() && attempt == 1 => continue,
                Err(error) if error.is_stale() => {
                    return Err(DomainError::precondition("turn-state-changed"));
                }
                other => return other,
            }
        }
    }

    async fn try_submit(
        &self,
        turn_id: &TurnId,
        player_id: &PlayerId,
        content: TurnContent,
    ) -> Result<Turn, DomainError> {
        let turn = self.repo.turn(turn_id).await?;
        let game = self.repo.game(&turn.game_id).await?;
        if !game.status.accepts_turns() {
            return Err(DomainError::precondition("game-not-active"));
        }

        let now = self.clock.now();
        let submitted = machine::submit(&turn, player_id, content, now)?;
        let submitted = self.repo.update_turn(TurnStatus::Pending, submitted).await?;
        info!(turn = %turn_id, player = %player_id, "turn submitted");

        if let Err(error) = self.timeouts.on_settle(turn_id).await {
            warn!(turn = %turn_id, %error, "failed to cancel deadline jobs; handlers will no-op");
        }
        let game = self.touch_game(&game, now).await;

        let mut intents = vec![Intent::TurnSubmittedAck {
            player_id: player_id.clone(),
        }];
        self.advance_or_complete(&game, &mut intents).await?;
        self.dispatch(intents).await;
        Ok(submitted)
    }

    /// Terminal disposition of a pending turn: deadline expiry or an
    /// explicit decline.
    pub async fn skip_turn(&self, turn_id: &TurnId) -> Result<(), DomainError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_skip(turn_id).await {
                Err(error) if error.is_stale() && attempt == 1 => continue,
                Err(error) if error.is_stale() => {
                    return Err(DomainError::precondition("turn-state-changed"));
                }
                other => return other,
            }
        }
    }

    async fn try_skip(&self, turn_id: &TurnId) -> Result<(), DomainError> {
        let turn = self.repo.turn(turn_id).await?;
        let game = self.repo.game(&turn.game_id).await?;
        if !game.status.accepts_turns() {
            return Err(DomainError::precondition("game-not-active"));
        }

        let now = self.clock.now();
        let skipped = machine::skip(&turn, now)?;
        let skipped = self.repo.update_turn(TurnStatus::Pending, skipped).await?;
        info!(turn = %turn_id, "turn skipped");

        if let Err(error) = self.timeouts.on_settle(turn_id).await {
            warn!(turn = %turn_id, %error, "failed to cancel deadline jobs; handlers will no-op");
        }

        // An on-demand game whose very first turn died produced no content;
        // it is removed outright rather than left in the guild's index.
        if game.is_on_demand() && skipped.turn_number == 1 {
            let mut intents = Vec::new();
            if let Some(player_id) = skipped.player_id.clone() {
                intents.push(Intent::GameDeletedInitialTurnTimeout { player_id });
            }
            self.scheduler.cancel_jobs_for_game(&game.id).await?;
            self.repo.delete_game(&game.id).await?;
            info!(game = %game.id, "on-demand game deleted after initial turn timeout");
            self.dispatch(intents).await;
            return Ok(());
        }

        let game = self.touch_game(&game, now).await;
        let mut intents = Vec::new();
        if let Some(player_id) = skipped.player_id.clone() {
            intents.push(Intent::TurnSkipped { player_id });
        }
        self.advance_or_complete(&game, &mut intents).await?;
        self.dispatch(intents).await;
        Ok(())
    }

    /// Flag a completed contribution and freeze the game for review.
    pub async fn flag_turn(
        &self,
        turn_id: &TurnId,
        flagger_id: &PlayerId,
    ) -> Result<(), DomainError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_flag(turn_id, flagger_id).await {
                Err(error) if error.is_stale() && attempt == 1 => continue,
                Err(error) if error.is_stale() => {
                    return Err(DomainError::precondition("turn-state-changed"));
                }
                other => return other,
            }
        }
    }

    async fn try_flag(
        &self,
        turn_id: &TurnId,
        flagger_id: &PlayerId,
    ) -> Result<(), DomainError> {
        self.repo.player(flagger_id).await?;
        let turn = self.repo.turn(turn_id).await?;
        let game = self.repo.game(&turn.game_id).await?;

        let now = self.clock.now();
        let flagged = machine::flag(&turn, now)?;
        self.repo.update_turn(TurnStatus::Completed, flagged).await?;

        if game.status.accepts_turns() {
            let mut paused = game.clone();
            paused.status = GameStatus::Paused;
            paused.updated_at = now;
            if let Err(error) = self.repo.update_game(game.status, paused).await {
                debug!(game = %game.id, %error, "game moved while pausing for flag");
            }
        }
        info!(turn = %turn_id, flagger = %flagger_id, "turn flagged; game paused");

        self.dispatch(vec![Intent::ContentFlagged {
            turn_id: turn_id.clone(),
            flagger_id: flagger_id.clone(),
        }])
        .await;
        Ok(())
    }

    pub async fn terminate_game(&self, game_id: &GameId) -> Result<(), DomainError> {
        let game = self.repo.game(game_id).await?;
        if game.status.is_terminal() {
            return Ok(());
        }

        let mut terminated = game.clone();
        terminated.status = GameStatus::Terminated;
        terminated.updated_at = self.clock.now();
        self.repo.update_game(game.status, terminated).await?;
        self.scheduler.cancel_jobs_for_game(game_id).await?;
        info!(game = %game_id, "game terminated");
        Ok(())
    }

    /// Complete a game if its completion rule holds right now. Idempotent:
    /// re-invocation on a completed game is a no-op. Returns whether this
    /// call performed the completion.
    pub async fn complete_game(&self, game_id: &GameId) -> Result<bool, DomainError> {
        let game = self.repo.game(game_id).await?;
        if !game.status.accepts_turns() {
            return Ok(false);
        }
        if self.evaluate_completion(&game).await?.is_none() {
            return Ok(false);
        }

        let mut intents = Vec::new();
        let completed = self.apply_completion(&game, &mut intents).await?;
        self.dispatch(intents).await;
        Ok(completed)
    }

    /// Ordered completed content of a game's chain.
    pub async fn game_transcript(&self, game_id: &GameId) -> Result<Vec<TurnContent>, DomainError> {
        let terminal = self.repo.terminal_turns(game_id).await?;
        Ok(terminal
            .into_iter()
            .filter(|t| t.status == TurnStatus::Completed)
            .filter_map(|t| t.content)
            .collect())
    }

    // ── completion plumbing ──

    pub(crate) async fn advance_or_complete(
        &self,
        game: &Game,
        intents: &mut Vec<Intent>,
    ) -> Result<(), DomainError> {
        if self.evaluate_completion(game).await?.is_some() {
            self.apply_completion(game, intents).await?;
        } else {
            self.offer_next_turn(&game.id, None, intents).await?;
        }
        Ok(())
    }

    async fn evaluate_completion(
        &self,
        game: &Game,
    ) -> Result<Option<completion::CompletionReason>, DomainError> {
        let terminal = self.repo.terminal_turns(&game.id).await?;
        match &game.origin {
            GameOrigin::Season { season_id } => {
                let members: Vec<PlayerId> = self
                    .repo
                    .season_members(season_id)
                    .await?
                    .into_iter()
                    .map(|m| m.player_id)
                    .collect();
                Ok(completion::season_game_complete(&members, &terminal))
            }
            GameOrigin::OnDemand { .. } => {
                let config = self.on_demand_config(game).await?;
                Ok(completion::on_demand_game_complete(
                    game,
                    &config,
                    terminal.len() as u32,
                    self.clock.now(),
                ))
            }
        }
    }

    async fn apply_completion(
        &self,
        game: &Game,
        intents: &mut Vec<Intent>,
    ) -> Result<bool, DomainError> {
        let now = self.clock.now();

        let fresh = self.repo.game(&game.id).await?;
        if !fresh.status.accepts_turns() {
            return Ok(false);
        }
        let mut completed = fresh.clone();
        completed.status = GameStatus::Completed;
        completed.completed_at = Some(now);
        completed.updated_at = now;
        match self.repo.update_game(fresh.status, completed).await {
            Ok(_) => {}
            Err(error) if error.is_stale() => {
                debug!(game = %game.id, "game completed concurrently");
                return Ok(false);
            }
            Err(error) => return Err(error),
        }

        // A pull-model game can go stale with an untouched available head
        // turn; drop it so the chain ends dense at its last contribution.
        // Completed games spawn no turns, so nothing re-creates it.
        if let Some(head) = self.repo.head_turn(&game.id).await? {
            self.timeouts.on_settle(&head.id).await?;
            self.repo.delete_turn(&head.id).await?;
        }
        self.scheduler.cancel_jobs_for_game(&game.id).await?;
        info!(game = %game.id, "game completed");

        intents.push(Intent::GameCompleted {
            game_id: game.id.clone(),
            transcript: self.game_transcript(&game.id).await?,
        });

        if let GameOrigin::Season { season_id } = &game.origin {
            let games = self.repo.season_games(season_id).await?;
            if completion::season_complete(&games) {
                let season = self.repo.season(season_id).await?;
                if season.status == SeasonStatus::Active {
                    let mut done = season.clone();
                    done.status = SeasonStatus::Completed;
                    done.updated_at = now;
                    match self.repo.update_season(SeasonStatus::Active, done).await {
                        Ok(_) => {
                            info!(season = %season_id, "season completed");
                            intents.push(Intent::SeasonCompleted {
                                season_id: season_id.clone(),
                            });
                        }
                        Err(error) if error.is_stale() => {
                            debug!(season = %season_id, "season completed concurrently");
                        }
                        Err(error) => return Err(error),
                    }
                }
            }
        }
        Ok(true)
    }

    // ── shared helpers ──

    /// Pattern and deadline profile in force for a game, by origin.
    pub(crate) async fn game_rules(
        &self,
        game: &Game,
    ) -> Result<(TurnPattern, TimeoutProfile), DomainError> {
        match &game.origin {
            GameOrigin::Season { season_id } => {
                let season = self.repo.season(season_id).await?;
                let config = self.repo.season_config(&season.config_id).await?;
                Ok((config.turn_pattern, config.timeouts))
            }
            GameOrigin::OnDemand { config_id, .. } => {
                let config = self.repo.game_config(config_id).await?;
                Ok((config.turn_pattern, config.timeouts))
            }
        }
    }

    pub(crate) async fn on_demand_config(&self, game: &Game) -> Result<GameConfig, DomainError> {
        match &game.origin {
            GameOrigin::OnDemand { config_id, .. } => self.repo.game_config(config_id).await,
            GameOrigin::Season { .. } => Err(DomainError::internal(format!(
                "game {} is not on-demand",
                game.id
            ))),
        }
    }

    /// Best-effort `last_activity_at` bump. Returns the freshest game row
    /// available; a lost race here is harmless and never fails the caller.
    async fn touch_game(&self, game: &Game, now: DateTime<Utc>) -> Game {
        let mut touched = game.clone();
        touched.last_activity_at = now;
        touched.updated_at = now;
        match self.repo.update_game(game.status, touched).await {
            Ok(updated) => updated,
            Err(_) => match self.repo.game(&game.id).await {
                Ok(mut fresh) => {
                    fresh.last_activity_at = now;
                    fresh.updated_at = now;
                    match self.repo.update_game(fresh.status, fresh.clone()).await {
                        Ok(updated) => updated,
                        Err(error) => {
                            debug!(game = %game.id, %error, "activity bump lost twice; skipping");
                            fresh
                        }
                    }
                }
                Err(_) => game.clone(),
            },
        }
    }

    // ── notification dispatch (post-commit, best-effort) ──

    pub(crate) async fn dispatch(&self, intents: Vec<Intent>) {
        for intent in intents {
            if let Err(error) = self.deliver(&intent).await {
                warn!(intent = intent.name(), %error, "notification delivery failed");
                let _ = self.error_bus.send(NotificationFailure {
                    intent: intent.name(),
                    reason: error.to_string(),
                });
            }
        }
    }

    async fn deliver(&self, intent: &Intent) -> Result<(), DomainError> {
        match intent {
            Intent::TurnOffered {
                player_id,
                turn_id,
                deadline,
            } => {
                self.notifier
                    .offer(
                        player_id,
                        turn_id,
                        *deadline,
                        &[OfferAction::Claim, OfferAction::Decline],
                    )
                    .await
            }
            Intent::TurnWarning { player_id, .. }
            | Intent::TurnSubmittedAck { player_id }
            | Intent::TurnSkipped { player_id }
            | Intent::GameDeletedInitialTurnTimeout { player_id } => {
                self.notifier.dm(player_id, intent).await
            }
            Intent::GameCompleted { game_id, .. } => {
                let game = self.repo.game(game_id).await?;
                let guild = match &game.origin {
                    GameOrigin::OnDemand { guild_id, .. } => Some(guild_id.clone()),
                    GameOrigin::Season { season_id } => {
                        self.repo.season(season_id).await?.guild_id
                    }
                };
                self.announce_to_completed_channel(guild.as_ref(), intent)
                    .await
            }
            Intent::SeasonCompleted { season_id } => {
                let season = self.repo.season(season_id).await?;
                self.announce_to_completed_channel(season.guild_id.as_ref(), intent)
                    .await
            }
            Intent::ContentFlagged { turn_id, .. } => {
                let turn = self.repo.turn(turn_id).await?;
                let game = self.repo.game(&turn.game_id).await?;
                let Some(guild) = game.guild_id() else {
                    return Ok(());
                };
                match self.channels.admin_channel(guild).await? {
                    Some(channel) => self.notifier.channel_announce(&channel, intent).await,
                    None => Ok(()),
                }
            }
        }
    }

    async fn announce_to_completed_channel(
        &self,
        guild: Option<&GuildId>,
        intent: &Intent,
    ) -> Result<(), DomainError> {
        let Some(guild) = guild else {
            debug!(intent = intent.name(), "no guild attached; announcement skipped");
            return Ok(());
        };
        match self.channels.completed_channel(guild).await? {
            Some(channel) => self.notifier.channel_announce(&channel, intent).await,
            None => Ok(()),
        }
    }

    pub(crate) fn remaining_until(&self, deadline: DateTime<Utc>) -> CompactDuration {
        CompactDuration::new(deadline - self.clock.now())
    }
}
