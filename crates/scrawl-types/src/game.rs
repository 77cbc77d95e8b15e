use crate::ids::{ConfigId, GameId, GuildId, PlayerId, SeasonId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Game lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameStatus {
    Setup,
    /// Created, waiting for a second participant.
    Pending,
    Active,
    /// Terminal.
    Completed,
    /// Terminal.
    Terminated,
    /// Frozen by a content flag until an admin resolves it.
    Paused,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Terminated)
    }

    /// States in which turns may be offered, claimed, and submitted.
    pub fn accepts_turns(self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Terminated => "terminated",
            Self::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// What spawned a game, and therefore which timeout and offering policy
/// applies to it. Season and on-demand games are one entity with a tagged
/// origin, not two entity types.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOrigin {
    Season { season_id: SeasonId },
    OnDemand {
        creator_id: PlayerId,
        guild_id: GuildId,
        config_id: ConfigId,
    },
}

/// One chain of alternating contributions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub status: GameStatus,
    pub origin: GameOrigin,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Advanced on every accepted claim, submit, and skip. Drives staleness.
    pub last_activity_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Game {
    pub fn is_on_demand(&self) -> bool {
        matches!(self.origin, GameOrigin::OnDemand { .. })
    }

    pub fn season_id(&self) -> Option<&SeasonId> {
        match &self.origin {
            GameOrigin::Season { season_id } => Some(season_id),
            GameOrigin::OnDemand { .. } => None,
        }
    }

    pub fn guild_id(&self) -> Option<&GuildId> {
        match &self.origin {
            GameOrigin::Season { .. } => None,
            GameOrigin::OnDemand { guild_id, .. } => Some(guild_id),
        }
    }
}
