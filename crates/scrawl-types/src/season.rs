use crate::ids::{ConfigId, GuildId, PlayerId, SeasonId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Season lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeasonStatus {
    Setup,
    /// Accepting members.
    Open,
    /// Games are running.
    Active,
    /// Terminal.
    Completed,
    /// Terminal.
    Terminated,
}

impl SeasonStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Terminated)
    }
}

impl fmt::Display for SeasonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Open => "open",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// A player cohort playing a batch of games under one config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub id: SeasonId,
    pub status: SeasonStatus,
    pub creator_id: PlayerId,
    pub config_id: ConfigId,
    pub guild_id: Option<GuildId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Membership row. `joined_at` participates in offer ordering, so it is part
/// of the data model rather than an audit column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonMembership {
    pub season_id: SeasonId,
    pub player_id: PlayerId,
    pub joined_at: DateTime<Utc>,
}
