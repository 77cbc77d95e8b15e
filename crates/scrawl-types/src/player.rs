use crate::ids::PlayerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered player.
///
/// `external_user_id` is the chat-platform identity and is unique across
/// players; `id` is the engine's own key. A set `banned_at` makes the player
/// ineligible for offers, joins, and game creation until cleared.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub external_user_id: String,
    pub display_name: String,
    pub banned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Player {
    pub fn is_banned(&self) -> bool {
        self.banned_at.is_some()
    }
}
