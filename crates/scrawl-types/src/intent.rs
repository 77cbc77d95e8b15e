use crate::duration::CompactDuration;
use crate::ids::{GameId, PlayerId, SeasonId, TurnId};
use crate::turn::TurnContent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A side effect the coordinator wants performed after its transaction
/// commits.
///
/// Intents are collected while state changes are applied and handed to the
/// notification port only once the changes are durable, so delivery latency
/// or failure can never roll back (or deadlock) a committed transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    /// A turn was offered to a player with a claim deadline.
    TurnOffered {
        player_id: PlayerId,
        turn_id: TurnId,
        deadline: DateTime<Utc>,
    },
    /// A claim or submission deadline is approaching.
    TurnWarning {
        player_id: PlayerId,
        turn_id: TurnId,
        remaining: CompactDuration,
    },
    /// A submission was accepted.
    TurnSubmittedAck { player_id: PlayerId },
    /// A pending turn was skipped (deadline or decline).
    TurnSkipped { player_id: PlayerId },
    /// The game chain terminated; transcript is the ordered completed
    /// content.
    GameCompleted {
        game_id: GameId,
        transcript: Vec<TurnContent>,
    },
    /// Every game in the season has finished.
    SeasonCompleted { season_id: SeasonId },
    /// A completed contribution was flagged and the game paused.
    ContentFlagged {
        turn_id: TurnId,
        flagger_id: PlayerId,
    },
    /// An on-demand game was deleted because its first turn timed out
    /// before any content existed.
    GameDeletedInitialTurnTimeout { player_id: PlayerId },
}

impl Intent {
    /// Variant name as a static string for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TurnOffered { .. } => "TurnOffered",
            Self::TurnWarning { .. } => "TurnWarning",
            Self::TurnSubmittedAck { .. } => "TurnSubmittedAck",
            Self::TurnSkipped { .. } => "TurnSkipped",
            Self::GameCompleted { .. } => "GameCompleted",
            Self::SeasonCompleted { .. } => "SeasonCompleted",
            Self::ContentFlagged { .. } => "ContentFlagged",
            Self::GameDeletedInitialTurnTimeout { .. } => "GameDeletedInitialTurnTimeout",
        }
    }
}
