use crate::ids::{GameId, PlayerId, TurnId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two kinds of contribution a turn can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContributionKind {
    Writing,
    Drawing,
}

impl ContributionKind {
    /// Variant name as a static string for error messages and logging.
    pub fn name(self) -> &'static str {
        match self {
            Self::Writing => "writing",
            Self::Drawing => "drawing",
        }
    }
}

impl fmt::Display for ContributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Turn lifecycle states.
///
/// `Available` and `Offered` and `Pending` are the open states; a game has at
/// most one turn in an open state at a time (its head turn). `Completed` and
/// `Skipped` are terminal. `Flagged` is semi-terminal: an admin may resolve
/// it, but nothing in this engine ever transitions out of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurnStatus {
    Available,
    Offered,
    Pending,
    Completed,
    Skipped,
    Flagged,
}

impl TurnStatus {
    /// Open states: the turn still flows toward a contribution.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Available | Self::Offered | Self::Pending)
    }

    /// Terminal dispositions that count toward completion rules.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Available => "available",
            Self::Offered => "offered",
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Flagged => "flagged",
        };
        f.write_str(name)
    }
}

/// A submitted contribution. Exactly one representation per turn: writing
/// turns carry text, drawing turns carry an image URL (images are referenced,
/// never hosted).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnContent {
    Text(String),
    Image(String),
}

impl TurnContent {
    /// The contribution kind this content satisfies.
    pub fn kind(&self) -> ContributionKind {
        match self {
            Self::Text(_) => ContributionKind::Writing,
            Self::Image(_) => ContributionKind::Drawing,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Image(url) => url.trim().is_empty(),
        }
    }
}

/// One contribution slot in a game chain.
///
/// `turn_number` is 1-based and dense within the game. `previous_turn_id`
/// links the chain back to turn 1 (which has none). A turn in `Available`
/// has no player; every other state carries the acting player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub game_id: GameId,
    pub turn_number: u32,
    pub kind: ContributionKind,
    pub status: TurnStatus,
    pub player_id: Option<PlayerId>,
    pub content: Option<TurnContent>,
    pub previous_turn_id: Option<TurnId>,
    pub offered_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub skipped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Turn {
    /// A fresh unassigned turn in `Available`.
    pub fn available(
        id: TurnId,
        game_id: GameId,
        turn_number: u32,
        kind: ContributionKind,
        previous_turn_id: Option<TurnId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            game_id,
            turn_number,
            kind,
            status: TurnStatus::Available,
            player_id: None,
            content: None,
            previous_turn_id,
            offered_at: None,
            claimed_at: None,
            completed_at: None,
            skipped_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `player` is the turn's current assignee.
    pub fn is_assigned_to(&self, player: &PlayerId) -> bool {
        self.player_id.as_ref() == Some(player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_terminal_partition_the_status_space() {
        use TurnStatus::*;
        for status in [Available, Offered, Pending, Completed, Skipped, Flagged] {
            // Flagged is neither open nor terminal.
            assert!(
                !(status.is_open() && status.is_terminal()),
                "{status} is both open and terminal"
            );
        }
        assert!(!Flagged.is_open());
        assert!(!Flagged.is_terminal());
    }

    #[test]
    fn content_kind_matches_representation() {
        assert_eq!(
            TurnContent::Text("a cat".into()).kind(),
            ContributionKind::Writing
        );
        assert_eq!(
            TurnContent::Image("https://img/u".into()).kind(),
            ContributionKind::Drawing
        );
        assert!(TurnContent::Text("  ".into()).is_empty());
        assert!(!TurnContent::Image("https://img/u".into()).is_empty());
    }
}
