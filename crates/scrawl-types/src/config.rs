use crate::duration::CompactDuration;
use crate::error::DomainError;
use crate::ids::ConfigId;
use crate::turn::ContributionKind;
use serde::{Deserialize, Serialize};

/// Timeout and warning offsets shared by season and on-demand configs.
///
/// Warnings are offsets from `now` at scheduling time, not remaining-time
/// thresholds. A missing warning means none is sent for that stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutProfile {
    pub claim_timeout: CompactDuration,
    pub writing_timeout: CompactDuration,
    pub drawing_timeout: CompactDuration,
    pub claim_warning: Option<CompactDuration>,
    pub writing_warning: Option<CompactDuration>,
    pub drawing_warning: Option<CompactDuration>,
}

impl TimeoutProfile {
    /// The submission timeout for a turn of the given kind.
    pub fn submission_timeout(&self, kind: ContributionKind) -> CompactDuration {
        match kind {
            ContributionKind::Writing => self.writing_timeout,
            ContributionKind::Drawing => self.drawing_timeout,
        }
    }

    /// The submission warning offset for a turn of the given kind, if set.
    pub fn submission_warning(&self, kind: ContributionKind) -> Option<CompactDuration> {
        match kind {
            ContributionKind::Writing => self.writing_warning,
            ContributionKind::Drawing => self.drawing_warning,
        }
    }
}

/// Ordered, non-empty cycle of contribution kinds.
///
/// Turn `n` (1-based) asks for `pattern[(n - 1) % len]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ContributionKind>", into = "Vec<ContributionKind>")]
pub struct TurnPattern(Vec<ContributionKind>);

impl TurnPattern {
    pub fn new(kinds: Vec<ContributionKind>) -> Result<Self, DomainError> {
        if kinds.is_empty() {
            return Err(DomainError::validation(
                "turn_pattern",
                "pattern must not be empty",
            ));
        }
        Ok(Self(kinds))
    }

    /// The classic alternating writing/drawing cycle.
    pub fn alternating() -> Self {
        Self(vec![ContributionKind::Writing, ContributionKind::Drawing])
    }

    /// Kind for a 1-based turn number.
    pub fn kind_at(&self, turn_number: u32) -> ContributionKind {
        debug_assert!(turn_number >= 1, "turn numbers are 1-based");
        let index = (turn_number.max(1) as usize - 1) % self.0.len();
        self.0[index]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl TryFrom<Vec<ContributionKind>> for TurnPattern {
    type Error = DomainError;

    fn try_from(kinds: Vec<ContributionKind>) -> Result<Self, Self::Error> {
        Self::new(kinds)
    }
}

impl From<TurnPattern> for Vec<ContributionKind> {
    fn from(pattern: TurnPattern) -> Self {
        pattern.0
    }
}

/// Rules for a season: membership bounds, the open window, and per-stage
/// deadlines applied to every game in the cohort.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonConfig {
    pub id: ConfigId,
    pub min_players: u32,
    pub max_players: u32,
    pub open_duration: CompactDuration,
    pub turn_pattern: TurnPattern,
    pub timeouts: TimeoutProfile,
}

/// Rules for on-demand games in a guild.
///
/// `return_count` of zero means a player may take unlimited turns in one
/// game; otherwise, once a player has taken `return_count` turns, at least
/// `return_cooldown` turns by other players must separate their returns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub id: ConfigId,
    pub turn_pattern: TurnPattern,
    pub min_turns: u32,
    pub max_turns: Option<u32>,
    pub stale_timeout: CompactDuration,
    pub return_count: u32,
    pub return_cooldown: u32,
    pub timeouts: TimeoutProfile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_cycles_one_based() {
        let pattern = TurnPattern::alternating();
        assert_eq!(pattern.kind_at(1), ContributionKind::Writing);
        assert_eq!(pattern.kind_at(2), ContributionKind::Drawing);
        assert_eq!(pattern.kind_at(3), ContributionKind::Writing);
        assert_eq!(pattern.kind_at(6), ContributionKind::Drawing);
    }

    #[test]
    fn empty_pattern_is_rejected_in_construction_and_deserialization() {
        assert!(TurnPattern::new(vec![]).is_err());
        let err = serde_json::from_str::<TurnPattern>("[]");
        assert!(err.is_err());
    }

    #[test]
    fn profile_selects_stage_fields_by_kind() {
        let profile = TimeoutProfile {
            claim_timeout: CompactDuration::minutes(10),
            writing_timeout: CompactDuration::minutes(30),
            drawing_timeout: CompactDuration::minutes(60),
            claim_warning: None,
            writing_warning: Some(CompactDuration::minutes(20)),
            drawing_warning: None,
        };
        assert_eq!(
            profile.submission_timeout(ContributionKind::Writing),
            CompactDuration::minutes(30)
        );
        assert_eq!(
            profile.submission_timeout(ContributionKind::Drawing),
            CompactDuration::minutes(60)
        );
        assert_eq!(
            profile.submission_warning(ContributionKind::Writing),
            Some(CompactDuration::minutes(20))
        );
        assert_eq!(profile.submission_warning(ContributionKind::Drawing), None);
    }
}
