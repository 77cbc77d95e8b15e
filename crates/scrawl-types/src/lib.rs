pub mod config;
pub mod duration;
pub mod error;
pub mod game;
pub mod ids;
pub mod intent;
pub mod job;
pub mod player;
pub mod season;
pub mod turn;

pub use config::{GameConfig, SeasonConfig, TimeoutProfile, TurnPattern};
pub use duration::{CompactDuration, format_compact, parse_compact};
pub use error::DomainError;
pub use game::{Game, GameOrigin, GameStatus};
pub use ids::{ConfigId, GameId, GuildId, PlayerId, SeasonId, TurnId};
pub use intent::Intent;
pub use job::{JobId, JobKind, JobStatus, ScheduledJob};
pub use player::Player;
pub use season::{Season, SeasonMembership, SeasonStatus};
pub use turn::{ContributionKind, Turn, TurnContent, TurnStatus};
