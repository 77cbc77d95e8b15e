use async_trait::async_trait;
use scrawl_types::{DomainError, GameConfig, GuildId};

/// Per-guild settings the engine needs but does not own: the on-demand game
/// config in force and where announcements land.
#[async_trait]
pub trait ChannelConfigPort: Send + Sync {
    /// The game config new on-demand games in this guild are created under.
    async fn game_config(&self, guild: &GuildId) -> Result<GameConfig, DomainError>;

    /// Channel for completed-game announcements, if configured.
    async fn completed_channel(&self, guild: &GuildId) -> Result<Option<String>, DomainError>;

    /// Channel for moderation events, if configured.
    async fn admin_channel(&self, guild: &GuildId) -> Result<Option<String>, DomainError>;
}

/// One fixed config for every guild. Useful for single-guild deployments
/// and tests.
#[derive(Clone, Debug)]
pub struct StaticChannelConfig {
    pub config: GameConfig,
    pub completed_channel: Option<String>,
    pub admin_channel: Option<String>,
}

impl StaticChannelConfig {
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            completed_channel: None,
            admin_channel: None,
        }
    }
}

#[async_trait]
impl ChannelConfigPort for StaticChannelConfig {
    async fn game_config(&self, _guild: &GuildId) -> Result<GameConfig, DomainError> {
        Ok(self.config.clone())
    }

    async fn completed_channel(&self, _guild: &GuildId) -> Result<Option<String>, DomainError> {
        Ok(self.completed_channel.clone())
    }

    async fn admin_channel(&self, _guild: &GuildId) -> Result<Option<String>, DomainError> {
        Ok(self.admin_channel.clone())
    }
}
