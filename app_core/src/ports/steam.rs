// steam-id resolver port

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPlayer {
    pub steam_id: String,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum SteamError {
    /// resolver is disabled because no API key is configured
    #[error("Steam API is not configured")]
    NotConfigured,
    /// input did not resolve to a player
    #[error("player not found")]
    NotFound,
    /// Steam Web API failure
    #[error("steam api error: {0}")]
    Upstream(String),
}

/// Steam resolver port trait. Accepts a steamID64, a vanity name or a
/// profile URL.
#[async_trait]
pub trait SteamResolverPort: Send + Sync {
    async fn resolve(&self, input: &str) -> Result<ResolvedPlayer, SteamError>;
}
