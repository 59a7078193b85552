// Steam Web API resolver adapter

use app_core::{ResolvedPlayer, SteamError, SteamResolverPort};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

const STEAM_API: &str = "https://api.steampowered.com";

/// Installed when `STEAM_API_KEY` is absent; every call reports the
/// feature as unconfigured.
pub struct DisabledSteamResolver;

#[async_trait]
impl SteamResolverPort for DisabledSteamResolver {
    async fn resolve(&self, _input: &str) -> Result<ResolvedPlayer, SteamError> {
        Err(SteamError::NotConfigured)
    }
}

pub struct SteamWebResolver {
    key: String,
    http: reqwest::Client,
}

impl SteamWebResolver {
    pub fn new(key: String) -> Self {
        SteamWebResolver {
            key,
            http: reqwest::Client::new(),
        }
    }

    /// Accepts a bare steamID64, a /profiles/ or /id/ URL, or a vanity
    /// name.
    fn classify(input: &str) -> SteamInput<'_> {
        let trimmed = input.trim().trim_end_matches('/');
        if trimmed.len() == 17 && trimmed.chars().all(|c| c.is_ascii_digit()) {
            return SteamInput::Id64(trimmed);
        }
        if let Some(rest) = trimmed.split("/profiles/").nth(1) {
            return SteamInput::Id64(rest);
        }
        if let Some(rest) = trimmed.split("/id/").nth(1) {
            return SteamInput::Vanity(rest);
        }
        SteamInput::Vanity(trimmed)
    }

    async fn vanity_to_id(&self, vanity: &str) -> Result<String, SteamError> {
        let url = format!(
            "{STEAM_API}/ISteamUser/ResolveVanityURL/v1/?key={}&vanityurl={}",
            self.key, vanity
        );
        let body: Value = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SteamError::Upstream(e.to_string()))?
            .json()
            .await
            .map_err(|e| SteamError::Upstream(e.to_string()))?;
        let response = &body["response"];
        if response["success"].as_i64() != Some(1) {
            return Err(SteamError::NotFound);
        }
        response["steamid"]
            .as_str()
            .map(str::to_string)
            .ok_or(SteamError::NotFound)
    }

    async fn summary(&self, steam_id: &str) -> Result<ResolvedPlayer, SteamError> {
        let url = format!(
            "{STEAM_API}/ISteamUser/GetPlayerSummaries/v2/?key={}&steamids={}",
            self.key, steam_id
        );
        let body: Value = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SteamError::Upstream(e.to_string()))?
            .json()
            .await
            .map_err(|e| SteamError::Upstream(e.to_string()))?;
        let player = body["response"]["players"]
            .as_array()
            .and_then(|players| players.first())
            .ok_or(SteamError::NotFound)?;
        Ok(ResolvedPlayer {
            steam_id: player["steamid"]
                .as_str()
                .unwrap_or(steam_id)
                .to_string(),
            name: player["personaname"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        })
    }
}

enum SteamInput<'a> {
    Id64(&'a str),
    Vanity(&'a str),
}

#[async_trait]
impl SteamResolverPort for SteamWebResolver {
    #[instrument(name = "steam.resolve", skip(self))]
    async fn resolve(&self, input: &str) -> Result<ResolvedPlayer, SteamError> {
        let id = match Self::classify(input) {
            SteamInput::Id64(id) => id.to_string(),
            SteamInput::Vanity(vanity) => self.vanity_to_id(vanity).await?,
        };
        let player = self.summary(&id).await?;
        debug!(steam_id = %player.steam_id, "steam_resolved");
        Ok(player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_recognizes_the_three_input_shapes() {
        match SteamWebResolver::classify("76561198012345678") {
            SteamInput::Id64(id) => assert_eq!(id, "76561198012345678"),
            _ => panic!("expected id64"),
        }
        match SteamWebResolver::classify("https://steamcommunity.com/profiles/76561198012345678/")
        {
            SteamInput::Id64(id) => assert_eq!(id, "76561198012345678"),
            _ => panic!("expected id64"),
        }
        match SteamWebResolver::classify("https://steamcommunity.com/id/somecoolguy") {
            SteamInput::Vanity(v) => assert_eq!(v, "somecoolguy"),
            _ => panic!("expected vanity"),
        }
        match SteamWebResolver::classify("somecoolguy") {
            SteamInput::Vanity(v) => assert_eq!(v, "somecoolguy"),
            _ => panic!("expected vanity"),
        }
    }
}
