// client registry port types

use crate::{LiveStats, MatchStatus};
use async_trait::async_trait;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;

/// Framework-agnostic event stream (boxed + pinned trait object).
pub type CrNoticeStream = Pin<Box<dyn Stream<Item = CrPushNotice> + Send + 'static>>;

#[derive(Debug, Clone, Error)]
pub enum CrError {
    /// registry rejected the subscription
    #[error("subscribe failed: {0}")]
    Subscribe(String),
    /// the notice has no topic and cannot be published
    #[error("notice is not publishable")]
    Unpublishable,
    /// registry internal failure
    #[error("client registry error: {0}")]
    Other(String),
}

pub type CrResult<T> = Result<T, CrError>;

/// Topics a client can subscribe to.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum CrTopic {
    /// per-match updates, keyed by slug
    Match(String),
    /// bracket structure changed
    Bracket,
    /// tournament lifecycle changed
    Tournament,
}

impl CrPushNotice {
    /// The topic a notice is delivered on. The stale sentinel is injected
    /// by adapters toward lagging subscribers and has no topic of its own;
    /// publishing it is an error.
    pub fn topic(&self) -> Option<CrTopic> {
        match self {
            CrPushNotice::MatchUpdate(p) => Some(CrTopic::Match(p.slug.clone())),
            CrPushNotice::BracketUpdate(_) => Some(CrTopic::Bracket),
            CrPushNotice::TournamentUpdate(_) => Some(CrTopic::Tournament),
            CrPushNotice::Stale => None,
        }
    }
}

/// Merge-patch payload for `match:update`. All fields optional; subscribers
/// merge what is present. Field names are fixed, JS clients consume them.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchUpdatePayload {
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MatchStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team1_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team2_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_stats: Option<LiveStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// Actions carried by `bracket:update`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BracketAction {
    BracketRegenerated,
    TournamentReset,
    TournamentStarted,
    TournamentCompleted,
    MatchReady,
    MatchLoaded,
    MatchStatus,
    ServerAssigned,
    MatchRestarted,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BracketUpdatePayload {
    pub action: BracketAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MatchStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
}

impl BracketUpdatePayload {
    pub fn new(action: BracketAction) -> Self {
        Self {
            action,
            match_slug: None,
            status: None,
            server_id: None,
        }
    }

    pub fn with_match(mut self, slug: impl Into<String>) -> Self {
        self.match_slug = Some(slug.into());
        self
    }

    pub fn with_status(mut self, status: MatchStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_server(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TournamentUpdatePayload {
    pub action: String,
}

/// Domain notices sent to subscribed clients. Keep payloads minimal; the
/// store is the source of truth and the channel is lossy.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum CrPushNotice {
    MatchUpdate(MatchUpdatePayload),
    BracketUpdate(BracketUpdatePayload),
    TournamentUpdate(TournamentUpdatePayload),
    /// Delivered by adapters when a subscriber overflowed and must refetch.
    Stale,
}

/// client registry port trait
#[async_trait]
pub trait ClientRegistryPort: Send + Sync {
    /// Subscribe to a topic; dropping the returned stream ends the
    /// subscription (RAII).
    async fn subscribe(&self, topic: CrTopic) -> CrResult<CrNoticeStream>;

    /// Publish a notice to current listeners (no bus is created if none
    /// exist). Fails with `Unpublishable` for the stale sentinel, which
    /// only adapters may inject.
    async fn publish(&self, notice: CrPushNotice) -> CrResult<()>;
}
