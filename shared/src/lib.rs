// shared data types, used by server and push-channel clients

use app_core::{Core, CrPushNotice, EventInterpreter, SchedulerConfig, SchedulerHandle};
use axum_macros::FromRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Server-wide state handed to every handler.
#[derive(FromRef, Clone)]
pub struct AppState {
    pub core: Arc<Core>,
    pub interpreter: Arc<EventInterpreter>,
    pub scheduler: SchedulerHandle,
    pub scheduler_cfg: Arc<SchedulerConfig>,
    pub auth: Arc<AuthTokens>,
    pub demo_dir: Arc<std::path::PathBuf>,
}

/// Operator bearer token and the plugin webhook secret.
pub struct AuthTokens {
    pub api_token: String,
    pub server_token: String,
}

/// Push-channel event names. Fixed: JS clients switch on them.
pub const EVENT_MATCH_UPDATE: &str = "match:update";
pub const EVENT_BRACKET_UPDATE: &str = "bracket:update";
pub const EVENT_TOURNAMENT_UPDATE: &str = "tournament:update";
pub const EVENT_STALE: &str = "stale";

/// One outbound text frame on the push channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushFrame {
    pub event: String,
    pub data: Value,
}

impl PushFrame {
    /// Render a registry notice as its wire frame.
    pub fn from_notice(notice: &CrPushNotice) -> PushFrame {
        match notice {
            CrPushNotice::MatchUpdate(p) => PushFrame {
                event: EVENT_MATCH_UPDATE.to_string(),
                data: serde_json::to_value(p).unwrap_or(Value::Null),
            },
            CrPushNotice::BracketUpdate(p) => PushFrame {
                event: EVENT_BRACKET_UPDATE.to_string(),
                data: serde_json::to_value(p).unwrap_or(Value::Null),
            },
            CrPushNotice::TournamentUpdate(p) => PushFrame {
                event: EVENT_TOURNAMENT_UPDATE.to_string(),
                data: serde_json::to_value(p).unwrap_or(Value::Null),
            },
            CrPushNotice::Stale => PushFrame {
                event: EVENT_STALE.to_string(),
                data: Value::Null,
            },
        }
    }
}

/// Inbound frames: subscribers manage their per-match subscriptions over
/// the same socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientFrame {
    Subscribe {
        #[serde(rename = "matchSlug")]
        match_slug: String,
    },
    Unsubscribe {
        #[serde(rename = "matchSlug")]
        match_slug: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use app_core::{MatchStatus, MatchUpdatePayload};

    #[test]
    fn match_update_frame_uses_fixed_names() {
        let notice = CrPushNotice::MatchUpdate(MatchUpdatePayload {
            slug: "a_vs_b".into(),
            status: Some(MatchStatus::Loaded),
            server_id: Some("s1".into()),
            ..Default::default()
        });
        let frame = PushFrame::from_notice(&notice);
        assert_eq!(frame.event, "match:update");
        assert_eq!(frame.data["slug"], "a_vs_b");
        assert_eq!(frame.data["status"], "loaded");
        assert_eq!(frame.data["serverId"], "s1");
    }

    #[test]
    fn client_frames_parse_subscribe_actions() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"action":"subscribe","matchSlug":"a_vs_b"}"#).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Subscribe {
                match_slug: "a_vs_b".into()
            }
        );
    }
}
