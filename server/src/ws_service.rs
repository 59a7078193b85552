// push channel: one websocket per client, three event topics

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use app_core::{ClientRegistryPort, CrPushNotice, CrTopic};
use futures_util::StreamExt;
use shared::{AppState, ClientFrame, PushFrame};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Socket entrypoint. Every client gets `bracket:update` and
/// `tournament:update`; per-match streams are added and removed with
/// inbound subscribe frames.
#[instrument(name = "ws_connection", skip(state, ws))]
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(state, socket))
}

async fn serve_socket(state: AppState, mut socket: WebSocket) {
    info!("ws_connected");
    let (notice_tx, mut notice_rx) = mpsc::channel::<CrPushNotice>(64);
    let mut forwards: HashMap<String, tokio::task::JoinHandle<()>> = HashMap::new();

    // baseline topics every client receives
    for topic in [CrTopic::Bracket, CrTopic::Tournament] {
        if let Some(handle) = spawn_forward(&state, topic.clone(), notice_tx.clone()).await {
            forwards.insert(topic_key(&topic), handle);
        }
    }

    loop {
        tokio::select! {
            notice = notice_rx.recv() => {
                let Some(notice) = notice else { break };
                let frame = PushFrame::from_notice(&notice);
                let Ok(text) = serde_json::to_string(&frame) else { continue };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(&state, &notice_tx, &mut forwards, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "ws_receive_failed");
                        break;
                    }
                }
            }
        }
    }

    for (_, handle) in forwards {
        handle.abort();
    }
    info!("ws_disconnected");
}

async fn handle_client_frame(
    state: &AppState,
    notice_tx: &mpsc::Sender<CrPushNotice>,
    forwards: &mut HashMap<String, tokio::task::JoinHandle<()>>,
    text: &str,
) {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::Subscribe { match_slug }) => {
            let topic = CrTopic::Match(match_slug.clone());
            let key = topic_key(&topic);
            if forwards.contains_key(&key) {
                return;
            }
            if let Some(handle) = spawn_forward(state, topic, notice_tx.clone()).await {
                debug!(slug = %match_slug, "ws_match_subscribed");
                forwards.insert(key, handle);
            }
        }
        Ok(ClientFrame::Unsubscribe { match_slug }) => {
            let key = topic_key(&CrTopic::Match(match_slug.clone()));
            if let Some(handle) = forwards.remove(&key) {
                handle.abort();
                debug!(slug = %match_slug, "ws_match_unsubscribed");
            }
        }
        Err(e) => debug!(error = %e, "ws_bad_client_frame"),
    }
}

fn topic_key(topic: &CrTopic) -> String {
    match topic {
        CrTopic::Match(slug) => format!("match:{slug}"),
        CrTopic::Bracket => "bracket".to_string(),
        CrTopic::Tournament => "tournament".to_string(),
    }
}

/// Pump one registry subscription into the socket's outbound queue. The
/// task dies with the subscription stream or when aborted on
/// unsubscribe/disconnect.
async fn spawn_forward(
    state: &AppState,
    topic: CrTopic,
    tx: mpsc::Sender<CrPushNotice>,
) -> Option<tokio::task::JoinHandle<()>> {
    match state.core.client_registry.subscribe(topic).await {
        Ok(mut stream) => Some(tokio::spawn(async move {
            while let Some(notice) = stream.next().await {
                if tx.send(notice).await.is_err() {
                    return;
                }
            }
        })),
        Err(e) => {
            warn!(error = %e, "ws_subscribe_failed");
            None
        }
    }
}
