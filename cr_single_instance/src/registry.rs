// implementation of trait ClientRegistryPort

use app_core::{ClientRegistryPort, CrError, CrNoticeStream, CrPushNotice, CrResult, CrTopic};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::debug;

/// Subscriber buffer. The channel is lossy by design: correctness lives in
/// the store, overflow turns into a stale sentinel telling the client to
/// refetch.
pub const SUBSCRIBER_BUFFER: usize = 64;

/// In-memory implementation using DashMap + tokio::broadcast.
///
/// One broadcast bus per topic, created on first subscribe. A bus whose
/// subscribers are all gone lingers until the next publish to its topic,
/// at which point the failed send reveals it is dead and it is removed.
#[derive(Clone, Default)]
pub struct CrSingleInstance {
    buses: Arc<DashMap<CrTopic, broadcast::Sender<CrPushNotice>>>,
}

impl CrSingleInstance {
    pub fn new() -> Self {
        Self {
            buses: Arc::new(DashMap::new()),
        }
    }

    fn ensure_bus(&self, topic: &CrTopic) -> broadcast::Sender<CrPushNotice> {
        self.buses
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel::<CrPushNotice>(SUBSCRIBER_BUFFER).0)
            .clone()
    }

    /// Drop the topic's bus unless a subscriber (re)appeared in the
    /// meantime; the check and the removal happen under one shard lock.
    fn sweep_bus(&self, topic: &CrTopic) {
        self.buses
            .remove_if(topic, |_, tx| tx.receiver_count() == 0);
    }

    /// Number of live topic buses (test observability).
    pub fn topic_count(&self) -> usize {
        self.buses.len()
    }
}

#[async_trait]
impl ClientRegistryPort for CrSingleInstance {
    async fn subscribe(&self, topic: CrTopic) -> CrResult<CrNoticeStream> {
        if let CrTopic::Match(slug) = &topic {
            if slug.is_empty() {
                return Err(CrError::Subscribe("empty match slug".into()));
            }
        }
        debug!(?topic, "cr_subscribe");
        let rx = self.ensure_bus(&topic).subscribe();

        // A lagged receiver lost messages; coalesce the gap into one stale
        // sentinel so the subscriber knows to refetch.
        let stream = BroadcastStream::new(rx).map(|res| match res {
            Ok(notice) => notice,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                debug!(skipped, "cr_subscriber_lagged");
                CrPushNotice::Stale
            }
        });

        Ok(Box::pin(stream))
    }

    async fn publish(&self, notice: CrPushNotice) -> CrResult<()> {
        // the stale sentinel is injected per-subscriber above, it never
        // travels through a bus
        let topic = notice.topic().ok_or(CrError::Unpublishable)?;
        let Some(tx) = self.buses.get(&topic).map(|bus| bus.clone()) else {
            // nobody ever subscribed to this topic
            return Ok(());
        };
        if tx.send(notice).is_err() {
            // every receiver is gone; reclaim the bus
            self.sweep_bus(&topic);
        }
        Ok(())
    }
}

pub mod test_support {
    use super::*;
    use app_core::MatchUpdatePayload;
    use std::time::Duration;

    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

    pub fn make_adapter() -> CrSingleInstance {
        CrSingleInstance::new()
    }

    pub fn match_notice(slug: &str, action: u32) -> CrPushNotice {
        CrPushNotice::MatchUpdate(MatchUpdatePayload {
            slug: slug.to_string(),
            action: Some(action.to_string()),
            ..Default::default()
        })
    }

    /// The numeric action a `match_notice` was built with; panics on other
    /// notices so tests fail loudly on cross-talk.
    pub fn notice_action(notice: &CrPushNotice) -> u32 {
        match notice {
            CrPushNotice::MatchUpdate(p) => p
                .action
                .as_deref()
                .and_then(|a| a.parse().ok())
                .expect("test notices always carry a numeric action"),
            other => panic!("unexpected notice {other:?}"),
        }
    }
}
