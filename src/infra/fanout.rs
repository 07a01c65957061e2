use anyhow::Result;
use redis::aio::PubSub;
use redis::AsyncCommands;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::infra::cache::RedisCache;

/// Per-user broadcast channels for real-time notification delivery.
///
/// Channels are ephemeral: a message published while nobody is subscribed is
/// dropped. REST reads against the notification store are the authoritative
/// catch-up path; these channels are advisory only.
#[derive(Clone)]
pub struct NotificationFanout {
    cache: RedisCache,
}

pub fn notification_channel(user_id: Uuid) -> String {
    format!("notifications:{}", user_id)
}

pub fn unread_count_channel(user_id: Uuid) -> String {
    format!("notifications:count:{}", user_id)
}

impl NotificationFanout {
    pub fn new(cache: RedisCache) -> Self {
        Self { cache }
    }

    /// Publish a full notification payload to the user's channel. Returns the
    /// number of live subscribers reached; zero is not an error.
    pub async fn publish_notification(&self, user_id: Uuid, payload: &Value) -> Result<i64> {
        let channel = notification_channel(user_id);
        let receivers = self.publish_raw(&channel, &payload.to_string()).await?;
        debug!(%channel, receivers, "published notification");
        Ok(receivers)
    }

    /// Publish an unread-count update to both the dedicated count channel and
    /// the full notification channel, so single-stream clients see it too.
    pub async fn publish_unread_count(&self, user_id: Uuid, count: i64) -> Result<i64> {
        let payload = serde_json::json!({
            "event_type": "unread_count",
            "unread_count": count,
        })
        .to_string();

        let mut receivers = self
            .publish_raw(&notification_channel(user_id), &payload)
            .await?;
        receivers += self
            .publish_raw(&unread_count_channel(user_id), &payload)
            .await?;
        debug!(%user_id, count, receivers, "published unread count");
        Ok(receivers)
    }

    /// Dedicated pub/sub connection for one notification stream. The
    /// subscription is released when the returned connection is dropped.
    pub async fn subscribe_notifications(&self, user_id: Uuid) -> Result<PubSub> {
        self.subscribe(&notification_channel(user_id)).await
    }

    pub async fn subscribe_unread_count(&self, user_id: Uuid) -> Result<PubSub> {
        self.subscribe(&unread_count_channel(user_id)).await
    }

    async fn subscribe(&self, channel: &str) -> Result<PubSub> {
        let mut pubsub = self.cache.client().get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        Ok(pubsub)
    }

    async fn publish_raw(&self, channel: &str, payload: &str) -> Result<i64> {
        let mut conn = self
            .cache
            .client()
            .get_multiplexed_async_connection()
            .await?;
        let receivers: i64 = conn.publish(channel, payload).await?;
        Ok(receivers)
    }
}
