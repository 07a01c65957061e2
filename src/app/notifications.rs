use anyhow::Result;
use serde_json::json;
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::format_description::well_known::Rfc3339;
use tracing::warn;
use uuid::Uuid;

use crate::domain::notification::{Notification, NotificationType};
use crate::infra::db::Db;
use crate::infra::fanout::NotificationFanout;
use crate::pagination::{PageCursor, MAX_PAGE_LIMIT};

/// The only writer of notification rows. Every create is durably stored
/// first, then best-effort published on the owner's fan-out channel; the two
/// never share a transaction.
#[derive(Clone)]
pub struct NotificationService {
    db: Db,
    fanout: NotificationFanout,
}

pub struct NotificationPage {
    pub items: Vec<Notification>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub has_previous: bool,
    pub total_count: Option<i64>,
    pub limit: i64,
}

impl NotificationService {
    pub fn new(db: Db, fanout: NotificationFanout) -> Self {
        Self { db, fanout }
    }

    /// Insert a notification and publish it to the user's live channel.
    /// Publish failure is logged and swallowed; the persisted row is the
    /// source of truth. An insert failure publishes nothing.
    pub async fn create_and_publish(
        &self,
        user_id: Uuid,
        message: &str,
        kind: NotificationType,
    ) -> Result<Notification> {
        let row = sqlx::query(
            "INSERT INTO notifications (user_id, type, message) \
             VALUES ($1, $2, $3) \
             RETURNING id, user_id, type, message, is_read, created_at",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(message)
        .fetch_one(self.db.pool())
        .await?;

        let notification = map_notification(&row);

        let payload = notification_payload(&notification);
        if let Err(err) = self.fanout.publish_notification(user_id, &payload).await {
            warn!(error = ?err, user_id = %user_id, "failed to publish notification");
        }

        Ok(notification)
    }

    /// Recount unread notifications and push the result to the user's count
    /// and notification channels. Called after every read/delete mutation so
    /// badge counts converge without the client re-polling.
    pub async fn recompute_and_publish_unread_count(&self, user_id: Uuid) -> Result<i64> {
        let count = self.unread_count(user_id).await?;
        if let Err(err) = self.fanout.publish_unread_count(user_id, count).await {
            warn!(error = ?err, user_id = %user_id, "failed to publish unread count");
        }
        Ok(count)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(count)
    }

    /// Cursor-paginated listing in (created_at DESC, id DESC) order. Fetches
    /// one row past the limit to detect a further page without a second
    /// query; the strict before-pair filter means ties on created_at are
    /// never skipped or duplicated across pages.
    pub async fn list(
        &self,
        user_id: Uuid,
        cursor: Option<PageCursor>,
        limit: i64,
        include_count: bool,
    ) -> Result<NotificationPage> {
        let limit = limit.clamp(1, MAX_PAGE_LIMIT);

        let rows = match cursor {
            Some(cursor) => {
                sqlx::query(
                    "SELECT id, user_id, type, message, is_read, created_at \
                     FROM notifications \
                     WHERE user_id = $1 \
                       AND (created_at < $2 OR (created_at = $2 AND id < $3)) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $4",
                )
                .bind(user_id)
                .bind(cursor.created_at)
                .bind(cursor.id)
                .bind(limit + 1)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, user_id, type, message, is_read, created_at \
                     FROM notifications \
                     WHERE user_id = $1 \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $2",
                )
                .bind(user_id)
                .bind(limit + 1)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        let mut items: Vec<Notification> = rows.iter().map(map_notification).collect();
        let has_more = items.len() as i64 > limit;
        if has_more {
            items.truncate(limit as usize);
        }

        let next_cursor = if has_more {
            items.last().and_then(|last| {
                PageCursor {
                    created_at: last.created_at,
                    id: last.id,
                }
                .encode()
                .ok()
            })
        } else {
            None
        };

        let total_count = if include_count {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_one(self.db.pool())
                    .await?;
            Some(count)
        } else {
            None
        };

        Ok(NotificationPage {
            items,
            next_cursor,
            has_more,
            has_previous: cursor.is_some(),
            total_count,
            limit,
        })
    }

    pub async fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications \
             SET is_read = TRUE \
             WHERE id = $1 AND user_id = $2 AND is_read = FALSE",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            self.recompute_and_publish_unread_count(user_id).await?;
        }
        Ok(updated)
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<i64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        self.recompute_and_publish_unread_count(user_id).await?;
        Ok(result.rows_affected() as i64)
    }

    pub async fn delete(&self, notification_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(notification_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            self.recompute_and_publish_unread_count(user_id).await?;
        }
        Ok(deleted)
    }
}

fn map_notification(row: &PgRow) -> Notification {
    let kind: String = row.get("type");
    Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: NotificationType::parse(&kind),
        message: row.get("message"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    }
}

fn notification_payload(notification: &Notification) -> serde_json::Value {
    json!({
        "event_type": "notification",
        "id": notification.id,
        "type": notification.kind.as_str(),
        "message": notification.message,
        "is_read": notification.is_read,
        "created_at": notification
            .created_at
            .format(&Rfc3339)
            .unwrap_or_default(),
        "user_id": notification.user_id,
    })
}
