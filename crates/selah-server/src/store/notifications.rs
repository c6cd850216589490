use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use selah_model::{Notification, NotificationKind, NotificationStatus};

use super::{parse_ts, parse_ts_opt, Store, StoreResult};

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, message, community_id, actor_id, post_id, status, read_at, created_at";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let kind_raw: String = row.get(2)?;
    let kind = NotificationKind::parse(&kind_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("unknown notification kind: {kind_raw}").into(),
        )
    })?;
    let status_raw: String = row.get(7)?;
    let status = NotificationStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            Type::Text,
            format!("unknown notification status: {status_raw}").into(),
        )
    })?;
    let read_raw: Option<String> = row.get(8)?;
    let created_raw: String = row.get(9)?;
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind,
        message: row.get(3)?,
        community_id: row.get(4)?,
        actor_id: row.get(5)?,
        post_id: row.get(6)?,
        status,
        read_at: parse_ts_opt(8, read_raw.as_deref())?,
        created_at: parse_ts(9, &created_raw)?,
    })
}

impl Store {
    pub async fn create_notification(
        &self,
        user_id: i64,
        kind: NotificationKind,
        message: String,
        community_id: Option<i64>,
        actor_id: Option<i64>,
        post_id: Option<i64>,
    ) -> StoreResult<i64> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO notifications (user_id, kind, message, community_id, actor_id, post_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        user_id,
                        kind.as_str(),
                        message,
                        community_id,
                        actor_id,
                        post_id,
                        Utc::now().to_rfc3339(),
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    pub async fn list_notifications(
        &self,
        user_id: i64,
        unread_only: bool,
    ) -> StoreResult<Vec<Notification>> {
        self.conn
            .call(move |conn| {
                let sql = if unread_only {
                    format!(
                        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                         WHERE user_id = ?1 AND read_at IS NULL
                         ORDER BY created_at DESC, id DESC LIMIT 50"
                    )
                } else {
                    format!(
                        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                         WHERE user_id = ?1
                         ORDER BY created_at DESC, id DESC LIMIT 50"
                    )
                };
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![user_id], notification_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
    }

    /// Scoped to the recipient; someone else's notification id reads as
    /// absent.
    pub async fn get_notification(
        &self,
        user_id: i64,
        id: i64,
    ) -> StoreResult<Option<Notification>> {
        self.conn
            .call(move |conn| {
                let notification = conn
                    .query_row(
                        &format!(
                            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                             WHERE id = ?1 AND user_id = ?2"
                        ),
                        params![id, user_id],
                        notification_from_row,
                    )
                    .optional()?;
                Ok(notification)
            })
            .await
    }

    pub async fn mark_notification_read(&self, user_id: i64, id: i64) -> StoreResult<bool> {
        self.conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE notifications SET read_at = ?1
                     WHERE id = ?2 AND user_id = ?3 AND read_at IS NULL",
                    params![Utc::now().to_rfc3339(), id, user_id],
                )?;
                Ok(changed > 0)
            })
            .await
    }

    pub async fn mark_all_notifications_read(&self, user_id: i64) -> StoreResult<usize> {
        self.conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE notifications SET read_at = ?1
                     WHERE user_id = ?2 AND read_at IS NULL",
                    params![Utc::now().to_rfc3339(), user_id],
                )?;
                Ok(changed)
            })
            .await
    }

    pub async fn delete_notification(&self, user_id: i64, id: i64) -> StoreResult<bool> {
        self.conn
            .call(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
                    params![id, user_id],
                )?;
                Ok(deleted > 0)
            })
            .await
    }

    pub async fn delete_all_notifications(&self, user_id: i64) -> StoreResult<usize> {
        self.conn
            .call(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM notifications WHERE user_id = ?1",
                    params![user_id],
                )?;
                Ok(deleted)
            })
            .await
    }

    /// Stamps the resolution of an actionable notification. `read_at`
    /// is always set so a resolved notification never counts as unread.
    pub async fn set_notification_status(
        &self,
        id: i64,
        status: NotificationStatus,
    ) -> StoreResult<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE notifications SET status = ?1, read_at = ?2 WHERE id = ?3",
                    params![status.as_str(), Utc::now().to_rfc3339(), id],
                )?;
                Ok(())
            })
            .await
    }
}
