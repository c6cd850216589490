use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};

use super::{Store, StoreResult};

impl Store {
    pub async fn create_session(
        &self,
        token: String,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (id, user_id, expires_at) VALUES (?1, ?2, ?3)",
                    params![token, user_id, expires_at.to_rfc3339()],
                )?;
                Ok(())
            })
            .await
    }

    /// Look up a session token and return its user id. Expired sessions
    /// are deleted on sight; live ones get their expiry slid forward by
    /// `ttl` from now.
    pub async fn resolve_session(&self, token: String, ttl: Duration) -> StoreResult<Option<i64>> {
        self.conn
            .call(move |conn| {
                let row: Option<(i64, String)> = conn
                    .query_row(
                        "SELECT user_id, expires_at FROM sessions WHERE id = ?1",
                        params![token],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                let Some((user_id, expires_raw)) = row else {
                    return Ok(None);
                };
                let now = Utc::now();
                let expired = DateTime::parse_from_rfc3339(&expires_raw)
                    .map(|dt| dt.with_timezone(&Utc) <= now)
                    .unwrap_or(true);
                if expired {
                    conn.execute("DELETE FROM sessions WHERE id = ?1", params![token])?;
                    return Ok(None);
                }
                conn.execute(
                    "UPDATE sessions SET expires_at = ?1 WHERE id = ?2",
                    params![(now + ttl).to_rfc3339(), token],
                )?;
                Ok(Some(user_id))
            })
            .await
    }

    pub async fn delete_session(&self, token: String) -> StoreResult<()> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM sessions WHERE id = ?1", params![token])?;
                Ok(())
            })
            .await
    }

    /// Used after a password change to force re-login everywhere.
    pub async fn delete_sessions_for_user(&self, user_id: i64) -> StoreResult<()> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
                Ok(())
            })
            .await
    }

    pub async fn purge_expired_sessions(&self) -> StoreResult<usize> {
        self.conn
            .call(move |conn| {
                let purged = conn.execute(
                    "DELETE FROM sessions WHERE expires_at <= ?1",
                    params![Utc::now().to_rfc3339()],
                )?;
                Ok(purged)
            })
            .await
    }
}
