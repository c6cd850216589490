//! SQLite persistence. All access goes through [`Store`], which owns a
//! single serialized connection; multi-step writes run inside one
//! `conn.call` closure so they commit atomically.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use tokio_rusqlite::Connection;

mod communities;
mod notes;
mod notifications;
mod posts;
mod schema;
mod sessions;
mod users;

pub use communities::{CommunityDetail, DiscoverFilter, MemberRow};
pub use notes::{NoteListPage, NoteQuery};
pub use posts::{PollState, PostWithAuthor, ReplyWithAuthor};
pub use users::{NewUser, SignupOutcome};

use schema::SCHEMA;

pub type StoreResult<T> = Result<T, tokio_rusqlite::Error>;

#[derive(Clone)]
pub struct Store {
    conn: Connection,
}

impl Store {
    pub async fn open(db_path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    /// In-memory store for tests.
    pub async fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> StoreResult<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

/// RFC3339 column to `DateTime<Utc>`, reporting malformed rows as a
/// column conversion failure instead of panicking.
fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
        })
}

fn parse_ts_opt(idx: usize, raw: Option<&str>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|raw| parse_ts(idx, raw)).transpose()
}

#[cfg(test)]
mod store_tests;
