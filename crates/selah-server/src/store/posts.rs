use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use selah_model::{CommunityPost, PollConfig, PollOption, PostBody, PostKind};

use super::{parse_ts, parse_ts_opt, Store, StoreResult};

#[derive(Debug)]
pub struct PostWithAuthor {
    pub post: CommunityPost,
    pub author_name: String,
}

#[derive(Debug)]
pub struct ReplyWithAuthor {
    pub reply: selah_model::CommunityReply,
    pub author_name: String,
}

/// Snapshot of a poll after a vote: every stored option index plus the
/// caller's own picks.
#[derive(Debug)]
pub struct PollState {
    pub all_votes: Vec<usize>,
    pub own_picks: Vec<usize>,
}

const POST_COLUMNS: &str = "p.id, p.community_id, p.author_id, p.title, p.kind, p.body, \
                            p.poll_options, p.poll_allow_multiple, p.poll_anonymous, \
                            p.reply_count, p.last_reply_at, p.created_at";

fn body_from_columns(
    kind_raw: &str,
    body: String,
    poll_options: Option<String>,
    allow_multiple: Option<bool>,
    anonymous: Option<bool>,
) -> rusqlite::Result<PostBody> {
    if kind_raw == "poll" {
        let options_json = poll_options.unwrap_or_else(|| "[]".to_string());
        let texts: Vec<String> = serde_json::from_str(&options_json).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(err))
        })?;
        return Ok(PostBody::Poll(PollConfig {
            options: texts
                .into_iter()
                .map(|text| PollOption { text })
                .collect(),
            allow_multiple: allow_multiple.unwrap_or(false),
            anonymous: anonymous.unwrap_or(true),
        }));
    }
    let kind = PostKind::parse(kind_raw).unwrap_or(PostKind::General);
    Ok(PostBody::Text { kind, body })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<CommunityPost> {
    let kind_raw: String = row.get(4)?;
    let body_raw: String = row.get(5)?;
    let poll_options: Option<String> = row.get(6)?;
    let allow_multiple: Option<bool> = row.get(7)?;
    let anonymous: Option<bool> = row.get(8)?;
    let last_reply_raw: Option<String> = row.get(10)?;
    let created_raw: String = row.get(11)?;
    Ok(CommunityPost {
        id: row.get(0)?,
        community_id: row.get(1)?,
        author_id: row.get(2)?,
        title: row.get(3)?,
        body: body_from_columns(&kind_raw, body_raw, poll_options, allow_multiple, anonymous)?,
        reply_count: row.get(9)?,
        last_reply_at: parse_ts_opt(10, last_reply_raw.as_deref())?,
        created_at: parse_ts(11, &created_raw)?,
    })
}

impl Store {
    /// Inserts the post and bumps the community's activity timestamp
    /// together.
    pub async fn create_post(
        &self,
        community_id: i64,
        author_id: i64,
        title: String,
        body: PostBody,
    ) -> StoreResult<i64> {
        self.conn
            .call(move |conn| {
                let now = Utc::now().to_rfc3339();
                let (text_body, poll_options, allow_multiple, anonymous) = match &body {
                    PostBody::Text { body, .. } => {
                        (body.clone(), None, None, None)
                    }
                    PostBody::Poll(cfg) => {
                        let texts: Vec<&str> =
                            cfg.options.iter().map(|o| o.text.as_str()).collect();
                        let json = serde_json::to_string(&texts).map_err(|err| {
                            rusqlite::Error::ToSqlConversionFailure(Box::new(err))
                        })?;
                        (
                            String::new(),
                            Some(json),
                            Some(cfg.allow_multiple),
                            Some(cfg.anonymous),
                        )
                    }
                };
                conn.execute(
                    "INSERT INTO posts (community_id, author_id, title, kind, body,
                                        poll_options, poll_allow_multiple, poll_anonymous, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        community_id,
                        author_id,
                        title,
                        body.kind_str(),
                        text_body,
                        poll_options,
                        allow_multiple,
                        anonymous,
                        now,
                    ],
                )?;
                let id = conn.last_insert_rowid();
                conn.execute(
                    "UPDATE communities SET last_activity_at = ?1 WHERE id = ?2",
                    params![now, community_id],
                )?;
                Ok(id)
            })
            .await
    }

    pub async fn list_posts(&self, community_id: i64) -> StoreResult<Vec<PostWithAuthor>> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {POST_COLUMNS}, u.first_name, u.last_name, u.username
                     FROM posts p
                     JOIN users u ON u.id = p.author_id
                     WHERE p.community_id = ?1
                     ORDER BY p.created_at DESC"
                ))?;
                let rows = stmt
                    .query_map(params![community_id], |row| {
                        Ok(PostWithAuthor {
                            post: post_from_row(row)?,
                            author_name: display_name_from_row(row, 12)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn get_post(&self, post_id: i64) -> StoreResult<Option<PostWithAuthor>> {
        self.conn
            .call(move |conn| {
                let post = conn
                    .query_row(
                        &format!(
                            "SELECT {POST_COLUMNS}, u.first_name, u.last_name, u.username
                             FROM posts p
                             JOIN users u ON u.id = p.author_id
                             WHERE p.id = ?1"
                        ),
                        params![post_id],
                        |row| {
                            Ok(PostWithAuthor {
                                post: post_from_row(row)?,
                                author_name: display_name_from_row(row, 12)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(post)
            })
            .await
    }

    /// Toggle semantics in one closure: same-option vote removes the
    /// row; otherwise single-select polls clear the caller's prior picks
    /// before inserting.
    pub async fn toggle_vote(
        &self,
        post_id: i64,
        user_id: i64,
        option_index: usize,
        allow_multiple: bool,
    ) -> StoreResult<()> {
        self.conn
            .call(move |conn| {
                let idx = option_index as i64;
                let removed = conn.execute(
                    "DELETE FROM poll_votes
                     WHERE post_id = ?1 AND user_id = ?2 AND option_index = ?3",
                    params![post_id, user_id, idx],
                )?;
                if removed > 0 {
                    return Ok(());
                }
                if !allow_multiple {
                    conn.execute(
                        "DELETE FROM poll_votes WHERE post_id = ?1 AND user_id = ?2",
                        params![post_id, user_id],
                    )?;
                }
                conn.execute(
                    "INSERT INTO poll_votes (post_id, user_id, option_index, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![post_id, user_id, idx, Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn poll_state(&self, post_id: i64, user_id: i64) -> StoreResult<PollState> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT option_index, user_id FROM poll_votes WHERE post_id = ?1",
                )?;
                let rows = stmt
                    .query_map(params![post_id], |row| {
                        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                let mut all_votes = Vec::with_capacity(rows.len());
                let mut own_picks = Vec::new();
                for (idx, voter) in rows {
                    let idx = usize::try_from(idx).unwrap_or(usize::MAX);
                    all_votes.push(idx);
                    if voter == user_id {
                        own_picks.push(idx);
                    }
                }
                own_picks.sort_unstable();
                Ok(PollState {
                    all_votes,
                    own_picks,
                })
            })
            .await
    }

    pub async fn list_replies(&self, post_id: i64) -> StoreResult<Vec<ReplyWithAuthor>> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT r.id, r.post_id, r.parent_id, r.author_id, r.body, r.created_at,
                            u.first_name, u.last_name, u.username
                     FROM replies r
                     JOIN users u ON u.id = r.author_id
                     WHERE r.post_id = ?1
                     ORDER BY r.created_at, r.id",
                )?;
                let rows = stmt
                    .query_map(params![post_id], |row| {
                        let created_raw: String = row.get(5)?;
                        Ok(ReplyWithAuthor {
                            reply: selah_model::CommunityReply {
                                id: row.get(0)?,
                                post_id: row.get(1)?,
                                parent_id: row.get(2)?,
                                author_id: row.get(3)?,
                                body: row.get(4)?,
                                created_at: parse_ts(5, &created_raw)?,
                            },
                            author_name: display_name_from_row(row, 6)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
    }

    /// Post id the reply belongs to, for parent validation.
    pub async fn reply_post_id(&self, reply_id: i64) -> StoreResult<Option<i64>> {
        self.conn
            .call(move |conn| {
                let post_id = conn
                    .query_row(
                        "SELECT post_id FROM replies WHERE id = ?1",
                        params![reply_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(post_id)
            })
            .await
    }

    /// Inserts the reply and bumps the post's reply counters and the
    /// community's activity timestamp together.
    pub async fn create_reply(
        &self,
        post_id: i64,
        parent_id: Option<i64>,
        author_id: i64,
        body: String,
    ) -> StoreResult<i64> {
        self.conn
            .call(move |conn| {
                let now = Utc::now().to_rfc3339();
                conn.execute(
                    "INSERT INTO replies (post_id, parent_id, author_id, body, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![post_id, parent_id, author_id, body, now],
                )?;
                let id = conn.last_insert_rowid();
                conn.execute(
                    "UPDATE posts SET reply_count = reply_count + 1, last_reply_at = ?1 WHERE id = ?2",
                    params![now, post_id],
                )?;
                conn.execute(
                    "UPDATE communities SET last_activity_at = ?1
                     WHERE id = (SELECT community_id FROM posts WHERE id = ?2)",
                    params![now, post_id],
                )?;
                Ok(id)
            })
            .await
    }
}

fn display_name_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<String> {
    let first: String = row.get(offset)?;
    let last: String = row.get(offset + 1)?;
    let username: String = row.get(offset + 2)?;
    let full = format!("{} {}", first.trim(), last.trim());
    let full = full.trim();
    if !full.is_empty() {
        return Ok(full.to_string());
    }
    if !username.trim().is_empty() {
        return Ok(username);
    }
    Ok("Unknown".to_string())
}
