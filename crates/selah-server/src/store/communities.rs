use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use rusqlite::types::Value as SqlValue;
use selah_model::{Community, CommunityKind, MembershipRole, SizeBucket, UserSummary};

use super::{parse_ts, Store, StoreResult};

/// Discover query after parameter parsing. `exclude_user` drops the
/// caller's own communities from the results.
#[derive(Debug, Default)]
pub struct DiscoverFilter {
    pub q: Option<String>,
    pub kind: Option<CommunityKind>,
    pub size: Option<SizeBucket>,
    pub activity_days: Option<i64>,
    pub exclude_user: Option<i64>,
}

#[derive(Debug)]
pub struct MemberRow {
    pub user: UserSummary,
    pub role: MembershipRole,
}

#[derive(Debug)]
pub struct CommunityDetail {
    pub community: Community,
    pub owner: Option<UserSummary>,
    pub members: Vec<MemberRow>,
}

const COMMUNITY_COLUMNS: &str = "id, header, subheader, content, kind, owner_id, members_count, \
                                 last_activity_at, hero_image_path, created_at";

fn community_from_row(row: &Row<'_>) -> rusqlite::Result<Community> {
    let kind_raw: String = row.get(4)?;
    let kind = CommunityKind::parse(&kind_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("unknown community kind: {kind_raw}").into(),
        )
    })?;
    let last_activity: String = row.get(7)?;
    let created: String = row.get(9)?;
    Ok(Community {
        id: row.get(0)?,
        header: row.get(1)?,
        subheader: row.get(2)?,
        content: row.get(3)?,
        kind,
        owner_id: row.get(5)?,
        members_count: row.get(6)?,
        last_activity_at: parse_ts(7, &last_activity)?,
        hero_image_path: row.get(8)?,
        created_at: parse_ts(9, &created)?,
    })
}

fn role_from_raw(idx: usize, raw: &str) -> rusqlite::Result<MembershipRole> {
    MembershipRole::parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown membership role: {raw}").into(),
        )
    })
}

impl Store {
    /// Creates the community and its owner membership in one closure so
    /// `members_count` starts in step with the membership rows.
    pub async fn create_community(
        &self,
        owner_id: i64,
        header: String,
        subheader: String,
        content: String,
        kind: CommunityKind,
    ) -> StoreResult<Community> {
        self.conn
            .call(move |conn| {
                let now = Utc::now().to_rfc3339();
                conn.execute(
                    "INSERT INTO communities (header, subheader, content, kind, owner_id, members_count, last_activity_at, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
                    params![header, subheader, content, kind.as_str(), owner_id, now],
                )?;
                let id = conn.last_insert_rowid();
                conn.execute(
                    "INSERT INTO memberships (user_id, community_id, role, joined_at)
                     VALUES (?1, ?2, 'Owner', ?3)",
                    params![owner_id, id, now],
                )?;
                conn.query_row(
                    &format!("SELECT {COMMUNITY_COLUMNS} FROM communities WHERE id = ?1"),
                    params![id],
                    community_from_row,
                )
                .map_err(Into::into)
            })
            .await
    }

    pub async fn get_community(&self, id: i64) -> StoreResult<Option<Community>> {
        self.conn
            .call(move |conn| {
                let community = conn
                    .query_row(
                        &format!("SELECT {COMMUNITY_COLUMNS} FROM communities WHERE id = ?1"),
                        params![id],
                        community_from_row,
                    )
                    .optional()?;
                Ok(community)
            })
            .await
    }

    pub async fn my_communities(
        &self,
        user_id: i64,
    ) -> StoreResult<Vec<(Community, MembershipRole)>> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT c.id, c.header, c.subheader, c.content, c.kind, c.owner_id,
                            c.members_count, c.last_activity_at, c.hero_image_path, c.created_at,
                            m.role
                     FROM communities c
                     JOIN memberships m ON m.community_id = c.id
                     WHERE m.user_id = ?1
                     ORDER BY c.last_activity_at DESC",
                )?;
                let rows = stmt
                    .query_map(params![user_id], |row| {
                        let community = community_from_row(row)?;
                        let role_raw: String = row.get(10)?;
                        Ok((community, role_from_raw(10, &role_raw)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn discover_communities(
        &self,
        filter: DiscoverFilter,
    ) -> StoreResult<Vec<Community>> {
        self.conn
            .call(move |conn| {
                let mut sql = format!(
                    "SELECT {COMMUNITY_COLUMNS} FROM communities WHERE 1 = 1"
                );
                let mut args: Vec<SqlValue> = Vec::new();
                if let Some(q) = &filter.q {
                    let needle = format!("%{}%", q.to_lowercase());
                    sql.push_str(
                        " AND (lower(header) LIKE ? OR lower(subheader) LIKE ? OR lower(content) LIKE ?)",
                    );
                    args.push(SqlValue::Text(needle.clone()));
                    args.push(SqlValue::Text(needle.clone()));
                    args.push(SqlValue::Text(needle));
                }
                if let Some(kind) = filter.kind {
                    sql.push_str(" AND kind = ?");
                    args.push(SqlValue::Text(kind.as_str().to_string()));
                }
                if let Some(size) = filter.size {
                    let (min, max) = size.bounds();
                    sql.push_str(" AND members_count >= ?");
                    args.push(SqlValue::Integer(min));
                    if let Some(max) = max {
                        sql.push_str(" AND members_count <= ?");
                        args.push(SqlValue::Integer(max));
                    }
                }
                if let Some(days) = filter.activity_days {
                    let cutoff = Utc::now() - chrono::Duration::days(days);
                    sql.push_str(" AND last_activity_at >= ?");
                    args.push(SqlValue::Text(cutoff.to_rfc3339()));
                }
                if let Some(user_id) = filter.exclude_user {
                    sql.push_str(
                        " AND id NOT IN (SELECT community_id FROM memberships WHERE user_id = ?)",
                    );
                    args.push(SqlValue::Integer(user_id));
                }
                sql.push_str(" ORDER BY last_activity_at DESC LIMIT 50");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params_from_iter(args), community_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn community_detail(&self, id: i64) -> StoreResult<Option<CommunityDetail>> {
        self.conn
            .call(move |conn| {
                let Some(community) = conn
                    .query_row(
                        &format!("SELECT {COMMUNITY_COLUMNS} FROM communities WHERE id = ?1"),
                        params![id],
                        community_from_row,
                    )
                    .optional()?
                else {
                    return Ok(None);
                };
                let mut stmt = conn.prepare(
                    "SELECT u.id, u.username, u.email, u.first_name, u.last_name, m.role
                     FROM memberships m
                     JOIN users u ON u.id = m.user_id
                     WHERE m.community_id = ?1
                     ORDER BY m.joined_at",
                )?;
                let members = stmt
                    .query_map(params![id], |row| {
                        let role_raw: String = row.get(5)?;
                        Ok(MemberRow {
                            user: UserSummary {
                                id: row.get(0)?,
                                username: row.get(1)?,
                                email: row.get(2)?,
                                first_name: row.get(3)?,
                                last_name: row.get(4)?,
                            },
                            role: role_from_raw(5, &role_raw)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                let owner = members
                    .iter()
                    .find(|m| m.user.id == community.owner_id)
                    .map(|m| m.user.clone());
                Ok(Some(CommunityDetail {
                    community,
                    owner,
                    members,
                }))
            })
            .await
    }

    pub async fn membership_role(
        &self,
        user_id: i64,
        community_id: i64,
    ) -> StoreResult<Option<MembershipRole>> {
        self.conn
            .call(move |conn| {
                let raw: Option<String> = conn
                    .query_row(
                        "SELECT role FROM memberships WHERE user_id = ?1 AND community_id = ?2",
                        params![user_id, community_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                raw.map(|raw| role_from_raw(0, &raw))
                    .transpose()
                    .map_err(Into::into)
            })
            .await
    }

    /// Idempotent membership insert. Returns true only when a new row
    /// was created; `members_count` moves only in that case.
    pub async fn add_member(
        &self,
        user_id: i64,
        community_id: i64,
        role: MembershipRole,
    ) -> StoreResult<bool> {
        self.conn
            .call(move |conn| {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO memberships (user_id, community_id, role, joined_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![user_id, community_id, role.as_str(), Utc::now().to_rfc3339()],
                )?;
                if inserted > 0 {
                    conn.execute(
                        "UPDATE communities SET members_count = members_count + 1 WHERE id = ?1",
                        params![community_id],
                    )?;
                }
                Ok(inserted > 0)
            })
            .await
    }

    pub async fn touch_community_activity(&self, community_id: i64) -> StoreResult<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE communities SET last_activity_at = ?1 WHERE id = ?2",
                    params![Utc::now().to_rfc3339(), community_id],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn set_hero_image(&self, community_id: i64, path: String) -> StoreResult<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE communities SET hero_image_path = ?1 WHERE id = ?2",
                    params![path, community_id],
                )?;
                Ok(())
            })
            .await
    }

    /// Owner and Leader member ids, used for new-post fan-out.
    pub async fn manager_ids(&self, community_id: i64) -> StoreResult<Vec<i64>> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT user_id FROM memberships
                     WHERE community_id = ?1 AND role IN ('Owner', 'Leader')",
                )?;
                let ids = stmt
                    .query_map(params![community_id], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<i64>>>()?;
                Ok(ids)
            })
            .await
    }

    #[cfg(test)]
    pub async fn membership_count(&self, community_id: i64) -> StoreResult<i64> {
        self.conn
            .call(move |conn| {
                let count = conn.query_row(
                    "SELECT COUNT(*) FROM memberships WHERE community_id = ?1",
                    params![community_id],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
    }
}
