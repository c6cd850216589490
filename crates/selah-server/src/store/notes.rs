use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use selah_model::{Note, NoteScope, NoteSort, SortDirection};

use super::{parse_ts, Store, StoreResult};

/// List parameters after query-string parsing and clamping.
#[derive(Debug)]
pub struct NoteQuery {
    pub q: Option<String>,
    pub bible_id: Option<String>,
    /// Chapter-prefix filter, e.g. `GEN` matches `GEN.1`, `GEN.2`.
    pub book_id: Option<String>,
    pub sort: NoteSort,
    pub direction: SortDirection,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug)]
pub struct NoteListPage {
    pub notes: Vec<Note>,
    pub total: i64,
}

const NOTE_COLUMNS: &str = "id, user_id, bible_id, chapter_id, range_start, range_end, \
                            title, text, created_at, updated_at";

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    let created_raw: String = row.get(8)?;
    let updated_raw: String = row.get(9)?;
    Ok(Note {
        id: row.get(0)?,
        user_id: row.get(1)?,
        bible_id: row.get(2)?,
        chapter_id: row.get(3)?,
        range_start: row.get(4)?,
        range_end: row.get(5)?,
        title: row.get(6)?,
        text: row.get(7)?,
        created_at: parse_ts(8, &created_raw)?,
        updated_at: parse_ts(9, &updated_raw)?,
    })
}

impl Store {
    pub async fn list_notes(&self, user_id: i64, query: NoteQuery) -> StoreResult<NoteListPage> {
        self.conn
            .call(move |conn| {
                let mut filter = String::from("user_id = ?");
                let mut args: Vec<SqlValue> = vec![SqlValue::Integer(user_id)];
                if let Some(q) = &query.q {
                    let needle = format!("%{}%", q.to_lowercase());
                    filter.push_str(" AND (lower(title) LIKE ? OR lower(text) LIKE ?)");
                    args.push(SqlValue::Text(needle.clone()));
                    args.push(SqlValue::Text(needle));
                }
                if let Some(bible_id) = &query.bible_id {
                    filter.push_str(" AND bible_id = ?");
                    args.push(SqlValue::Text(bible_id.clone()));
                }
                if let Some(book_id) = &query.book_id {
                    filter.push_str(" AND chapter_id LIKE ?");
                    args.push(SqlValue::Text(format!("{book_id}.%")));
                }

                let total: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM notes WHERE {filter}"),
                    params_from_iter(args.iter().cloned()),
                    |row| row.get(0),
                )?;

                let order = match (query.sort, query.direction) {
                    (NoteSort::Title, SortDirection::Asc) => "lower(title) ASC",
                    (NoteSort::Title, SortDirection::Desc) => "lower(title) DESC",
                    (NoteSort::UpdatedAt, SortDirection::Asc) => "updated_at ASC",
                    (NoteSort::UpdatedAt, SortDirection::Desc) => "updated_at DESC",
                };
                let mut stmt = conn.prepare(&format!(
                    "SELECT {NOTE_COLUMNS} FROM notes WHERE {filter} ORDER BY {order} LIMIT ? OFFSET ?"
                ))?;
                args.push(SqlValue::Integer(query.limit));
                args.push(SqlValue::Integer(query.offset));
                let notes = stmt
                    .query_map(params_from_iter(args), note_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(NoteListPage { notes, total })
            })
            .await
    }

    pub async fn note_exists(
        &self,
        user_id: i64,
        bible_id: String,
        chapter_id: String,
    ) -> StoreResult<bool> {
        self.conn
            .call(move |conn| {
                let exists = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM notes
                     WHERE user_id = ?1 AND bible_id = ?2 AND chapter_id = ?3)",
                    params![user_id, bible_id, chapter_id],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
    }

    /// Most recently updated note for an exact scope tuple. `IS` keeps
    /// null ranges matching null, not failing the comparison.
    pub async fn latest_note_for_scope(
        &self,
        user_id: i64,
        scope: NoteScope,
    ) -> StoreResult<Option<Note>> {
        self.conn
            .call(move |conn| {
                let note = conn
                    .query_row(
                        &format!(
                            "SELECT {NOTE_COLUMNS} FROM notes
                             WHERE user_id = ?1 AND bible_id = ?2 AND chapter_id = ?3
                               AND range_start IS ?4 AND range_end IS ?5
                             ORDER BY updated_at DESC LIMIT 1"
                        ),
                        params![
                            user_id,
                            scope.bible_id,
                            scope.chapter_id,
                            scope.range_start,
                            scope.range_end,
                        ],
                        note_from_row,
                    )
                    .optional()?;
                Ok(note)
            })
            .await
    }

    /// Always inserts; the scope uniqueness index rejects a second note
    /// on the same scope with a constraint violation.
    pub async fn create_note(
        &self,
        user_id: i64,
        scope: NoteScope,
        title: String,
        text: String,
    ) -> StoreResult<Note> {
        self.conn
            .call(move |conn| {
                let now = Utc::now().to_rfc3339();
                conn.execute(
                    "INSERT INTO notes (user_id, bible_id, chapter_id, range_start, range_end, title, text, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                    params![
                        user_id,
                        scope.bible_id,
                        scope.chapter_id,
                        scope.range_start,
                        scope.range_end,
                        title,
                        text,
                        now,
                    ],
                )?;
                let id = conn.last_insert_rowid();
                conn.query_row(
                    &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
                    params![id],
                    note_from_row,
                )
                .map_err(Into::into)
            })
            .await
    }

    pub async fn get_note(&self, user_id: i64, id: i64) -> StoreResult<Option<Note>> {
        self.conn
            .call(move |conn| {
                let note = conn
                    .query_row(
                        &format!(
                            "SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1 AND user_id = ?2"
                        ),
                        params![id, user_id],
                        note_from_row,
                    )
                    .optional()?;
                Ok(note)
            })
            .await
    }

    pub async fn update_note(
        &self,
        user_id: i64,
        id: i64,
        title: Option<String>,
        text: Option<String>,
    ) -> StoreResult<Option<Note>> {
        self.conn
            .call(move |conn| {
                let existing = conn
                    .query_row(
                        &format!(
                            "SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1 AND user_id = ?2"
                        ),
                        params![id, user_id],
                        note_from_row,
                    )
                    .optional()?;
                if existing.is_none() {
                    return Ok(None);
                }
                conn.execute(
                    "UPDATE notes SET title = coalesce(?1, title), text = coalesce(?2, text), updated_at = ?3
                     WHERE id = ?4",
                    params![title, text, Utc::now().to_rfc3339(), id],
                )?;
                let note = conn.query_row(
                    &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
                    params![id],
                    note_from_row,
                )?;
                Ok(Some(note))
            })
            .await
    }

    pub async fn delete_note(&self, user_id: i64, id: i64) -> StoreResult<bool> {
        self.conn
            .call(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM notes WHERE id = ?1 AND user_id = ?2",
                    params![id, user_id],
                )?;
                Ok(deleted > 0)
            })
            .await
    }
}
