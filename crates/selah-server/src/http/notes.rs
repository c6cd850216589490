use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use selah_model::note::{clamp_title, clamp_text};
use selah_model::{Note, NoteScope, NoteSort};

use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::http::ok_body;
use crate::middleware::CurrentUser;
use crate::store::NoteQuery;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

fn note_json(note: &Note) -> Value {
    json!({
        "id": note.id,
        "bibleId": note.bible_id,
        "chapterId": note.chapter_id,
        "rangeStart": note.range_start,
        "rangeEnd": note.range_end,
        "title": note.title,
        "text": note.text,
        "preview": note.preview(),
        "createdAt": note.created_at.to_rfc3339(),
        "updatedAt": note.updated_at.to_rfc3339(),
    })
}

/// Range query values arrive as strings; empty, "null", and
/// non-numeric values all mean "no range bound".
fn to_null_or_number(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if raw.is_empty() || raw == "null" {
        return None;
    }
    raw.parse().ok()
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListParams {
    q: Option<String>,
    bible_id: Option<String>,
    book_id: Option<String>,
    sort: Option<String>,
    limit: Option<String>,
    offset: Option<String>,
}

pub(crate) async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(params): Query<ListParams>,
) -> ApiResult<Response> {
    let (sort, direction) = NoteSort::parse(params.sort.as_deref().unwrap_or("updatedAt:desc"));
    let limit = params
        .limit
        .as_deref()
        .and_then(|raw| raw.parse::<i64>().ok())
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, MAX_LIMIT);
    let offset = params
        .offset
        .as_deref()
        .and_then(|raw| raw.parse::<i64>().ok())
        .unwrap_or(0)
        .max(0);

    let page = state
        .store
        .list_notes(
            user_id,
            NoteQuery {
                q: non_empty(params.q),
                bible_id: non_empty(params.bible_id),
                book_id: non_empty(params.book_id),
                sort,
                direction,
                limit,
                offset,
            },
        )
        .await?;

    let notes: Vec<Value> = page.notes.iter().map(note_json).collect();
    Ok(ok_body(json!({ "notes": notes, "total": page.total })).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExistsParams {
    bible_id: Option<String>,
    chapter_id: Option<String>,
}

pub(crate) async fn exists(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(params): Query<ExistsParams>,
) -> ApiResult<Response> {
    let (Some(bible_id), Some(chapter_id)) =
        (non_empty(params.bible_id), non_empty(params.chapter_id))
    else {
        return Err(ApiError::validation("Missing bibleId or chapterId"));
    };
    let has_any = state.store.note_exists(user_id, bible_id, chapter_id).await?;
    Ok(ok_body(json!({ "hasAnyNote": has_any })).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScopeParams {
    bible_id: Option<String>,
    chapter_id: Option<String>,
    range_start: Option<String>,
    range_end: Option<String>,
}

impl ScopeParams {
    fn into_scope(self) -> ApiResult<NoteScope> {
        let (Some(bible_id), Some(chapter_id)) =
            (non_empty(self.bible_id), non_empty(self.chapter_id))
        else {
            return Err(ApiError::validation("Missing bibleId or chapterId"));
        };
        Ok(NoteScope {
            bible_id,
            chapter_id,
            range_start: to_null_or_number(self.range_start.as_deref()),
            range_end: to_null_or_number(self.range_end.as_deref()),
        })
    }
}

pub(crate) async fn latest_for_scope(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(params): Query<ScopeParams>,
) -> ApiResult<Response> {
    let scope = params.into_scope()?;
    let note = state.store.latest_note_for_scope(user_id, scope).await?;
    Ok(ok_body(json!({ "note": note.as_ref().map(note_json) })).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateRequest {
    bible_id: Option<String>,
    chapter_id: Option<String>,
    range_start: Option<Value>,
    range_end: Option<Value>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    text: String,
}

fn json_null_or_number(raw: Option<&Value>) -> Option<i64> {
    match raw {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => to_null_or_number(Some(s)),
        _ => None,
    }
}

pub(crate) async fn create(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<CreateRequest>,
) -> ApiResult<Response> {
    let (Some(bible_id), Some(chapter_id)) = (non_empty(req.bible_id), non_empty(req.chapter_id))
    else {
        return Err(ApiError::validation("Missing bibleId or chapterId"));
    };
    let scope = NoteScope {
        bible_id,
        chapter_id,
        range_start: json_null_or_number(req.range_start.as_ref()),
        range_end: json_null_or_number(req.range_end.as_ref()),
    };
    let title = clamp_title(&req.title);
    let text = clamp_text(&req.text);

    match state.store.create_note(user_id, scope, title, text).await {
        Ok(note) => Ok((
            StatusCode::CREATED,
            ok_body(json!({ "note": note_json(&note) })),
        )
            .into_response()),
        Err(err) if is_unique_violation(&err) => Err(ApiError::Conflict(
            "A note already exists for this passage".to_string(),
        )),
        Err(err) => Err(err.into()),
    }
}

pub(crate) async fn get_by_id(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let note = state
        .store
        .get_note(user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Note not found"))?;
    Ok(ok_body(json!({ "note": note_json(&note) })).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    text: String,
}

pub(crate) async fn update(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRequest>,
) -> ApiResult<Response> {
    let note = state
        .store
        .update_note(
            user_id,
            id,
            Some(clamp_title(&req.title)),
            Some(clamp_text(&req.text)),
        )
        .await?
        .ok_or_else(|| ApiError::not_found("Note not found"))?;
    Ok(ok_body(json!({ "note": note_json(&note) })).into_response())
}

pub(crate) async fn delete(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    if !state.store.delete_note(user_id, id).await? {
        return Err(ApiError::not_found("Note not found"));
    }
    Ok(ok_body(json!({})).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_markers_and_garbage_become_none() {
        assert_eq!(to_null_or_number(None), None);
        assert_eq!(to_null_or_number(Some("")), None);
        assert_eq!(to_null_or_number(Some("null")), None);
        assert_eq!(to_null_or_number(Some("abc")), None);
        assert_eq!(to_null_or_number(Some("12")), Some(12));
    }

    #[test]
    fn json_range_accepts_numbers_and_strings() {
        assert_eq!(json_null_or_number(Some(&json!(7))), Some(7));
        assert_eq!(json_null_or_number(Some(&json!("7"))), Some(7));
        assert_eq!(json_null_or_number(Some(&json!(null))), None);
        assert_eq!(json_null_or_number(None), None);
    }
}
