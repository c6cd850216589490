use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::http::ok_body;
use crate::passage;
use crate::AppState;

/// `chapterId` arrives as `BOOK.N`, e.g. `GEN.1`.
fn split_chapter_id(chapter_id: &str) -> Option<(&str, u32)> {
    let (book, chapter_raw) = chapter_id.split_once('.')?;
    let chapter: u32 = chapter_raw.parse().ok()?;
    if book.is_empty() || chapter == 0 {
        return None;
    }
    Some((book, chapter))
}

pub(crate) async fn get_passage(
    State(state): State<AppState>,
    Path((edition_id, chapter_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    if edition_id != "kor" {
        return Err(ApiError::NotImplemented(
            "Not implemented for this edition".to_string(),
        ));
    }
    let (book_code, chapter) = split_chapter_id(&chapter_id)
        .ok_or_else(|| ApiError::validation("Invalid chapterId"))?;

    let url = format!(
        "{}/quote.php?kor-{book_code}/{chapter}:1-200",
        state.config.passage_upstream_base
    );
    debug!(%url, "fetching passage upstream");

    let response = state
        .http
        .get(&url)
        .send()
        .await
        .map_err(|err| ApiError::Upstream(format!("Upstream fetch failed: {err}")))?;
    if !response.status().is_success() {
        return Err(ApiError::Upstream(format!(
            "Upstream returned {}",
            response.status().as_u16()
        )));
    }
    let html = response
        .text()
        .await
        .map_err(|err| ApiError::Upstream(format!("Upstream read failed: {err}")))?;

    let verses = passage::parse_chapter(&html, book_code, chapter);
    Ok(ok_body(json!({
        "versionId": edition_id,
        "chapterId": chapter_id,
        "bookId": book_code,
        "chapter": chapter,
        "verses": verses,
    }))
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_id_splits_into_book_and_number() {
        assert_eq!(split_chapter_id("GEN.1"), Some(("GEN", 1)));
        assert_eq!(split_chapter_id("REV.22"), Some(("REV", 22)));
        assert_eq!(split_chapter_id("GEN"), None);
        assert_eq!(split_chapter_id("GEN.0"), None);
        assert_eq!(split_chapter_id(".3"), None);
        assert_eq!(split_chapter_id("GEN.x"), None);
    }
}
