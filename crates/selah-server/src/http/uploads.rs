use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

fn content_type_for(file_name: &str) -> &'static str {
    match file_name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

fn safe_file_name(raw: &str) -> Option<&str> {
    if raw.is_empty() || raw.contains("..") || raw.contains('/') || raw.contains('\\') {
        return None;
    }
    Some(raw)
}

/// Serves hero images from the uploads directory. Only bare file names
/// are accepted so requests cannot escape the directory.
pub(crate) async fn serve_upload(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> ApiResult<Response> {
    let file_name =
        safe_file_name(&file).ok_or_else(|| ApiError::not_found("File not found"))?;
    let path = state.config.uploads_dir.join(file_name);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::not_found("File not found"))?;
    Ok((
        [(header::CONTENT_TYPE, content_type_for(file_name))],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_attempts_are_rejected() {
        assert_eq!(safe_file_name("../etc/passwd"), None);
        assert_eq!(safe_file_name("a/b.png"), None);
        assert_eq!(safe_file_name("a\\b.png"), None);
        assert_eq!(safe_file_name(""), None);
        assert_eq!(safe_file_name("hero.png"), Some("hero.png"));
    }

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("a.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }
}
