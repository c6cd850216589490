use chrono::{DateTime, Utc};

use crate::text::{clamp, collapse_whitespace};

pub const MAX_TITLE_CHARS: usize = 120;
pub const MAX_TEXT_CHARS: usize = 50_000;
pub const PREVIEW_CHARS: usize = 160;

/// A personal scripture annotation. Range fields are null for a
/// chapter-level note that is not scoped to specific verses.
#[derive(Debug, Clone)]
pub struct Note {
    pub id: i64,
    pub user_id: i64,
    pub bible_id: String,
    pub chapter_id: String,
    pub range_start: Option<i64>,
    pub range_end: Option<i64>,
    pub title: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Whitespace-collapsed preview for list views.
    #[must_use]
    pub fn preview(&self) -> String {
        preview_of(&self.text)
    }
}

#[must_use]
pub fn preview_of(text: &str) -> String {
    collapse_whitespace(text).chars().take(PREVIEW_CHARS).collect()
}

#[must_use]
pub fn clamp_title(raw: &str) -> String {
    clamp(raw, MAX_TITLE_CHARS)
}

#[must_use]
pub fn clamp_text(raw: &str) -> String {
    clamp(raw, MAX_TEXT_CHARS)
}

/// The passage a note annotates. One user may hold at most one note per
/// exact scope tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteScope {
    pub bible_id: String,
    pub chapter_id: String,
    pub range_start: Option<i64>,
    pub range_end: Option<i64>,
}

/// Sort field accepted by the notes list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteSort {
    UpdatedAt,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl NoteSort {
    /// Parse a `field:dir` sort expression, defaulting to newest-updated
    /// first on anything unrecognized.
    #[must_use]
    pub fn parse(raw: &str) -> (Self, SortDirection) {
        let (field_raw, dir_raw) = raw.split_once(':').unwrap_or((raw, "desc"));
        let field = if field_raw == "title" {
            Self::Title
        } else {
            Self::UpdatedAt
        };
        let dir = if dir_raw == "asc" {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        };
        (field, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_collapses_and_caps() {
        let text = format!("a  b\n\nc {}", "x".repeat(300));
        let p = preview_of(&text);
        assert!(p.starts_with("a b c "));
        assert_eq!(p.chars().count(), PREVIEW_CHARS);
    }

    #[test]
    fn title_and_text_are_clamped() {
        assert_eq!(clamp_title(&"t".repeat(500)).chars().count(), MAX_TITLE_CHARS);
        assert_eq!(clamp_text("  body  "), "body");
    }

    #[test]
    fn sort_parse_handles_all_forms() {
        assert_eq!(
            NoteSort::parse("title:asc"),
            (NoteSort::Title, SortDirection::Asc)
        );
        assert_eq!(
            NoteSort::parse("updatedAt:desc"),
            (NoteSort::UpdatedAt, SortDirection::Desc)
        );
        assert_eq!(
            NoteSort::parse("garbage"),
            (NoteSort::UpdatedAt, SortDirection::Desc)
        );
    }
}
