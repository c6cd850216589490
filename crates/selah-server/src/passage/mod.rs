//! Verse extraction for the scripture passage proxy. The upstream page
//! is loosely structured HTML; the pipeline flattens it to plain text
//! and then segments verses on `chapter:verse` markers.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));
static QUOTE_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Bible\s*Quote:?").expect("quote label regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
// Heading like "레위기 3장" ahead of the first verse marker.
static HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[\u{3131}-\u{D79D}\w\s"'「」()]+?\d+\s*장\s*"#).expect("heading regex")
});
static VERSE_MARK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*:\s*(\d+)").expect("verse marker regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verse {
    pub id: String,
    pub number: u32,
    pub text: String,
}

fn collapse(raw: &str) -> String {
    WHITESPACE_RE.replace_all(raw, " ").trim().to_string()
}

/// Flatten upstream HTML to one whitespace-normalized text block with
/// the boilerplate label and leading chapter heading removed.
fn plain_text(html: &str) -> String {
    let no_tags = TAG_RE.replace_all(html, " ");
    let no_label = QUOTE_LABEL_RE.replace_all(&no_tags, " ");
    let collapsed = collapse(&no_label);
    let no_heading = HEADING_RE.replace(&collapsed, " ");
    no_heading.trim().to_string()
}

/// Segment a chapter's verses out of an upstream HTML page.
///
/// Markers from a different chapter (upstream bleed from adjacent
/// chapters) and empty bodies are dropped; duplicate verse ids keep
/// their first occurrence. When no marker matches at all but text
/// remains, the whole block becomes a single synthetic verse 1.
pub fn parse_chapter(html: &str, book_code: &str, chapter: u32) -> Vec<Verse> {
    let plain = plain_text(html);
    if plain.is_empty() {
        return Vec::new();
    }

    struct Marker {
        body_start: usize,
        marker_start: usize,
        chapter: u32,
        verse: u32,
    }
    let markers: Vec<Marker> = VERSE_MARK_RE
        .captures_iter(&plain)
        .filter_map(|cap| {
            let full = cap.get(0)?;
            Some(Marker {
                body_start: full.end(),
                marker_start: full.start(),
                chapter: cap.get(1)?.as_str().parse().ok()?,
                verse: cap.get(2)?.as_str().parse().ok()?,
            })
        })
        .collect();

    let mut verses: Vec<Verse> = Vec::new();
    for (i, marker) in markers.iter().enumerate() {
        if marker.chapter != chapter {
            continue;
        }
        let body_end = markers
            .get(i + 1)
            .map(|next| next.marker_start)
            .unwrap_or(plain.len());
        let body = collapse(&plain[marker.body_start..body_end]);
        if body.is_empty() {
            continue;
        }
        let id = format!("{book_code}.{chapter}.{}", marker.verse);
        if verses.iter().any(|v| v.id == id) {
            continue;
        }
        verses.push(Verse {
            id,
            number: marker.verse,
            text: body,
        });
    }

    if verses.is_empty() {
        verses.push(Verse {
            id: format!("{book_code}.{chapter}.1"),
            number: 1,
            text: plain,
        });
    }
    verses
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "<html><body><b>Bible Quote:</b> 창세기 1장 \
        1:1 태초에 하나님이 천지를 창조하시니라 \
        1:2 땅이 혼돈하고 공허하며 <br/> \
        1:2 땅이 혼돈하고 공허하며 \
        2:1 천지와 만물이 다 이루어지니라</body></html>";

    #[test]
    fn parses_ordered_verses_with_ids() {
        let verses = parse_chapter(SAMPLE, "GEN", 1);
        assert_eq!(verses.len(), 2);
        assert_eq!(verses[0].id, "GEN.1.1");
        assert_eq!(verses[0].number, 1);
        assert!(verses[0].text.contains("태초에"));
        assert!(verses.iter().all(|v| v.id.starts_with("GEN.1.")));
        assert!(verses.iter().all(|v| !v.text.is_empty()));
    }

    #[test]
    fn drops_adjacent_chapter_bleed() {
        let verses = parse_chapter(SAMPLE, "GEN", 1);
        assert!(verses.iter().all(|v| v.number != 0));
        assert!(!verses.iter().any(|v| v.text.contains("천지와 만물")));
    }

    #[test]
    fn deduplicates_repeated_verse_ids() {
        let verses = parse_chapter(SAMPLE, "GEN", 1);
        let twos: Vec<_> = verses.iter().filter(|v| v.number == 2).collect();
        assert_eq!(twos.len(), 1);
    }

    #[test]
    fn strips_tags_label_and_heading() {
        let verses = parse_chapter(SAMPLE, "GEN", 1);
        let joined: String = verses.iter().map(|v| v.text.as_str()).collect();
        assert!(!joined.contains('<'));
        assert!(!joined.contains("Bible Quote"));
        assert!(!joined.contains("창세기 1장"));
    }

    #[test]
    fn falls_back_to_single_synthetic_verse() {
        let verses = parse_chapter("<p>no markers here at all</p>", "GEN", 3);
        assert_eq!(verses.len(), 1);
        assert_eq!(verses[0].id, "GEN.3.1");
        assert_eq!(verses[0].number, 1);
        assert_eq!(verses[0].text, "no markers here at all");
    }

    #[test]
    fn empty_upstream_yields_no_verses() {
        assert!(parse_chapter("<html></html>", "GEN", 1).is_empty());
    }
}
