use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::text::truncate_chars;

/// How many characters of the body make it into the list-view subtitle.
pub const SUBTITLE_CHARS: usize = 140;

/// Non-poll post categories. An unrecognized or missing category falls
/// back to `General`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    General,
    Questions,
    Announcements,
}

impl PostKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Questions => "questions",
            Self::Announcements => "announcements",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "general" => Some(Self::General),
            "questions" => Some(Self::Questions),
            "announcements" => Some(Self::Announcements),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    pub options: Vec<PollOption>,
    pub allow_multiple: bool,
    pub anonymous: bool,
}

impl PollConfig {
    /// Trim option texts and drop empties; a valid poll needs at least
    /// two options left afterwards.
    #[must_use]
    pub fn clean_options(raw: Vec<String>) -> Vec<PollOption> {
        raw.into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(|text| PollOption { text })
            .collect()
    }
}

/// Post content as a tagged union so a poll post cannot exist without its
/// options and a text post cannot carry poll configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostBody {
    Text { kind: PostKind, body: String },
    Poll(PollConfig),
}

impl PostBody {
    /// Storage/wire tag: one of general, questions, announcements, poll.
    #[must_use]
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Text { kind, .. } => kind.as_str(),
            Self::Poll(_) => "poll",
        }
    }

    /// Display category shown in post lists.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Text {
                kind: PostKind::General,
                ..
            } => "General",
            Self::Text {
                kind: PostKind::Questions,
                ..
            } => "Questions",
            Self::Text {
                kind: PostKind::Announcements,
                ..
            } => "Announcements",
            Self::Poll(_) => "Poll",
        }
    }

    #[must_use]
    pub fn poll(&self) -> Option<&PollConfig> {
        match self {
            Self::Poll(cfg) => Some(cfg),
            Self::Text { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommunityPost {
    pub id: i64,
    pub community_id: i64,
    pub author_id: i64,
    pub title: String,
    pub body: PostBody,
    pub reply_count: i64,
    pub last_reply_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CommunityPost {
    /// Short list-view subtitle. Polls carry no free-text body, so they
    /// yield an empty subtitle.
    #[must_use]
    pub fn subtitle(&self) -> String {
        match &self.body {
            PostBody::Text { body, .. } => truncate_chars(body, SUBTITLE_CHARS),
            PostBody::Poll(_) => String::new(),
        }
    }
}

/// Aggregate vote counts for a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollTally {
    pub counts: Vec<u64>,
    pub total: u64,
}

/// Count votes per option. Stored indices outside the options list are
/// ignored rather than trusted.
#[must_use]
pub fn tally_votes(option_count: usize, votes: impl IntoIterator<Item = usize>) -> PollTally {
    let mut counts = vec![0u64; option_count];
    let mut total = 0u64;
    for idx in votes {
        if let Some(slot) = counts.get_mut(idx) {
            *slot += 1;
            total += 1;
        }
    }
    PollTally { counts, total }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kind_is_not_parsed() {
        assert_eq!(PostKind::parse("poll"), None);
        assert_eq!(PostKind::parse("general"), Some(PostKind::General));
    }

    #[test]
    fn clean_options_trims_and_drops_empties() {
        let opts = PollConfig::clean_options(vec![
            "  yes ".to_string(),
            "".to_string(),
            "   ".to_string(),
            "no".to_string(),
        ]);
        assert_eq!(
            opts,
            vec![
                PollOption {
                    text: "yes".to_string()
                },
                PollOption {
                    text: "no".to_string()
                },
            ]
        );
    }

    #[test]
    fn body_tags_and_categories_line_up() {
        let poll = PostBody::Poll(PollConfig {
            options: PollConfig::clean_options(vec!["a".into(), "b".into()]),
            allow_multiple: false,
            anonymous: true,
        });
        assert_eq!(poll.kind_str(), "poll");
        assert_eq!(poll.category(), "Poll");

        let text = PostBody::Text {
            kind: PostKind::Questions,
            body: "why?".to_string(),
        };
        assert_eq!(text.kind_str(), "questions");
        assert_eq!(text.category(), "Questions");
        assert!(text.poll().is_none());
    }

    #[test]
    fn tally_ignores_out_of_range_indices() {
        let tally = tally_votes(2, vec![0, 1, 1, 7]);
        assert_eq!(tally.counts, vec![1, 2]);
        assert_eq!(tally.total, 3);
    }

    #[test]
    fn subtitle_truncates_long_bodies() {
        let post = CommunityPost {
            id: 1,
            community_id: 1,
            author_id: 1,
            title: "t".to_string(),
            body: PostBody::Text {
                kind: PostKind::General,
                body: "x".repeat(200),
            },
            reply_count: 0,
            last_reply_at: None,
            created_at: Utc::now(),
        };
        let subtitle = post.subtitle();
        assert_eq!(subtitle.chars().count(), SUBTITLE_CHARS + 1);
        assert!(subtitle.ends_with('…'));
    }
}
