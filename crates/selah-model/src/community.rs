use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The community categories offered at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommunityKind {
    #[serde(rename = "Bible Study")]
    BibleStudy,
    #[serde(rename = "Read Through")]
    ReadThrough,
    #[serde(rename = "Church Organization")]
    ChurchOrganization,
    #[serde(rename = "Prayer Group")]
    PrayerGroup,
    #[serde(rename = "Other")]
    Other,
}

impl CommunityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BibleStudy => "Bible Study",
            Self::ReadThrough => "Read Through",
            Self::ChurchOrganization => "Church Organization",
            Self::PrayerGroup => "Prayer Group",
            Self::Other => "Other",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Bible Study" => Some(Self::BibleStudy),
            "Read Through" => Some(Self::ReadThrough),
            "Church Organization" => Some(Self::ChurchOrganization),
            "Prayer Group" => Some(Self::PrayerGroup),
            "Other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Community {
    pub id: i64,
    pub header: String,
    pub subheader: String,
    pub content: String,
    pub kind: CommunityKind,
    pub owner_id: i64,
    /// Denormalized count, kept in step with membership inserts.
    pub members_count: i64,
    pub last_activity_at: DateTime<Utc>,
    pub hero_image_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Role a user holds within one community. Ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipRole {
    Owner,
    Leader,
    Member,
}

impl MembershipRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Leader => "Leader",
            Self::Member => "Member",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Owner" => Some(Self::Owner),
            "Leader" => Some(Self::Leader),
            "Member" => Some(Self::Member),
            _ => None,
        }
    }

    /// Owners and leaders may invite users and manage the hero image.
    #[must_use]
    pub fn can_manage(self) -> bool {
        matches!(self, Self::Owner | Self::Leader)
    }
}

#[derive(Debug, Clone)]
pub struct CommunityMembership {
    pub id: i64,
    pub user_id: i64,
    pub community_id: i64,
    pub role: MembershipRole,
    pub joined_at: DateTime<Utc>,
}

/// Member-count buckets used by the discover filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeBucket {
    Small,
    Medium,
    Large,
}

impl SizeBucket {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "small" => Some(Self::Small),
            "medium" => Some(Self::Medium),
            "large" => Some(Self::Large),
            _ => None,
        }
    }

    /// Inclusive member-count bounds; `None` means unbounded above.
    #[must_use]
    pub fn bounds(self) -> (i64, Option<i64>) {
        match self {
            Self::Small => (2, Some(10)),
            Self::Medium => (11, Some(30)),
            Self::Large => (31, None),
        }
    }
}

/// Recent-activity window filter for discover. Only 7/30/90 days are
/// recognized; anything else means no filter.
#[must_use]
pub fn activity_window_days(raw: &str) -> Option<i64> {
    match raw {
        "7" => Some(7),
        "30" => Some(30),
        "90" => Some(90),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            CommunityKind::BibleStudy,
            CommunityKind::ReadThrough,
            CommunityKind::ChurchOrganization,
            CommunityKind::PrayerGroup,
            CommunityKind::Other,
        ] {
            assert_eq!(CommunityKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(CommunityKind::parse("Book Club"), None);
    }

    #[test]
    fn manage_rights_follow_role() {
        assert!(MembershipRole::Owner.can_manage());
        assert!(MembershipRole::Leader.can_manage());
        assert!(!MembershipRole::Member.can_manage());
    }

    #[test]
    fn size_buckets_have_expected_ranges() {
        assert_eq!(SizeBucket::Small.bounds(), (2, Some(10)));
        assert_eq!(SizeBucket::Medium.bounds(), (11, Some(30)));
        assert_eq!(SizeBucket::Large.bounds(), (31, None));
        assert_eq!(SizeBucket::parse("tiny"), None);
    }

    #[test]
    fn activity_windows_are_restricted() {
        assert_eq!(activity_window_days("7"), Some(7));
        assert_eq!(activity_window_days("30"), Some(30));
        assert_eq!(activity_window_days("90"), Some(90));
        assert_eq!(activity_window_days("14"), None);
    }
}
