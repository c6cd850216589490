use chrono::{DateTime, Utc};

/// Events that produce a notification row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    CommunityInvite,
    CommunityJoinRequest,
    CommunityNewPost,
}

impl NotificationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CommunityInvite => "COMMUNITY_INVITE",
            Self::CommunityJoinRequest => "COMMUNITY_JOIN_REQUEST",
            Self::CommunityNewPost => "COMMUNITY_NEW_POST",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "COMMUNITY_INVITE" => Some(Self::CommunityInvite),
            "COMMUNITY_JOIN_REQUEST" => Some(Self::CommunityJoinRequest),
            "COMMUNITY_NEW_POST" => Some(Self::CommunityNewPost),
            _ => None,
        }
    }

    /// Only invites and join-requests carry an accept/decline action.
    #[must_use]
    pub fn is_actionable(self) -> bool {
        matches!(self, Self::CommunityInvite | Self::CommunityJoinRequest)
    }
}

/// Resolution state of an actionable notification. Meaningless for
/// non-actionable kinds, which stay `Pending` forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    Pending,
    Accepted,
    Declined,
}

impl NotificationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }
}

/// The recipient's accept/decline choice on an actionable notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    Accept,
    Decline,
}

impl NotificationAction {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "accept" => Some(Self::Accept),
            "decline" => Some(Self::Decline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: i64,
    /// Recipient.
    pub user_id: i64,
    pub kind: NotificationKind,
    pub message: String,
    pub community_id: Option<i64>,
    /// Who triggered the event (inviter, requester, post author).
    pub actor_id: Option<i64>,
    pub post_id: Option<i64>,
    pub status: NotificationStatus,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actionable_kinds_are_invite_and_join_request() {
        assert!(NotificationKind::CommunityInvite.is_actionable());
        assert!(NotificationKind::CommunityJoinRequest.is_actionable());
        assert!(!NotificationKind::CommunityNewPost.is_actionable());
    }

    #[test]
    fn kind_and_status_round_trip() {
        for kind in [
            NotificationKind::CommunityInvite,
            NotificationKind::CommunityJoinRequest,
            NotificationKind::CommunityNewPost,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
        for status in [
            NotificationStatus::Pending,
            NotificationStatus::Accepted,
            NotificationStatus::Declined,
        ] {
            assert_eq!(NotificationStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn action_parse_rejects_unknown() {
        assert_eq!(
            NotificationAction::parse("accept"),
            Some(NotificationAction::Accept)
        );
        assert_eq!(
            NotificationAction::parse("decline"),
            Some(NotificationAction::Decline)
        );
        assert_eq!(NotificationAction::parse("snooze"), None);
    }
}
