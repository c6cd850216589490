#![forbid(unsafe_code)]

//! Model types shared by the Selah community backend.
//!
//! Pure data: records as they live in the store, the enums constraining
//! their fields, and the derivation helpers (previews, subtitles, poll
//! tallies) that operate on them. No I/O happens in this crate.

pub mod community;
pub mod note;
pub mod notification;
pub mod post;
pub mod reply;
pub mod text;
pub mod user;

pub use community::{
    activity_window_days, Community, CommunityKind, CommunityMembership, MembershipRole,
    SizeBucket,
};
pub use note::{Note, NoteScope, NoteSort, SortDirection};
pub use notification::{Notification, NotificationAction, NotificationKind, NotificationStatus};
pub use post::{tally_votes, CommunityPost, PollConfig, PollOption, PollTally, PostBody, PostKind};
pub use reply::CommunityReply;
pub use user::{User, UserSummary};
