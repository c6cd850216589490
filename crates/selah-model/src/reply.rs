use chrono::{DateTime, Utc};

/// A reply under a post. `parent_id` points at another reply on the same
/// post when the reply is threaded; replies are stored flat and threads
/// are reconstructed by grouping children by parent at read time.
#[derive(Debug, Clone)]
pub struct CommunityReply {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub author_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
