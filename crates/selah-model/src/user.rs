use chrono::{DateTime, Utc};
use serde::Serialize;

/// A registered account. `username` and `email` are stored lowercase and
/// are unique across the system.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub provider: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Name shown next to posts and in notification messages. Falls back
    /// to the username when the profile has no name, then to "Unknown".
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if !full.is_empty() {
            return full.to_string();
        }
        if !self.username.trim().is_empty() {
            return self.username.clone();
        }
        "Unknown".to_string()
    }

    #[must_use]
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// The shape of a user handed back to API clients. Never carries the
/// password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(first: &str, last: &str, username: &str) -> User {
        User {
            id: 1,
            username: username.to_string(),
            email: "a@b.c".to_string(),
            password_hash: "x".to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            role: "user".to_string(),
            provider: "local".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn display_name_prefers_full_name() {
        assert_eq!(user("Ji", "Lee", "jlee").display_name(), "Ji Lee");
    }

    #[test]
    fn display_name_falls_back_to_username_then_unknown() {
        assert_eq!(user("", "", "jlee").display_name(), "jlee");
        assert_eq!(user("", "", "").display_name(), "Unknown");
    }
}
