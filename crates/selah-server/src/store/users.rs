use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use selah_model::User;

use super::{parse_ts, Store, StoreResult};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

/// Signup resolution. The duplicate checks and the insert run in the
/// same closure so two concurrent signups cannot both succeed.
#[derive(Debug)]
pub enum SignupOutcome {
    Created(User),
    EmailTaken,
    UsernameTaken,
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, first_name, last_name, role, provider, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let created_at: String = row.get(8)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        role: row.get(6)?,
        provider: row.get(7)?,
        created_at: parse_ts(8, &created_at)?,
    })
}

impl Store {
    pub async fn create_user(&self, new: NewUser) -> StoreResult<SignupOutcome> {
        self.conn
            .call(move |conn| {
                let email_taken: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                    params![new.email],
                    |row| row.get(0),
                )?;
                if email_taken {
                    return Ok(SignupOutcome::EmailTaken);
                }
                let username_taken: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                    params![new.username],
                    |row| row.get(0),
                )?;
                if username_taken {
                    return Ok(SignupOutcome::UsernameTaken);
                }
                let now = Utc::now().to_rfc3339();
                conn.execute(
                    "INSERT INTO users (username, email, password_hash, first_name, last_name, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        new.username,
                        new.email,
                        new.password_hash,
                        new.first_name,
                        new.last_name,
                        now,
                    ],
                )?;
                let id = conn.last_insert_rowid();
                let user = conn.query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                    params![id],
                    user_from_row,
                )?;
                Ok(SignupOutcome::Created(user))
            })
            .await
    }

    pub async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        self.conn
            .call(move |conn| {
                let user = conn
                    .query_row(
                        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                        params![id],
                        user_from_row,
                    )
                    .optional()?;
                Ok(user)
            })
            .await
    }

    pub async fn find_user_by_email(&self, email: String) -> StoreResult<Option<User>> {
        self.conn
            .call(move |conn| {
                let user = conn
                    .query_row(
                        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                        params![email],
                        user_from_row,
                    )
                    .optional()?;
                Ok(user)
            })
            .await
    }

    pub async fn find_user_by_username(&self, username: String) -> StoreResult<Option<User>> {
        self.conn
            .call(move |conn| {
                let user = conn
                    .query_row(
                        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                        params![username],
                        user_from_row,
                    )
                    .optional()?;
                Ok(user)
            })
            .await
    }

    pub async fn update_password(&self, user_id: i64, password_hash: String) -> StoreResult<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                    params![password_hash, user_id],
                )?;
                Ok(())
            })
            .await
    }
}
