use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::http::ok_body;
use crate::middleware::{CurrentSession, SessionToken, SESSION_COOKIE};
use crate::store::SignupOutcome;
use crate::AppState;

const MIN_PASSWORD_CHARS: usize = 4;

fn hash_password(plain: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::Internal(err.to_string().into()))
}

fn verify_password(hash: &str, plain: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Key stretching is CPU-bound; run it off the async workers.
async fn hash_password_blocking(plain: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|err| ApiError::Internal(Box::new(err)))?
}

async fn verify_password_blocking(hash: String, plain: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&hash, &plain))
        .await
        .map_err(|err| ApiError::Internal(Box::new(err)))
}

fn new_session_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn session_cookie(token: &str, max_age_secs: u64) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}")
}

fn cleared_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignupRequest {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

pub(crate) async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<Response> {
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(ApiError::validation("name required"));
    }
    if req.email.trim().is_empty() || req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("email/username/password required"));
    }

    let email = req.email.trim().to_lowercase();
    let username = req.username.trim().to_lowercase();
    let password_hash = hash_password_blocking(req.password).await?;

    let outcome = state
        .store
        .create_user(crate::store::NewUser {
            username,
            email,
            password_hash,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
        })
        .await?;

    match outcome {
        SignupOutcome::EmailTaken => {
            Err(ApiError::Conflict("Email already registered".to_string()))
        }
        SignupOutcome::UsernameTaken => {
            Err(ApiError::Conflict("Username already taken".to_string()))
        }
        SignupOutcome::Created(user) => {
            info!(user_id = user.id, "account created");
            // No session here; the user logs in after signup.
            Ok((
                StatusCode::CREATED,
                ok_body(json!({ "user": user.summary() })),
            )
                .into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    #[serde(default)]
    identifier: String,
    /// Older clients send `email` instead of `identifier`.
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

pub(crate) async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    let login_id = if req.identifier.trim().is_empty() {
        req.email.trim().to_lowercase()
    } else {
        req.identifier.trim().to_lowercase()
    };
    if login_id.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("id/email and password required"));
    }

    let user = if login_id.contains('@') {
        state.store.find_user_by_email(login_id).await?
    } else {
        state.store.find_user_by_username(login_id).await?
    };
    let Some(user) = user else {
        return Err(ApiError::Authentication("Invalid credentials".to_string()));
    };
    if !verify_password_blocking(user.password_hash.clone(), req.password).await? {
        return Err(ApiError::Authentication("Invalid credentials".to_string()));
    }

    let token = new_session_token();
    let expires_at = Utc::now() + state.session_ttl;
    state
        .store
        .create_session(token.clone(), user.id, expires_at)
        .await?;
    info!(user_id = user.id, "login");

    let cookie = session_cookie(&token, state.config.session_ttl.as_secs());
    Ok((
        [(header::SET_COOKIE, cookie)],
        ok_body(json!({ "user": user.summary() })),
    )
        .into_response())
}

pub(crate) async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> ApiResult<Response> {
    let Some(user_id) = session.0 else {
        return Err(ApiError::unauthenticated());
    };
    let user = state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(ok_body(json!({ "user": user.summary() })).into_response())
}

pub(crate) async fn logout(
    State(state): State<AppState>,
    token: Option<Extension<SessionToken>>,
) -> ApiResult<Response> {
    if let Some(Extension(SessionToken(token))) = token {
        state.store.delete_session(token).await?;
    }
    Ok((
        [(header::SET_COOKIE, cleared_session_cookie())],
        ok_body(json!({})),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChangePasswordRequest {
    #[serde(default)]
    current_password: String,
    #[serde(default)]
    new_password: String,
}

pub(crate) async fn change_password(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Response> {
    let Some(user_id) = session.0 else {
        return Err(ApiError::unauthenticated());
    };
    if req.current_password.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::validation("current/new password required"));
    }
    if req.new_password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::validation("New password is too short"));
    }

    let user = state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !verify_password_blocking(user.password_hash.clone(), req.current_password).await? {
        return Err(ApiError::Authentication(
            "Current password is incorrect".to_string(),
        ));
    }
    if verify_password_blocking(user.password_hash.clone(), req.new_password.clone()).await? {
        return Err(ApiError::validation("New password must be different"));
    }

    let new_hash = hash_password_blocking(req.new_password).await?;
    state.store.update_password(user_id, new_hash).await?;
    state.store.delete_sessions_for_user(user_id).await?;
    info!(user_id, "password changed, sessions revoked");

    Ok((
        [(header::SET_COOKIE, cleared_session_cookie())],
        ok_body(json!({})),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_never_the_plaintext_and_verifies() {
        let hash = hash_password("hunter2").expect("hash");
        assert_ne!(hash, "hunter2");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "hunter2"));
        assert!(!verify_password(&hash, "hunter3"));
    }

    #[test]
    fn verify_rejects_malformed_hash() {
        assert!(!verify_password("not-a-phc-string", "anything"));
    }

    #[test]
    fn session_tokens_are_long_and_distinct() {
        let a = new_session_token();
        let b = new_session_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn cookies_carry_http_only_and_path() {
        let cookie = session_cookie("abc", 7200);
        assert!(cookie.contains("sid=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=7200"));
        assert!(cleared_session_cookie().contains("Max-Age=0"));
    }
}
