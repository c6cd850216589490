use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::AppState;

pub const SESSION_COOKIE: &str = "sid";

/// Resolved session for this request; `None` when the caller is
/// anonymous. Present on every request once the session layer has run.
#[derive(Debug, Clone, Copy)]
pub struct CurrentSession(pub Option<i64>);

/// The authenticated user's id. Only present behind the auth gate.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub i64);

/// Raw cookie token, kept around so logout can destroy the right row.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

fn cookie_value(req: &Request<Body>, name: &str) -> Option<String> {
    let raw = req.headers().get("cookie")?.to_str().ok()?;
    for pair in raw.split(';') {
        if let Some((key, value)) = pair.trim().split_once('=') {
            if key == name && !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Global layer: resolves the `sid` cookie against the session store
/// (sliding the expiry forward on a hit) and stamps the result into
/// request extensions. Never rejects; the auth gate does that.
pub(crate) async fn resolve_session_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = cookie_value(&req, SESSION_COOKIE);
    let mut resolved = None;
    if let Some(token) = &token {
        match state
            .store
            .resolve_session(token.clone(), state.session_ttl)
            .await
        {
            Ok(user_id) => resolved = user_id,
            Err(err) => return ApiError::from(err).into_response(),
        }
    }
    if let Some(token) = token {
        req.extensions_mut().insert(SessionToken(token));
    }
    req.extensions_mut().insert(CurrentSession(resolved));
    next.run(req).await
}

/// Auth gate for session-only route groups. Pre-flight requests pass
/// through so CORS keeps working for unauthenticated browsers.
pub(crate) async fn require_auth_middleware(mut req: Request<Body>, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return next.run(req).await;
    }
    let session = req
        .extensions()
        .get::<CurrentSession>()
        .copied()
        .unwrap_or(CurrentSession(None));
    let Some(user_id) = session.0 else {
        return ApiError::unauthenticated().into_response();
    };
    req.extensions_mut().insert(CurrentUser(user_id));
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_cookie(raw: &str) -> Request<Body> {
        Request::builder()
            .header("cookie", raw)
            .body(Body::empty())
            .expect("request")
    }

    #[test]
    fn cookie_value_finds_named_cookie() {
        let req = request_with_cookie("theme=dark; sid=abc123; lang=en");
        assert_eq!(cookie_value(&req, "sid"), Some("abc123".to_string()));
    }

    #[test]
    fn cookie_value_ignores_empty_and_missing() {
        let req = request_with_cookie("sid=");
        assert_eq!(cookie_value(&req, "sid"), None);
        let req = Request::builder().body(Body::empty()).expect("request");
        assert_eq!(cookie_value(&req, "sid"), None);
    }
}
