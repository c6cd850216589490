use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::AppState;

fn request_origin(req: &Request<Body>) -> Option<String> {
    let raw = req.headers().get("origin")?.to_str().ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > 256 {
        return None;
    }
    Some(trimmed.to_string())
}

fn origin_allowed(state: &AppState, origin: &str) -> bool {
    state
        .config
        .cors_allowed_origins
        .iter()
        .any(|allowed| allowed == "*" || allowed == origin)
}

fn apply_cors_headers(resp: &mut Response, origin: &str) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        resp.headers_mut().insert("access-control-allow-origin", value);
    }
    resp.headers_mut().insert(
        "access-control-allow-credentials",
        HeaderValue::from_static("true"),
    );
    resp.headers_mut()
        .insert("vary", HeaderValue::from_static("Origin"));
}

pub(crate) async fn cors_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let origin = request_origin(&req);
    if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        if let Some(origin) = origin {
            if origin_allowed(&state, &origin) {
                apply_cors_headers(&mut resp, &origin);
                resp.headers_mut().insert(
                    "access-control-allow-methods",
                    HeaderValue::from_static("GET,POST,PUT,DELETE,OPTIONS"),
                );
                resp.headers_mut().insert(
                    "access-control-allow-headers",
                    HeaderValue::from_static("content-type,x-request-id"),
                );
            }
        }
        return resp;
    }

    let mut resp = next.run(req).await;
    if let Some(origin) = origin {
        if origin_allowed(&state, &origin) {
            apply_cors_headers(&mut resp, &origin);
        }
    }
    resp
}
