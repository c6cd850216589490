#![forbid(unsafe_code)]

//! HTTP backend for the Selah scripture community app: session-cookie
//! auth, communities with posts/polls/replies, notifications with an
//! accept/decline workflow, personal scripture notes, and a passage
//! proxy scraping one upstream edition.

pub mod config;
pub mod error;
mod http;
mod middleware;
mod passage;
mod store;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;

pub use config::{validate_startup_config_contract, ApiConfig};
pub use error::{ApiError, ApiResult};
pub use store::Store;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub store: Store,
    /// `config.session_ttl` pre-converted for timestamp arithmetic.
    pub session_ttl: chrono::Duration,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: ApiConfig, store: Store, http: reqwest::Client) -> Result<Self, String> {
        let session_ttl = chrono::Duration::from_std(config.session_ttl)
            .map_err(|err| format!("invalid session ttl: {err}"))?;
        Ok(Self {
            config: Arc::new(config),
            store,
            session_ttl,
            http,
        })
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

pub fn build_router(state: AppState) -> Router {
    // A little slack over the advertised limit so multipart framing
    // does not push a maximal image over the edge.
    let hero_body_limit = state.config.max_upload_bytes + 64 * 1024;

    let gated = Router::new()
        .route("/community", post(http::community::create_community))
        .route("/community/my", get(http::community::my_communities))
        .route("/community/:id/invite", post(http::community::invite))
        .route(
            "/community/:id/request-join",
            post(http::community::request_join),
        )
        .route(
            "/community/:id/hero-image",
            post(http::community::upload_hero_image)
                .layer(DefaultBodyLimit::max(hero_body_limit)),
        )
        .route(
            "/community/:id/posts",
            get(http::community::list_posts).post(http::community::create_post),
        )
        .route(
            "/community/:id/posts/:post_id",
            get(http::community::post_detail),
        )
        .route(
            "/community/:id/posts/:post_id/vote",
            post(http::community::vote),
        )
        .route(
            "/community/:id/posts/:post_id/replies",
            get(http::community::list_replies).post(http::community::create_reply),
        )
        .route(
            "/notifications",
            get(http::notifications::list).delete(http::notifications::delete_all),
        )
        .route(
            "/notifications/read-all",
            post(http::notifications::mark_all_read),
        )
        .route(
            "/notifications/:id/read",
            post(http::notifications::mark_read),
        )
        .route("/notifications/:id", delete(http::notifications::delete_one))
        .route("/notifications/:id/act", post(http::notifications::act))
        .route("/notes/list", get(http::notes::list))
        .route("/notes/exists", get(http::notes::exists))
        .route(
            "/notes",
            get(http::notes::latest_for_scope).post(http::notes::create),
        )
        .route(
            "/notes/:id",
            get(http::notes::get_by_id)
                .put(http::notes::update)
                .delete(http::notes::delete),
        )
        .route_layer(from_fn(middleware::session::require_auth_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/auth/signup", post(http::auth::signup))
        .route("/auth/login", post(http::auth::login))
        .route("/auth/me", get(http::auth::me))
        .route("/auth/logout", post(http::auth::logout))
        .route("/auth/change-password", post(http::auth::change_password))
        .route("/community/discover", get(http::community::discover))
        .route("/community/:id", get(http::community::community_detail))
        .route(
            "/api/passage/:edition_id/:chapter_id",
            get(http::passage::get_passage),
        )
        .route("/uploads/:file", get(http::uploads::serve_upload))
        .merge(gated)
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::session::resolve_session_middleware,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::cors::cors_middleware,
        ))
        .layer(from_fn(
            middleware::request_tracing::request_tracing_middleware,
        ))
        .with_state(state)
}
