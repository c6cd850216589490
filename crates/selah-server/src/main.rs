#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use selah_server::{build_router, validate_startup_config_contract, ApiConfig, AppState, Store};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_origins(name: &str, default: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let log_json = env_bool("SELAH_LOG_JSON", false);
    init_tracing(log_json);

    let defaults = ApiConfig::default();
    let config = ApiConfig {
        bind_addr: env::var("SELAH_BIND").unwrap_or(defaults.bind_addr),
        db_path: PathBuf::from(
            env::var("SELAH_DB_PATH").unwrap_or_else(|_| "selah.db".to_string()),
        ),
        uploads_dir: PathBuf::from(
            env::var("SELAH_UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string()),
        ),
        cors_allowed_origins: env_origins("SELAH_CORS_ORIGINS", "http://localhost:3000"),
        max_body_bytes: env_usize("SELAH_MAX_BODY_BYTES", defaults.max_body_bytes),
        max_upload_bytes: env_usize("SELAH_MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
        session_ttl: Duration::from_secs(env_u64("SELAH_SESSION_TTL_SECS", 2 * 60 * 60)),
        passage_upstream_base: env::var("SELAH_PASSAGE_UPSTREAM")
            .unwrap_or(defaults.passage_upstream_base),
        passage_upstream_timeout: Duration::from_secs(env_u64(
            "SELAH_PASSAGE_TIMEOUT_SECS",
            10,
        )),
        log_json,
    };
    validate_startup_config_contract(&config)?;

    tokio::fs::create_dir_all(&config.uploads_dir)
        .await
        .map_err(|err| format!("failed to create uploads dir: {err}"))?;

    let store = Store::open(&config.db_path)
        .await
        .map_err(|err| format!("failed to open database: {err}"))?;

    let http = reqwest::Client::builder()
        .timeout(config.passage_upstream_timeout)
        .build()
        .map_err(|err| format!("failed to build http client: {err}"))?;

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, store, http)?;
    let app = build_router(state.clone());

    // Expired sessions are deleted on access; this sweep catches the
    // ones nobody ever touches again.
    let purge_store = state.store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            match purge_store.purge_expired_sessions().await {
                Ok(purged) if purged > 0 => info!(purged, "expired sessions purged"),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "session purge failed"),
            }
        }
    });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| format!("bind {bind_addr} failed: {err}"))?;
    info!("selah-server listening on {bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .map_err(|err| format!("server failed: {err}"))
}
