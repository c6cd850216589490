use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub cors_allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
    pub max_upload_bytes: usize,
    pub session_ttl: Duration,
    pub passage_upstream_base: String,
    pub passage_upstream_timeout: Duration,
    pub log_json: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:4000".to_string(),
            db_path: PathBuf::from("selah.db"),
            uploads_dir: PathBuf::from("uploads"),
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            max_body_bytes: 64 * 1024,
            max_upload_bytes: 5 * 1024 * 1024,
            session_ttl: Duration::from_secs(2 * 60 * 60),
            passage_upstream_base: "http://ibibles.net".to_string(),
            passage_upstream_timeout: Duration::from_secs(10),
            log_json: false,
        }
    }
}

pub fn validate_startup_config_contract(api: &ApiConfig) -> Result<(), String> {
    if api.bind_addr.is_empty() {
        return Err("bind_addr must be non-empty".to_string());
    }
    if api.max_body_bytes == 0 || api.max_upload_bytes == 0 {
        return Err("body size limits must be > 0".to_string());
    }
    if api.max_upload_bytes < api.max_body_bytes {
        return Err("max_upload_bytes must be >= max_body_bytes".to_string());
    }
    if api.session_ttl.is_zero() || api.passage_upstream_timeout.is_zero() {
        return Err("timeouts must be > 0".to_string());
    }
    if api.passage_upstream_base.is_empty() {
        return Err("passage_upstream_base must be non-empty".to_string());
    }
    for origin in &api.cors_allowed_origins {
        if origin != "*" && !origin.starts_with("http://") && !origin.starts_with("https://") {
            return Err(format!("invalid CORS origin: {origin}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        validate_startup_config_contract(&ApiConfig::default()).expect("default config");
    }

    #[test]
    fn startup_config_validation_rejects_inverted_body_limits() {
        let api = ApiConfig {
            max_upload_bytes: 1024,
            max_body_bytes: 64 * 1024,
            ..ApiConfig::default()
        };
        let err = validate_startup_config_contract(&api).expect_err("inverted limits");
        assert!(err.contains("max_upload_bytes"));
    }

    #[test]
    fn startup_config_validation_rejects_malformed_origin() {
        let api = ApiConfig {
            cors_allowed_origins: vec!["localhost:3000".to_string()],
            ..ApiConfig::default()
        };
        let err = validate_startup_config_contract(&api).expect_err("bad origin");
        assert!(err.contains("CORS origin"));
    }

    #[test]
    fn wildcard_origin_is_accepted() {
        let api = ApiConfig {
            cors_allowed_origins: vec!["*".to_string()],
            ..ApiConfig::default()
        };
        validate_startup_config_contract(&api).expect("wildcard origin");
    }
}
