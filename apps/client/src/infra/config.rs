use std::path::PathBuf;
use std::time::Duration;

use env_helpers::{get_env, get_env_default};
use url::Url;

use crate::application::use_cases::session::VerifierSettings;

pub const DEFAULT_SESSION_FILE: &str = ".suscridash/session.json";

pub struct AppConfig {
    /// Base URL shared by the identity and catalog services (e.g., "http://localhost:5000/api").
    pub api_base_url: Url,
    /// Where the session survives restarts.
    pub session_file: PathBuf,
    pub verify_timeout: Duration,
    pub verify_max_retries: u32,
    pub token_clock_skew_secs: u64,
    pub catalog_refresh_interval: Duration,
    /// Optional JSON log file; console logging is always on.
    pub log_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let api_base_url: Url = get_env("API_BASE_URL");
        let session_file: String =
            get_env_default("SESSION_FILE", DEFAULT_SESSION_FILE.to_string());
        let verify_timeout_ms: u64 = get_env_default("VERIFY_TIMEOUT_MS", 3000);
        let verify_max_retries: u32 = get_env_default("VERIFY_MAX_RETRIES", 2);
        let token_clock_skew_secs: u64 = get_env_default("TOKEN_CLOCK_SKEW_SECS", 60);
        let catalog_refresh_secs: u64 = get_env_default("CATALOG_REFRESH_SECS", 30);
        let log_file: Option<PathBuf> = std::env::var("LOG_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Self {
            api_base_url,
            session_file: PathBuf::from(session_file),
            verify_timeout: Duration::from_millis(verify_timeout_ms),
            verify_max_retries,
            token_clock_skew_secs,
            catalog_refresh_interval: Duration::from_secs(catalog_refresh_secs.max(1)),
            log_file,
        }
    }

    pub fn verifier_settings(&self) -> VerifierSettings {
        VerifierSettings {
            timeout: self.verify_timeout,
            max_retries: self.verify_max_retries,
            clock_skew_secs: self.token_clock_skew_secs,
            ..VerifierSettings::default()
        }
    }
}
