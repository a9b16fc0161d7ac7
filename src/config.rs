use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://campuscruz.onrender.com";
const DEFAULT_TOKEN_PATH: &str = ".campuscruz-token";
const DEFAULT_POLL_SECS: u64 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_EMAIL_DOMAINS: &str = "geu.ac.in,gehu.ac.in";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: Url,
    pub log_level: String,
    /// Where the bearer token survives between runs. `None` keeps it in memory only.
    pub token_path: Option<PathBuf>,
    pub notification_poll_interval: Duration,
    pub request_timeout: Duration,
    pub allowed_email_domains: Vec<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `load` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup("API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url =
            Url::parse(&raw_url).with_context(|| format!("API_URL is not a valid URL: {}", raw_url))?;

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let token_path = match lookup("TOKEN_PATH") {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from(DEFAULT_TOKEN_PATH)),
        };

        let poll_secs = lookup("NOTIFICATION_POLL_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_POLL_SECS);
        let timeout_secs = lookup("REQUEST_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let allowed_email_domains = lookup("ALLOWED_EMAIL_DOMAINS")
            .unwrap_or_else(|| DEFAULT_EMAIL_DOMAINS.to_string())
            .split(',')
            .map(|domain| domain.trim().to_lowercase())
            .filter(|domain| !domain.is_empty())
            .collect();

        Ok(Self {
            api_url,
            log_level,
            token_path,
            notification_poll_interval: Duration::from_secs(poll_secs),
            request_timeout: Duration::from_secs(timeout_secs),
            allowed_email_domains,
        })
    }
}
