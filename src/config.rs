use std::str::FromStr;

use crate::{ClientOptions, KaldraError, Result};

/// Base URL used when `KALDRA_API_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Selects which backend variant [`crate::KaldraClient::from_config`] builds.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ApiMode {
    /// Serve local fixtures; no network calls.
    #[default]
    Mock,
    /// Call the KALDRA HTTP API.
    Real,
}

impl FromStr for ApiMode {
    type Err = KaldraError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "real" => Ok(Self::Real),
            other => Err(KaldraError::Config(format!(
                "unknown KALDRA_API_MODE '{other}', expected 'mock' or 'real'"
            ))),
        }
    }
}

/// Process-wide client configuration, read once at startup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KaldraConfig {
    pub base_url: String,
    pub mode: ApiMode,
    pub options: ClientOptions,
}

impl Default for KaldraConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            mode: ApiMode::default(),
            options: ClientOptions::default(),
        }
    }
}

impl KaldraConfig {
    /// Reads configuration from environment variables.
    ///
    /// Reads:
    /// - `KALDRA_API_URL` — API base URL (default `http://localhost:8000`)
    /// - `KALDRA_API_MODE` — `mock` or `real` (default `mock`)
    /// - `KALDRA_TIMEOUT_MS` — per-attempt timeout (default 15000)
    /// - `KALDRA_MAX_RETRIES` — retries after the first attempt (default 3)
    /// - `KALDRA_RETRY_BACKOFF_MS` — backoff base (default 1000)
    ///
    /// Unset variables fall back to their defaults; set but malformed ones
    /// are a [`KaldraError::Config`].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use kaldra_http::KaldraConfig;
    ///
    /// let config = KaldraConfig::from_env().expect("invalid KALDRA_* env vars");
    /// ```
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_url = match lookup("KALDRA_API_URL") {
            Some(url) if url.trim().is_empty() => {
                return Err(KaldraError::Config(
                    "KALDRA_API_URL is set but empty".to_owned(),
                ))
            }
            Some(url) => url.trim().trim_end_matches('/').to_owned(),
            None => defaults.base_url,
        };

        let mode = match lookup("KALDRA_API_MODE") {
            Some(mode) => mode.parse()?,
            None => defaults.mode,
        };

        let options = ClientOptions {
            timeout_ms: parse_var(&lookup, "KALDRA_TIMEOUT_MS", defaults.options.timeout_ms)?,
            max_retries: parse_var(&lookup, "KALDRA_MAX_RETRIES", defaults.options.max_retries)?,
            retry_backoff_ms: parse_var(
                &lookup,
                "KALDRA_RETRY_BACKOFF_MS",
                defaults.options.retry_backoff_ms,
            )?,
        };

        if options.timeout_ms == 0 {
            return Err(KaldraError::Config(
                "KALDRA_TIMEOUT_MS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            base_url,
            mode,
            options,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            KaldraError::Config(format!("{key} must be a non-negative integer, got '{raw}'"))
        }),
        None => Ok(default),
    }
}
