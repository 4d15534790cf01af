use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use tracing::{info, warn};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api/";
const DEFAULT_LOOKAHEAD_MS: &str = "1000";
const DEFAULT_TIMEOUT_SECS: &str = "30";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub token_file: PathBuf,
    pub refresh_lookahead: Duration,
    pub timeout: Duration,
}

impl Config {
    pub fn load() -> Self {
        let lookahead_ms: u64 = try_load("DASHBOARD_REFRESH_LOOKAHEAD_MS", DEFAULT_LOOKAHEAD_MS);
        let timeout_secs: u64 = try_load("DASHBOARD_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);

        Self {
            api_url: normalize_base_url(&try_load::<String>("DASHBOARD_API_URL", DEFAULT_API_URL)),
            token_file: var("DASHBOARD_TOKEN_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_token_file()),
            refresh_lookahead: Duration::from_millis(lookahead_ms),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn with_api_url(mut self, api_url: Option<String>) -> Self {
        if let Some(url) = api_url {
            self.api_url = normalize_base_url(&url);
        }
        self
    }
}

/// Relative endpoint paths are joined onto the base, so it must end with `/`.
pub fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

fn default_token_file() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("engagement-dashboard")
        .join("tokens.json")
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        info!("Environment variable {key} not set");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    match raw.parse() {
        Ok(value) => value,
        Err(e) => {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            match default.parse() {
                Ok(value) => value,
                Err(_) => unreachable!("built-in default for {key} must parse"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        assert_eq!(
            normalize_base_url("http://localhost:8000/api"),
            "http://localhost:8000/api/"
        );
        assert_eq!(
            normalize_base_url(" http://localhost:8000/api/ "),
            "http://localhost:8000/api/"
        );
    }

    #[test]
    fn cli_override_replaces_api_url() {
        let config = Config {
            api_url: DEFAULT_API_URL.to_string(),
            token_file: PathBuf::from("tokens.json"),
            refresh_lookahead: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
        .with_api_url(Some("https://stats.example.com/api".to_string()));
        assert_eq!(config.api_url, "https://stats.example.com/api/");
    }

    #[test]
    fn invalid_numeric_value_falls_back_to_default() {
        let parsed: u64 = try_load("DASHBOARD_TEST_UNSET_NUMERIC_KEY", "1000");
        assert_eq!(parsed, 1000);
    }
}
