//! Environment-based configuration
//!
//! All settings come from `CARLANE_*` environment variables so the
//! tool drops into cron jobs and CI without a config file.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

const ENV_PREFIX: &str = "CARLANE_";

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base_url: String,
    /// Bearer token for the platform API. Only required by commands
    /// that actually call the platform.
    pub api_token: Option<String>,
    pub state_db: PathBuf,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub concurrency: usize,
}

impl Settings {
    /// Read settings from the environment.
    pub fn from_env() -> Result<Self> {
        let api_base_url = require_env("API_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        let api_token = optional_env("API_TOKEN");

        let state_db = match optional_env("STATE_DB") {
            Some(path) => PathBuf::from(path),
            None => default_state_db()?,
        };

        let timeout = Duration::from_secs(parsed_env("TIMEOUT_SECS", 10u64)?);
        let max_attempts = parsed_env("MAX_ATTEMPTS", 3u32)?;
        let concurrency = parsed_env("CONCURRENCY", 4usize)?;

        Ok(Self {
            api_base_url,
            api_token,
            state_db,
            timeout,
            max_attempts,
            concurrency,
        })
    }

    pub fn require_token(&self) -> Result<&str> {
        self.api_token
            .as_deref()
            .with_context(|| format!("Missing required variable: {ENV_PREFIX}API_TOKEN"))
    }
}

fn require_env(name: &str) -> Result<String> {
    optional_env(name)
        .with_context(|| format!("Missing required variable: {ENV_PREFIX}{name}"))
}

fn optional_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{name}"))
        .ok()
        .filter(|value| !value.is_empty())
}

fn parsed_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match optional_env(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .ok()
            .with_context(|| format!("Invalid value for {ENV_PREFIX}{name}: {raw}")),
    }
}

fn default_state_db() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Home directory not found")?;
    Ok(home.join(".carlane").join("state.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep them in one test so
    // they cannot race each other.
    #[test]
    fn reads_and_defaults() {
        env::set_var("CARLANE_API_BASE_URL", "https://api.example.test/");
        env::remove_var("CARLANE_API_TOKEN");
        env::remove_var("CARLANE_STATE_DB");
        env::remove_var("CARLANE_TIMEOUT_SECS");
        env::set_var("CARLANE_CONCURRENCY", "8");

        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.api_base_url, "https://api.example.test");
        assert!(settings.api_token.is_none());
        assert!(settings.require_token().is_err());
        assert_eq!(settings.timeout, Duration::from_secs(10));
        assert_eq!(settings.concurrency, 8);
        assert!(settings.state_db.ends_with(".carlane/state.db"));

        env::set_var("CARLANE_TIMEOUT_SECS", "not-a-number");
        assert!(Settings::from_env().is_err());

        env::remove_var("CARLANE_API_BASE_URL");
        env::remove_var("CARLANE_TIMEOUT_SECS");
        env::remove_var("CARLANE_CONCURRENCY");
        assert!(Settings::from_env().is_err());
    }
}
