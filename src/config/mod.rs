//! Runtime configuration
//!
//! Values start from [`Config::default`], are overridden by environment
//! variables and finally by command line flags in `main`.

use crate::error::{Error, Result};
use crate::orchestrator::ReadFailurePolicy;

pub const DEFAULT_STORE_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_STORE_FILE: &str = "ctxs.json5";
pub const DEFAULT_NOTIFY_ENDPOINT: &str = "https://notify-api.line.me/api/notify";
pub const DEFAULT_CACHE_WINDOW_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Credential for the document store
    pub store_token: Option<String>,
    /// Identifier of the gist holding the context document
    pub store_id: Option<String>,
    /// File name of the context document inside the gist
    pub store_file: String,
    pub store_api_base: String,
    pub notify_endpoint: String,
    pub cache_window_ms: u64,
    pub read_failure_policy: ReadFailurePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_token: None,
            store_id: None,
            store_file: DEFAULT_STORE_FILE.to_string(),
            store_api_base: DEFAULT_STORE_API_BASE.to_string(),
            notify_endpoint: DEFAULT_NOTIFY_ENDPOINT.to_string(),
            cache_window_ms: DEFAULT_CACHE_WINDOW_MS,
            read_failure_policy: ReadFailurePolicy::default(),
        }
    }
}

impl Config {
    /// Defaults merged with the process environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.merge_env_vars(|key| std::env::var(key).ok());
        config
    }

    /// Merge variables from `lookup`. Empty values count as unset.
    pub fn merge_env_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("GITHUB_TOKEN") {
            self.store_token = Some(token);
        }

        if let Some(id) = get("GIST_CONTEXT") {
            self.store_id = Some(id.trim().to_string());
        }

        if let Some(file) = get("GIST_CONTEXT_FILE") {
            self.store_file = file.trim().to_string();
        }

        if let Some(base) = get("GITHUB_API_URL") {
            self.store_api_base = base.trim().trim_end_matches('/').to_string();
        }

        if let Some(endpoint) = get("LINE_NOTIFY_URL") {
            self.notify_endpoint = endpoint.trim().to_string();
        }

        if let Some(window) = get("CALENDAR_CACHE_WINDOW_MS") {
            match window.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.cache_window_ms = ms,
                _ => tracing::warn!(
                    value = %window,
                    "Ignoring invalid CALENDAR_CACHE_WINDOW_MS"
                ),
            }
        }
    }

    /// Fails when the context document cannot be addressed.
    ///
    /// Called before any client is built, so a misconfigured run touches
    /// no external system.
    pub fn validate(&self) -> Result<()> {
        self.store_id()?;
        Ok(())
    }

    pub fn store_id(&self) -> Result<&str> {
        self.store_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::Config("GIST_CONTEXT is required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.store_file, "ctxs.json5");
        assert_eq!(config.store_api_base, "https://api.github.com");
        assert_eq!(config.notify_endpoint, "https://notify-api.line.me/api/notify");
        assert_eq!(config.cache_window_ms, 30_000);
        assert_eq!(config.read_failure_policy, ReadFailurePolicy::Abort);
    }

    #[test]
    fn test_merge_env_vars_overrides_defaults() {
        let mut config = Config::default();
        config.merge_env_vars(lookup(&[
            ("GITHUB_TOKEN", "ghp_secret"),
            ("GIST_CONTEXT", " abc123 "),
            ("GITHUB_API_URL", "http://127.0.0.1:9000/"),
            ("CALENDAR_CACHE_WINDOW_MS", "60000"),
        ]));

        assert_eq!(config.store_token.as_deref(), Some("ghp_secret"));
        assert_eq!(config.store_id.as_deref(), Some("abc123"));
        assert_eq!(config.store_api_base, "http://127.0.0.1:9000");
        assert_eq!(config.cache_window_ms, 60_000);
        assert_eq!(config.store_file, DEFAULT_STORE_FILE);
    }

    #[test]
    fn test_invalid_cache_window_is_ignored() {
        let mut config = Config::default();
        config.merge_env_vars(lookup(&[("CALENDAR_CACHE_WINDOW_MS", "0")]));
        assert_eq!(config.cache_window_ms, DEFAULT_CACHE_WINDOW_MS);

        config.merge_env_vars(lookup(&[("CALENDAR_CACHE_WINDOW_MS", "soon")]));
        assert_eq!(config.cache_window_ms, DEFAULT_CACHE_WINDOW_MS);
    }

    #[test]
    fn test_validate_requires_store_id() {
        let mut config = Config::default();
        config.merge_env_vars(lookup(&[("GIST_CONTEXT", "   ")]));

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg == "GIST_CONTEXT is required"));

        config.merge_env_vars(lookup(&[("GIST_CONTEXT", "abc123")]));
        assert!(config.validate().is_ok());
        assert_eq!(config.store_id().unwrap(), "abc123");
    }
}
