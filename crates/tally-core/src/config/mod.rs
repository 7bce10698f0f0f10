//! Runtime configuration for the sync core.
//!
//! Values are safe-to-ship public endpoints/keys; session credentials come
//! from the identity provider and are only held in memory.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};

/// Remote store endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Base URL of the remote store (e.g. `https://project.example.co`)
    pub base_url: String,
    /// Public API key sent with every request
    pub api_key: String,
}

impl RemoteSettings {
    /// Validate and normalize remote settings.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, String> {
        let base_url = normalize_text_option(Some(base_url.into()))
            .ok_or_else(|| "remote base URL must not be empty".to_string())?;
        if !is_http_url(&base_url) {
            return Err("remote base URL must include http:// or https://".to_string());
        }
        let api_key = normalize_text_option(Some(api_key.into()))
            .ok_or_else(|| "remote API key must not be empty".to_string())?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Read remote settings from `TALLY_REMOTE_URL` / `TALLY_REMOTE_API_KEY`.
    ///
    /// Returns `None` when either variable is unset or invalid; running
    /// without a remote is a supported (local-only) mode.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("TALLY_REMOTE_URL").ok()?;
        let api_key = std::env::var("TALLY_REMOTE_API_KEY").ok()?;
        match Self::new(base_url, api_key) {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring invalid remote configuration");
                None
            }
        }
    }
}

/// An authenticated session, provided by the external identity layer.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Bearer token for remote calls
    pub access_token: String,
    /// Owner id used to scope every remote write
    pub user_id: String,
}

impl Session {
    pub fn new(access_token: impl Into<String>, user_id: impl Into<String>) -> Option<Self> {
        let access_token = normalize_text_option(Some(access_token.into()))?;
        let user_id = normalize_text_option(Some(user_id.into()))?;
        Some(Self {
            access_token,
            user_id,
        })
    }

    /// Read a session from `TALLY_ACCESS_TOKEN` / `TALLY_USER_ID`.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let access_token = std::env::var("TALLY_ACCESS_TOKEN").ok()?;
        let user_id = std::env::var("TALLY_USER_ID").ok()?;
        Self::new(access_token, user_id)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Tunables for the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Maximum operations dispatched concurrently per batch
    pub batch_size: usize,
    /// Pause between batches (rate-limit friendliness)
    pub inter_batch_delay: Duration,
    /// Wait after connectivity returns before auto-syncing, to avoid
    /// flushing against a flapping connection
    pub debounce: Duration,
}

impl EngineSettings {
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub const fn with_inter_batch_delay(mut self, delay: Duration) -> Self {
        self.inter_batch_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            inter_batch_delay: Duration::from_millis(200),
            debounce: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_settings_rejects_invalid_values() {
        assert!(RemoteSettings::new("  ", "key").is_err());
        assert!(RemoteSettings::new("project.example.co", "key").is_err());
        assert!(RemoteSettings::new("https://project.example.co", " ").is_err());
    }

    #[test]
    fn remote_settings_trims_trailing_slash() {
        let settings = RemoteSettings::new("https://project.example.co/", "key").unwrap();
        assert_eq!(settings.base_url, "https://project.example.co");
    }

    #[test]
    fn session_debug_redacts_token() {
        let session = Session::new("secret-token", "user-1").unwrap();
        let debug = format!("{session:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn session_rejects_blank_fields() {
        assert!(Session::new(" ", "user-1").is_none());
        assert!(Session::new("token", "").is_none());
    }
}
