//! Configuration for the outbox engine.
//!
//! # Example
//!
//! ```
//! use outbox_engine::OutboxConfig;
//!
//! // Minimal config (uses defaults)
//! let config = OutboxConfig::default();
//! assert_eq!(config.max_attempts, 3);
//! assert_eq!(config.debounce_ms, 2000);
//!
//! // Full config
//! let config = OutboxConfig {
//!     db_path: Some("./outbox.db".into()),
//!     max_attempts: 5,
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::backoff::RetryPolicy;

/// Configuration for the outbox engine.
///
/// All fields have defaults matching the outbox contract. Set `db_path` for a
/// durable on-disk queue; without it the embedder supplies its own store.
#[derive(Debug, Clone, Deserialize)]
pub struct OutboxConfig {
    /// SQLite file for the durable outbox (e.g., "./outbox.db")
    #[serde(default)]
    pub db_path: Option<String>,

    /// Attempts per record before it is marked terminally failed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff in seconds; delay after the n-th failure is base * 2^(n-1)
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    /// Quiet period after the network signal flips online before the
    /// reconnect watcher fires
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_secs() -> u64 {
    2
}
fn default_debounce_ms() -> u64 {
    2_000
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base_secs(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl OutboxConfig {
    /// The retry policy this configuration describes.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_secs(self.backoff_base_secs),
        }
    }

    /// The reconnect debounce window.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_contract() {
        let config = OutboxConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff_base_secs, 2);
        assert_eq!(config.debounce_ms, 2_000);
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_deserialize_with_partial_fields() {
        let config: OutboxConfig =
            serde_json::from_str(r#"{"db_path": "./outbox.db", "max_attempts": 5}"#).unwrap();
        assert_eq!(config.db_path.as_deref(), Some("./outbox.db"));
        assert_eq!(config.max_attempts, 5);
        // Unspecified fields fall back to defaults
        assert_eq!(config.debounce_ms, 2_000);
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = OutboxConfig {
            backoff_base_secs: 1,
            ..Default::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(2));
    }
}
