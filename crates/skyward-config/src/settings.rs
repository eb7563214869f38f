//! Settings file model
//!
//! Every field is optional. Unset wait fields fall back to the defaults of
//! the wait category they belong to, which the reconcile crate owns.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};

/// Top-level settings document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Polling of operation handles
    pub operation: WaitSettings,

    /// Polling of a resource's own state field
    pub resource_state: WaitSettings,

    /// Tag reconciliation
    pub tags: TagSettings,
}

/// Overrides for one wait category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaitSettings {
    /// Give up after this many seconds
    pub timeout_secs: Option<u64>,

    /// Wait before the first check (seconds)
    pub delay_secs: Option<u64>,

    /// Floor for the interval between checks (seconds)
    pub min_interval_secs: Option<u64>,

    /// Consecutive not-found reads tolerated before failing
    pub not_found_checks: Option<u32>,
}

/// Tag reconciliation settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TagSettings {
    /// Maximum tags per add/remove call. Unset means the platform client decides.
    pub max_per_call: Option<usize>,

    /// Keys hidden when reading a resource's current tags
    pub ignore_keys: Vec<String>,

    /// Key prefixes hidden when reading a resource's current tags
    pub ignore_key_prefixes: Vec<String>,

    /// Skip platform-reserved keys (defaults to true)
    pub ignore_reserved: Option<bool>,
}

impl Settings {
    /// Reject values the waiters and the tag reconciler cannot work with
    pub fn validate(&self) -> Result<()> {
        self.operation.validate("operation")?;
        self.resource_state.validate("resource_state")?;

        if self.tags.max_per_call == Some(0) {
            return Err(ConfigError::Invalid {
                field: "tags.max_per_call".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if let Some(prefix) = self.tags.ignore_key_prefixes.iter().find(|p| p.is_empty()) {
            return Err(ConfigError::Invalid {
                field: "tags.ignore_key_prefixes".to_string(),
                reason: format!("empty prefix {:?} would ignore every tag", prefix),
            });
        }

        Ok(())
    }
}

impl WaitSettings {
    fn validate(&self, section: &str) -> Result<()> {
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: format!("{}.timeout_secs", section),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.min_interval_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: format!("{}.min_interval_secs", section),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
