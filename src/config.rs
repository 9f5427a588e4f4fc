use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{Result, ScopeError};
use crate::policy::{DEFAULT_RETRY_BUDGET, RequiredFilter};

/// Retry settings for scoped facades
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Wrap every collection call in the transient-failure retry loop
    pub enabled: bool,

    /// Milliseconds a single call may keep retrying
    pub budget_ms: u64,

    /// Also retry bulk-builder calls (off by default: bulk writes are not
    /// safe to replay blindly)
    pub retry_bulk_operations: bool,
}

impl RetryConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }
}

/// Whole milliseconds in `budget`, saturating.
fn millis(budget: Duration) -> u64 {
    u64::try_from(budget.as_millis()).unwrap_or(u64::MAX)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            budget_ms: millis(DEFAULT_RETRY_BUDGET),
            retry_bulk_operations: false,
        }
    }
}

/// Construction-time configuration of a scoped database or collection
///
/// ```
/// use docscope::ScopeConfig;
///
/// let config = ScopeConfig::from_json_str(r#"{
///     "required_filter": {"tenant": "acme"},
///     "retry": {"budget_ms": 10000}
/// }"#).unwrap();
///
/// assert_eq!(config.retry.budget(), std::time::Duration::from_secs(10));
/// assert!(config.retry.enabled);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Fields every scoped operation must match
    pub required_filter: RequiredFilter,

    pub retry: RetryConfig,
}

impl ScopeConfig {
    pub fn new(required_filter: RequiredFilter) -> Self {
        Self {
            required_filter,
            retry: RetryConfig::default(),
        }
    }

    /// Enable or disable retry wrapping
    pub fn retry(mut self, enabled: bool) -> Self {
        self.retry.enabled = enabled;
        self
    }

    /// Set the retry budget
    pub fn retry_budget(mut self, budget: Duration) -> Self {
        self.retry.budget_ms = millis(budget);
        self
    }

    /// Keep the retry hook active on bulk builders
    pub fn retry_bulk_operations(mut self, enabled: bool) -> Self {
        self.retry.retry_bulk_operations = enabled;
        self
    }

    pub fn from_json_str(input: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = fs::read_to_string(path).map_err(|err| {
            ScopeError::ConfigError(format!("Failed to read '{}': {}", path.display(), err))
        })?;
        Self::from_json_str(&input)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.retry.enabled && self.retry.budget_ms == 0 {
            return Err(ScopeError::ConfigError(
                "retry.budget_ms must be > 0 when retry is enabled".to_string(),
            ));
        }

        Ok(())
    }
}
