//! Scoped facades
//!
//! Composition root: wraps database, collection and bulk-builder objects in
//! interception proxies configured with the filter-merge overrides and the
//! retry hook.
//!
//! - `database.rs` - `ScopedDatabase`, hands out scoped collections
//! - `collection.rs` - `ScopedCollection`, filters every query/write
//! - `bulk.rs` - `ScopedBulkOperation` and its selector sub-builder

mod bulk;
mod collection;
mod database;

pub use bulk::{ScopedBulkOperation, ScopedBulkSelector};
pub use collection::ScopedCollection;
pub use database::{CollectionFactory, DatabaseMember, FactoryMethod, ScopedDatabase};

use std::sync::Arc;

use crate::config::ScopeConfig;
use crate::core::{Result, ScopeError};
use crate::policy::{Clock, RequiredFilter, RetryPolicy};

/// Runtime settings shared by a facade and every object it spawns.
///
/// Cloning is cheap; the required filter is shared, never copied.
#[derive(Debug, Clone)]
pub struct Scope {
    required: Arc<RequiredFilter>,
    retry: Option<RetryPolicy>,
    retry_bulk: bool,
}

impl Scope {
    /// Scope with the default retry policy and no bulk retry
    pub fn new(required: RequiredFilter) -> Self {
        Self {
            required: Arc::new(required),
            retry: Some(RetryPolicy::default()),
            retry_bulk: false,
        }
    }

    /// Validates `config` and builds the runtime scope from it
    pub fn from_config(config: &ScopeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            required: Arc::new(config.required_filter.clone()),
            retry: config
                .retry
                .enabled
                .then(|| RetryPolicy::new(config.retry.budget())),
            retry_bulk: config.retry.retry_bulk_operations,
        })
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.retry = None;
        self
    }

    /// Swap the clock of the configured retry policy
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.retry = self.retry.map(|policy| policy.with_clock(clock));
        self
    }

    pub fn with_bulk_retry(mut self, enabled: bool) -> Self {
        self.retry_bulk = enabled;
        self
    }

    pub fn required_filter(&self) -> &Arc<RequiredFilter> {
        &self.required
    }

    pub fn retry(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    pub fn retries_bulk_operations(&self) -> bool {
        self.retry_bulk
    }
}

impl TryFrom<ScopeConfig> for Scope {
    type Error = ScopeError;

    fn try_from(config: ScopeConfig) -> Result<Self> {
        Self::from_config(&config)
    }
}

impl From<RequiredFilter> for Scope {
    fn from(required: RequiredFilter) -> Self {
        Self::new(required)
    }
}
