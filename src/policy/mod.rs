//! Policies layered onto proxies: filter scoping and bounded retry.

pub mod filter_merge;
pub mod retry;

pub use filter_merge::{FilterMergePolicy, ID_FIELD, RequiredFilter};
pub use retry::{Clock, DEFAULT_RETRY_BUDGET, ManualClock, RetryPolicy, RetryState, SystemClock};
