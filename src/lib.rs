// ============================================================================
// docscope Library
// ============================================================================

//! Transparent scoping for document-store clients.
//!
//! A [`ScopedDatabase`] or [`ScopedCollection`] wraps a client object and
//! behaves like it, except that every query, update, delete, aggregation and
//! bulk selector is restricted to documents matching a fixed
//! [`RequiredFilter`], and every call is retried on transient transport
//! failures for a bounded time.
//!
//! ```
//! use docscope::{MemoryClient, RequiredFilter, ScopedDatabase};
//! use serde_json::{Value, json};
//!
//! # fn main() -> docscope::Result<()> {
//! let client = MemoryClient::new();
//! client.database("local").collection("people")?.insert_documents(vec![
//!     json!({"name": "foobar", "id": "a", "val": 420}),
//!     json!({"name": "foobar", "id": "b", "val": 123}),
//!     json!({"name": "foobaz", "id": "a", "val": 840}),
//! ])?;
//!
//! let required = RequiredFilter::from_value(json!({"name": "foobar"}))?;
//! let db = ScopedDatabase::new(client.database("local"), required);
//! let people = db.collection("people")?;
//!
//! assert_eq!(people.count(Value::Null)?, 2);
//! assert_eq!(people.base().len()?, 3);
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod backend;
pub mod config;
pub mod core;
pub mod facade;
pub mod policy;
pub mod proxy;
pub mod storage;

// Re-export main types for convenience
pub use args::{CallArgs, ESCAPE_KEYWORD, Invocation, Signature};
pub use backend::{BulkMethod, CollectionMethod, DatabaseMethod, SelectorMethod};
pub use config::{RetryConfig, ScopeConfig};
pub use core::{Document, Result, ScopeError, TransportError, Value};
pub use facade::{
    CollectionFactory, DatabaseMember, FactoryMethod, Scope, ScopedBulkOperation, ScopedBulkSelector, ScopedCollection,
    ScopedDatabase,
};
pub use policy::{Clock, FilterMergePolicy, ManualClock, RequiredFilter, RetryPolicy, SystemClock};
pub use proxy::{BaseObject, InterceptionProxy, Member, Method, OverrideTable};
pub use storage::{FaultInjector, MemoryClient, MemoryCollection, MemoryDatabase};
