//! In-memory reference store
//!
//! Implements the backend traits over plain maps of JSON documents so the
//! scoped facades can be driven end to end without a server. Nothing is
//! persisted. Every handle shares a [`FaultInjector`] for simulating
//! transport failures.

pub mod aggregate;
mod bulk;
mod collection;
mod database;
mod faults;
pub mod matcher;
pub mod query;
pub mod store;
pub mod update;

pub use bulk::{MemoryBulkOp, MemorySelector};
pub use collection::MemoryCollection;
pub use database::{MemoryClient, MemoryDatabase};
pub use faults::FaultInjector;
pub use store::DocumentStore;
