//! Append-only event store boundary.
//!
//! Storage-agnostic contract plus two backends: an in-memory store for tests
//! and single-node runs, and Postgres for persistent deployments.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
