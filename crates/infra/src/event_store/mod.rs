//! Append-only event store boundary.
//!
//! Orders are persisted as event streams. Placing an order is a single
//! append carrying the header and every line, so it succeeds or fails as a
//! unit.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
