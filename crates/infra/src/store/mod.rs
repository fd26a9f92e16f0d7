//! Key/value storage abstractions for carts, order-number claims and read models,
//! plus the per-key locks that serialize updates to them.

pub mod key_value;
pub mod locks;

pub use key_value::{InMemoryKeyValueStore, KeyValueStore, StoreError};
pub use locks::KeyedLocks;
