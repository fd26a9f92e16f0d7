//! Product catalog boundary.
//!
//! The catalog itself (CRUD, search) is an external collaborator. This crate
//! only defines what the order pipeline needs from it: whether a product
//! exists, whether it is still sellable, and its current unit price.

pub mod catalog;
pub mod product;

pub use catalog::{InMemoryProductCatalog, ProductCatalog};
pub use product::{ProductSnapshot, ProductStatus};
