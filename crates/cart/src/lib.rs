//! Shopping cart domain module.
//!
//! Pure cart rules (line merging, quantity validation, price snapshots). The
//! concurrent per-user store lives in `storefront-infra`.

pub mod cart;

pub use cart::{Cart, CartItem, CartLimits};
