//! Stock ledger.
//!
//! Owns each product's available quantity and exposes atomic
//! reserve/commit/release operations used by checkout. Stock is decremented
//! when an order is created, never when an item is added to a cart.

pub mod ledger;
pub mod stock;

pub use ledger::{ReservationToken, StockLedger};
pub use stock::StockLevel;
