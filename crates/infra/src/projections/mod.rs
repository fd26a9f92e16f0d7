//! Projection implementations (read model builders).
//!
//! Projections consume committed order events and build query-optimized read
//! models. All projections are:
//! - **Rebuildable**: can be reconstructed from the event stream
//! - **Idempotent**: safe for at-least-once delivery

pub mod order_history;

pub use order_history::{OrderHistoryError, OrderHistoryProjection, OrderSummary};
