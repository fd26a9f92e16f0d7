//! Orders domain module (event-sourced).
//!
//! Order lifecycle rules, implemented purely as deterministic domain logic
//! (no IO, no stock movements, no storage). The checkout and order services
//! in `storefront-infra` act on the events decided here.

pub mod order;
pub mod status;

pub use order::{
    ChangeStatus, DeleteOrder, Order, OrderCommand, OrderDeleted, OrderEvent, OrderItem,
    OrderNumber, OrderPlaced, OrderStatusChanged, PlaceOrder, ORDER_AGGREGATE_TYPE,
};
pub use status::OrderStatus;
