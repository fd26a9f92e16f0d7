//! Infrastructure layer: event store, key/value stores, services wiring the
//! order pipeline together, and configuration.

pub mod cart_store;
pub mod checkout;
pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod order_service;
pub mod projections;
pub mod store;
pub mod storefront;

#[cfg(test)]
mod integration_tests;

pub use cart_store::CartStore;
pub use checkout::{OrderAssembler, OrderNumberGenerator, SequentialOrderNumbers};
pub use config::{ConfigError, StorefrontConfig};
pub use order_service::OrderService;
pub use storefront::{OrderEventBus, Storefront};
