//! Composition root: wires catalog, ledger, carts and orders together.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use storefront_cart::{Cart, CartItem};
use storefront_catalog::{InMemoryProductCatalog, ProductCatalog};
use storefront_core::{DomainResult, Money, OrderId, ProductId, UserId};
use storefront_events::{EventEnvelope, InMemoryEventBus, Subscription};
use storefront_inventory::StockLedger;
use storefront_orders::{Order, OrderNumber, OrderStatus};

use crate::cart_store::CartStore;
use crate::checkout::{OrderAssembler, SequentialOrderNumbers};
use crate::command_dispatcher::CommandDispatcher;
use crate::config::StorefrontConfig;
use crate::event_store::{EventStore, InMemoryEventStore};
use crate::order_service::OrderService;
use crate::projections::OrderSummary;
use crate::store::InMemoryKeyValueStore;

pub type OrderEventBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

/// The order pipeline with in-memory collaborators, generic over the event
/// store so tests can inject a failing backend.
pub struct Storefront<S = InMemoryEventStore> {
    config: StorefrontConfig,
    catalog: Arc<InMemoryProductCatalog>,
    ledger: Arc<StockLedger>,
    carts: Arc<CartStore>,
    orders: Arc<OrderService<S, OrderEventBus>>,
    assembler: OrderAssembler<S, OrderEventBus>,
}

impl<S> core::fmt::Debug for Storefront<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Storefront")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Storefront<InMemoryEventStore> {
    pub fn in_memory(config: StorefrontConfig) -> Self {
        Self::with_event_store(config, InMemoryEventStore::new())
    }
}

impl<S: EventStore> Storefront<S> {
    pub fn with_event_store(config: StorefrontConfig, event_store: S) -> Self {
        let catalog = Arc::new(InMemoryProductCatalog::new());
        let ledger = Arc::new(StockLedger::new());
        let bus: OrderEventBus = Arc::new(InMemoryEventBus::new());

        let carts = Arc::new(CartStore::new(
            catalog.clone() as Arc<dyn ProductCatalog>,
            Arc::new(InMemoryKeyValueStore::<UserId, Cart>::new()),
            config.cart_limits(),
        ));
        let orders = Arc::new(OrderService::new(
            CommandDispatcher::new(event_store, bus),
            ledger.clone(),
            Arc::new(InMemoryKeyValueStore::<OrderId, OrderSummary>::new()),
            Arc::new(InMemoryKeyValueStore::<OrderNumber, OrderId>::new()),
        ));
        let assembler = OrderAssembler::new(
            carts.clone(),
            ledger.clone(),
            orders.clone(),
            Arc::new(SequentialOrderNumbers::new(
                config.order_prefix.clone(),
                config.order_sequence_start,
            )),
        );

        tracing::info!(
            order_prefix = %config.order_prefix,
            max_line_quantity = config.max_line_quantity,
            "storefront initialized"
        );

        Self {
            config,
            catalog,
            ledger,
            carts,
            orders,
            assembler,
        }
    }

    pub fn config(&self) -> &StorefrontConfig {
        &self.config
    }

    pub fn catalog(&self) -> &InMemoryProductCatalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    pub fn carts(&self) -> &CartStore {
        &self.carts
    }

    pub fn orders(&self) -> &OrderService<S, OrderEventBus> {
        &self.orders
    }

    /// List a product and start tracking its stock.
    pub fn add_product(
        &self,
        product_id: ProductId,
        name: impl Into<String>,
        unit_price: Money,
        initial_stock: u64,
    ) -> DomainResult<()> {
        self.catalog.upsert(product_id, name, unit_price)?;
        self.ledger.track(product_id, initial_stock)
    }

    /// Soft delete: the product leaves the catalog and its stock is frozen.
    pub fn archive_product(&self, product_id: ProductId) -> DomainResult<()> {
        self.catalog.archive(product_id)?;
        if self.ledger.contains(product_id)? {
            self.ledger.freeze(product_id)?;
        }
        Ok(())
    }

    pub fn add_to_cart(&self, user_id: UserId, product_id: ProductId, quantity: u32) -> DomainResult<CartItem> {
        self.carts.add_item(user_id, product_id, quantity)
    }

    pub fn create_order(&self, user_id: UserId) -> DomainResult<Order> {
        self.assembler.create_order(user_id)
    }

    pub fn update_status(&self, order_id: OrderId, status: OrderStatus) -> DomainResult<Order> {
        self.orders.update_status(order_id, status)
    }

    pub fn delete_order(&self, order_id: OrderId) -> DomainResult<()> {
        self.orders.delete_order(order_id)
    }

    pub fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.orders.subscribe()
    }
}
