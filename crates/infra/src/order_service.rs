//! Order lifecycle service.
//!
//! Runs order commands through the [`CommandDispatcher`], keeps the order
//! history read model in step, and applies the stock side effects of
//! committed events (cancellation and deletion hand stock back to the ledger).

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;

use storefront_core::{AggregateId, DomainError, DomainResult, OrderId, UserId};
use storefront_events::{EventBus, EventEnvelope, Subscription};
use storefront_inventory::StockLedger;
use storefront_orders::{
    ChangeStatus, DeleteOrder, ORDER_AGGREGATE_TYPE, Order, OrderCommand, OrderItem, OrderNumber,
    OrderStatus, PlaceOrder,
};

use crate::command_dispatcher::{CommandDispatcher, Dispatched};
use crate::event_store::{EventStore, StoredEvent};
use crate::projections::{OrderHistoryProjection, OrderSummary};
use crate::store::{KeyValueStore, KeyedLocks};

pub type OrderHistoryStore = Arc<dyn KeyValueStore<OrderId, OrderSummary>>;
pub type OrderNumberRegistry = Arc<dyn KeyValueStore<OrderNumber, OrderId>>;

fn make_order(id: AggregateId) -> Order {
    Order::empty(OrderId::from(id))
}

pub struct OrderService<S, B> {
    dispatcher: CommandDispatcher<S, B>,
    ledger: Arc<StockLedger>,
    history: OrderHistoryProjection<OrderHistoryStore>,
    numbers: OrderNumberRegistry,
    /// Held from load through projection so history rows see each order's
    /// events in stream order.
    locks: KeyedLocks<OrderId>,
}

impl<S, B> core::fmt::Debug for OrderService<S, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OrderService").finish_non_exhaustive()
    }
}

impl<S, B> OrderService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: CommandDispatcher<S, B>,
        ledger: Arc<StockLedger>,
        history: OrderHistoryStore,
        numbers: OrderNumberRegistry,
    ) -> Self {
        Self {
            dispatcher,
            ledger,
            history: OrderHistoryProjection::new(history),
            numbers,
            locks: KeyedLocks::new("order"),
        }
    }

    /// Subscribe to committed order events.
    pub fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.dispatcher.bus().subscribe()
    }

    /// Persist a new `Pending` order as one atomic append.
    ///
    /// The order number is claimed first; a taken number is a `Conflict` and
    /// nothing is written. If the append fails the claim is dropped again.
    /// Stock is not touched here.
    pub fn place(
        &self,
        order_number: OrderNumber,
        user_id: UserId,
        items: Vec<OrderItem>,
    ) -> DomainResult<Order> {
        let order_id = OrderId::new();
        let lock = self.locks.handle(order_id)?;
        let _guard = self.locks.acquire(&lock)?;

        if !self.numbers.insert_if_absent(order_number.clone(), order_id)? {
            return Err(DomainError::conflict(format!(
                "order number {order_number} is already taken"
            )));
        }

        let command = OrderCommand::PlaceOrder(PlaceOrder {
            order_id,
            order_number: order_number.clone(),
            user_id,
            items,
            occurred_at: Utc::now(),
        });

        match self
            .dispatcher
            .dispatch(order_id.into(), ORDER_AGGREGATE_TYPE, command, make_order)
        {
            Ok(dispatched) => {
                self.project(&dispatched.committed);
                Ok(dispatched.aggregate)
            }
            Err(err) => {
                if let Err(release_err) = self.numbers.remove(&order_number) {
                    tracing::warn!(%order_number, error = %release_err, "failed to release order number claim");
                }
                Err(err.into())
            }
        }
    }

    pub fn get_order(&self, order_id: OrderId) -> DomainResult<Order> {
        let order: Order = self.dispatcher.load(order_id.into(), make_order)?;
        if !order.exists() {
            return Err(DomainError::OrderNotFound(order_id));
        }
        Ok(order)
    }

    /// Look an order up by its human-facing number. Deleted orders are not found.
    pub fn find_by_number(&self, order_number: &OrderNumber) -> DomainResult<Option<Order>> {
        let Some(order_id) = self.numbers.get(order_number)? else {
            return Ok(None);
        };
        match self.get_order(order_id) {
            Ok(order) => Ok(Some(order)),
            Err(DomainError::OrderNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// A user's order history, oldest first.
    pub fn list_orders(&self, user_id: UserId) -> DomainResult<Vec<OrderSummary>> {
        self.history
            .list_for_user(user_id)
            .map_err(|e| DomainError::persistence(e.to_string()))
    }

    /// Move an order to `status`.
    ///
    /// Cancelling a `Pending` or `Confirmed` order returns every line's
    /// quantity to the ledger. Transitions on one order run one at a time, so
    /// a transition raced by another is checked against the winner's status.
    pub fn update_status(&self, order_id: OrderId, status: OrderStatus) -> DomainResult<Order> {
        let lock = self.locks.handle(order_id)?;
        let _guard = self.locks.acquire(&lock)?;

        let current = self.get_order(order_id)?;
        if status == OrderStatus::Cancelled && current.status().holds_committed_stock() {
            self.ensure_restorable(&current)?;
        }

        let command = OrderCommand::ChangeStatus(ChangeStatus {
            order_id,
            status,
            occurred_at: Utc::now(),
        });
        let dispatched = self.execute(order_id, command)?;

        tracing::info!(
            %order_id,
            from = %current.status(),
            to = %status,
            "order status changed"
        );
        self.apply_stock_effects(&dispatched)?;
        Ok(dispatched.aggregate)
    }

    /// Administrative delete.
    ///
    /// Never-fulfilled orders give their stock back; `Shipped` and
    /// `Delivered` orders cannot be deleted.
    pub fn delete_order(&self, order_id: OrderId) -> DomainResult<()> {
        let lock = self.locks.handle(order_id)?;
        let _guard = self.locks.acquire(&lock)?;

        let current = self.get_order(order_id)?;
        if current.status().holds_committed_stock() {
            self.ensure_restorable(&current)?;
        }

        let command = OrderCommand::DeleteOrder(DeleteOrder {
            order_id,
            occurred_at: Utc::now(),
        });
        let dispatched = self.execute(order_id, command)?;

        tracing::info!(%order_id, status = %current.status(), "order deleted");
        self.apply_stock_effects(&dispatched)
    }

    fn execute(&self, order_id: OrderId, command: OrderCommand) -> DomainResult<Dispatched<Order>> {
        let dispatched =
            self.dispatcher
                .dispatch(order_id.into(), ORDER_AGGREGATE_TYPE, command, make_order)?;
        self.project(&dispatched.committed);
        Ok(dispatched)
    }

    fn project(&self, committed: &[StoredEvent]) {
        for stored in committed {
            if let Err(err) = self.history.apply_envelope(&stored.to_envelope()) {
                tracing::warn!(
                    aggregate_id = %stored.aggregate_id,
                    sequence_number = stored.sequence_number,
                    error = %err,
                    "order history projection failed"
                );
            }
        }
    }

    /// Refuse a reversal up front when the ledger could not take the stock back.
    fn ensure_restorable(&self, order: &Order) -> DomainResult<()> {
        for item in order.items() {
            if !self.ledger.contains(item.product_id)? {
                return Err(DomainError::StockReversal(format!(
                    "product {} of order {} is not tracked by the stock ledger",
                    item.product_id,
                    order.id_typed()
                )));
            }
        }
        Ok(())
    }

    fn apply_stock_effects(&self, dispatched: &Dispatched<Order>) -> DomainResult<()> {
        if !dispatched.events.iter().any(|e| e.returns_stock()) {
            return Ok(());
        }

        let order = &dispatched.aggregate;
        let mut failures = Vec::new();
        for item in order.items() {
            if let Err(err) = self.ledger.restore(item.product_id, u64::from(item.quantity)) {
                tracing::error!(
                    order_id = %order.id_typed(),
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    error = %err,
                    "stock reversal failed"
                );
                failures.push(format!("{}: {err}", item.product_id));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DomainError::StockReversal(failures.join("; ")))
        }
    }
}
