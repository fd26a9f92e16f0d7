//! Order assembly: cart → reservations → persisted order → commit → empty cart.
//!
//! ```text
//! lock cart ─ empty? ──────────────────────────────► EmptyCart (ledger untouched)
//!     │
//! reserve lines (ascending product id) ─ short? ───► release taken (reverse), InsufficientStock
//!     │
//! persist order (one append) ─ failed? ────────────► release all (reverse), PersistenceFailure
//!     │
//! commit reservations → clear cart → Order
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value as JsonValue;

use storefront_cart::Cart;
use storefront_core::{DomainError, DomainResult, UserId};
use storefront_events::{EventBus, EventEnvelope};
use storefront_inventory::{ReservationToken, StockLedger};
use storefront_orders::{Order, OrderItem, OrderNumber};

use crate::cart_store::CartStore;
use crate::event_store::EventStore;
use crate::order_service::OrderService;

/// Source of human-facing order numbers.
pub trait OrderNumberGenerator: Send + Sync {
    fn next_number(&self) -> DomainResult<OrderNumber>;
}

/// `{prefix}-{sequence:08}` numbers from a process-wide atomic counter.
#[derive(Debug)]
pub struct SequentialOrderNumbers {
    prefix: String,
    next: AtomicU64,
}

impl SequentialOrderNumbers {
    pub fn new(prefix: impl Into<String>, start: u64) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(start),
        }
    }
}

impl OrderNumberGenerator for SequentialOrderNumbers {
    fn next_number(&self) -> DomainResult<OrderNumber> {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        OrderNumber::new(format!("{}-{seq:08}", self.prefix))
    }
}

/// Number claims that collide (e.g. after a restart with a reused start
/// value) are retried with a fresh number this many times.
const MAX_NUMBER_ATTEMPTS: usize = 8;

pub struct OrderAssembler<S, B> {
    carts: Arc<CartStore>,
    ledger: Arc<StockLedger>,
    orders: Arc<OrderService<S, B>>,
    numbers: Arc<dyn OrderNumberGenerator>,
}

impl<S, B> core::fmt::Debug for OrderAssembler<S, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OrderAssembler").finish_non_exhaustive()
    }
}

impl<S, B> OrderAssembler<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        carts: Arc<CartStore>,
        ledger: Arc<StockLedger>,
        orders: Arc<OrderService<S, B>>,
        numbers: Arc<dyn OrderNumberGenerator>,
    ) -> Self {
        Self {
            carts,
            ledger,
            orders,
            numbers,
        }
    }

    /// Turn the user's cart into a `Pending` order.
    ///
    /// Either the order exists, its stock is committed and the cart is empty,
    /// or no stock moved and the cart is unchanged.
    pub fn create_order(&self, user_id: UserId) -> DomainResult<Order> {
        self.carts.checkout(user_id, |cart| self.assemble(user_id, cart))
    }

    fn assemble(&self, user_id: UserId, cart: &Cart) -> DomainResult<Order> {
        if cart.is_empty() {
            return Err(DomainError::EmptyCart);
        }

        let lines: Vec<OrderItem> = cart
            .items()
            .iter()
            .map(|item| OrderItem {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        let tokens = self.reserve_all(&lines)?;

        let order = match self.persist(user_id, lines) {
            Ok(order) => order,
            Err(err) => {
                tracing::warn!(%user_id, error = %err, "order persistence failed, releasing reservations");
                self.release_all(&tokens);
                return Err(err);
            }
        };

        for token in &tokens {
            if let Err(err) = self.ledger.commit(token) {
                // Only reachable if the token was resolved elsewhere; the order stands.
                tracing::error!(
                    order_id = %order.id_typed(),
                    reservation_id = %token.id(),
                    error = %err,
                    "reservation commit failed"
                );
            }
        }

        tracing::info!(
            order_id = %order.id_typed(),
            order_number = ?order.order_number().map(|n| n.as_str()),
            %user_id,
            lines = order.items().len(),
            "order placed"
        );
        Ok(order)
    }

    /// Reserve every line in ascending product order; `lines` itself is left as is.
    fn reserve_all(&self, lines: &[OrderItem]) -> DomainResult<Vec<ReservationToken>> {
        // One global acquisition order for every checkout.
        let mut ordered: Vec<&OrderItem> = lines.iter().collect();
        ordered.sort_by_key(|line| line.product_id);

        let mut tokens = Vec::with_capacity(lines.len());
        for line in ordered {
            match self.ledger.reserve(line.product_id, line.quantity) {
                Ok(token) => tokens.push(token),
                Err(err) => {
                    self.release_all(&tokens);
                    return Err(err);
                }
            }
        }
        Ok(tokens)
    }

    fn release_all(&self, tokens: &[ReservationToken]) {
        for token in tokens.iter().rev() {
            if let Err(err) = self.ledger.release(token) {
                tracing::error!(
                    product_id = %token.product_id(),
                    reservation_id = %token.id(),
                    error = %err,
                    "reservation release failed"
                );
            }
        }
    }

    fn persist(&self, user_id: UserId, lines: Vec<OrderItem>) -> DomainResult<Order> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let number = self.numbers.next_number()?;
            match self.orders.place(number, user_id, lines.clone()) {
                Err(DomainError::Conflict(msg)) if attempt < MAX_NUMBER_ATTEMPTS => {
                    tracing::debug!(attempt, reason = %msg, "order number collision, retrying");
                }
                other => return other,
            }
        }
    }
}
