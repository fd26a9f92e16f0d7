use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use storefront_core::{AggregateId, DomainResult, Money, OrderId, UserId};
use storefront_events::EventEnvelope;
use storefront_orders::{ORDER_AGGREGATE_TYPE, OrderEvent, OrderItem, OrderNumber, OrderStatus};

use crate::store::{KeyValueStore, StoreError};

/// One row of a user's order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderSummary {
    pub fn total(&self) -> DomainResult<Money> {
        self.items
            .iter()
            .try_fold(Money::ZERO, |acc, item| acc.checked_add(item.line_total()?))
    }
}

#[derive(Debug, Error)]
pub enum OrderHistoryError {
    #[error("failed to deserialize order event: {0}")]
    Deserialize(String),
    #[error("stream mismatch: {0}")]
    StreamMismatch(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Disposable order-history read model.
///
/// Fed synchronously with every committed order event. Idempotent per stream:
/// envelopes at or below the stream cursor are ignored, so replays and
/// at-least-once redelivery are harmless. Deleted orders leave the history.
#[derive(Debug)]
pub struct OrderHistoryProjection<S>
where
    S: KeyValueStore<OrderId, OrderSummary>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> OrderHistoryProjection<S>
where
    S: KeyValueStore<OrderId, OrderSummary>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    fn get_cursor(&self, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => *cursors.get(&aggregate_id).unwrap_or(&0),
            Err(_) => 0,
        }
    }

    fn update_cursor(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(aggregate_id, seq);
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Result<Option<OrderSummary>, OrderHistoryError> {
        Ok(self.store.get(order_id)?)
    }

    /// A user's orders, oldest first.
    pub fn list_for_user(&self, user_id: UserId) -> Result<Vec<OrderSummary>, OrderHistoryError> {
        let mut orders: Vec<_> = self
            .store
            .list()?
            .into_iter()
            .filter(|o| o.user_id == user_id)
            .collect();
        orders.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.order_number.cmp(&b.order_number))
        });
        Ok(orders)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), OrderHistoryError> {
        if envelope.aggregate_type() != ORDER_AGGREGATE_TYPE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.get_cursor(aggregate_id);
        if seq == 0 {
            return Err(OrderHistoryError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if seq != last + 1 && last != 0 {
            return Err(OrderHistoryError::NonMonotonicSequence { last, found: seq });
        }

        let ev: OrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| OrderHistoryError::Deserialize(e.to_string()))?;

        let order_id = ev.order_id();
        if AggregateId::from(order_id) != aggregate_id {
            return Err(OrderHistoryError::StreamMismatch(
                "event order_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            OrderEvent::OrderPlaced(e) => {
                self.store.upsert(
                    e.order_id,
                    OrderSummary {
                        order_id: e.order_id,
                        order_number: e.order_number,
                        user_id: e.user_id,
                        status: OrderStatus::Pending,
                        items: e.items,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                )?;
            }
            OrderEvent::OrderStatusChanged(e) => {
                if let Some(mut summary) = self.store.get(&e.order_id)? {
                    summary.status = e.to;
                    summary.updated_at = e.occurred_at;
                    self.store.upsert(e.order_id, summary)?;
                }
            }
            OrderEvent::OrderDeleted(e) => {
                self.store.remove(&e.order_id)?;
            }
        }

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }

    /// Drop the read model and replay the given envelopes in stream order.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), OrderHistoryError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        self.store.clear()?;
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }

        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
