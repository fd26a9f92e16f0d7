//! Concurrency-safe stock ledger.
//!
//! Every product has its own `Mutex<StockEntry>`; the product map is behind
//! an `RwLock` that is only held to look up (or insert) an entry handle, never
//! while stock is being mutated. Reservations on the same product serialize,
//! reservations on different products never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use storefront_core::{DomainError, DomainResult, ProductId, ReservationId};

use crate::stock::StockLevel;

/// Handle for a provisional stock decrement taken by one checkout attempt.
///
/// Resolve it exactly once with [`StockLedger::commit`] or
/// [`StockLedger::release`]; resolving it again reports `AlreadyResolved`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationToken {
    id: ReservationId,
    product_id: ProductId,
    quantity: u64,
}

impl ReservationToken {
    pub fn id(&self) -> ReservationId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }
}

#[derive(Debug, Default)]
struct StockEntry {
    level: StockLevel,
    /// Reservations taken but not yet committed or released.
    pending: HashMap<ReservationId, u64>,
}

/// Stock ledger: one entry per tracked product.
#[derive(Debug, Default)]
pub struct StockLedger {
    entries: RwLock<HashMap<ProductId, Arc<Mutex<StockEntry>>>>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a product with `initial` units on hand.
    pub fn track(&self, product_id: ProductId, initial: u64) -> DomainResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| DomainError::persistence("stock ledger lock poisoned"))?;
        if entries.contains_key(&product_id) {
            return Err(DomainError::conflict(format!(
                "product {product_id} is already tracked"
            )));
        }
        entries.insert(
            product_id,
            Arc::new(Mutex::new(StockEntry {
                level: StockLevel::new(initial),
                pending: HashMap::new(),
            })),
        );
        Ok(())
    }

    pub fn contains(&self, product_id: ProductId) -> DomainResult<bool> {
        Ok(self.entry(product_id)?.is_some())
    }

    /// Atomically check and decrement `available`.
    ///
    /// Fails fast: an untracked product has nothing available, and there is
    /// no waiting for stock to come back.
    pub fn reserve(&self, product_id: ProductId, quantity: u32) -> DomainResult<ReservationToken> {
        if quantity == 0 {
            return Err(DomainError::invalid_quantity(
                quantity,
                "reservation must cover at least one unit",
            ));
        }
        let quantity = u64::from(quantity);

        let Some(entry) = self.entry(product_id)? else {
            return Err(DomainError::InsufficientStock {
                product_id,
                requested: quantity,
                available: 0,
            });
        };

        let mut entry = lock(&entry)?;
        if let Err(err) = entry.level.reserve(product_id, quantity) {
            tracing::warn!(%product_id, quantity, error = %err, "stock reservation rejected");
            return Err(err);
        }

        let id = ReservationId::new();
        entry.pending.insert(id, quantity);
        tracing::debug!(%product_id, reservation_id = %id, quantity, "stock reserved");

        Ok(ReservationToken {
            id,
            product_id,
            quantity,
        })
    }

    /// Turn a reservation into a permanent decrement.
    pub fn commit(&self, token: &ReservationToken) -> DomainResult<()> {
        self.resolve(token, |level, quantity| level.commit(quantity))?;
        tracing::debug!(product_id = %token.product_id, reservation_id = %token.id, "reservation committed");
        Ok(())
    }

    /// Return reserved units to `available`.
    pub fn release(&self, token: &ReservationToken) -> DomainResult<()> {
        self.resolve(token, |level, quantity| level.release(quantity))?;
        tracing::debug!(product_id = %token.product_id, reservation_id = %token.id, "reservation released");
        Ok(())
    }

    /// Units a checkout could take right now (0 for untracked products).
    pub fn get_available(&self, product_id: ProductId) -> DomainResult<u64> {
        Ok(self
            .level(product_id)?
            .map(|l| l.available())
            .unwrap_or(0))
    }

    /// Snapshot of a product's counters; `None` when it is not tracked.
    pub fn level(&self, product_id: ProductId) -> DomainResult<Option<StockLevel>> {
        let Some(entry) = self.entry(product_id)? else {
            return Ok(None);
        };
        let entry = lock(&entry)?;
        Ok(Some(entry.level))
    }

    /// Give committed units back after an order is cancelled or deleted.
    ///
    /// The product must still be tracked; a reversal that cannot be applied is
    /// reported as `StockReversal` so the caller never silently leaves stock short.
    pub fn restore(&self, product_id: ProductId, quantity: u64) -> DomainResult<()> {
        let entry = self.entry(product_id)?.ok_or_else(|| {
            DomainError::StockReversal(format!("product {product_id} is not tracked"))
        })?;
        let mut entry = lock(&entry)?;
        entry
            .level
            .replenish(quantity)
            .map_err(|e| DomainError::StockReversal(e.to_string()))?;
        tracing::debug!(%product_id, quantity, "stock restored");
        Ok(())
    }

    /// Receive new goods. Starts tracking the product if needed.
    pub fn restock(&self, product_id: ProductId, quantity: u64) -> DomainResult<()> {
        if let Some(entry) = self.entry(product_id)? {
            let mut entry = lock(&entry)?;
            return entry.level.replenish(quantity);
        }
        // Losing a race with another `track` is a conflict; retry as replenish.
        match self.track(product_id, quantity) {
            Err(DomainError::Conflict(_)) => self.restock(product_id, quantity),
            other => other,
        }
    }

    /// Stop accepting reservations (soft-deleted product). In-flight
    /// reservations may still be committed or released.
    pub fn freeze(&self, product_id: ProductId) -> DomainResult<()> {
        self.set_frozen(product_id, true)
    }

    pub fn unfreeze(&self, product_id: ProductId) -> DomainResult<()> {
        self.set_frozen(product_id, false)
    }

    fn set_frozen(&self, product_id: ProductId, frozen: bool) -> DomainResult<()> {
        let entry = self
            .entry(product_id)?
            .ok_or(DomainError::ProductUnavailable(product_id))?;
        lock(&entry)?.level.set_frozen(frozen);
        Ok(())
    }

    fn resolve(
        &self,
        token: &ReservationToken,
        apply: impl FnOnce(&mut StockLevel, u64) -> DomainResult<()>,
    ) -> DomainResult<()> {
        let entry = self
            .entry(token.product_id)?
            .ok_or(DomainError::AlreadyResolved(token.id))?;
        let mut entry = lock(&entry)?;

        let Some(quantity) = entry.pending.get(&token.id).copied() else {
            return Err(DomainError::AlreadyResolved(token.id));
        };
        apply(&mut entry.level, quantity)?;
        entry.pending.remove(&token.id);
        Ok(())
    }

    fn entry(&self, product_id: ProductId) -> DomainResult<Option<Arc<Mutex<StockEntry>>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| DomainError::persistence("stock ledger lock poisoned"))?;
        Ok(entries.get(&product_id).cloned())
    }
}

fn lock(entry: &Mutex<StockEntry>) -> DomainResult<MutexGuard<'_, StockEntry>> {
    entry
        .lock()
        .map_err(|_| DomainError::persistence("stock entry lock poisoned"))
}
