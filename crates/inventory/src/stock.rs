use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, ProductId};

/// Stock counters for one product.
///
/// `available` is what checkouts may still take; `reserved` is stock held by
/// in-flight checkout attempts. Both are unsigned, so the "never negative"
/// invariant is enforced by checked arithmetic rather than by convention.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    available: u64,
    reserved: u64,
    frozen: bool,
}

impl StockLevel {
    pub fn new(available: u64) -> Self {
        Self {
            available,
            reserved: 0,
            frozen: false,
        }
    }

    pub fn available(&self) -> u64 {
        self.available
    }

    pub fn reserved(&self) -> u64 {
        self.reserved
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Check-and-decrement in one step; no partial reservation.
    pub fn reserve(&mut self, product_id: ProductId, quantity: u64) -> DomainResult<()> {
        if self.frozen {
            return Err(DomainError::ProductUnavailable(product_id));
        }
        if self.available < quantity {
            return Err(DomainError::InsufficientStock {
                product_id,
                requested: quantity,
                available: self.available,
            });
        }
        let reserved = self
            .reserved
            .checked_add(quantity)
            .ok_or_else(|| DomainError::validation("reserved quantity overflows"))?;
        self.available -= quantity;
        self.reserved = reserved;
        Ok(())
    }

    /// Make a reservation permanent: the units leave the ledger.
    pub fn commit(&mut self, quantity: u64) -> DomainResult<()> {
        self.reserved = self.take_reserved(quantity)?;
        Ok(())
    }

    /// Undo a reservation: the units go back to `available`.
    pub fn release(&mut self, quantity: u64) -> DomainResult<()> {
        let reserved = self.take_reserved(quantity)?;
        self.available = self.checked_available_add(quantity)?;
        self.reserved = reserved;
        Ok(())
    }

    /// Return previously committed units (cancelled or deleted order), or
    /// receive new goods. Allowed while frozen.
    pub fn replenish(&mut self, quantity: u64) -> DomainResult<()> {
        self.available = self.checked_available_add(quantity)?;
        Ok(())
    }

    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    fn take_reserved(&self, quantity: u64) -> DomainResult<u64> {
        self.reserved.checked_sub(quantity).ok_or_else(|| {
            DomainError::validation(format!(
                "cannot resolve {quantity} units, only {} reserved",
                self.reserved
            ))
        })
    }

    fn checked_available_add(&self, quantity: u64) -> DomainResult<u64> {
        self.available
            .checked_add(quantity)
            .ok_or_else(|| DomainError::validation("available quantity overflows"))
    }
}
