use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_catalog::ProductSnapshot;
use storefront_core::{DomainError, DomainResult, Entity, Money, ProductId, UserId, ValueObject};

/// Cart line: product, quantity, and the unit price seen when it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl ValueObject for CartItem {}

impl CartItem {
    pub fn line_total(&self) -> DomainResult<Money> {
        self.unit_price.times(self.quantity)
    }
}

/// Per-line quantity bounds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLimits {
    pub max_line_quantity: u32,
}

impl Default for CartLimits {
    fn default() -> Self {
        Self {
            max_line_quantity: 999,
        }
    }
}

impl CartLimits {
    fn check(&self, quantity: u32) -> DomainResult<()> {
        if quantity < 1 {
            return Err(DomainError::invalid_quantity(quantity, "must be at least 1"));
        }
        if quantity > self.max_line_quantity {
            return Err(DomainError::invalid_quantity(
                quantity,
                format!("exceeds the per-line maximum of {}", self.max_line_quantity),
            ));
        }
        Ok(())
    }
}

/// A user's active cart.
///
/// Invariant: at most one line per product; lines keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    user_id: UserId,
    items: Vec<CartItem>,
    updated_at: DateTime<Utc>,
}

impl Entity for Cart {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.user_id
    }
}

impl Cart {
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            updated_at: now,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn item(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    pub fn subtotal(&self) -> DomainResult<Money> {
        self.items
            .iter()
            .try_fold(Money::ZERO, |acc, item| acc.checked_add(item.line_total()?))
    }

    /// Add `quantity` units, merging into an existing line.
    ///
    /// The line's price snapshot is refreshed to the product's current price.
    pub fn add_item(
        &mut self,
        product: &ProductSnapshot,
        quantity: u32,
        limits: CartLimits,
        now: DateTime<Utc>,
    ) -> DomainResult<CartItem> {
        if quantity < 1 {
            return Err(DomainError::invalid_quantity(quantity, "must be at least 1"));
        }
        if !product.can_be_sold() {
            return Err(DomainError::ProductUnavailable(product.product_id));
        }

        let merged = match self.item(product.product_id) {
            Some(existing) => existing.quantity.checked_add(quantity).ok_or_else(|| {
                DomainError::invalid_quantity(quantity, "line quantity overflows")
            })?,
            None => quantity,
        };
        limits.check(merged)?;

        let line = CartItem {
            product_id: product.product_id,
            quantity: merged,
            unit_price: product.unit_price,
        };
        match self.position(product.product_id) {
            Some(idx) => self.items[idx] = line.clone(),
            None => self.items.push(line.clone()),
        }
        self.updated_at = now;
        Ok(line)
    }

    /// Set a line's quantity; `0` removes the line.
    pub fn update_item(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        limits: CartLimits,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<CartItem>> {
        let idx = self
            .position(product_id)
            .ok_or(DomainError::ItemNotFound(product_id))?;

        if quantity == 0 {
            self.items.remove(idx);
            self.updated_at = now;
            return Ok(None);
        }

        limits.check(quantity)?;
        self.items[idx].quantity = quantity;
        self.updated_at = now;
        Ok(Some(self.items[idx].clone()))
    }

    /// Remove a line. Absent products are reported, not ignored.
    pub fn remove_item(&mut self, product_id: ProductId, now: DateTime<Utc>) -> DomainResult<CartItem> {
        let idx = self
            .position(product_id)
            .ok_or(DomainError::ItemNotFound(product_id))?;
        let removed = self.items.remove(idx);
        self.updated_at = now;
        Ok(removed)
    }

    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.items.clear();
        self.updated_at = now;
    }

    fn position(&self, product_id: ProductId) -> Option<usize> {
        self.items.iter().position(|i| i.product_id == product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use storefront_catalog::ProductStatus;

    fn product(price: u64) -> ProductSnapshot {
        ProductSnapshot {
            product_id: ProductId::new(),
            name: "Pour-over kettle".to_string(),
            status: ProductStatus::Active,
            unit_price: Money::from_minor(price),
        }
    }

    fn empty_cart() -> Cart {
        Cart::new(UserId::new(), Utc::now())
    }

    #[test]
    fn adding_the_same_product_twice_merges_lines() {
        let mut cart = empty_cart();
        let p = product(500);

        cart.add_item(&p, 2, CartLimits::default(), Utc::now()).unwrap();
        cart.add_item(&p, 3, CartLimits::default(), Utc::now()).unwrap();

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.item(p.product_id).unwrap().quantity, 5);
        assert_eq!(cart.subtotal().unwrap(), Money::from_minor(2_500));
    }

    #[test]
    fn merge_refreshes_the_price_snapshot() {
        let mut cart = empty_cart();
        let mut p = product(500);
        cart.add_item(&p, 1, CartLimits::default(), Utc::now()).unwrap();

        p.unit_price = Money::from_minor(450);
        cart.add_item(&p, 1, CartLimits::default(), Utc::now()).unwrap();

        assert_eq!(cart.item(p.product_id).unwrap().unit_price, Money::from_minor(450));
    }

    #[test]
    fn zero_quantity_add_is_invalid() {
        let mut cart = empty_cart();
        let err = cart
            .add_item(&product(100), 0, CartLimits::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity { quantity: 0, .. }));
        assert!(cart.is_empty());
    }

    #[test]
    fn archived_products_cannot_be_added() {
        let mut cart = empty_cart();
        let mut p = product(100);
        p.status = ProductStatus::Archived;

        let err = cart.add_item(&p, 1, CartLimits::default(), Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::ProductUnavailable(p.product_id));
    }

    #[test]
    fn merged_quantity_respects_the_line_limit() {
        let mut cart = empty_cart();
        let p = product(100);
        let limits = CartLimits {
            max_line_quantity: 5,
        };
        cart.add_item(&p, 4, limits, Utc::now()).unwrap();

        let err = cart.add_item(&p, 2, limits, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity { .. }));
        assert_eq!(cart.item(p.product_id).unwrap().quantity, 4);
    }

    #[test]
    fn update_to_zero_removes_the_line() {
        let mut cart = empty_cart();
        let p = product(100);
        cart.add_item(&p, 2, CartLimits::default(), Utc::now()).unwrap();

        let updated = cart
            .update_item(p.product_id, 0, CartLimits::default(), Utc::now())
            .unwrap();

        assert!(updated.is_none());
        assert!(cart.is_empty());
    }

    #[test]
    fn update_and_remove_report_missing_lines() {
        let mut cart = empty_cart();
        let missing = ProductId::new();

        assert_eq!(
            cart.update_item(missing, 1, CartLimits::default(), Utc::now())
                .unwrap_err(),
            DomainError::ItemNotFound(missing)
        );
        assert_eq!(
            cart.remove_item(missing, Utc::now()).unwrap_err(),
            DomainError::ItemNotFound(missing)
        );
    }

    #[test]
    fn lines_keep_insertion_order() {
        let mut cart = empty_cart();
        let first = product(100);
        let second = product(200);
        cart.add_item(&first, 1, CartLimits::default(), Utc::now()).unwrap();
        cart.add_item(&second, 1, CartLimits::default(), Utc::now()).unwrap();
        cart.add_item(&first, 1, CartLimits::default(), Utc::now()).unwrap();

        let ids: Vec<_> = cart.items().iter().map(|i| i.product_id).collect();
        assert_eq!(ids, vec![first.product_id, second.product_id]);
    }

    proptest! {
        /// Property: any sequence of adds yields one line per product whose
        /// quantity is the sum of the accepted adds.
        #[test]
        fn adds_merge_per_product(adds in prop::collection::vec((0usize..4, 1u32..20), 1..40)) {
            let products: Vec<_> = (0..4u64).map(|i| product(100 + i)).collect();
            let mut cart = empty_cart();
            let mut expected = [0u32; 4];

            for (idx, qty) in adds {
                if cart.add_item(&products[idx], qty, CartLimits::default(), Utc::now()).is_ok() {
                    expected[idx] += qty;
                }
            }

            for (idx, p) in products.iter().enumerate() {
                let lines = cart.items().iter().filter(|i| i.product_id == p.product_id).count();
                prop_assert!(lines <= 1);
                let qty = cart.item(p.product_id).map(|i| i.quantity).unwrap_or(0);
                prop_assert_eq!(qty, expected[idx]);
            }
        }
    }
}
