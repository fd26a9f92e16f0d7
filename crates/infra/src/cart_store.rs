//! Concurrent per-user cart store.
//!
//! Every operation on one user's cart runs under that user's lock as a single
//! load → mutate → save step. Different users never contend.

use std::sync::Arc;

use chrono::Utc;

use storefront_cart::{Cart, CartItem, CartLimits};
use storefront_catalog::ProductCatalog;
use storefront_core::{DomainError, DomainResult, ProductId, UserId};

use crate::store::{KeyValueStore, KeyedLocks};

pub struct CartStore {
    catalog: Arc<dyn ProductCatalog>,
    carts: Arc<dyn KeyValueStore<UserId, Cart>>,
    locks: KeyedLocks<UserId>,
    limits: CartLimits,
}

impl core::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CartStore")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl CartStore {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        carts: Arc<dyn KeyValueStore<UserId, Cart>>,
        limits: CartLimits,
    ) -> Self {
        Self {
            catalog,
            carts,
            locks: KeyedLocks::new("cart"),
            limits,
        }
    }

    pub fn limits(&self) -> CartLimits {
        self.limits
    }

    /// Add units of a product, merging with an existing line.
    pub fn add_item(&self, user_id: UserId, product_id: ProductId, quantity: u32) -> DomainResult<CartItem> {
        if quantity < 1 {
            return Err(DomainError::invalid_quantity(quantity, "must be at least 1"));
        }
        let product = self
            .catalog
            .get_product(product_id)
            .ok_or(DomainError::ProductUnavailable(product_id))?;

        self.mutate(user_id, |cart| {
            cart.add_item(&product, quantity, self.limits, Utc::now())
        })
    }

    /// Set a line's quantity; `0` removes the line.
    pub fn update_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> DomainResult<Option<CartItem>> {
        self.mutate(user_id, |cart| {
            cart.update_item(product_id, quantity, self.limits, Utc::now())
        })
    }

    pub fn remove_item(&self, user_id: UserId, product_id: ProductId) -> DomainResult<CartItem> {
        self.mutate(user_id, |cart| cart.remove_item(product_id, Utc::now()))
    }

    /// Empty the cart. Clearing an empty cart is a no-op.
    pub fn clear(&self, user_id: UserId) -> DomainResult<()> {
        self.mutate(user_id, |cart| {
            cart.clear(Utc::now());
            Ok(())
        })
    }

    /// Current cart snapshot; the first read creates an empty cart.
    pub fn get_cart(&self, user_id: UserId) -> DomainResult<Cart> {
        let lock = self.locks.handle(user_id)?;
        let _guard = self.locks.acquire(&lock)?;

        if let Some(cart) = self.carts.get(&user_id)? {
            return Ok(cart);
        }
        let cart = Cart::new(user_id, Utc::now());
        self.carts.upsert(user_id, cart.clone())?;
        Ok(cart)
    }

    /// Run a checkout against the cart while holding the user's lock, and
    /// empty the cart if `checkout` succeeds.
    ///
    /// No add/update/remove for this user can interleave with the attempt,
    /// so a line added mid-checkout is never lost by the final clear. A
    /// failed attempt leaves the cart exactly as it was.
    pub fn checkout<T>(
        &self,
        user_id: UserId,
        checkout: impl FnOnce(&Cart) -> DomainResult<T>,
    ) -> DomainResult<T> {
        let lock = self.locks.handle(user_id)?;
        let _guard = self.locks.acquire(&lock)?;

        let cart = self
            .carts
            .get(&user_id)?
            .unwrap_or_else(|| Cart::new(user_id, Utc::now()));
        let outcome = checkout(&cart)?;

        let mut emptied = cart;
        emptied.clear(Utc::now());
        if let Err(err) = self.carts.upsert(user_id, emptied) {
            // The order is already placed; a stale cart is recoverable by the user.
            tracing::warn!(%user_id, error = %err, "order placed but cart could not be cleared");
        }
        Ok(outcome)
    }

    fn mutate<T>(&self, user_id: UserId, f: impl FnOnce(&mut Cart) -> DomainResult<T>) -> DomainResult<T> {
        let lock = self.locks.handle(user_id)?;
        let _guard = self.locks.acquire(&lock)?;

        let mut cart = self
            .carts
            .get(&user_id)?
            .unwrap_or_else(|| Cart::new(user_id, Utc::now()));
        let out = f(&mut cart)?;
        self.carts.upsert(user_id, cart)?;
        Ok(out)
    }
}
