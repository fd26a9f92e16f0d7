use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use storefront_core::{DomainError, DomainResult, Money, ProductId};

use crate::product::{ProductSnapshot, ProductStatus};

/// Read access to the product catalog.
///
/// Injected into the cart store at construction; there is no global catalog.
pub trait ProductCatalog: Send + Sync {
    /// Returns `None` when the product does not exist.
    fn get_product(&self, product_id: ProductId) -> Option<ProductSnapshot>;
}

impl<C> ProductCatalog for Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    fn get_product(&self, product_id: ProductId) -> Option<ProductSnapshot> {
        (**self).get_product(product_id)
    }
}

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<HashMap<ProductId, ProductSnapshot>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an active product.
    pub fn upsert(
        &self,
        product_id: ProductId,
        name: impl Into<String>,
        unit_price: Money,
    ) -> DomainResult<ProductSnapshot> {
        let snapshot = ProductSnapshot {
            product_id,
            name: name.into(),
            status: ProductStatus::Active,
            unit_price,
        };
        let mut products = self.write()?;
        products.insert(product_id, snapshot.clone());
        Ok(snapshot)
    }

    /// Change the list price. Existing cart lines and orders keep their snapshot.
    pub fn set_price(&self, product_id: ProductId, unit_price: Money) -> DomainResult<()> {
        self.update(product_id, |p| p.unit_price = unit_price)
    }

    /// Soft delete.
    pub fn archive(&self, product_id: ProductId) -> DomainResult<()> {
        self.update(product_id, |p| p.status = ProductStatus::Archived)?;
        tracing::info!(%product_id, "product archived");
        Ok(())
    }

    pub fn activate(&self, product_id: ProductId) -> DomainResult<()> {
        self.update(product_id, |p| p.status = ProductStatus::Active)
    }

    fn update(
        &self,
        product_id: ProductId,
        f: impl FnOnce(&mut ProductSnapshot),
    ) -> DomainResult<()> {
        let mut products = self.write()?;
        let product = products
            .get_mut(&product_id)
            .ok_or(DomainError::ProductUnavailable(product_id))?;
        f(product);
        Ok(())
    }

    fn write(
        &self,
    ) -> DomainResult<std::sync::RwLockWriteGuard<'_, HashMap<ProductId, ProductSnapshot>>> {
        self.products
            .write()
            .map_err(|_| DomainError::persistence("catalog lock poisoned"))
    }
}

impl ProductCatalog for InMemoryProductCatalog {
    fn get_product(&self, product_id: ProductId) -> Option<ProductSnapshot> {
        let products = self.products.read().ok()?;
        products.get(&product_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archived_products_remain_readable_but_not_sellable() {
        let catalog = InMemoryProductCatalog::new();
        let product_id = ProductId::new();
        catalog
            .upsert(product_id, "Espresso beans", Money::from_minor(1_450))
            .unwrap();

        catalog.archive(product_id).unwrap();

        let snapshot = catalog.get_product(product_id).unwrap();
        assert_eq!(snapshot.status, ProductStatus::Archived);
        assert!(!snapshot.can_be_sold());
    }

    #[test]
    fn updating_an_unknown_product_fails() {
        let catalog = InMemoryProductCatalog::new();
        let product_id = ProductId::new();

        let err = catalog.set_price(product_id, Money::from_minor(1)).unwrap_err();
        assert_eq!(err, DomainError::ProductUnavailable(product_id));
        assert!(catalog.get_product(product_id).is_none());
    }

    #[test]
    fn catalog_is_usable_through_a_trait_object() {
        let catalog: Arc<dyn ProductCatalog> = Arc::new(InMemoryProductCatalog::new());
        assert!(catalog.get_product(ProductId::new()).is_none());
    }
}
