use serde::{Deserialize, Serialize};

use storefront_core::{Money, ProductId, ValueObject};

/// Product status lifecycle as observed by the order pipeline.
///
/// `Archived` is the catalog's soft delete: the product stays readable for
/// historical orders but can no longer be added to carts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Archived,
}

/// Point-in-time view of a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub status: ProductStatus,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: Money,
}

impl ValueObject for ProductSnapshot {}

impl ProductSnapshot {
    /// Check if product can be sold (must be Active, not Archived).
    pub fn can_be_sold(&self) -> bool {
        self.status == ProductStatus::Active
    }
}
