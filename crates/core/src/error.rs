//! Domain error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::{OrderId, ProductId, ReservationId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Stable, transport-friendly classification of a [`DomainError`].
///
/// A thin HTTP layer maps these to status codes; the variants never carry
/// data so the mapping stays a flat `match`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidQuantity,
    ItemNotFound,
    ProductUnavailable,
    EmptyCart,
    InsufficientStock,
    InvalidStateTransition,
    AlreadyResolved,
    PersistenceFailure,
    OrderNotFound,
    Conflict,
    Validation,
}

/// Domain-level error.
///
/// Every cart, stock and order operation reports one of these synchronously;
/// nothing is swallowed on the way to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Line quantity outside the accepted range.
    #[error("invalid quantity {quantity}: {reason}")]
    InvalidQuantity { quantity: u32, reason: String },

    /// The product is not a line of the cart.
    #[error("product {0} is not in the cart")]
    ItemNotFound(ProductId),

    /// The product does not exist, is archived, or its stock is frozen.
    #[error("product {0} is unavailable")]
    ProductUnavailable(ProductId),

    #[error("cart is empty")]
    EmptyCart,

    #[error("insufficient stock for product {product_id} (requested {requested}, available {available})")]
    InsufficientStock {
        product_id: ProductId,
        requested: u64,
        available: u64,
    },

    #[error("invalid order state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// The reservation was already committed or released.
    #[error("reservation {0} already resolved")]
    AlreadyResolved(ReservationId),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// Durable storage failed; the operation was rolled back before surfacing.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Stock could not be returned to the ledger after an order reversal.
    #[error("stock reversal failed: {0}")]
    StockReversal(String),

    /// A conflict occurred (stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    pub fn invalid_quantity(quantity: u32, reason: impl Into<String>) -> Self {
        Self::InvalidQuantity {
            quantity,
            reason: reason.into(),
        }
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::InvalidQuantity { .. } => ErrorKind::InvalidQuantity,
            DomainError::ItemNotFound(_) => ErrorKind::ItemNotFound,
            DomainError::ProductUnavailable(_) => ErrorKind::ProductUnavailable,
            DomainError::EmptyCart => ErrorKind::EmptyCart,
            DomainError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            DomainError::InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
            DomainError::AlreadyResolved(_) => ErrorKind::AlreadyResolved,
            DomainError::OrderNotFound(_) => ErrorKind::OrderNotFound,
            DomainError::Persistence(_) | DomainError::StockReversal(_) => {
                ErrorKind::PersistenceFailure
            }
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::Validation(_) => ErrorKind::Validation,
        }
    }
}
