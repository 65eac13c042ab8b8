//! Business logic layer for ordering, carts and catalog maintenance.
//!
//! This crate defines the [`OrderService`], [`CartService`] and
//! [`CatalogService`] traits and their implementations over the repository
//! seams. Every operation runs in exactly one transaction: it either commits
//! in full or is rolled back before its error is returned.
//!
//! # Features
//! - Atomic order creation: header, frozen line items and cart cleanup.
//! - Ordered cascading deletes of categories, subcategories and products.
//! - Prices and GST computed through the `pricing` crate at every call site.
//! - Well-typed error handling via [`ServiceError`].

use model::{Product, SizeVariant, UserId};
use repository::Database;
use tracing::error;

mod cart;
mod catalog;
mod error;
mod orders;

pub use cart::{CartLine, CartService, CartServiceImpl, CartView};
pub use catalog::{CascadeReport, CatalogService, CatalogServiceImpl, PriceQuote};
pub use error::{FieldError, ServiceError};
pub use orders::{OrderService, OrderServiceImpl, PricedOrder, PricedOrderItem};

/// Identity of the user making a request, as established upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Caller {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(self.user_id))
        }
    }

    /// Owners and admins may act on a user's resources.
    pub fn require_access(&self, owner: UserId) -> Result<(), ServiceError> {
        if self.is_admin || self.user_id == owner {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(self.user_id))
        }
    }
}

/// Commits `tx` when `result` is Ok, otherwise rolls it back and returns the
/// original error. A failed rollback is logged; the connection is discarded
/// by the transaction handle either way.
async fn finish<D, T>(db: &D, tx: D::Tx, result: Result<T, ServiceError>) -> Result<T, ServiceError>
where
    D: Database,
    T: Send,
{
    match result {
        Ok(value) => {
            db.commit(tx).await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = db.rollback(tx).await {
                error!(error = %rollback, cause = %e, "rollback failed");
            }
            Err(e)
        }
    }
}

/// The variant an order line is priced with: the one matching the selected
/// size, if it is currently available.
fn effective_variant<'a>(product: &'a Product, size: Option<&str>) -> Option<&'a SizeVariant> {
    product.variant_for(size).filter(|v| v.available)
}

/// The product's own spelling of a selected size label.
fn canonical_size(product: &Product, size: Option<&str>) -> Option<String> {
    let size = size.map(str::trim).filter(|s| !s.is_empty())?;
    if let Some(variant) = product.variant_for(Some(size)) {
        return Some(variant.size.trim().to_string());
    }
    let legacy = product
        .legacy_size_list()
        .into_iter()
        .find(|s| s.eq_ignore_ascii_case(size))
        .unwrap_or(size);
    Some(legacy.to_string())
}

/// Checks a size selection against what the product sells.
fn validate_size(product: &Product, size: Option<&str>) -> Result<(), ServiceError> {
    const FIELD: &str = "selectedSize";
    match size {
        None if product.offers_sizes() => {
            Err(ServiceError::invalid(FIELD, "is required for this product"))
        }
        None => Ok(()),
        Some(_) if !product.offers_sizes() => {
            Err(ServiceError::invalid(FIELD, "is not applicable to this product"))
        }
        Some(s) if !product.offers_size(s) => {
            Err(ServiceError::invalid(FIELD, format!("'{s}' is not offered")))
        }
        Some(s) => match product.variant_for(Some(s)) {
            Some(v) if !v.available => {
                Err(ServiceError::invalid(FIELD, format!("'{s}' is currently unavailable")))
            }
            _ => Ok(()),
        },
    }
}
