//! # Data Repository Layer
//!
//! This module provides the persistence seams used by the services:
//! a [`Database`] that opens, commits and rolls back transactions, and
//! repository traits for products, orders, catalog cleanup and carts.
//! Every repository call takes the same `&mut Tx` handle so that a
//! multi-row operation commits or rolls back as one unit.
//!
//! PostgreSQL implementations live in [`pg`]; an in-memory implementation
//! with fault injection lives in `memory` behind the `memory` feature.

use async_trait::async_trait;
use model::{
    CartItem, CartItemId, CategoryId, NewCartItem, NewOrder, NewOrderItem, Order, OrderId,
    OrderStatus, Product, ProductId, StatusUpdate, SubcategoryId, UserId,
};
use thiserror::Error;

#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod pg;

pub use pg::{
    PgCartRepository, PgCatalogRepository, PgDatabase, PgOrdersRepository, PgProductsRepository,
    PgTx,
};

/// # RepositoryError
///
/// Error types that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database-related errors, wrapping the underlying PostgreSQL error
    #[error("Database error: {0}")]
    Db(#[from] tokio_postgres::Error),
    /// Failed to obtain a connection from the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    /// No result found.
    #[error("Not found")]
    NotFound,
    /// A stored value could not be mapped onto the domain model.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
    /// The transaction handle was already committed or rolled back.
    #[error("Transaction already finished")]
    TransactionClosed,
    /// Failure reported by a non-PostgreSQL backend.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// # Database
///
/// Transaction boundary shared by all repositories.
///
/// A transaction that is neither committed nor rolled back must leave no
/// trace once dropped.
#[async_trait]
pub trait Database: Send + Sync {
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx, RepositoryError>;

    async fn commit(&self, tx: Self::Tx) -> Result<(), RepositoryError>;

    async fn rollback(&self, tx: Self::Tx) -> Result<(), RepositoryError>;
}

/// # ProductsRepository
///
/// Read access to products together with their size variants.
#[async_trait]
pub trait ProductsRepository<Tx: Send>: Send + Sync {
    /// Loads every existing product among `ids`, variants ordered by display order.
    /// Missing ids are simply absent from the result.
    async fn find_by_ids(
        &self,
        tx: &mut Tx,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError>;

    async fn find_by_id(&self, tx: &mut Tx, id: ProductId) -> Result<Product, RepositoryError> {
        self.find_by_ids(tx, &[id])
            .await?
            .pop()
            .ok_or(RepositoryError::NotFound)
    }

    async fn ids_in_subcategory(
        &self,
        tx: &mut Tx,
        subcategory: SubcategoryId,
    ) -> Result<Vec<ProductId>, RepositoryError>;

    /// Products attached to the category directly, with no subcategory.
    async fn ids_directly_in_category(
        &self,
        tx: &mut Tx,
        category: CategoryId,
    ) -> Result<Vec<ProductId>, RepositoryError>;
}

/// # OrdersRepository
///
/// Order headers and their frozen line items.
#[async_trait]
pub trait OrdersRepository<Tx: Send>: Send + Sync {
    /// Writes a header with status `pending` and returns its id.
    async fn insert_header(&self, tx: &mut Tx, order: &NewOrder) -> Result<OrderId, RepositoryError>;

    async fn insert_items(
        &self,
        tx: &mut Tx,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, tx: &mut Tx, id: OrderId) -> Result<Order, RepositoryError>;

    /// Newest first.
    async fn find_by_user(&self, tx: &mut Tx, user: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Newest first.
    async fn find_all(&self, tx: &mut Tx) -> Result<Vec<Order>, RepositoryError>;

    /// Current status, locking the header for the rest of the transaction.
    async fn status_for_update(&self, tx: &mut Tx, id: OrderId) -> Result<OrderStatus, RepositoryError>;

    /// Applies the status and any supplied tracking/rejection fields. Returns rows affected.
    async fn update_status(
        &self,
        tx: &mut Tx,
        id: OrderId,
        update: &StatusUpdate,
    ) -> Result<u64, RepositoryError>;

    /// Deletes the items, then the header. Returns header rows deleted.
    async fn delete_cascade(&self, tx: &mut Tx, id: OrderId) -> Result<u64, RepositoryError>;
}

/// # CatalogRepository
///
/// Row-level deletes used by cascading catalog removal. None of these cascade
/// on their own; callers delete children before parents.
#[async_trait]
pub trait CatalogRepository<Tx: Send>: Send + Sync {
    async fn delete_product_images(&self, tx: &mut Tx, product: ProductId) -> Result<u64, RepositoryError>;

    async fn delete_product_specifications(
        &self,
        tx: &mut Tx,
        product: ProductId,
    ) -> Result<u64, RepositoryError>;

    async fn delete_size_variants(&self, tx: &mut Tx, product: ProductId) -> Result<u64, RepositoryError>;

    async fn delete_product(&self, tx: &mut Tx, product: ProductId) -> Result<u64, RepositoryError>;

    async fn subcategory_ids(
        &self,
        tx: &mut Tx,
        category: CategoryId,
    ) -> Result<Vec<SubcategoryId>, RepositoryError>;

    async fn delete_subcategory_spec_keys(
        &self,
        tx: &mut Tx,
        subcategory: SubcategoryId,
    ) -> Result<u64, RepositoryError>;

    async fn delete_category_spec_keys(
        &self,
        tx: &mut Tx,
        category: CategoryId,
    ) -> Result<u64, RepositoryError>;

    async fn delete_subcategory(
        &self,
        tx: &mut Tx,
        subcategory: SubcategoryId,
    ) -> Result<u64, RepositoryError>;

    async fn delete_category(&self, tx: &mut Tx, category: CategoryId) -> Result<u64, RepositoryError>;
}

/// # CartRepository
///
/// Cart rows, unique per (user, product, size).
#[async_trait]
pub trait CartRepository<Tx: Send>: Send + Sync {
    async fn find_by_user(&self, tx: &mut Tx, user: UserId) -> Result<Vec<CartItem>, RepositoryError>;

    /// Inserts the line, or adds to the quantity of the existing
    /// (user, product, size) line. Returns the stored row.
    async fn add(&self, tx: &mut Tx, item: &NewCartItem) -> Result<CartItem, RepositoryError>;

    async fn set_quantity(
        &self,
        tx: &mut Tx,
        user: UserId,
        id: CartItemId,
        quantity: i32,
    ) -> Result<u64, RepositoryError>;

    async fn delete(&self, tx: &mut Tx, user: UserId, id: CartItemId) -> Result<u64, RepositoryError>;

    /// Deletes the user's rows matching any (product, size) pair.
    async fn delete_lines(
        &self,
        tx: &mut Tx,
        user: UserId,
        lines: &[(ProductId, Option<String>)],
    ) -> Result<u64, RepositoryError>;

    /// Deletes every user's rows for the product.
    async fn delete_for_product(&self, tx: &mut Tx, product: ProductId) -> Result<u64, RepositoryError>;
}
