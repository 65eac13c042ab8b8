use std::collections::HashMap;

use async_trait::async_trait;
use model::{CartItem, CartItemId, NewCartItem, Product, ProductId, UserId};
use pricing::{LineResult, OrderTotals, aggregate, price_line};
use repository::{CartRepository, Database, ProductsRepository, RepositoryError};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};

use crate::{ServiceError, canonical_size, effective_variant, finish, validate_size};

/// A cart row priced with the product's current price and GST.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(flatten)]
    pub item: CartItem,
    pub product_name: String,
    pub pricing: LineResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLine>,
    /// Shipping is not known before checkout and is always 0 here.
    pub totals: OrderTotals,
}

#[async_trait]
pub trait CartService: Send + Sync {
    async fn view_cart(&self, user: UserId) -> Result<CartView, ServiceError>;

    /// Adds `quantity` of the product in `size`, merging with an existing
    /// line for the same product and size.
    ///
    /// # Errors
    /// [`ServiceError::Validation`] for a quantity below 1, a size the
    /// product does not offer, or a merged quantity that would not fit in the
    /// line.
    async fn add_item(
        &self,
        user: UserId,
        product: ProductId,
        size: Option<String>,
        quantity: i32,
    ) -> Result<CartItem, ServiceError>;

    async fn update_quantity(
        &self,
        user: UserId,
        item: CartItemId,
        quantity: i32,
    ) -> Result<(), ServiceError>;

    async fn remove_item(&self, user: UserId, item: CartItemId) -> Result<(), ServiceError>;
}

pub struct CartServiceImpl<D, P, C> {
    db: D,
    products_repo: P,
    cart_repo: C,
}

fn check_quantity(quantity: i32) -> Result<(), ServiceError> {
    if quantity < 1 {
        return Err(ServiceError::invalid("quantity", "must be at least 1"));
    }
    Ok(())
}

impl<D, P, C> CartServiceImpl<D, P, C>
where
    D: Database,
    P: ProductsRepository<D::Tx>,
    C: CartRepository<D::Tx>,
{
    pub fn new(db: D, products_repo: P, cart_repo: C) -> Self {
        Self {
            db,
            products_repo,
            cart_repo,
        }
    }

    async fn load_cart(&self, tx: &mut D::Tx, user: UserId) -> Result<CartView, ServiceError> {
        let rows = self.cart_repo.find_by_user(tx, user).await?;
        let mut ids: Vec<ProductId> = rows.iter().map(|r| r.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let catalog: HashMap<ProductId, Product> = self
            .products_repo
            .find_by_ids(tx, &ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let lines: Vec<CartLine> = rows
            .into_iter()
            .filter_map(|item| {
                let product = catalog.get(&item.product_id)?;
                let variant = effective_variant(product, item.size.as_deref());
                Some(CartLine {
                    product_name: product.name.clone(),
                    pricing: price_line(product, variant, item.quantity),
                    item,
                })
            })
            .collect();

        let totals = aggregate(lines.iter().map(|l| &l.pricing), Decimal::ZERO);
        Ok(CartView {
            items: lines
                .into_iter()
                .map(|l| CartLine {
                    pricing: l.pricing.rounded(),
                    ..l
                })
                .collect(),
            totals,
        })
    }

    async fn insert_item(
        &self,
        tx: &mut D::Tx,
        user: UserId,
        product_id: ProductId,
        size: Option<String>,
        quantity: i32,
    ) -> Result<CartItem, ServiceError> {
        let product = match self.products_repo.find_by_id(tx, product_id).await {
            Ok(p) => p,
            Err(RepositoryError::NotFound) => {
                return Err(ServiceError::ProductNotFound(vec![product_id]));
            }
            Err(e) => return Err(e.into()),
        };
        validate_size(&product, size.as_deref())?;
        let size = canonical_size(&product, size.as_deref());

        let current = self
            .cart_repo
            .find_by_user(tx, user)
            .await?
            .iter()
            .find(|c| c.is_line(product_id, size.as_deref()))
            .map_or(0, |c| c.quantity);
        if current.checked_add(quantity).is_none() {
            return Err(ServiceError::invalid("quantity", "cart line quantity is too large"));
        }

        let item = NewCartItem {
            user_id: user,
            product_id,
            size,
            quantity,
        };
        Ok(self.cart_repo.add(tx, &item).await?)
    }
}

#[async_trait]
impl<D, P, C> CartService for CartServiceImpl<D, P, C>
where
    D: Database,
    P: ProductsRepository<D::Tx>,
    C: CartRepository<D::Tx>,
{
    #[instrument(skip(self))]
    async fn view_cart(&self, user: UserId) -> Result<CartView, ServiceError> {
        let mut tx = self.db.begin().await?;
        let result = self.load_cart(&mut tx, user).await;
        finish(&self.db, tx, result).await
    }

    #[instrument(skip(self))]
    async fn add_item(
        &self,
        user: UserId,
        product: ProductId,
        size: Option<String>,
        quantity: i32,
    ) -> Result<CartItem, ServiceError> {
        check_quantity(quantity)?;
        let size = model::request::normalize_size(size);

        let mut tx = self.db.begin().await?;
        let result = self.insert_item(&mut tx, user, product, size, quantity).await;
        let item = finish(&self.db, tx, result).await?;

        info!(cart_item = item.id, quantity = item.quantity, "cart line stored");
        Ok(item)
    }

    #[instrument(skip(self))]
    async fn update_quantity(
        &self,
        user: UserId,
        item: CartItemId,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        check_quantity(quantity)?;

        let mut tx = self.db.begin().await?;
        let result = match self.cart_repo.set_quantity(&mut tx, user, item, quantity).await {
            Ok(0) => Err(ServiceError::NotFound),
            Ok(_) => Ok(()),
            Err(e) => Err(e.into()),
        };
        finish(&self.db, tx, result).await
    }

    #[instrument(skip(self))]
    async fn remove_item(&self, user: UserId, item: CartItemId) -> Result<(), ServiceError> {
        let mut tx = self.db.begin().await?;
        let result = match self.cart_repo.delete(&mut tx, user, item).await {
            Ok(0) => Err(ServiceError::NotFound),
            Ok(_) => Ok(()),
            Err(e) => Err(e.into()),
        };
        finish(&self.db, tx, result).await
    }
}
