use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::{
    GstMode, NewOrder, NewOrderItem, Order, OrderId, OrderItem, OrderStatus, PlaceOrder, Product,
    ProductId, ShippingInfo, StatusUpdate, UserId,
};
use pricing::{LineResult, OrderTotals, aggregate, price_frozen_line, resolve_price, round_money};
use repository::{CartRepository, Database, OrdersRepository, ProductsRepository};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{Caller, FieldError, ServiceError, canonical_size, effective_variant, finish};

/// An order line with its tax breakdown.
///
/// The unit price is the frozen price-at-purchase; GST rate and mode come
/// from the product as it is now.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedOrderItem {
    #[serde(flatten)]
    pub item: OrderItem,
    /// None once the product has been removed from the catalog.
    pub product_name: Option<String>,
    pub gst_rate: Decimal,
    pub gst_mode: GstMode,
    pub pricing: LineResult,
}

/// An order as shown in history, detail and admin views.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedOrder {
    pub id: OrderId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub shipping: ShippingInfo,
    pub payment_mode: String,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<PricedOrderItem>,
    pub totals: OrderTotals,
}

impl PricedOrder {
    /// Prices `order` against the current catalog. Products missing from
    /// `catalog` are taxed at rate 0, exclusive.
    pub fn new(order: Order, catalog: &HashMap<ProductId, Product>) -> Self {
        let items: Vec<PricedOrderItem> = order
            .items
            .into_iter()
            .map(|item| {
                let product = catalog.get(&item.product_id);
                let gst_rate = product.map_or(Decimal::ZERO, |p| p.gst_rate);
                let gst_mode = product.map_or(GstMode::default(), |p| p.gst_mode);
                let line = price_frozen_line(
                    item.price_at_purchase,
                    None,
                    gst_rate,
                    gst_mode,
                    item.quantity,
                );
                PricedOrderItem {
                    product_name: product.map(|p| p.name.clone()),
                    gst_rate,
                    gst_mode,
                    pricing: line,
                    item,
                }
            })
            .collect();

        let totals = aggregate(items.iter().map(|i| &i.pricing), order.shipping_charge);

        Self {
            id: order.id,
            user_id: order.user_id,
            shipping: order.shipping,
            payment_mode: order.payment_mode,
            status: order.status,
            tracking_number: order.tracking_number,
            tracking_url: order.tracking_url,
            rejection_reason: order.rejection_reason,
            created_at: order.created_at,
            items: items
                .into_iter()
                .map(|i| PricedOrderItem {
                    pricing: i.pricing.rounded(),
                    ..i
                })
                .collect(),
            totals,
        }
    }
}

/// Trait describing business operations for order management.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Atomically creates an order: header, one frozen line per item and
    /// removal of the ordered lines from the buyer's cart.
    ///
    /// # Errors
    /// [`ServiceError::Validation`] for missing fields or items,
    /// [`ServiceError::ProductNotFound`] naming every unknown product id,
    /// [`ServiceError::Persistence`] when storage fails. Nothing is written
    /// in any error case.
    async fn create_order(&self, user: UserId, order: PlaceOrder) -> Result<OrderId, ServiceError>;

    /// The user's orders, newest first.
    async fn list_user_orders(&self, user: UserId) -> Result<Vec<PricedOrder>, ServiceError>;

    /// One order, visible to its owner and to admins.
    async fn get_order(&self, caller: Caller, id: OrderId) -> Result<PricedOrder, ServiceError>;

    /// Every order, newest first. Admin only.
    async fn list_all_orders(&self, caller: Caller) -> Result<Vec<PricedOrder>, ServiceError>;

    /// Moves an order along its lifecycle. Admin only.
    ///
    /// Tracking fields are stored when supplied; the rejection reason only
    /// when cancelling.
    ///
    /// # Arguments
    /// * `caller` - Must be an admin.
    /// * `id` - The order to move.
    /// * `update` - Target status plus optional tracking and rejection fields.
    ///
    /// # Errors
    /// Returns [`ServiceError::Forbidden`] for non-admins,
    /// [`ServiceError::NotFound`] for an unknown order,
    /// [`ServiceError::StatusTransition`] when the lifecycle does not allow
    /// the move, or [`ServiceError::Persistence`] when storage fails.
    async fn update_status(
        &self,
        caller: Caller,
        id: OrderId,
        update: StatusUpdate,
    ) -> Result<PricedOrder, ServiceError>;

    /// Deletes an order's items and then the order in one transaction.
    ///
    /// # Arguments
    /// * `caller` - The order's owner or an admin.
    /// * `id` - The order to delete.
    ///
    /// # Errors
    /// Returns [`ServiceError::NotFound`] for an unknown order,
    /// [`ServiceError::Forbidden`] when the caller neither owns the order nor
    /// is an admin, or [`ServiceError::Persistence`] when storage fails.
    async fn delete_order(&self, caller: Caller, id: OrderId) -> Result<(), ServiceError>;
}

/// Implementation of [`OrderService`] over the repository seams.
pub struct OrderServiceImpl<D, P, O, C> {
    db: D,
    products_repo: P,
    orders_repo: O,
    cart_repo: C,
}

impl<D, P, O, C> OrderServiceImpl<D, P, O, C>
where
    D: Database,
    P: ProductsRepository<D::Tx>,
    O: OrdersRepository<D::Tx>,
    C: CartRepository<D::Tx>,
{
    pub fn new(db: D, products_repo: P, orders_repo: O, cart_repo: C) -> Self {
        Self {
            db,
            products_repo,
            orders_repo,
            cart_repo,
        }
    }

    async fn insert_order(
        &self,
        tx: &mut D::Tx,
        user: UserId,
        order: &PlaceOrder,
    ) -> Result<OrderId, ServiceError> {
        let mut ids: Vec<ProductId> = order.items.iter().map(|l| l.product_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let catalog: HashMap<ProductId, Product> = self
            .products_repo
            .find_by_ids(tx, &ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let missing: Vec<ProductId> = ids
            .iter()
            .copied()
            .filter(|id| !catalog.contains_key(id))
            .collect();
        if !missing.is_empty() {
            warn!(?missing, "order references unknown products");
            return Err(ServiceError::ProductNotFound(missing));
        }

        let header = NewOrder {
            user_id: user,
            shipping: order.shipping.clone(),
            payment_mode: order.payment_mode.clone(),
            shipping_charge: round_money(order.shipping_charge.unwrap_or_default()),
        };
        let order_id = self.orders_repo.insert_header(tx, &header).await?;

        let mut items = Vec::with_capacity(order.items.len());
        for line in &order.items {
            let product = catalog
                .get(&line.product_id)
                .ok_or_else(|| ServiceError::ProductNotFound(vec![line.product_id]))?;
            let size = line.selected_size.as_deref();
            let resolved = resolve_price(
                product.price,
                product.mrp,
                effective_variant(product, size),
            );
            items.push(NewOrderItem {
                product_id: product.id,
                quantity: line.quantity,
                price_at_purchase: round_money(resolved.price),
                selected_size: canonical_size(product, size),
            });
        }
        self.orders_repo.insert_items(tx, order_id, &items).await?;

        let ordered: Vec<_> = items
            .iter()
            .map(|i| (i.product_id, i.selected_size.clone()))
            .collect();
        self.cart_repo.delete_lines(tx, user, &ordered).await?;

        Ok(order_id)
    }

    async fn price_orders(
        &self,
        tx: &mut D::Tx,
        orders: Vec<Order>,
    ) -> Result<Vec<PricedOrder>, ServiceError> {
        let mut ids: Vec<ProductId> = orders
            .iter()
            .flat_map(|o| o.items.iter().map(|i| i.product_id))
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let catalog: HashMap<ProductId, Product> = self
            .products_repo
            .find_by_ids(tx, &ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(orders
            .into_iter()
            .map(|o| PricedOrder::new(o, &catalog))
            .collect())
    }

    async fn load_order(&self, tx: &mut D::Tx, caller: Caller, id: OrderId) -> Result<PricedOrder, ServiceError> {
        let order = self.orders_repo.find_by_id(tx, id).await?;
        caller.require_access(order.user_id)?;
        let mut priced = self.price_orders(tx, vec![order]).await?;
        priced.pop().ok_or(ServiceError::NotFound)
    }

    async fn apply_status(
        &self,
        tx: &mut D::Tx,
        caller: Caller,
        id: OrderId,
        mut update: StatusUpdate,
    ) -> Result<PricedOrder, ServiceError> {
        let current = self.orders_repo.status_for_update(tx, id).await?;
        current.transition_to(update.status)?;

        if update.status != OrderStatus::Cancelled {
            update.rejection_reason = None;
        }
        if self.orders_repo.update_status(tx, id, &update).await? == 0 {
            return Err(ServiceError::NotFound);
        }
        self.load_order(tx, caller, id).await
    }

    async fn remove_order(&self, tx: &mut D::Tx, caller: Caller, id: OrderId) -> Result<(), ServiceError> {
        let order = self.orders_repo.find_by_id(tx, id).await?;
        caller.require_access(order.user_id)?;
        if self.orders_repo.delete_cascade(tx, id).await? == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(())
    }
}

/// Checks an order request and collects every problem found.
fn validate_order(order: &PlaceOrder) -> Result<(), ServiceError> {
    let mut errors: Vec<FieldError> = order
        .shipping
        .missing_fields()
        .into_iter()
        .map(|field| FieldError::new(field, "is required"))
        .collect();

    if order.payment_mode.trim().is_empty() {
        errors.push(FieldError::new("paymentMode", "is required"));
    }
    if order.items.is_empty() {
        errors.push(FieldError::new("items", "must contain at least one item"));
    }
    for (i, line) in order.items.iter().enumerate() {
        if line.quantity < 1 {
            errors.push(FieldError::new(
                format!("items[{i}].quantity"),
                "must be at least 1",
            ));
        }
    }
    if order.shipping_charge.is_some_and(|c| c.is_sign_negative()) {
        errors.push(FieldError::new("shippingCharge", "must not be negative"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::Validation(errors))
    }
}

#[async_trait]
impl<D, P, O, C> OrderService for OrderServiceImpl<D, P, O, C>
where
    D: Database,
    P: ProductsRepository<D::Tx>,
    O: OrdersRepository<D::Tx>,
    C: CartRepository<D::Tx>,
{
    #[instrument(skip(self, order), fields(items = order.items.len()))]
    async fn create_order(&self, user: UserId, order: PlaceOrder) -> Result<OrderId, ServiceError> {
        if let Err(e) = validate_order(&order) {
            warn!(error = %e, "order rejected");
            return Err(e);
        }

        let mut tx = self.db.begin().await?;
        let result = self.insert_order(&mut tx, user, &order).await;
        let order_id = finish(&self.db, tx, result).await?;

        info!(order_id, "order created");
        Ok(order_id)
    }

    #[instrument(skip(self))]
    async fn list_user_orders(&self, user: UserId) -> Result<Vec<PricedOrder>, ServiceError> {
        let mut tx = self.db.begin().await?;
        let result = match self.orders_repo.find_by_user(&mut tx, user).await {
            Ok(orders) => self.price_orders(&mut tx, orders).await,
            Err(e) => Err(e.into()),
        };
        finish(&self.db, tx, result).await
    }

    #[instrument(skip(self))]
    async fn get_order(&self, caller: Caller, id: OrderId) -> Result<PricedOrder, ServiceError> {
        let mut tx = self.db.begin().await?;
        let result = self.load_order(&mut tx, caller, id).await;
        finish(&self.db, tx, result).await
    }

    #[instrument(skip(self))]
    async fn list_all_orders(&self, caller: Caller) -> Result<Vec<PricedOrder>, ServiceError> {
        caller.require_admin()?;
        let mut tx = self.db.begin().await?;
        let result = match self.orders_repo.find_all(&mut tx).await {
            Ok(orders) => self.price_orders(&mut tx, orders).await,
            Err(e) => Err(e.into()),
        };
        finish(&self.db, tx, result).await
    }

    #[instrument(skip(self, update), fields(status = %update.status))]
    async fn update_status(
        &self,
        caller: Caller,
        id: OrderId,
        update: StatusUpdate,
    ) -> Result<PricedOrder, ServiceError> {
        caller.require_admin()?;
        let mut tx = self.db.begin().await?;
        let result = self.apply_status(&mut tx, caller, id, update).await;
        let order = finish(&self.db, tx, result).await?;

        info!(order_id = id, status = %order.status, "order status updated");
        Ok(order)
    }

    #[instrument(skip(self))]
    async fn delete_order(&self, caller: Caller, id: OrderId) -> Result<(), ServiceError> {
        let mut tx = self.db.begin().await?;
        let result = self.remove_order(&mut tx, caller, id).await;
        finish(&self.db, tx, result).await?;

        info!(order_id = id, "order deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::OrderLine;
    use rust_decimal_macros::dec;

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            full_name: "Asha Rao".into(),
            email: "asha@example.com".into(),
            phone: "9800000000".into(),
            address_street: "12 MG Road".into(),
            city: "Pune".into(),
            state: "MH".into(),
            zip_code: "411001".into(),
            country: "India".into(),
        }
    }

    #[test]
    fn test_validate_order_collects_all_problems() {
        let order = PlaceOrder {
            items: vec![OrderLine {
                product_id: 1,
                quantity: 0,
                selected_size: None,
            }],
            shipping: ShippingInfo {
                email: String::new(),
                ..shipping()
            },
            payment_mode: " ".into(),
            shipping_charge: Some(dec!(-1)),
        };
        let Err(ServiceError::Validation(errors)) = validate_order(&order) else {
            panic!("expected validation error");
        };
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            ["email", "paymentMode", "items[0].quantity", "shippingCharge"]
        );
    }

    #[test]
    fn test_validate_order_requires_items() {
        let order = PlaceOrder {
            items: vec![],
            shipping: shipping(),
            payment_mode: "cod".into(),
            shipping_charge: None,
        };
        assert!(matches!(
            validate_order(&order),
            Err(ServiceError::Validation(e)) if e[0].field == "items"
        ));
    }

    #[test]
    fn test_priced_order_falls_back_for_deleted_products() {
        let order = Order {
            id: 1,
            user_id: 1,
            shipping: shipping(),
            payment_mode: "cod".into(),
            status: OrderStatus::Pending,
            tracking_number: None,
            tracking_url: None,
            rejection_reason: None,
            shipping_charge: dec!(50),
            created_at: Utc::now(),
            items: vec![OrderItem {
                id: 1,
                order_id: 1,
                product_id: 77,
                quantity: 2,
                price_at_purchase: dec!(100),
                selected_size: None,
            }],
        };
        let priced = PricedOrder::new(order, &HashMap::new());
        assert_eq!(priced.items[0].product_name, None);
        assert_eq!(priced.items[0].pricing.tax_amount, dec!(0));
        assert_eq!(priced.totals.subtotal_before_gst, dec!(200));
        assert_eq!(priced.totals.grand_total, dec!(250));
    }
}
