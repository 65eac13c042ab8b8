//! PostgreSQL implementations of the repository traits.
//!
//! Repositories are stateless; all SQL runs on the connection owned by the
//! [`PgTx`] handed in by the caller.

use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use model::{
    CartItem, CartItemId, CategoryId, GstMode, NewCartItem, NewOrder, NewOrderItem, Order,
    OrderId, OrderItem, OrderStatus, PriceModifier, Product, ProductId, ShippingInfo, SizeVariant,
    StatusUpdate, SubcategoryId, UserId,
};
use rust_decimal::Decimal;
use tokio_postgres::Row;
use tracing::warn;

use crate::{
    CartRepository, CatalogRepository, Database, OrdersRepository, ProductsRepository,
    RepositoryError,
};

/// Pooled PostgreSQL database.
#[derive(Clone)]
pub struct PgDatabase {
    pool: Pool,
}

impl PgDatabase {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

/// An open transaction on a pooled connection.
///
/// If dropped before [`Database::commit`] or [`Database::rollback`], the
/// connection is detached from the pool and closed, which makes the server
/// discard the transaction.
pub struct PgTx {
    conn: Option<Object>,
}

impl PgTx {
    fn client(&self) -> Result<&Object, RepositoryError> {
        self.conn.as_ref().ok_or(RepositoryError::TransactionClosed)
    }

    async fn finish(mut self, statement: &str) -> Result<(), RepositoryError> {
        let conn = self.conn.take().ok_or(RepositoryError::TransactionClosed)?;
        match conn.batch_execute(statement).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // State of the session is unknown; never hand it back to the pool.
                drop(Object::take(conn));
                Err(e.into())
            }
        }
    }
}

impl Drop for PgTx {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!("transaction dropped without commit or rollback; closing connection");
            drop(Object::take(conn));
        }
    }
}

#[async_trait]
impl Database for PgDatabase {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, RepositoryError> {
        let conn = self.pool.get().await?;
        conn.batch_execute("BEGIN").await?;
        Ok(PgTx { conn: Some(conn) })
    }

    async fn commit(&self, tx: PgTx) -> Result<(), RepositoryError> {
        tx.finish("COMMIT").await
    }

    async fn rollback(&self, tx: PgTx) -> Result<(), RepositoryError> {
        tx.finish("ROLLBACK").await
    }
}

/// PostgreSQL implementation of the ProductsRepository trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgProductsRepository;

impl PgProductsRepository {
    pub fn new() -> Self {
        Self
    }
}

fn product_from_row(row: &Row) -> Result<Product, RepositoryError> {
    Ok(Product {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        category_id: row.try_get("category_id")?,
        subcategory_id: row.try_get("subcategory_id")?,
        price: row.try_get("price")?,
        mrp: row.try_get("mrp")?,
        gst_rate: row
            .try_get::<_, Option<Decimal>>("gst_rate")?
            .unwrap_or(Decimal::ZERO),
        gst_mode: GstMode::parse_lenient(row.try_get::<_, Option<&str>>("gst_mode")?),
        legacy_sizes: row.try_get("sizes")?,
        variants: Vec::new(),
    })
}

fn variant_from_row(row: &Row) -> Result<SizeVariant, RepositoryError> {
    Ok(SizeVariant {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        size: row.try_get("size")?,
        available: row.try_get("available")?,
        display_order: row.try_get("display_order")?,
        modifier: PriceModifier::from_parts(
            row.try_get::<_, Option<&str>>("price_mode")?,
            row.try_get("price")?,
            row.try_get("mrp")?,
            row.try_get("percentage")?,
        ),
    })
}

#[async_trait]
impl ProductsRepository<PgTx> for PgProductsRepository {
    async fn find_by_ids(
        &self,
        tx: &mut PgTx,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let client = tx.client()?;

        let query = r#"
            SELECT id, name, category_id, subcategory_id, price, mrp, gst_rate, gst_mode, sizes
            FROM products WHERE id = ANY($1)
            ORDER BY id
        "#;
        let mut products = client
            .query(query, &[&ids])
            .await?
            .iter()
            .map(product_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let query = r#"
            SELECT id, product_id, size, available, display_order, price_mode, price, mrp, percentage
            FROM size_variants WHERE product_id = ANY($1)
            ORDER BY product_id, display_order, id
        "#;
        let mut variants: HashMap<ProductId, Vec<SizeVariant>> = HashMap::new();
        for row in client.query(query, &[&ids]).await? {
            let variant = variant_from_row(&row)?;
            variants.entry(variant.product_id).or_default().push(variant);
        }

        for product in &mut products {
            product.variants = variants.remove(&product.id).unwrap_or_default();
        }
        Ok(products)
    }

    async fn ids_in_subcategory(
        &self,
        tx: &mut PgTx,
        subcategory: SubcategoryId,
    ) -> Result<Vec<ProductId>, RepositoryError> {
        let query = "SELECT id FROM products WHERE subcategory_id = $1 ORDER BY id";
        let rows = tx.client()?.query(query, &[&subcategory]).await?;
        rows.iter().map(|r| Ok(r.try_get("id")?)).collect()
    }

    async fn ids_directly_in_category(
        &self,
        tx: &mut PgTx,
        category: CategoryId,
    ) -> Result<Vec<ProductId>, RepositoryError> {
        let query =
            "SELECT id FROM products WHERE category_id = $1 AND subcategory_id IS NULL ORDER BY id";
        let rows = tx.client()?.query(query, &[&category]).await?;
        rows.iter().map(|r| Ok(r.try_get("id")?)).collect()
    }
}

/// PostgreSQL implementation of the OrdersRepository trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgOrdersRepository;

impl PgOrdersRepository {
    pub fn new() -> Self {
        Self
    }
}

const ORDER_COLUMNS: &str = "id, user_id, full_name, email, phone, address_street, city, state, \
     zip_code, country, payment_mode, status, tracking_number, tracking_url, rejection_reason, \
     shipping_charge, created_at";

fn parse_status(raw: &str) -> Result<OrderStatus, RepositoryError> {
    raw.parse()
        .map_err(|e| RepositoryError::InvalidData(format!("order status: {e}")))
}

fn order_from_row(row: &Row) -> Result<Order, RepositoryError> {
    Ok(Order {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        shipping: ShippingInfo {
            full_name: row.try_get("full_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            address_street: row.try_get("address_street")?,
            city: row.try_get("city")?,
            state: row.try_get("state")?,
            zip_code: row.try_get("zip_code")?,
            country: row.try_get("country")?,
        },
        payment_mode: row.try_get("payment_mode")?,
        status: parse_status(row.try_get("status")?)?,
        tracking_number: row.try_get("tracking_number")?,
        tracking_url: row.try_get("tracking_url")?,
        rejection_reason: row.try_get("rejection_reason")?,
        shipping_charge: row.try_get("shipping_charge")?,
        created_at: row.try_get("created_at")?,
        items: Vec::new(),
    })
}

fn order_item_from_row(row: &Row) -> Result<OrderItem, RepositoryError> {
    Ok(OrderItem {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        product_id: row.try_get("product_id")?,
        quantity: row.try_get("quantity")?,
        price_at_purchase: row.try_get("price_at_purchase")?,
        selected_size: row.try_get("selected_size")?,
    })
}

/// Loads the items of every order in `orders` with one query.
async fn attach_items(tx: &PgTx, orders: &mut [Order]) -> Result<(), RepositoryError> {
    if orders.is_empty() {
        return Ok(());
    }
    let ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();
    let query = r#"
        SELECT id, order_id, product_id, quantity, price_at_purchase, selected_size
        FROM order_items WHERE order_id = ANY($1)
        ORDER BY order_id, id
    "#;
    let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for row in tx.client()?.query(query, &[&ids]).await? {
        let item = order_item_from_row(&row)?;
        items.entry(item.order_id).or_default().push(item);
    }
    for order in orders {
        order.items = items.remove(&order.id).unwrap_or_default();
    }
    Ok(())
}

#[async_trait]
impl OrdersRepository<PgTx> for PgOrdersRepository {
    async fn insert_header(&self, tx: &mut PgTx, order: &NewOrder) -> Result<OrderId, RepositoryError> {
        let query = r#"
            INSERT INTO orders (user_id, full_name, email, phone, address_street, city, state,
                                zip_code, country, payment_mode, status, shipping_charge)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending', $11)
            RETURNING id
        "#;
        let s = &order.shipping;
        let row = tx
            .client()?
            .query_one(
                query,
                &[
                    &order.user_id,
                    &s.full_name,
                    &s.email,
                    &s.phone,
                    &s.address_street,
                    &s.city,
                    &s.state,
                    &s.zip_code,
                    &s.country,
                    &order.payment_mode,
                    &order.shipping_charge,
                ],
            )
            .await?;
        Ok(row.try_get("id")?)
    }

    async fn insert_items(
        &self,
        tx: &mut PgTx,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<(), RepositoryError> {
        let query = r#"
            INSERT INTO order_items (order_id, product_id, quantity, price_at_purchase, selected_size)
            VALUES ($1, $2, $3, $4, $5)
        "#;
        let client = tx.client()?;
        let stmt = client.prepare(query).await?;
        for it in items {
            client
                .execute(
                    &stmt,
                    &[
                        &order_id,
                        &it.product_id,
                        &it.quantity,
                        &it.price_at_purchase,
                        &it.selected_size,
                    ],
                )
                .await?;
        }
        Ok(())
    }

    async fn find_by_id(&self, tx: &mut PgTx, id: OrderId) -> Result<Order, RepositoryError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = tx
            .client()?
            .query_opt(&query, &[&id])
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let mut orders = [order_from_row(&row)?];
        attach_items(tx, &mut orders).await?;
        let [order] = orders;
        Ok(order)
    }

    async fn find_by_user(&self, tx: &mut PgTx, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        let mut orders = tx
            .client()?
            .query(&query, &[&user])
            .await?
            .iter()
            .map(order_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        attach_items(tx, &mut orders).await?;
        Ok(orders)
    }

    async fn find_all(&self, tx: &mut PgTx) -> Result<Vec<Order>, RepositoryError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC");
        let mut orders = tx
            .client()?
            .query(&query, &[])
            .await?
            .iter()
            .map(order_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        attach_items(tx, &mut orders).await?;
        Ok(orders)
    }

    async fn status_for_update(&self, tx: &mut PgTx, id: OrderId) -> Result<OrderStatus, RepositoryError> {
        let row = tx
            .client()?
            .query_opt("SELECT status FROM orders WHERE id = $1 FOR UPDATE", &[&id])
            .await?
            .ok_or(RepositoryError::NotFound)?;
        parse_status(row.try_get("status")?)
    }

    async fn update_status(
        &self,
        tx: &mut PgTx,
        id: OrderId,
        update: &StatusUpdate,
    ) -> Result<u64, RepositoryError> {
        let query = r#"
            UPDATE orders
            SET status = $2,
                tracking_number = COALESCE($3, tracking_number),
                tracking_url = COALESCE($4, tracking_url),
                rejection_reason = COALESCE($5, rejection_reason)
            WHERE id = $1
        "#;
        let n = tx
            .client()?
            .execute(
                query,
                &[
                    &id,
                    &update.status.as_str(),
                    &update.tracking_number,
                    &update.tracking_url,
                    &update.rejection_reason,
                ],
            )
            .await?;
        Ok(n)
    }

    async fn delete_cascade(&self, tx: &mut PgTx, id: OrderId) -> Result<u64, RepositoryError> {
        let client = tx.client()?;
        client
            .execute("DELETE FROM order_items WHERE order_id = $1", &[&id])
            .await?;
        Ok(client.execute("DELETE FROM orders WHERE id = $1", &[&id]).await?)
    }
}

/// PostgreSQL implementation of the CatalogRepository trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgCatalogRepository;

impl PgCatalogRepository {
    pub fn new() -> Self {
        Self
    }
}

async fn delete_by(tx: &PgTx, query: &str, id: i64) -> Result<u64, RepositoryError> {
    Ok(tx.client()?.execute(query, &[&id]).await?)
}

#[async_trait]
impl CatalogRepository<PgTx> for PgCatalogRepository {
    async fn delete_product_images(&self, tx: &mut PgTx, product: ProductId) -> Result<u64, RepositoryError> {
        delete_by(tx, "DELETE FROM product_images WHERE product_id = $1", product).await
    }

    async fn delete_product_specifications(
        &self,
        tx: &mut PgTx,
        product: ProductId,
    ) -> Result<u64, RepositoryError> {
        delete_by(tx, "DELETE FROM product_specifications WHERE product_id = $1", product).await
    }

    async fn delete_size_variants(&self, tx: &mut PgTx, product: ProductId) -> Result<u64, RepositoryError> {
        delete_by(tx, "DELETE FROM size_variants WHERE product_id = $1", product).await
    }

    async fn delete_product(&self, tx: &mut PgTx, product: ProductId) -> Result<u64, RepositoryError> {
        delete_by(tx, "DELETE FROM products WHERE id = $1", product).await
    }

    async fn subcategory_ids(
        &self,
        tx: &mut PgTx,
        category: CategoryId,
    ) -> Result<Vec<SubcategoryId>, RepositoryError> {
        let rows = tx
            .client()?
            .query(
                "SELECT id FROM subcategories WHERE category_id = $1 ORDER BY id",
                &[&category],
            )
            .await?;
        rows.iter().map(|r| Ok(r.try_get("id")?)).collect()
    }

    async fn delete_subcategory_spec_keys(
        &self,
        tx: &mut PgTx,
        subcategory: SubcategoryId,
    ) -> Result<u64, RepositoryError> {
        delete_by(tx, "DELETE FROM spec_keys WHERE subcategory_id = $1", subcategory).await
    }

    async fn delete_category_spec_keys(
        &self,
        tx: &mut PgTx,
        category: CategoryId,
    ) -> Result<u64, RepositoryError> {
        delete_by(tx, "DELETE FROM spec_keys WHERE category_id = $1", category).await
    }

    async fn delete_subcategory(
        &self,
        tx: &mut PgTx,
        subcategory: SubcategoryId,
    ) -> Result<u64, RepositoryError> {
        delete_by(tx, "DELETE FROM subcategories WHERE id = $1", subcategory).await
    }

    async fn delete_category(&self, tx: &mut PgTx, category: CategoryId) -> Result<u64, RepositoryError> {
        delete_by(tx, "DELETE FROM categories WHERE id = $1", category).await
    }
}

/// PostgreSQL implementation of the CartRepository trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgCartRepository;

impl PgCartRepository {
    pub fn new() -> Self {
        Self
    }
}

fn cart_item_from_row(row: &Row) -> Result<CartItem, RepositoryError> {
    Ok(CartItem {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        product_id: row.try_get("product_id")?,
        size: row.try_get("size")?,
        quantity: row.try_get("quantity")?,
    })
}

#[async_trait]
impl CartRepository<PgTx> for PgCartRepository {
    async fn find_by_user(&self, tx: &mut PgTx, user: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        let query = r#"
            SELECT id, user_id, product_id, size, quantity
            FROM cart_items WHERE user_id = $1
            ORDER BY id
        "#;
        let rows = tx.client()?.query(query, &[&user]).await?;
        rows.iter().map(cart_item_from_row).collect()
    }

    async fn add(&self, tx: &mut PgTx, item: &NewCartItem) -> Result<CartItem, RepositoryError> {
        let query = r#"
            INSERT INTO cart_items (user_id, product_id, size, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id, (COALESCE(size, '')))
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            RETURNING id, user_id, product_id, size, quantity
        "#;
        let row = tx
            .client()?
            .query_one(
                query,
                &[&item.user_id, &item.product_id, &item.size, &item.quantity],
            )
            .await?;
        cart_item_from_row(&row)
    }

    async fn set_quantity(
        &self,
        tx: &mut PgTx,
        user: UserId,
        id: CartItemId,
        quantity: i32,
    ) -> Result<u64, RepositoryError> {
        let query = "UPDATE cart_items SET quantity = $3 WHERE id = $1 AND user_id = $2";
        Ok(tx.client()?.execute(query, &[&id, &user, &quantity]).await?)
    }

    async fn delete(&self, tx: &mut PgTx, user: UserId, id: CartItemId) -> Result<u64, RepositoryError> {
        let query = "DELETE FROM cart_items WHERE id = $1 AND user_id = $2";
        Ok(tx.client()?.execute(query, &[&id, &user]).await?)
    }

    async fn delete_lines(
        &self,
        tx: &mut PgTx,
        user: UserId,
        lines: &[(ProductId, Option<String>)],
    ) -> Result<u64, RepositoryError> {
        let query = r#"
            DELETE FROM cart_items
            WHERE user_id = $1 AND product_id = $2 AND COALESCE(size, '') = COALESCE($3::TEXT, '')
        "#;
        let client = tx.client()?;
        let stmt = client.prepare(query).await?;
        let mut removed = 0;
        for (product, size) in lines {
            removed += client.execute(&stmt, &[&user, product, size]).await?;
        }
        Ok(removed)
    }

    async fn delete_for_product(&self, tx: &mut PgTx, product: ProductId) -> Result<u64, RepositoryError> {
        delete_by(tx, "DELETE FROM cart_items WHERE product_id = $1", product).await
    }
}
