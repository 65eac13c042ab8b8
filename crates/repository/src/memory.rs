//! In-memory implementation of every repository trait.
//!
//! A transaction works on a private copy of all tables; commit swaps the copy
//! in, rollback or drop discards it. Foreign keys of the SQL schema are
//! checked on delete, so a cascade that removes a parent before its children
//! fails the same way it would against PostgreSQL.
//!
//! Failures can be injected per operation (and optionally per id) with
//! [`MemoryStore::fail`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use model::{
    CartItem, CartItemId, Category, CategoryId, ImageId, NewCartItem, NewOrder, NewOrderItem,
    Order, OrderId, OrderItem, OrderItemId, OrderStatus, Product, ProductId, ProductImage,
    SizeVariant, SizeVariantId, SpecKey, SpecKeyId, Specification, SpecificationId, StatusUpdate,
    Subcategory, SubcategoryId, UserId,
};

use crate::{
    CartRepository, CatalogRepository, Database, OrdersRepository, ProductsRepository,
    RepositoryError,
};

/// All rows of the store. Products and orders are kept without their
/// variants and items, which live in their own tables.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub categories: BTreeMap<CategoryId, Category>,
    pub subcategories: BTreeMap<SubcategoryId, Subcategory>,
    pub spec_keys: BTreeMap<SpecKeyId, SpecKey>,
    pub products: BTreeMap<ProductId, Product>,
    pub size_variants: BTreeMap<SizeVariantId, SizeVariant>,
    pub images: BTreeMap<ImageId, ProductImage>,
    pub specifications: BTreeMap<SpecificationId, Specification>,
    pub cart_items: BTreeMap<CartItemId, CartItem>,
    pub orders: BTreeMap<OrderId, Order>,
    pub order_items: BTreeMap<OrderItemId, OrderItem>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn product_with_variants(&self, id: ProductId) -> Option<Product> {
        let mut product = self.products.get(&id)?.clone();
        product.variants = self
            .size_variants
            .values()
            .filter(|v| v.product_id == id)
            .cloned()
            .collect();
        product
            .variants
            .sort_by_key(|v| (v.display_order, v.id));
        Some(product)
    }

    fn order_with_items(&self, order: &Order) -> Order {
        let mut order = order.clone();
        order.items = self
            .order_items
            .values()
            .filter(|i| i.order_id == order.id)
            .cloned()
            .collect();
        order
    }

    fn orders_newest_first<'a>(&self, orders: impl Iterator<Item = &'a Order>) -> Vec<Order> {
        let mut out: Vec<Order> = orders.map(|o| self.order_with_items(o)).collect();
        out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        out
    }

    fn delete_where<K: Ord + Copy, V>(
        table: &mut BTreeMap<K, V>,
        mut pred: impl FnMut(&V) -> bool,
    ) -> u64 {
        let before = table.len();
        table.retain(|_, v| !pred(v));
        (before - table.len()) as u64
    }
}

/// An injected failure: operation name plus, optionally, the id it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    op: &'static str,
    id: Option<i64>,
}

impl Fault {
    /// Fails every call of `op`, e.g. `"insert_items"` or `"commit"`.
    pub fn on(op: &'static str) -> Self {
        Self { op, id: None }
    }

    /// Restricts the fault to calls for one id.
    pub fn for_id(self, id: i64) -> Self {
        Self { id: Some(id), ..self }
    }

    fn matches(&self, op: &str, id: Option<i64>) -> bool {
        self.op == op && (self.id.is_none() || self.id == id)
    }
}

type Faults = Arc<Mutex<Vec<Fault>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn check(faults: &Faults, op: &str, id: Option<i64>) -> Result<(), RepositoryError> {
    if lock(faults).iter().any(|f| f.matches(op, id)) {
        return Err(RepositoryError::Storage(format!("injected failure in {op}")));
    }
    Ok(())
}

fn fk_violation(table: &str, id: i64, child: &str) -> RepositoryError {
    RepositoryError::Storage(format!(
        "{table} {id} is still referenced from {child}"
    ))
}

/// Shared in-memory database. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Tables>>,
    faults: Faults,
}

/// Transaction over a private copy of the tables.
#[derive(Debug)]
pub struct MemoryTx {
    tables: Tables,
    faults: Faults,
}

impl MemoryTx {
    fn check(&self, op: &str, id: Option<i64>) -> Result<(), RepositoryError> {
        check(&self.faults, op, id)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Injects a failure that stays active until [`MemoryStore::clear_faults`].
    pub fn fail(&self, fault: Fault) {
        lock(&self.faults).push(fault);
    }

    pub fn clear_faults(&self) {
        lock(&self.faults).clear();
    }

    /// Copy of the committed tables.
    pub fn snapshot(&self) -> Tables {
        lock(&self.inner).clone()
    }

    fn seed<T>(&self, f: impl FnOnce(&mut Tables, i64) -> T) -> T {
        let mut tables = lock(&self.inner);
        let id = tables.next_id();
        f(&mut tables, id)
    }

    pub fn insert_category(&self, name: &str) -> CategoryId {
        self.seed(|t, id| {
            t.categories.insert(id, Category { id, name: name.into() });
            id
        })
    }

    pub fn insert_subcategory(&self, category_id: CategoryId, name: &str) -> SubcategoryId {
        self.seed(|t, id| {
            t.subcategories.insert(
                id,
                Subcategory {
                    id,
                    category_id,
                    name: name.into(),
                },
            );
            id
        })
    }

    pub fn insert_spec_key(
        &self,
        name: &str,
        category_id: Option<CategoryId>,
        subcategory_id: Option<SubcategoryId>,
    ) -> SpecKeyId {
        self.seed(|t, id| {
            t.spec_keys.insert(
                id,
                SpecKey {
                    id,
                    name: name.into(),
                    category_id,
                    subcategory_id,
                },
            );
            id
        })
    }

    /// Stores the product under a fresh id, splitting off its variants.
    /// Returns the product as stored, variants included.
    pub fn insert_product(&self, mut product: Product) -> Product {
        let variants = std::mem::take(&mut product.variants);
        let mut tables = lock(&self.inner);
        let id = tables.next_id();
        product.id = id;
        for mut v in variants {
            v.id = tables.next_id();
            v.product_id = id;
            tables.size_variants.insert(v.id, v);
        }
        tables.products.insert(id, product.clone());
        tables.product_with_variants(id).unwrap_or(product)
    }

    /// Edits a stored product row in place, as a catalog admin would.
    /// Returns false when there is no such product.
    pub fn update_product(&self, id: ProductId, edit: impl FnOnce(&mut Product)) -> bool {
        match lock(&self.inner).products.get_mut(&id) {
            Some(product) => {
                edit(product);
                true
            }
            None => false,
        }
    }

    pub fn insert_image(&self, product_id: ProductId, url: &str) -> ImageId {
        self.seed(|t, id| {
            t.images.insert(
                id,
                ProductImage {
                    id,
                    product_id,
                    url: url.into(),
                },
            );
            id
        })
    }

    pub fn insert_specification(
        &self,
        product_id: ProductId,
        spec_key_id: Option<SpecKeyId>,
        value: &str,
    ) -> SpecificationId {
        self.seed(|t, id| {
            t.specifications.insert(
                id,
                Specification {
                    id,
                    product_id,
                    spec_key_id,
                    value: value.into(),
                },
            );
            id
        })
    }
}

#[async_trait]
impl Database for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, RepositoryError> {
        check(&self.faults, "begin", None)?;
        Ok(MemoryTx {
            tables: self.snapshot(),
            faults: self.faults.clone(),
        })
    }

    async fn commit(&self, tx: MemoryTx) -> Result<(), RepositoryError> {
        check(&self.faults, "commit", None)?;
        *lock(&self.inner) = tx.tables;
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTx) -> Result<(), RepositoryError> {
        check(&self.faults, "rollback", None)?;
        drop(tx);
        Ok(())
    }
}

#[async_trait]
impl ProductsRepository<MemoryTx> for MemoryStore {
    async fn find_by_ids(
        &self,
        tx: &mut MemoryTx,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        tx.check("find_products", None)?;
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids
            .into_iter()
            .filter_map(|id| tx.tables.product_with_variants(id))
            .collect())
    }

    async fn ids_in_subcategory(
        &self,
        tx: &mut MemoryTx,
        subcategory: SubcategoryId,
    ) -> Result<Vec<ProductId>, RepositoryError> {
        tx.check("ids_in_subcategory", Some(subcategory))?;
        Ok(tx
            .tables
            .products
            .values()
            .filter(|p| p.subcategory_id == Some(subcategory))
            .map(|p| p.id)
            .collect())
    }

    async fn ids_directly_in_category(
        &self,
        tx: &mut MemoryTx,
        category: CategoryId,
    ) -> Result<Vec<ProductId>, RepositoryError> {
        tx.check("ids_directly_in_category", Some(category))?;
        Ok(tx
            .tables
            .products
            .values()
            .filter(|p| p.category_id == category && p.subcategory_id.is_none())
            .map(|p| p.id)
            .collect())
    }
}

#[async_trait]
impl OrdersRepository<MemoryTx> for MemoryStore {
    async fn insert_header(&self, tx: &mut MemoryTx, order: &NewOrder) -> Result<OrderId, RepositoryError> {
        tx.check("insert_order_header", None)?;
        let id = tx.tables.next_id();
        tx.tables.orders.insert(
            id,
            Order {
                id,
                user_id: order.user_id,
                shipping: order.shipping.clone(),
                payment_mode: order.payment_mode.clone(),
                status: OrderStatus::Pending,
                tracking_number: None,
                tracking_url: None,
                rejection_reason: None,
                shipping_charge: order.shipping_charge,
                created_at: Utc::now(),
                items: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn insert_items(
        &self,
        tx: &mut MemoryTx,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<(), RepositoryError> {
        tx.check("insert_order_items", Some(order_id))?;
        if !tx.tables.orders.contains_key(&order_id) {
            return Err(RepositoryError::Storage(format!("order {order_id} does not exist")));
        }
        for it in items {
            let id = tx.tables.next_id();
            tx.tables.order_items.insert(
                id,
                OrderItem {
                    id,
                    order_id,
                    product_id: it.product_id,
                    quantity: it.quantity,
                    price_at_purchase: it.price_at_purchase,
                    selected_size: it.selected_size.clone(),
                },
            );
        }
        Ok(())
    }

    async fn find_by_id(&self, tx: &mut MemoryTx, id: OrderId) -> Result<Order, RepositoryError> {
        tx.check("find_order", Some(id))?;
        let order = tx.tables.orders.get(&id).ok_or(RepositoryError::NotFound)?;
        Ok(tx.tables.order_with_items(order))
    }

    async fn find_by_user(&self, tx: &mut MemoryTx, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        tx.check("find_orders_by_user", Some(user))?;
        let t = &tx.tables;
        Ok(t.orders_newest_first(t.orders.values().filter(|o| o.user_id == user)))
    }

    async fn find_all(&self, tx: &mut MemoryTx) -> Result<Vec<Order>, RepositoryError> {
        tx.check("find_all_orders", None)?;
        let t = &tx.tables;
        Ok(t.orders_newest_first(t.orders.values()))
    }

    async fn status_for_update(&self, tx: &mut MemoryTx, id: OrderId) -> Result<OrderStatus, RepositoryError> {
        tx.check("status_for_update", Some(id))?;
        tx.tables
            .orders
            .get(&id)
            .map(|o| o.status)
            .ok_or(RepositoryError::NotFound)
    }

    async fn update_status(
        &self,
        tx: &mut MemoryTx,
        id: OrderId,
        update: &StatusUpdate,
    ) -> Result<u64, RepositoryError> {
        tx.check("update_status", Some(id))?;
        let Some(order) = tx.tables.orders.get_mut(&id) else {
            return Ok(0);
        };
        order.status = update.status;
        if let Some(v) = &update.tracking_number {
            order.tracking_number = Some(v.clone());
        }
        if let Some(v) = &update.tracking_url {
            order.tracking_url = Some(v.clone());
        }
        if let Some(v) = &update.rejection_reason {
            order.rejection_reason = Some(v.clone());
        }
        Ok(1)
    }

    async fn delete_cascade(&self, tx: &mut MemoryTx, id: OrderId) -> Result<u64, RepositoryError> {
        tx.check("delete_order", Some(id))?;
        Tables::delete_where(&mut tx.tables.order_items, |i| i.order_id == id);
        Ok(tx.tables.orders.remove(&id).map_or(0, |_| 1))
    }
}

#[async_trait]
impl CatalogRepository<MemoryTx> for MemoryStore {
    async fn delete_product_images(&self, tx: &mut MemoryTx, product: ProductId) -> Result<u64, RepositoryError> {
        tx.check("delete_product_images", Some(product))?;
        Ok(Tables::delete_where(&mut tx.tables.images, |i| i.product_id == product))
    }

    async fn delete_product_specifications(
        &self,
        tx: &mut MemoryTx,
        product: ProductId,
    ) -> Result<u64, RepositoryError> {
        tx.check("delete_product_specifications", Some(product))?;
        Ok(Tables::delete_where(&mut tx.tables.specifications, |s| {
            s.product_id == product
        }))
    }

    async fn delete_size_variants(&self, tx: &mut MemoryTx, product: ProductId) -> Result<u64, RepositoryError> {
        tx.check("delete_size_variants", Some(product))?;
        Ok(Tables::delete_where(&mut tx.tables.size_variants, |v| {
            v.product_id == product
        }))
    }

    async fn delete_product(&self, tx: &mut MemoryTx, product: ProductId) -> Result<u64, RepositoryError> {
        tx.check("delete_product", Some(product))?;
        let t = &tx.tables;
        if t.images.values().any(|i| i.product_id == product) {
            return Err(fk_violation("product", product, "product_images"));
        }
        if t.specifications.values().any(|s| s.product_id == product) {
            return Err(fk_violation("product", product, "product_specifications"));
        }
        if t.size_variants.values().any(|v| v.product_id == product) {
            return Err(fk_violation("product", product, "size_variants"));
        }
        if t.cart_items.values().any(|c| c.product_id == product) {
            return Err(fk_violation("product", product, "cart_items"));
        }
        Ok(tx.tables.products.remove(&product).map_or(0, |_| 1))
    }

    async fn subcategory_ids(
        &self,
        tx: &mut MemoryTx,
        category: CategoryId,
    ) -> Result<Vec<SubcategoryId>, RepositoryError> {
        tx.check("subcategory_ids", Some(category))?;
        Ok(tx
            .tables
            .subcategories
            .values()
            .filter(|s| s.category_id == category)
            .map(|s| s.id)
            .collect())
    }

    async fn delete_subcategory_spec_keys(
        &self,
        tx: &mut MemoryTx,
        subcategory: SubcategoryId,
    ) -> Result<u64, RepositoryError> {
        tx.check("delete_subcategory_spec_keys", Some(subcategory))?;
        let t = &mut tx.tables;
        let keys: Vec<SpecKeyId> = t
            .spec_keys
            .values()
            .filter(|k| k.subcategory_id == Some(subcategory))
            .map(|k| k.id)
            .collect();
        if let Some(spec) = t
            .specifications
            .values()
            .find(|s| s.spec_key_id.is_some_and(|k| keys.contains(&k)))
        {
            return Err(fk_violation("spec_key", spec.spec_key_id.unwrap_or_default(), "product_specifications"));
        }
        Ok(Tables::delete_where(&mut t.spec_keys, |k| {
            k.subcategory_id == Some(subcategory)
        }))
    }

    async fn delete_category_spec_keys(
        &self,
        tx: &mut MemoryTx,
        category: CategoryId,
    ) -> Result<u64, RepositoryError> {
        tx.check("delete_category_spec_keys", Some(category))?;
        let t = &mut tx.tables;
        let keys: Vec<SpecKeyId> = t
            .spec_keys
            .values()
            .filter(|k| k.category_id == Some(category))
            .map(|k| k.id)
            .collect();
        if let Some(spec) = t
            .specifications
            .values()
            .find(|s| s.spec_key_id.is_some_and(|k| keys.contains(&k)))
        {
            return Err(fk_violation("spec_key", spec.spec_key_id.unwrap_or_default(), "product_specifications"));
        }
        Ok(Tables::delete_where(&mut t.spec_keys, |k| {
            k.category_id == Some(category)
        }))
    }

    async fn delete_subcategory(
        &self,
        tx: &mut MemoryTx,
        subcategory: SubcategoryId,
    ) -> Result<u64, RepositoryError> {
        tx.check("delete_subcategory", Some(subcategory))?;
        let t = &tx.tables;
        if t.products.values().any(|p| p.subcategory_id == Some(subcategory)) {
            return Err(fk_violation("subcategory", subcategory, "products"));
        }
        if t.spec_keys.values().any(|k| k.subcategory_id == Some(subcategory)) {
            return Err(fk_violation("subcategory", subcategory, "spec_keys"));
        }
        Ok(tx.tables.subcategories.remove(&subcategory).map_or(0, |_| 1))
    }

    async fn delete_category(&self, tx: &mut MemoryTx, category: CategoryId) -> Result<u64, RepositoryError> {
        tx.check("delete_category", Some(category))?;
        let t = &tx.tables;
        if t.subcategories.values().any(|s| s.category_id == category) {
            return Err(fk_violation("category", category, "subcategories"));
        }
        if t.products.values().any(|p| p.category_id == category) {
            return Err(fk_violation("category", category, "products"));
        }
        if t.spec_keys.values().any(|k| k.category_id == Some(category)) {
            return Err(fk_violation("category", category, "spec_keys"));
        }
        Ok(tx.tables.categories.remove(&category).map_or(0, |_| 1))
    }
}

#[async_trait]
impl CartRepository<MemoryTx> for MemoryStore {
    async fn find_by_user(&self, tx: &mut MemoryTx, user: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        tx.check("find_cart", Some(user))?;
        Ok(tx
            .tables
            .cart_items
            .values()
            .filter(|c| c.user_id == user)
            .cloned()
            .collect())
    }

    async fn add(&self, tx: &mut MemoryTx, item: &NewCartItem) -> Result<CartItem, RepositoryError> {
        tx.check("add_cart_item", Some(item.product_id))?;
        if !tx.tables.products.contains_key(&item.product_id) {
            return Err(RepositoryError::Storage(format!(
                "product {} does not exist",
                item.product_id
            )));
        }
        let existing = tx
            .tables
            .cart_items
            .values_mut()
            .find(|c| c.user_id == item.user_id && c.is_line(item.product_id, item.size.as_deref()));
        if let Some(row) = existing {
            let id = row.id;
            row.quantity = row.quantity.checked_add(item.quantity).ok_or_else(|| {
                RepositoryError::Storage(format!("cart item {id} quantity out of range"))
            })?;
            return Ok(row.clone());
        }
        let id = tx.tables.next_id();
        let row = CartItem {
            id,
            user_id: item.user_id,
            product_id: item.product_id,
            size: item.size.clone(),
            quantity: item.quantity,
        };
        tx.tables.cart_items.insert(id, row.clone());
        Ok(row)
    }

    async fn set_quantity(
        &self,
        tx: &mut MemoryTx,
        user: UserId,
        id: CartItemId,
        quantity: i32,
    ) -> Result<u64, RepositoryError> {
        tx.check("set_cart_quantity", Some(id))?;
        match tx.tables.cart_items.get_mut(&id) {
            Some(row) if row.user_id == user => {
                row.quantity = quantity;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn delete(&self, tx: &mut MemoryTx, user: UserId, id: CartItemId) -> Result<u64, RepositoryError> {
        tx.check("delete_cart_item", Some(id))?;
        Ok(Tables::delete_where(&mut tx.tables.cart_items, |c| {
            c.id == id && c.user_id == user
        }))
    }

    async fn delete_lines(
        &self,
        tx: &mut MemoryTx,
        user: UserId,
        lines: &[(ProductId, Option<String>)],
    ) -> Result<u64, RepositoryError> {
        tx.check("delete_cart_lines", Some(user))?;
        Ok(Tables::delete_where(&mut tx.tables.cart_items, |c| {
            c.user_id == user
                && lines
                    .iter()
                    .any(|(product, size)| c.is_line(*product, size.as_deref()))
        }))
    }

    async fn delete_for_product(&self, tx: &mut MemoryTx, product: ProductId) -> Result<u64, RepositoryError> {
        tx.check("delete_cart_for_product", Some(product))?;
        Ok(Tables::delete_where(&mut tx.tables.cart_items, |c| {
            c.product_id == product
        }))
    }
}
