use std::ops::AddAssign;

use async_trait::async_trait;
use model::{CategoryId, GstMode, ProductId, SubcategoryId};
use pricing::price_line;
use repository::{CartRepository, CatalogRepository, Database, ProductsRepository, RepositoryError};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};

use crate::{ServiceError, canonical_size, effective_variant, finish, validate_size};

/// Rows removed by a cascading delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    pub categories: u64,
    pub subcategories: u64,
    pub products: u64,
    pub images: u64,
    pub specifications: u64,
    pub size_variants: u64,
    pub spec_keys: u64,
    pub cart_items: u64,
}

impl AddAssign for CascadeReport {
    fn add_assign(&mut self, rhs: Self) {
        self.categories += rhs.categories;
        self.subcategories += rhs.subcategories;
        self.products += rhs.products;
        self.images += rhs.images;
        self.specifications += rhs.specifications;
        self.size_variants += rhs.size_variants;
        self.spec_keys += rhs.spec_keys;
        self.cart_items += rhs.cart_items;
    }
}

/// Price of one unit of a product in a given size, rounded for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub product_id: ProductId,
    pub selected_size: Option<String>,
    pub price: Decimal,
    pub mrp: Option<Decimal>,
    pub gst_rate: Decimal,
    pub gst_mode: GstMode,
    pub before_tax: Decimal,
    pub tax_amount: Decimal,
    pub final_price: Decimal,
    pub discount_percent: u32,
}

/// Catalog maintenance and single-product pricing.
///
/// Deletes remove children before parents inside one transaction and never
/// rely on database-level cascades. Any failure leaves the catalog untouched.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Removes the category, every subcategory under it, every product
    /// under those or directly under the category, and the spec keys scoped
    /// to any of them.
    async fn delete_category(&self, id: CategoryId) -> Result<CascadeReport, ServiceError>;

    /// Removes the subcategory, its products and its spec keys.
    async fn delete_subcategory(&self, id: SubcategoryId) -> Result<CascadeReport, ServiceError>;

    /// Removes images, specifications, size variants and cart rows of the
    /// product, then the product.
    async fn delete_product(&self, id: ProductId) -> Result<CascadeReport, ServiceError>;

    async fn quote_product(
        &self,
        id: ProductId,
        size: Option<String>,
    ) -> Result<PriceQuote, ServiceError>;
}

pub struct CatalogServiceImpl<D, P, K, C> {
    db: D,
    products_repo: P,
    catalog_repo: K,
    cart_repo: C,
}

impl<D, P, K, C> CatalogServiceImpl<D, P, K, C>
where
    D: Database,
    P: ProductsRepository<D::Tx>,
    K: CatalogRepository<D::Tx>,
    C: CartRepository<D::Tx>,
{
    pub fn new(db: D, products_repo: P, catalog_repo: K, cart_repo: C) -> Self {
        Self {
            db,
            products_repo,
            catalog_repo,
            cart_repo,
        }
    }

    async fn remove_product(&self, tx: &mut D::Tx, id: ProductId) -> Result<CascadeReport, ServiceError> {
        let mut report = CascadeReport {
            images: self.catalog_repo.delete_product_images(tx, id).await?,
            specifications: self.catalog_repo.delete_product_specifications(tx, id).await?,
            size_variants: self.catalog_repo.delete_size_variants(tx, id).await?,
            cart_items: self.cart_repo.delete_for_product(tx, id).await?,
            ..Default::default()
        };
        report.products = self.catalog_repo.delete_product(tx, id).await?;
        if report.products == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(report)
    }

    async fn remove_subcategory(
        &self,
        tx: &mut D::Tx,
        id: SubcategoryId,
    ) -> Result<CascadeReport, ServiceError> {
        let mut report = CascadeReport::default();
        for product in self.products_repo.ids_in_subcategory(tx, id).await? {
            report += self.remove_product(tx, product).await?;
        }
        report.spec_keys += self.catalog_repo.delete_subcategory_spec_keys(tx, id).await?;
        report.subcategories = self.catalog_repo.delete_subcategory(tx, id).await?;
        if report.subcategories == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(report)
    }

    async fn remove_category(&self, tx: &mut D::Tx, id: CategoryId) -> Result<CascadeReport, ServiceError> {
        let mut report = CascadeReport::default();
        for subcategory in self.catalog_repo.subcategory_ids(tx, id).await? {
            report += self.remove_subcategory(tx, subcategory).await?;
        }
        for product in self.products_repo.ids_directly_in_category(tx, id).await? {
            report += self.remove_product(tx, product).await?;
        }
        report.spec_keys += self.catalog_repo.delete_category_spec_keys(tx, id).await?;
        report.categories = self.catalog_repo.delete_category(tx, id).await?;
        if report.categories == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(report)
    }

    async fn quote(
        &self,
        tx: &mut D::Tx,
        id: ProductId,
        size: Option<String>,
    ) -> Result<PriceQuote, ServiceError> {
        let product = match self.products_repo.find_by_id(tx, id).await {
            Ok(p) => p,
            Err(RepositoryError::NotFound) => {
                return Err(ServiceError::ProductNotFound(vec![id]));
            }
            Err(e) => return Err(e.into()),
        };
        let size = model::request::normalize_size(size);
        if size.is_some() {
            validate_size(&product, size.as_deref())?;
        }

        let line = price_line(&product, effective_variant(&product, size.as_deref()), 1).rounded();
        Ok(PriceQuote {
            product_id: product.id,
            selected_size: canonical_size(&product, size.as_deref()),
            price: line.unit_price,
            mrp: line.mrp,
            gst_rate: product.gst_rate,
            gst_mode: product.gst_mode,
            before_tax: line.before_tax,
            tax_amount: line.tax_amount,
            final_price: line.final_price,
            discount_percent: line.discount_percent,
        })
    }
}

#[async_trait]
impl<D, P, K, C> CatalogService for CatalogServiceImpl<D, P, K, C>
where
    D: Database,
    P: ProductsRepository<D::Tx>,
    K: CatalogRepository<D::Tx>,
    C: CartRepository<D::Tx>,
{
    #[instrument(skip(self))]
    async fn delete_category(&self, id: CategoryId) -> Result<CascadeReport, ServiceError> {
        let mut tx = self.db.begin().await?;
        let result = self.remove_category(&mut tx, id).await;
        let report = finish(&self.db, tx, result).await?;

        info!(category_id = id, ?report, "category deleted");
        Ok(report)
    }

    #[instrument(skip(self))]
    async fn delete_subcategory(&self, id: SubcategoryId) -> Result<CascadeReport, ServiceError> {
        let mut tx = self.db.begin().await?;
        let result = self.remove_subcategory(&mut tx, id).await;
        let report = finish(&self.db, tx, result).await?;

        info!(subcategory_id = id, ?report, "subcategory deleted");
        Ok(report)
    }

    #[instrument(skip(self))]
    async fn delete_product(&self, id: ProductId) -> Result<CascadeReport, ServiceError> {
        let mut tx = self.db.begin().await?;
        let result = self.remove_product(&mut tx, id).await;
        let report = finish(&self.db, tx, result).await?;

        info!(product_id = id, ?report, "product deleted");
        Ok(report)
    }

    #[instrument(skip(self))]
    async fn quote_product(
        &self,
        id: ProductId,
        size: Option<String>,
    ) -> Result<PriceQuote, ServiceError> {
        let mut tx = self.db.begin().await?;
        let result = self.quote(&mut tx, id, size).await;
        finish(&self.db, tx, result).await
    }
}
