//! Catalog entities: categories, products and their per-size variants.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type CategoryId = i64;
pub type SubcategoryId = i64;
pub type ProductId = i64;
pub type SizeVariantId = i64;
pub type ImageId = i64;
pub type SpecificationId = i64;
pub type SpecKeyId = i64;

/// GstMode says whether a quoted price already contains GST.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GstMode {
    /// Quoted price already includes the tax; tax is extracted from it.
    Inclusive,
    /// Tax is added on top of the quoted price.
    #[default]
    Exclusive,
}

impl GstMode {
    /// Parses a stored or submitted mode. Absent and unrecognized values
    /// fall back to [`GstMode::Exclusive`].
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("inclusive") => Self::Inclusive,
            _ => Self::Exclusive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inclusive => "inclusive",
            Self::Exclusive => "exclusive",
        }
    }
}

/// PriceModifier describes how a size variant changes the product's base price.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum PriceModifier {
    /// The variant sells at the product's base price.
    #[default]
    None,
    /// The variant carries its own price and MRP; absent values use the base ones.
    Fixed {
        price: Option<Decimal>,
        mrp: Option<Decimal>,
    },
    /// Base price and MRP are scaled by `value / 100` (110 means 10% above base).
    Percentage { value: Option<Decimal> },
}

impl PriceModifier {
    /// Builds a modifier from its flat storage columns.
    ///
    /// Unknown modes degrade to [`PriceModifier::None`].
    pub fn from_parts(
        mode: Option<&str>,
        price: Option<Decimal>,
        mrp: Option<Decimal>,
        percentage: Option<Decimal>,
    ) -> Self {
        match mode.map(|m| m.trim().to_ascii_lowercase()).as_deref() {
            Some("fixed") => Self::Fixed { price, mrp },
            Some("percentage" | "percent") => Self::Percentage { value: percentage },
            _ => Self::None,
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Fixed { .. } => "fixed",
            Self::Percentage { .. } => "percentage",
        }
    }
}

/// SizeVariant is a per-size override of availability and price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeVariant {
    pub id: SizeVariantId,
    pub product_id: ProductId,
    pub size: String,
    pub available: bool,
    pub display_order: i32,
    pub modifier: PriceModifier,
}

/// Product as seen by pricing and ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category_id: CategoryId,
    pub subcategory_id: Option<SubcategoryId>,
    pub price: Decimal,
    pub mrp: Option<Decimal>,
    /// GST percentage, 0 when the product has none configured.
    pub gst_rate: Decimal,
    pub gst_mode: GstMode,
    /// Comma-separated size labels from before size variants existed.
    pub legacy_sizes: Option<String>,
    /// Ordered by `display_order`.
    pub variants: Vec<SizeVariant>,
}

impl Product {
    /// Finds the variant matching the selected size label, if any.
    pub fn variant_for(&self, size: Option<&str>) -> Option<&SizeVariant> {
        let size = size.map(str::trim).filter(|s| !s.is_empty())?;
        self.variants
            .iter()
            .find(|v| v.size.trim().eq_ignore_ascii_case(size))
    }

    pub fn legacy_size_list(&self) -> Vec<&str> {
        self.legacy_sizes
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True when the product is sold in sizes at all.
    pub fn offers_sizes(&self) -> bool {
        !self.variants.is_empty() || !self.legacy_size_list().is_empty()
    }

    /// True when `size` is a label this product sells.
    pub fn offers_size(&self, size: &str) -> bool {
        let size = size.trim();
        if !self.variants.is_empty() {
            return self.variant_for(Some(size)).is_some();
        }
        self.legacy_size_list()
            .iter()
            .any(|s| s.eq_ignore_ascii_case(size))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    pub id: SubcategoryId,
    pub category_id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub id: ImageId,
    pub product_id: ProductId,
    pub url: String,
}

/// SpecKey names a specification attribute, scoped to a category or a subcategory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecKey {
    pub id: SpecKeyId,
    pub name: String,
    pub category_id: Option<CategoryId>,
    pub subcategory_id: Option<SubcategoryId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specification {
    pub id: SpecificationId,
    pub product_id: ProductId,
    pub spec_key_id: Option<SpecKeyId>,
    pub value: String,
}
