use model::{PriceModifier, SizeVariant};
use rust_decimal::Decimal;
use serde::Serialize;

/// Effective unit price and MRP after applying a size variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPrice {
    pub price: Decimal,
    pub mrp: Option<Decimal>,
}

/// Resolves the effective price of a product, optionally in a size variant.
///
/// - no variant or mode `none`: base price and MRP unchanged;
/// - `fixed`: the variant's own price and MRP, each falling back to the base one;
/// - `percentage`: base price and MRP scaled by `value / 100`.
///
/// Negative fixed prices and non-positive or missing percentages are treated
/// as absent and yield the base price.
pub fn resolve_price(
    base_price: Decimal,
    base_mrp: Option<Decimal>,
    variant: Option<&SizeVariant>,
) -> ResolvedPrice {
    let base = ResolvedPrice {
        price: base_price,
        mrp: base_mrp,
    };

    let Some(variant) = variant else {
        return base;
    };

    match &variant.modifier {
        PriceModifier::None => base,
        PriceModifier::Fixed { price, mrp } => ResolvedPrice {
            price: price.filter(|p| !p.is_sign_negative()).unwrap_or(base_price),
            mrp: mrp.filter(|m| !m.is_sign_negative()).or(base_mrp),
        },
        PriceModifier::Percentage { value } => match value.filter(|v| *v > Decimal::ZERO) {
            Some(pct) => {
                let factor = pct / Decimal::ONE_HUNDRED;
                ResolvedPrice {
                    price: base_price * factor,
                    mrp: base_mrp.map(|m| m * factor),
                }
            }
            None => base,
        },
    }
}
