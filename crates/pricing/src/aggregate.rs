use model::{GstMode, Product, SizeVariant};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::{compute_tax, resolve_price, round_money};

/// Pricing of one line: per-unit figures plus the line figures across quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineResult {
    pub quantity: i32,
    /// Size-adjusted unit price before GST handling.
    pub unit_price: Decimal,
    pub mrp: Option<Decimal>,
    pub before_tax: Decimal,
    pub tax_amount: Decimal,
    pub final_price: Decimal,
    pub line_before_tax: Decimal,
    pub line_tax: Decimal,
    /// `final_price * quantity`.
    pub subtotal_for_line: Decimal,
    pub discount_percent: u32,
}

impl LineResult {
    /// Copy with every money figure rounded for display.
    pub fn rounded(&self) -> Self {
        Self {
            unit_price: round_money(self.unit_price),
            mrp: self.mrp.map(round_money),
            before_tax: round_money(self.before_tax),
            tax_amount: round_money(self.tax_amount),
            final_price: round_money(self.final_price),
            line_before_tax: round_money(self.line_before_tax),
            line_tax: round_money(self.line_tax),
            subtotal_for_line: round_money(self.subtotal_for_line),
            ..*self
        }
    }
}

/// Rounded order-level totals.
///
/// `subtotal_before_gst + total_gst + shipping_charge == grand_total` holds
/// exactly on the rounded figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal_before_gst: Decimal,
    pub total_gst: Decimal,
    pub shipping_charge: Decimal,
    pub grand_total: Decimal,
}

/// Prices a live product line: resolves the size variant, then applies the
/// product's GST.
pub fn price_line(product: &Product, variant: Option<&SizeVariant>, quantity: i32) -> LineResult {
    let resolved = resolve_price(product.price, product.mrp, variant);
    price_frozen_line(
        resolved.price,
        resolved.mrp,
        product.gst_rate,
        product.gst_mode,
        quantity,
    )
}

/// Prices a line from an already resolved unit price, such as an order
/// item's price-at-purchase.
pub fn price_frozen_line(
    unit_price: Decimal,
    mrp: Option<Decimal>,
    gst_rate: Decimal,
    gst_mode: GstMode,
    quantity: i32,
) -> LineResult {
    let tax = compute_tax(unit_price, gst_rate, gst_mode);
    let qty = Decimal::from(quantity.max(0));

    LineResult {
        quantity,
        unit_price,
        mrp,
        before_tax: tax.before_tax,
        tax_amount: tax.tax_amount,
        final_price: tax.final_price,
        line_before_tax: tax.before_tax * qty,
        line_tax: tax.tax_amount * qty,
        subtotal_for_line: tax.final_price * qty,
        discount_percent: discount_percent(mrp, tax.final_price),
    }
}

/// Rolls lines up into order totals. Sums are taken at full precision and
/// rounded once; the grand total is the sum of the rounded parts.
pub fn aggregate<'a, I>(lines: I, shipping_charge: Decimal) -> OrderTotals
where
    I: IntoIterator<Item = &'a LineResult>,
{
    let (before_tax, tax) = lines
        .into_iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(b, t), line| {
            (b + line.line_before_tax, t + line.line_tax)
        });

    let subtotal_before_gst = round_money(before_tax);
    let total_gst = round_money(tax);
    let shipping_charge = round_money(shipping_charge.max(Decimal::ZERO));

    OrderTotals {
        subtotal_before_gst,
        total_gst,
        shipping_charge,
        grand_total: subtotal_before_gst + total_gst + shipping_charge,
    }
}

/// Whole-number discount of `final_price` against the MRP, 0 when there is
/// no MRP above the final price.
pub fn discount_percent(mrp: Option<Decimal>, final_price: Decimal) -> u32 {
    match mrp {
        Some(mrp) if mrp > Decimal::ZERO && mrp > final_price => {
            (Decimal::ONE_HUNDRED * (mrp - final_price) / mrp)
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_u32()
                .unwrap_or(0)
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::PriceModifier;
    use rust_decimal_macros::dec;

    fn product(price: Decimal, gst_rate: Decimal, gst_mode: GstMode) -> Product {
        Product {
            id: 1,
            name: "Kurta".into(),
            category_id: 1,
            subcategory_id: None,
            price,
            mrp: None,
            gst_rate,
            gst_mode,
            legacy_sizes: None,
            variants: vec![SizeVariant {
                id: 7,
                product_id: 1,
                size: "XL".into(),
                available: true,
                display_order: 1,
                modifier: PriceModifier::Percentage {
                    value: Some(dec!(110)),
                },
            }],
        }
    }

    #[test]
    fn test_variant_then_exclusive_gst() {
        let p = product(dec!(500), dec!(12), GstMode::Exclusive);
        let line = price_line(&p, p.variant_for(Some("XL")), 1).rounded();
        assert_eq!(line.unit_price, dec!(550.00));
        assert_eq!(line.tax_amount, dec!(66.00));
        assert_eq!(line.final_price, dec!(616.00));
    }

    #[test]
    fn test_line_scales_with_quantity() {
        let p = product(dec!(1000), dec!(18), GstMode::Exclusive);
        let line = price_line(&p, None, 3);
        assert_eq!(line.line_before_tax, dec!(3000));
        assert_eq!(line.line_tax, dec!(540));
        assert_eq!(line.subtotal_for_line, dec!(3540));
    }

    #[test]
    fn test_aggregate_reconciles() {
        let a = price_line(&product(dec!(1000), dec!(18), GstMode::Inclusive), None, 1);
        let b = price_line(&product(dec!(333.33), dec!(5), GstMode::Exclusive), None, 3);
        let totals = aggregate([&a, &b], dec!(40));

        assert_eq!(totals.subtotal_before_gst, round_money(dec!(1000) / dec!(1.18) + dec!(999.99)));
        assert_eq!(
            totals.subtotal_before_gst + totals.total_gst + totals.shipping_charge,
            totals.grand_total
        );
        assert_eq!(totals.shipping_charge, dec!(40));
    }

    #[test]
    fn test_aggregate_empty() {
        let totals = aggregate(std::iter::empty(), Decimal::ZERO);
        assert_eq!(totals, OrderTotals::default());
    }

    #[test]
    fn test_totals_sum_unrounded_lines() {
        let p = product(dec!(1.00), dec!(18), GstMode::Inclusive);
        let lines: Vec<_> = (0..3).map(|_| price_line(&p, None, 1)).collect();
        let totals = aggregate(&lines, Decimal::ZERO);
        // Per-line rounding would give 2.55 + 0.45.
        assert_eq!(totals.subtotal_before_gst, dec!(2.54));
        assert_eq!(totals.total_gst, dec!(0.46));
        assert_eq!(totals.grand_total, dec!(3.00));
    }

    #[test]
    fn test_frozen_line_uses_given_price() {
        let line = price_frozen_line(dec!(550), None, dec!(12), GstMode::Exclusive, 2).rounded();
        assert_eq!(line.final_price, dec!(616.00));
        assert_eq!(line.subtotal_for_line, dec!(1232.00));
    }

    #[test]
    fn test_discount_percent() {
        assert_eq!(discount_percent(Some(dec!(1000)), dec!(750)), 25);
        assert_eq!(discount_percent(Some(dec!(999)), dec!(666)), 33);
        assert_eq!(discount_percent(Some(dec!(500)), dec!(500)), 0);
        assert_eq!(discount_percent(Some(dec!(400)), dec!(500)), 0);
        assert_eq!(discount_percent(Some(dec!(0)), dec!(0)), 0);
        assert_eq!(discount_percent(None, dec!(10)), 0);
    }
}
