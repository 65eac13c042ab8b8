use model::GstMode;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::round_money;

/// GST split of a single unit price. Values are unrounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBreakdown {
    pub before_tax: Decimal,
    pub tax_amount: Decimal,
    pub final_price: Decimal,
}

impl TaxBreakdown {
    /// Copy with every amount rounded for display.
    pub fn rounded(&self) -> Self {
        Self {
            before_tax: round_money(self.before_tax),
            tax_amount: round_money(self.tax_amount),
            final_price: round_money(self.final_price),
        }
    }
}

/// Computes GST on a unit price.
///
/// Exclusive: tax is `unit_price * rate / 100` on top of the price.
/// Inclusive: the price already contains tax, `before_tax = unit_price / (1 + rate / 100)`.
/// Negative rates are treated as 0.
pub fn compute_tax(unit_price: Decimal, gst_rate: Decimal, gst_mode: GstMode) -> TaxBreakdown {
    let rate = gst_rate.max(Decimal::ZERO) / Decimal::ONE_HUNDRED;

    match gst_mode {
        GstMode::Exclusive => {
            let tax_amount = unit_price * rate;
            TaxBreakdown {
                before_tax: unit_price,
                tax_amount,
                final_price: unit_price + tax_amount,
            }
        }
        GstMode::Inclusive => {
            let before_tax = unit_price / (Decimal::ONE + rate);
            TaxBreakdown {
                before_tax,
                tax_amount: unit_price - before_tax,
                final_price: unit_price,
            }
        }
    }
}
