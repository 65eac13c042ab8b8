//! Pricing for the storefront.
//!
//! Three layers, leaf first:
//! - [`resolve_price`] turns a base price/MRP and an optional size variant
//!   into the effective unit price.
//! - [`compute_tax`] splits a unit price into pre-tax, GST and final amounts
//!   for inclusive or exclusive GST.
//! - [`price_line`] and [`aggregate`] compose the two per line and roll
//!   lines up into order totals.
//!
//! Every caller that shows money (cart, order creation, order history, order
//! detail, admin listing) goes through these functions so the figures agree.
//! Arithmetic keeps full precision; rounding to 2 places happens only in
//! [`round_money`] at the presentation boundary. None of these functions fail:
//! missing or malformed modifier data falls back to base-price behaviour.

mod aggregate;
mod resolver;
mod tax;

pub use aggregate::{LineResult, OrderTotals, aggregate, discount_percent, price_frozen_line, price_line};
pub use resolver::{ResolvedPrice, resolve_price};
pub use tax::{TaxBreakdown, compute_tax};

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places shown for money.
pub const MONEY_DP: u32 = 2;

/// Rounds a money amount to 2 places, half away from zero.
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec!(847.457627)), dec!(847.46));
        assert_eq!(round_money(dec!(0.005)), dec!(0.01));
        assert_eq!(round_money(dec!(-0.005)), dec!(-0.01));
        assert_eq!(round_money(dec!(10)), dec!(10));
    }
}
