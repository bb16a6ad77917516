//! Discount pricing and order totals.
//!
//! Every surface that shows or charges a price goes through
//! [`discounted_price`], so the cart, the product JSON and the checkout
//! total never disagree.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Tax rate folded into the charged amount (18%).
pub const TAX_RATE_PERCENT: i64 = 18;

/// Flat shipping charge recorded on every order, in major units.
pub const SHIPPING_COST: i64 = 49;

/// Apply a percentage discount to a whole-unit price.
///
/// The result is rounded half away from zero. Discounts are clamped to
/// `0..=100`; a zero discount returns the price unchanged.
///
/// ```
/// use marigold_core::discounted_price;
///
/// assert_eq!(discounted_price(999, 15), 849);
/// assert_eq!(discounted_price(500, 0), 500);
/// ```
#[must_use]
pub fn discounted_price(price: i64, discount: i32) -> i64 {
    let discount = discount.clamp(0, 100);
    if discount == 0 {
        return price;
    }

    let factor = Decimal::ONE - Decimal::new(i64::from(discount), 2);
    let discounted = (Decimal::from(price) * factor)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    i64::try_from(discounted).unwrap_or(price)
}

/// Money breakdown stored on an order, in major units with two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Split a tax-inclusive charge (in minor units) into subtotal and tax.
    ///
    /// `subtotal = amount / 100 / 1.18`, `tax = subtotal * 0.18`,
    /// `total = amount / 100`. Shipping is recorded as the flat
    /// [`SHIPPING_COST`] and is not part of `total`.
    #[must_use]
    pub fn from_amount_minor(amount: i64) -> Self {
        let total = Decimal::new(amount, 2);
        let rate = Decimal::new(TAX_RATE_PERCENT, 2);
        let subtotal = round2(total / (Decimal::ONE + rate));
        let tax = round2(subtotal * rate);

        Self {
            subtotal,
            tax,
            shipping_cost: Decimal::from(SHIPPING_COST),
            total: round2(total),
        }
    }
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a whole-unit amount into minor units (paise, cents).
#[must_use]
pub const fn to_minor_units(major: i64) -> i64 {
    major.saturating_mul(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_discount_is_identity() {
        assert_eq!(discounted_price(1299, 0), 1299);
    }

    #[test]
    fn test_rounds_half_away_from_zero() {
        // 25 * 0.9 = 22.5
        assert_eq!(discounted_price(25, 10), 23);
        // 10 * 0.85 = 8.5
        assert_eq!(discounted_price(10, 15), 9);
        // 1000 * 0.67 = 670
        assert_eq!(discounted_price(1000, 33), 670);
    }

    #[test]
    fn test_full_discount_is_free() {
        assert_eq!(discounted_price(450, 100), 0);
    }

    #[test]
    fn test_out_of_range_discount_is_clamped() {
        assert_eq!(discounted_price(200, -5), 200);
        assert_eq!(discounted_price(200, 150), 0);
    }

    #[test]
    fn test_every_discount_stays_within_bounds() {
        for price in [1_i64, 7, 99, 1000, 54_321] {
            for discount in 0..=100 {
                let p = discounted_price(price, discount);
                assert!((0..=price).contains(&p), "{price} @ {discount}% -> {p}");
                let exact = Decimal::from(price) * Decimal::new(i64::from(100 - discount), 2);
                assert!((Decimal::from(p) - exact).abs() <= Decimal::new(5, 1));
            }
        }
    }

    #[test]
    fn test_totals_for_11800_minor() {
        let totals = OrderTotals::from_amount_minor(11_800);
        assert_eq!(totals.subtotal, Decimal::new(10_000, 2));
        assert_eq!(totals.tax, Decimal::new(1_800, 2));
        assert_eq!(totals.shipping_cost, Decimal::from(49));
        assert_eq!(totals.total, Decimal::new(11_800, 2));
    }

    #[test]
    fn test_totals_round_to_two_places() {
        let totals = OrderTotals::from_amount_minor(1_000);
        // 10 / 1.18 = 8.4745...
        assert_eq!(totals.subtotal, Decimal::new(847, 2));
        assert_eq!(totals.tax, Decimal::new(152, 2));
        assert_eq!(totals.total, Decimal::new(1_000, 2));
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(118), 11_800);
    }
}
