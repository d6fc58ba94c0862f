//! Escrow calculation.
//!
//! The cash that must be locked to back an order, given what the submitter
//! already holds of the targeted outcome. Pure; the admission path is the
//! only caller.

use rust_decimal::Decimal;

use crate::models::OrderSide;

/// Escrow required to admit an order.
///
/// A buy locks `quantity * price`: the bid is the cap on what the buyer can
/// ever pay. A sell locks `(quantity - owned) * (1 - price)` for the portion
/// not covered by existing holdings: shorting a contract co-mints a basket,
/// and the `1 - price` locked here plus the `price` received at match time
/// exactly collateralises it. Selling only what is owned locks nothing.
pub fn required_escrow(side: OrderSide, quantity: i64, price: Decimal, owned: Decimal) -> Decimal {
    let quantity = Decimal::from(quantity);
    match side {
        OrderSide::Buy => quantity * price,
        OrderSide::Sell => (quantity - owned).max(Decimal::ZERO) * (Decimal::ONE - price),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_buy_escrow_is_full_bid_value() {
        assert_eq!(
            required_escrow(OrderSide::Buy, 10, dec!(0.70), Decimal::ZERO),
            dec!(7.0)
        );
    }

    #[test]
    fn test_sell_covered_requires_nothing() {
        // Selling exactly as many as owned.
        assert_eq!(
            required_escrow(OrderSide::Sell, 10, dec!(0.30), dec!(10)),
            Decimal::ZERO
        );
        // Owning more than the sale never goes negative.
        assert_eq!(
            required_escrow(OrderSide::Sell, 10, dec!(0.30), dec!(25)),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_sell_short_locks_complement_value() {
        // Fully naked short: 10 * (1 - 0.30).
        assert_eq!(
            required_escrow(OrderSide::Sell, 10, dec!(0.30), Decimal::ZERO),
            dec!(7.0)
        );
        // Partially covered: only the 6 uncovered contracts need escrow.
        assert_eq!(
            required_escrow(OrderSide::Sell, 10, dec!(0.30), dec!(4)),
            dec!(4.2)
        );
    }

    #[test]
    fn test_sell_against_existing_short_collateralises_the_whole_exposure() {
        // Holdings are literal negatives for shorts, so the uncovered
        // quantity grows by the existing short.
        assert_eq!(
            required_escrow(OrderSide::Sell, 10, dec!(0.50), dec!(-10)),
            dec!(10.0)
        );
    }
}
