use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::stock_validation::CartLine;

/// Monetary breakdown persisted on every order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

/// Sums the cart and adds the flat delivery fee. Tax and discount are
/// carried as zero: the fields exist for display and future pricing rules,
/// nothing populates them yet.
pub fn calculate(lines: &[CartLine], delivery_fee: Decimal) -> OrderTotals {
    let subtotal: Decimal = lines
        .iter()
        .map(|line| line.unit_price * Decimal::from(line.quantity))
        .sum();

    OrderTotals {
        subtotal,
        shipping_cost: delivery_fee,
        tax_amount: Decimal::ZERO,
        discount_amount: Decimal::ZERO,
        total_amount: subtotal + delivery_fee,
    }
}
