// src/utils/precision.rs
use rust_decimal::Decimal;

/// Rounds a quantity DOWN to the nearest multiple of `step_size`.
/// Example: amount=10.999, step=1.0 -> 10.0
pub fn normalize_quantity(amount: Decimal, step_size: Decimal) -> Decimal {
    if step_size.is_zero() {
        return amount;
    }
    (amount / step_size).floor() * step_size
}

/// Size of an order that flattens a position of `quantity`.
///
/// Never below `min_lot`, and always a whole number of lot steps.
pub fn closing_quantity(quantity: Decimal, min_lot: Decimal, step_size: Decimal) -> Decimal {
    let size = normalize_quantity(quantity.abs(), step_size);
    size.max(min_lot)
}

/// Exchange wire format for a contract count: no fractional part, no trailing zeros.
pub fn format_contracts(quantity: Decimal) -> String {
    quantity.round().normalize().to_string()
}
