use rust_decimal::Decimal;

/// Rounds `value` down to a whole multiple of `step`.
///
/// Used for both lot steps and tick sizes. A non-positive step leaves the
/// value untouched; callers reject such precision data before getting here.
/// Returns `None` when `value / step` does not fit in a `Decimal`.
pub fn floor_to_step(value: Decimal, step: Decimal) -> Option<Decimal> {
    if step <= Decimal::ZERO {
        return Some(value);
    }
    value
        .checked_div(step)
        .and_then(|units| units.floor().checked_mul(step))
        .map(|v| v.normalize())
}
