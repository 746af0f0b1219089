use rust_decimal::prelude::*;

/// Amounts are persisted as integer ten-thousandths so the store's CHECK
/// constraints and ordering stay numeric. Four decimal places is the
/// precision cap for every amount entering the ledger.
const UNITS_PER_WHOLE: i64 = 10_000;

/// Convert a decimal amount to minor units. `None` when the amount carries
/// more than four decimal places or does not fit the unit range.
pub(crate) fn to_units(amount: Decimal) -> Option<i64> {
    let scaled = amount.checked_mul(Decimal::from(UNITS_PER_WHOLE))?;
    if scaled.normalize().scale() > 0 {
        return None;
    }
    scaled.to_i64()
}

pub(crate) fn from_units(units: i64) -> Decimal {
    Decimal::new(units, 4).normalize()
}
