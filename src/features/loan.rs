use std::fmt;

use rust_decimal::prelude::*;

use super::account::AccountNumber;

/// Store-assigned loan identifier. Monotonically increasing, so the lowest
/// id is always the oldest loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoanId(i64);

impl LoanId {
    pub(crate) fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<i64> for LoanId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A debt record against an account.
///
/// `amount` is fixed at creation; `remaining` only ever decreases, toward
/// zero. A settled loan stays in the record set.
#[derive(Debug, Clone, PartialEq)]
pub struct Loan {
    pub id: LoanId,
    pub account: AccountNumber,
    pub amount: Decimal,
    pub remaining: Decimal,
}

impl Loan {
    pub fn is_settled(&self) -> bool {
        self.remaining.is_zero()
    }
}
