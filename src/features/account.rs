use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use rust_decimal::Decimal;

/// Externally supplied account identifier. Immutable once the account exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountNumber(i64);

impl AccountNumber {
    pub(crate) fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<i64> for AccountNumber {
    fn from(number: i64) -> Self {
        Self(number)
    }
}

impl FromStr for AccountNumber {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single account record: holder name and a balance that never goes
/// negative.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub number: AccountNumber,
    pub holder: String,
    pub balance: Decimal,
}
