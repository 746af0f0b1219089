mod account;
mod ledger;
mod loan;
mod money;

pub use self::{
    account::{Account, AccountNumber},
    ledger::{Ledger, LedgerError},
    loan::{Loan, LoanId},
};
