use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{ConnectOptions, Connection, Row, SqliteConnection};
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};

use super::account::{Account, AccountNumber};
use super::loan::{Loan, LoanId};
use super::money;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("account {0} already exists")]
    DuplicateAccount(AccountNumber),

    #[error("account {0} not found")]
    AccountNotFound(AccountNumber),

    #[error("no active loans for account {0}")]
    LoanNotFound(AccountNumber),

    #[error("invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error("cannot withdraw {requested}, only {available} available")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },

    #[error("repayment of {requested} exceeds the remaining loan balance of {remaining}")]
    ExcessRepayment {
        requested: Decimal,
        remaining: Decimal,
    },

    #[error("store failure: {0}")]
    Store(#[from] sqlx::Error),

    #[error("runtime setup failed: {0}")]
    Runtime(#[from] std::io::Error),
}

type LedgerResult<T> = anyhow::Result<T, LedgerError>;

/// Owns the `accounts` and `loans` tables and applies every balance
/// mutation, one guarded read-modify-write at a time.
///
/// The handle is synchronous: a private current-thread runtime drives each
/// SQLite round trip to completion before the call returns, so operations
/// are serialized by the caller's control flow. Validation runs before the
/// single statement that commits a mutation, so a failed operation never
/// leaves a partial write behind.
pub struct Ledger {
    rt: Runtime,
    conn: SqliteConnection,
}

impl Ledger {
    /// Open a file-backed ledger store, creating the database file and
    /// schema on first use.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        Self::connect(options)
    }

    /// In-memory store with the same schema. Nothing survives the handle.
    pub fn open_in_memory() -> LedgerResult<Self> {
        Self::connect(SqliteConnectOptions::new().in_memory(true).foreign_keys(true))
    }

    fn connect(options: SqliteConnectOptions) -> LedgerResult<Self> {
        let rt = Builder::new_current_thread().build()?;
        let conn = rt.block_on(async {
            let mut conn = options.connect().await?;
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS accounts (
                    account_number INTEGER PRIMARY KEY,
                    account_holder TEXT NOT NULL,
                    balance        INTEGER NOT NULL CHECK (balance >= 0)
                )
                "#,
            )
            .execute(&mut conn)
            .await?;
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS loans (
                    loan_id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    account_number   INTEGER NOT NULL REFERENCES accounts (account_number),
                    loan_amount      INTEGER NOT NULL CHECK (loan_amount > 0),
                    remaining_amount INTEGER NOT NULL
                        CHECK (remaining_amount >= 0 AND remaining_amount <= loan_amount)
                )
                "#,
            )
            .execute(&mut conn)
            .await?;
            Ok::<_, LedgerError>(conn)
        })?;
        debug!("ledger store ready");
        Ok(Self { rt, conn })
    }

    /// Close the underlying connection. Dropping the handle without calling
    /// this is safe; an explicit close surfaces any final store error.
    pub fn close(self) -> LedgerResult<()> {
        let Self { rt, conn } = self;
        rt.block_on(conn.close())?;
        Ok(())
    }

    /// Create a new account. The number is caller-supplied and must be
    /// unused; the initial balance may be zero but not negative.
    pub fn create_account(
        &mut self,
        number: AccountNumber,
        holder: &str,
        initial_balance: Decimal,
    ) -> LedgerResult<()> {
        if initial_balance < dec!(0) {
            return Err(LedgerError::InvalidAmount(initial_balance));
        }
        let units =
            money::to_units(initial_balance).ok_or(LedgerError::InvalidAmount(initial_balance))?;

        let Self { rt, conn } = self;
        rt.block_on(async {
            let result = sqlx::query(
                "INSERT INTO accounts (account_number, account_holder, balance) VALUES (?1, ?2, ?3)",
            )
            .bind(number.as_i64())
            .bind(holder)
            .bind(units)
            .execute(&mut *conn)
            .await;

            match result {
                Ok(_) => {
                    info!("created account {number} for {holder:?}");
                    Ok(())
                }
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    Err(LedgerError::DuplicateAccount(number))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Add `amount` to the account's balance and return the new balance.
    pub fn deposit(&mut self, number: AccountNumber, amount: Decimal) -> LedgerResult<Decimal> {
        let units = positive_units(amount)?;
        let Self { rt, conn } = self;
        rt.block_on(async {
            let balance = fetch_balance_units(conn, number).await?;
            let new_balance = balance
                .checked_add(units)
                .ok_or(LedgerError::InvalidAmount(amount))?;
            update_balance(conn, number, new_balance).await?;
            info!("deposited {amount} to account {number}");
            Ok(money::from_units(new_balance))
        })
    }

    /// Subtract `amount` from the account's balance and return the new
    /// balance. The balance never goes below zero.
    pub fn withdraw(&mut self, number: AccountNumber, amount: Decimal) -> LedgerResult<Decimal> {
        let units = positive_units(amount)?;
        let Self { rt, conn } = self;
        rt.block_on(async {
            let balance = fetch_balance_units(conn, number).await?;
            if units > balance {
                return Err(LedgerError::InsufficientFunds {
                    requested: amount,
                    available: money::from_units(balance),
                });
            }
            let new_balance = balance - units;
            update_balance(conn, number, new_balance).await?;
            info!("withdrew {amount} from account {number}");
            Ok(money::from_units(new_balance))
        })
    }

    pub fn balance(&mut self, number: AccountNumber) -> LedgerResult<Decimal> {
        let Self { rt, conn } = self;
        rt.block_on(async { Ok(money::from_units(fetch_balance_units(conn, number).await?)) })
    }

    /// Record a new loan against an existing account. Remaining starts
    /// equal to the original amount; the returned id is unique and
    /// monotonically increasing.
    pub fn apply_for_loan(
        &mut self,
        number: AccountNumber,
        amount: Decimal,
    ) -> LedgerResult<LoanId> {
        let units = positive_units(amount)?;
        let Self { rt, conn } = self;
        rt.block_on(async {
            fetch_balance_units(conn, number).await?;
            let result = sqlx::query(
                "INSERT INTO loans (account_number, loan_amount, remaining_amount) VALUES (?1, ?2, ?2)",
            )
            .bind(number.as_i64())
            .bind(units)
            .execute(&mut *conn)
            .await?;
            let id = LoanId::from(result.last_insert_rowid());
            info!("approved loan {id} of {amount} for account {number}");
            Ok(id)
        })
    }

    /// Repay part of the account's oldest active loan and return the
    /// updated record. Repayments never target a caller-chosen loan: the
    /// lowest-id loan with remaining > 0 always receives the payment.
    pub fn repay_loan(&mut self, number: AccountNumber, amount: Decimal) -> LedgerResult<Loan> {
        let units = positive_units(amount)?;
        let Self { rt, conn } = self;
        rt.block_on(async {
            let row = sqlx::query(
                "SELECT loan_id, loan_amount, remaining_amount FROM loans \
                 WHERE account_number = ?1 AND remaining_amount > 0 \
                 ORDER BY loan_id LIMIT 1",
            )
            .bind(number.as_i64())
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(LedgerError::LoanNotFound(number))?;

            let loan = loan_from_row(&row, number)?;
            let remaining_units: i64 = row.try_get("remaining_amount")?;
            if units > remaining_units {
                return Err(LedgerError::ExcessRepayment {
                    requested: amount,
                    remaining: loan.remaining,
                });
            }

            let new_remaining = remaining_units - units;
            sqlx::query("UPDATE loans SET remaining_amount = ?1 WHERE loan_id = ?2")
                .bind(new_remaining)
                .bind(loan.id.as_i64())
                .execute(&mut *conn)
                .await?;
            info!("repaid {amount} on loan {} for account {number}", loan.id);
            Ok(Loan {
                remaining: money::from_units(new_remaining),
                ..loan
            })
        })
    }

    /// All loan records for the account, settled ones included, in
    /// ascending loan-id order. Empty when the account has none.
    pub fn loans(&mut self, number: AccountNumber) -> LedgerResult<Vec<Loan>> {
        let Self { rt, conn } = self;
        rt.block_on(async {
            let rows = sqlx::query(
                "SELECT loan_id, loan_amount, remaining_amount FROM loans \
                 WHERE account_number = ?1 ORDER BY loan_id",
            )
            .bind(number.as_i64())
            .fetch_all(&mut *conn)
            .await?;
            rows.iter().map(|row| loan_from_row(row, number)).collect()
        })
    }

    /// All account records, in ascending account-number order.
    pub fn accounts(&mut self) -> LedgerResult<Vec<Account>> {
        let Self { rt, conn } = self;
        rt.block_on(async {
            let rows = sqlx::query(
                "SELECT account_number, account_holder, balance FROM accounts \
                 ORDER BY account_number",
            )
            .fetch_all(&mut *conn)
            .await?;
            rows.iter()
                .map(|row| {
                    Ok(Account {
                        number: AccountNumber::from(row.try_get::<i64, _>("account_number")?),
                        holder: row.try_get("account_holder")?,
                        balance: money::from_units(row.try_get("balance")?),
                    })
                })
                .collect()
        })
    }
}

fn positive_units(amount: Decimal) -> LedgerResult<i64> {
    if amount <= dec!(0) {
        return Err(LedgerError::InvalidAmount(amount));
    }
    money::to_units(amount).ok_or(LedgerError::InvalidAmount(amount))
}

async fn fetch_balance_units(
    conn: &mut SqliteConnection,
    number: AccountNumber,
) -> LedgerResult<i64> {
    let row = sqlx::query("SELECT balance FROM accounts WHERE account_number = ?1")
        .bind(number.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => Ok(row.try_get("balance")?),
        None => Err(LedgerError::AccountNotFound(number)),
    }
}

async fn update_balance(
    conn: &mut SqliteConnection,
    number: AccountNumber,
    units: i64,
) -> LedgerResult<()> {
    sqlx::query("UPDATE accounts SET balance = ?1 WHERE account_number = ?2")
        .bind(units)
        .bind(number.as_i64())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn loan_from_row(row: &SqliteRow, account: AccountNumber) -> LedgerResult<Loan> {
    Ok(Loan {
        id: LoanId::from(row.try_get::<i64, _>("loan_id")?),
        account,
        amount: money::from_units(row.try_get("loan_amount")?),
        remaining: money::from_units(row.try_get("remaining_amount")?),
    })
}
