use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

#[macro_use]
extern crate log;

use anyhow::Context;
use clap::Parser;
use rust_decimal::Decimal;

mod features;
use features::{AccountNumber, Ledger, LedgerError};

/// Menu-driven bank account and loan record-keeper.
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Args {
    /// Path to the ledger database file.
    #[clap(short, long, default_value = "bank_system.db")]
    database: PathBuf,
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("{e:#}");
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut ledger = Ledger::open(&args.database)
        .with_context(|| format!("failed to open ledger store at {}", args.database.display()))?;

    println!("Welcome to the Bank Management System with Loans");

    loop {
        print_menu();
        let choice = prompt("Enter your choice")?;
        match choice.as_str() {
            "1" => create_account(&mut ledger)?,
            "2" => deposit(&mut ledger)?,
            "3" => withdraw(&mut ledger)?,
            "4" => check_balance(&mut ledger)?,
            "5" => apply_for_loan(&mut ledger)?,
            "6" => repay_loan(&mut ledger)?,
            "7" => view_loans(&mut ledger)?,
            "8" => list_accounts(&mut ledger),
            "9" => break,
            _ => println!("Invalid choice. Please try again."),
        }
    }

    println!("Exiting the system.");
    ledger.close().context("failed to close the ledger store")?;
    Ok(())
}

fn print_menu() {
    println!();
    println!("1: Create Account");
    println!("2: Deposit");
    println!("3: Withdraw");
    println!("4: Check Balance");
    println!("5: Apply for Loan");
    println!("6: Repay Loan");
    println!("7: View Loans");
    println!("8: List All Accounts");
    println!("9: Exit");
}

fn create_account(ledger: &mut Ledger) -> anyhow::Result<()> {
    let Some(number) = prompt_parsed::<AccountNumber>("Enter account number")? else {
        return Ok(());
    };
    let holder = prompt("Enter account holder name")?;
    let Some(balance) = prompt_parsed::<Decimal>("Enter initial balance")? else {
        return Ok(());
    };
    match ledger.create_account(number, &holder, balance) {
        Ok(()) => println!("Account {number} created for {holder} with balance {balance}."),
        Err(e) => report(e),
    }
    Ok(())
}

fn deposit(ledger: &mut Ledger) -> anyhow::Result<()> {
    let Some(number) = prompt_parsed::<AccountNumber>("Enter account number")? else {
        return Ok(());
    };
    let Some(amount) = prompt_parsed::<Decimal>("Enter amount to deposit")? else {
        return Ok(());
    };
    match ledger.deposit(number, amount) {
        Ok(balance) => println!("Deposited {amount} to account {number}. New balance: {balance}."),
        Err(e) => report(e),
    }
    Ok(())
}

fn withdraw(ledger: &mut Ledger) -> anyhow::Result<()> {
    let Some(number) = prompt_parsed::<AccountNumber>("Enter account number")? else {
        return Ok(());
    };
    let Some(amount) = prompt_parsed::<Decimal>("Enter amount to withdraw")? else {
        return Ok(());
    };
    match ledger.withdraw(number, amount) {
        Ok(balance) => println!("Withdrew {amount} from account {number}. New balance: {balance}."),
        Err(e) => report(e),
    }
    Ok(())
}

fn check_balance(ledger: &mut Ledger) -> anyhow::Result<()> {
    let Some(number) = prompt_parsed::<AccountNumber>("Enter account number")? else {
        return Ok(());
    };
    match ledger.balance(number) {
        Ok(balance) => println!("Account {number} balance: {balance}"),
        Err(e) => report(e),
    }
    Ok(())
}

fn apply_for_loan(ledger: &mut Ledger) -> anyhow::Result<()> {
    let Some(number) = prompt_parsed::<AccountNumber>("Enter account number")? else {
        return Ok(());
    };
    let Some(amount) = prompt_parsed::<Decimal>("Enter loan amount")? else {
        return Ok(());
    };
    match ledger.apply_for_loan(number, amount) {
        Ok(id) => println!("Loan of {amount} approved for account {number} (loan ID {id})."),
        Err(e) => report(e),
    }
    Ok(())
}

fn repay_loan(ledger: &mut Ledger) -> anyhow::Result<()> {
    let Some(number) = prompt_parsed::<AccountNumber>("Enter account number")? else {
        return Ok(());
    };
    let Some(amount) = prompt_parsed::<Decimal>("Enter repayment amount")? else {
        return Ok(());
    };
    match ledger.repay_loan(number, amount) {
        Ok(loan) => println!(
            "Repayment of {amount} made for loan ID {}. Remaining loan balance: {}.",
            loan.id, loan.remaining
        ),
        Err(e) => report(e),
    }
    Ok(())
}

fn view_loans(ledger: &mut Ledger) -> anyhow::Result<()> {
    let Some(number) = prompt_parsed::<AccountNumber>("Enter account number")? else {
        return Ok(());
    };
    match ledger.loans(number) {
        Ok(loans) if loans.is_empty() => println!("No loans found for account {number}."),
        Ok(loans) => {
            println!("\nLoans for account {number}:");
            for loan in loans {
                println!(
                    "Loan ID: {}, Total Loan: {}, Remaining Amount: {}",
                    loan.id, loan.amount, loan.remaining
                );
            }
        }
        Err(e) => report(e),
    }
    Ok(())
}

fn list_accounts(ledger: &mut Ledger) {
    match ledger.accounts() {
        Ok(accounts) if accounts.is_empty() => println!("No accounts on record."),
        Ok(accounts) => {
            println!("\nAll Accounts:");
            for account in accounts {
                println!(
                    "Account Number: {}, Holder: {}, Balance: {}",
                    account.number, account.holder, account.balance
                );
            }
        }
        Err(e) => report(e),
    }
}

/// Print the surfaced ledger error and keep the menu loop going.
fn report(err: LedgerError) {
    warn!("operation failed: {err}");
    println!("{err}");
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}: ");
    io::stdout().flush().context("failed to flush stdout")?;

    let mut line = String::new();
    let bytes = io::stdin()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    if bytes == 0 {
        anyhow::bail!("stdin closed");
    }
    Ok(line.trim().to_string())
}

/// Prompt for a typed value. Invalid input is reported and `None` returned
/// so the menu loop continues instead of terminating.
fn prompt_parsed<T: FromStr>(label: &str) -> anyhow::Result<Option<T>> {
    let line = prompt(label)?;
    match line.parse() {
        Ok(value) => Ok(Some(value)),
        Err(_) => {
            println!("Invalid input: {line:?} is not a valid number.");
            Ok(None)
        }
    }
}
