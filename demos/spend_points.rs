//! Demo: seed a file-backed ledger with the classic five transactions,
//! spend 5000 points, and print what each payer paid.
//!
//! Uses a throwaway directory unless `POINTS_LEDGER_DIR` is set.
//!
//! Run: `cargo run --example spend_points`

use std::path::PathBuf;
use std::process::ExitCode;

use points_ledger::ledger::Ledger;
use points_ledger::models::NewTransaction;
use points_ledger::storage::FileStorage;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let scratch = tempfile::tempdir()?;
    let dir = std::env::var_os("POINTS_LEDGER_DIR")
        .map_or_else(|| scratch.path().to_path_buf(), PathBuf::from);
    println!("Storing ledger in {}", dir.display());

    let ledger = Ledger::new(FileStorage::new(dir)?);

    let seed = [
        ("DANNON", "300", "2020-10-31T10:00:00Z"),
        ("UNILEVER", "200", "2020-10-31T11:00:00Z"),
        ("DANNON", "-200", "2020-10-31T15:00:00Z"),
        ("MILLER COORS", "10000", "2020-11-01T14:00:00Z"),
        ("DANNON", "1000", "2020-11-02T14:00:00Z"),
    ];
    for (payer, points, timestamp) in seed {
        let tx = ledger.add_transaction(&NewTransaction::parse(payer, points, timestamp)?)?;
        println!("  recorded #{} {payer:>12} {:>6}", tx.id, tx.points);
    }

    println!("Spending 5000...");
    for entry in ledger.spend(5000)? {
        println!("  {:>12} {:>6}", entry.payer, entry.points);
    }

    println!("Balances:");
    for (payer, balance) in ledger.balances()? {
        println!("  {payer:>12} {balance:>6}");
    }

    Ok(())
}
