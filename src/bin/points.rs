//! CLI binary for recording, spending, and inspecting ledger points.

use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};
use owo_colors::OwoColorize;
use points_ledger::error::LedgerError;
use points_ledger::ledger::Ledger;
use points_ledger::models::{Balances, NewTransaction, SpendEntry, SpendRequest, Transaction};
use points_ledger::storage::{FileStorage, Storage};
use serde::Serialize;

/// Environment variable overriding the storage directory.
const DATA_DIR_ENV: &str = "POINTS_LEDGER_DIR";

/// Points ledger CLI: record payer transactions and spend points
/// oldest-first.
#[derive(Debug, Parser)]
#[command(name = "points", version, about)]
struct Cli {
    /// Override the storage directory (default: $POINTS_LEDGER_DIR, then
    /// the XDG data dir).
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    /// Print machine-readable JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Record a transaction for a payer.
    Add(AddArgs),
    /// Spend points, oldest transactions first.
    Spend {
        /// Number of points to spend.
        #[arg(allow_hyphen_values = true)]
        points: String,
    },
    /// Show the balance of every payer.
    Balances,
    /// List live transactions in the order they will be spent.
    Ledger,
    /// Record every transaction from a JSON array file, in order.
    Import {
        /// Path to a JSON array of `{"payer", "points", "timestamp"}`
        /// objects.
        file: PathBuf,
    },
}

/// Arguments for the `add` subcommand.
#[derive(Debug, Args)]
struct AddArgs {
    /// Payer name.
    #[arg(long)]
    payer: String,
    /// Signed, non-zero points.
    #[arg(long, allow_hyphen_values = true)]
    points: String,
    /// When the points were earned (e.g. 2020-11-02T14:00:00Z).
    #[arg(long)]
    timestamp: String,
}

/// How results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    /// Human-readable tables.
    Table,
    /// Pretty-printed JSON.
    Json,
}

/// Runs the CLI, returning an appropriate exit code.
fn run() -> io::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let _dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    let output = if cli.json { Output::Json } else { Output::Table };

    let storage = match create_storage(cli.data_dir) {
        Ok(storage) => storage,
        Err(err) => {
            report_error("failed to initialize storage", &err)?;
            return Ok(ExitCode::FAILURE);
        }
    };

    dispatch(&Ledger::new(storage), cli.command, output)
}

/// Creates the storage backend from `data_dir`, the environment, or the
/// default XDG data directory, in that order.
fn create_storage(data_dir: Option<PathBuf>) -> points_ledger::error::Result<FileStorage> {
    let from_env = std::env::var_os(DATA_DIR_ENV)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from);
    let dir = match data_dir.or(from_env) {
        Some(dir) => dir,
        None => FileStorage::default_dir()?,
    };
    FileStorage::new(dir)
}

/// Dispatches to the appropriate subcommand handler.
fn dispatch<S: Storage>(
    ledger: &Ledger<S>,
    command: Command,
    output: Output,
) -> io::Result<ExitCode> {
    match command {
        Command::Add(args) => cmd_add(ledger, &args, output),
        Command::Spend { points } => cmd_spend(ledger, &points, output),
        Command::Balances => cmd_balances(ledger, output),
        Command::Ledger => cmd_ledger(ledger, output),
        Command::Import { file } => cmd_import(ledger, &file, output),
    }
}

/// Executes the `add` subcommand: validates and records one transaction.
fn cmd_add<S: Storage>(ledger: &Ledger<S>, args: &AddArgs, output: Output) -> io::Result<ExitCode> {
    let recorded = NewTransaction::parse(&args.payer, &args.points, &args.timestamp)
        .and_then(|tx| ledger.add_transaction(&tx));
    match recorded {
        Ok(tx) => {
            match output {
                Output::Json => print_json(&tx)?,
                Output::Table => writeln!(
                    io::stdout().lock(),
                    "{} {} points for {} (transaction {})",
                    "Recorded".green().bold(),
                    tx.points,
                    args.payer.trim().bold(),
                    tx.id
                )?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report_error("transaction rejected", &err)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `spend` subcommand.
fn cmd_spend<S: Storage>(ledger: &Ledger<S>, raw: &str, output: Output) -> io::Result<ExitCode> {
    let spent = SpendRequest::parse(raw).and_then(|request| ledger.spend(request.amount()));
    match spent {
        Ok(entries) => {
            match output {
                Output::Json => print_json(&entries)?,
                Output::Table => print_spend_table(&entries)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report_error("spend rejected", &err)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `balances` subcommand.
fn cmd_balances<S: Storage>(ledger: &Ledger<S>, output: Output) -> io::Result<ExitCode> {
    match ledger.balances() {
        Ok(balances) => {
            match output {
                Output::Json => print_json(&balances)?,
                Output::Table => print_balances_table(&balances)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report_error("failed to read balances", &err)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `ledger` subcommand: lists live transactions in spend
/// order.
fn cmd_ledger<S: Storage>(ledger: &Ledger<S>, output: Output) -> io::Result<ExitCode> {
    let listing = ledger.transactions().and_then(|txs| {
        let payers = ledger.storage().payers()?;
        let rows: Vec<LedgerRow> = txs
            .iter()
            .map(|tx| LedgerRow::new(tx, payer_name(&payers, tx)))
            .collect();
        Ok(rows)
    });
    match listing {
        Ok(rows) => {
            match output {
                Output::Json => print_json(&rows)?,
                Output::Table => print_ledger_table(&rows)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report_error("failed to read transactions", &err)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `import` subcommand: records each entry of a JSON array,
/// stopping at the first rejection.
fn cmd_import<S: Storage>(ledger: &Ledger<S>, file: &Path, output: Output) -> io::Result<ExitCode> {
    let entries = match read_import_file(file) {
        Ok(entries) => entries,
        Err(err) => {
            report_error(&format!("cannot import {}", file.display()), &err)?;
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut recorded = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match NewTransaction::from_json(entry).and_then(|tx| ledger.add_transaction(&tx)) {
            Ok(tx) => recorded.push(tx),
            Err(err) => {
                report_error(&format!("entry {index} rejected"), &err)?;
                writeln!(
                    io::stderr().lock(),
                    "  {} {} earlier entries were recorded",
                    "note:".cyan(),
                    recorded.len()
                )?;
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    match output {
        Output::Json => print_json(&recorded)?,
        Output::Table => writeln!(
            io::stdout().lock(),
            "{} {}",
            "Imported".green().bold(),
            format_args!("{} transactions", recorded.len())
        )?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Reads an import file as a JSON array.
fn read_import_file(file: &Path) -> points_ledger::error::Result<Vec<serde_json::Value>> {
    let contents = std::fs::read_to_string(file).map_err(|err| LedgerError::Storage(Box::new(err)))?;
    let serde_json::Value::Array(entries) = serde_json::from_str(&contents)? else {
        return Err(LedgerError::malformed(
            "body",
            "import file must hold a JSON array",
        ));
    };
    Ok(entries)
}

/// Returns the name of the payer owning `tx`.
fn payer_name<'payers>(payers: &'payers [points_ledger::models::Payer], tx: &Transaction) -> &'payers str {
    payers
        .iter()
        .find(|p| p.id == tx.payer)
        .map_or("?", |p| p.name.as_str())
}

/// One row of the `ledger` listing.
#[derive(Debug, Serialize)]
struct LedgerRow {
    /// Transaction identifier.
    id: u64,
    /// Owning payer's name.
    payer: String,
    /// Signed points.
    points: i64,
    /// RFC 3339 timestamp.
    timestamp: String,
}

impl LedgerRow {
    /// Builds a row from a transaction and its payer's name.
    fn new(tx: &Transaction, payer: &str) -> Self {
        Self {
            id: tx.id.into_inner(),
            payer: payer.to_owned(),
            points: tx.points,
            timestamp: tx.timestamp.to_rfc3339(),
        }
    }
}

// ── Output formatting ────────────────────────────────────────────────

/// Prints an error line to stderr.
fn report_error(context: &str, err: &LedgerError) -> io::Result<()> {
    writeln!(
        io::stderr().lock(),
        "{} {context}: {err}",
        "error:".red().bold()
    )
}

/// Prints a value as pretty JSON to stdout.
fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    writeln!(io::stdout().lock(), "{json}")
}

/// Returns a table with the shared preset and cyan headers.
fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    _ = table.load_preset(UTF8_FULL);
    _ = table.set_header(headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

/// Colors a signed point amount.
fn points_cell(points: i64) -> Cell {
    match points.signum() {
        1 => Cell::new(points).fg(Color::Green),
        -1 => Cell::new(points).fg(Color::Red),
        _ => Cell::new(points).fg(Color::DarkGrey),
    }
}

/// Prints the per-payer result of a spend.
fn print_spend_table(entries: &[SpendEntry]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if entries.is_empty() {
        writeln!(out, "{}", "Nothing spent.".dimmed())?;
        return Ok(());
    }

    let mut table = new_table(&["Payer", "Points"]);
    for entry in entries {
        _ = table.add_row(vec![Cell::new(&entry.payer), points_cell(entry.points)]);
    }

    let total: i128 = entries.iter().map(|e| i128::from(e.points)).sum();
    writeln!(
        out,
        "{} {}",
        "Spent".green().bold(),
        format_args!("(net {total})").dimmed()
    )?;
    writeln!(out)?;
    writeln!(out, "{table}")?;
    Ok(())
}

/// Prints payer balances in a table.
fn print_balances_table(balances: &Balances) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if balances.is_empty() {
        writeln!(out, "{}", "No payers yet.".dimmed())?;
        return Ok(());
    }

    let mut table = new_table(&["Payer", "Balance"]);
    for (payer, &balance) in balances {
        _ = table.add_row(vec![Cell::new(payer), points_cell(balance)]);
    }

    let total: i128 = balances.values().map(|&balance| i128::from(balance)).sum();
    writeln!(
        out,
        "{} {}",
        "Balances".green().bold(),
        format_args!("(total {total})").dimmed()
    )?;
    writeln!(out)?;
    writeln!(out, "{table}")?;
    Ok(())
}

/// Prints live transactions in spend order.
fn print_ledger_table(rows: &[LedgerRow]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if rows.is_empty() {
        writeln!(out, "{}", "No live transactions.".dimmed())?;
        return Ok(());
    }

    let mut table = new_table(&["#", "Timestamp", "Payer", "Points"]);
    for row in rows {
        _ = table.add_row(vec![
            Cell::new(row.id),
            Cell::new(&row.timestamp),
            Cell::new(&row.payer),
            points_cell(row.points),
        ]);
    }

    writeln!(
        out,
        "{} {}",
        "Ledger".green().bold(),
        format_args!("({})", rows.len()).dimmed()
    )?;
    writeln!(out)?;
    writeln!(out, "{table}")?;
    Ok(())
}

fn main() -> ExitCode {
    run().unwrap_or(ExitCode::FAILURE)
}
