//! Command-line interface for the look-through collector.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use crate::aggregate;
use crate::issuers::default_registry;
use crate::pipeline::{self, CollectOptions, Diagnostic};
use crate::positions::load_positions;
use crate::report;
use crate::store::{HoldingsStore, DEFAULT_DB_DIR};
use crate::table::{write_csv, Table};

#[derive(Parser)]
#[command(name = "lookthrough")]
#[command(version)]
#[command(
    about = "Resolve fund positions into their underlying holdings and aggregate them",
    long_about = None
)]
pub struct Cli {
    /// CSV export of portfolio positions (ticker, account, issuer, price, number)
    pub positions_csv: PathBuf,

    /// Skip short positions entirely
    #[arg(short = 'l', long)]
    pub ignore_shorts: bool,

    /// Drop options positions when loading the portfolio
    #[arg(short = 'o', long)]
    pub ignore_options: bool,

    /// Directory of downloaded issuer files, one subdirectory per ticker
    #[arg(long, default_value = DEFAULT_DB_DIR)]
    pub db_dir: PathBuf,

    /// Write the full per-fund-holding table to this CSV path
    #[arg(short = 'F', long)]
    pub full_table: Option<PathBuf>,

    /// Write the aggregated table to this CSV path
    #[arg(short = 'A', long)]
    pub agg_table: Option<PathBuf>,

    /// Write collected diagnostics to this path as JSON lines
    #[arg(long)]
    pub diagnostics: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub fn run(cli: Cli) -> Result<()> {
    let registry = default_registry();
    let store = HoldingsStore::new(&cli.db_dir);

    let positions_file = File::open(&cli.positions_csv)
        .with_context(|| format!("Cannot open positions file {}", cli.positions_csv.display()))?;
    let positions = load_positions(positions_file, cli.ignore_options)?;
    info!("Loaded {} positions", positions.len());

    let collection = pipeline::collect(
        &positions,
        &registry,
        &store,
        CollectOptions {
            ignore_shorts: cli.ignore_shorts,
        },
    )?;
    info!(
        "Total amount from full holdings table: {:.2}",
        collection.total
    );
    render_diagnostics(&collection.diagnostics);

    if let Some(path) = &cli.full_table {
        export_csv(&collection.table, path)?;
        info!("Wrote full table to {}", path.display());
    }

    let aggregated = aggregate::group(&collection.table)?;
    render_diagnostics(&aggregated.diagnostics);

    if let Some(path) = &cli.agg_table {
        export_csv(&aggregated.table, path)?;
        info!("Wrote aggregated table to {}", path.display());
    }

    if let Some(path) = &cli.diagnostics {
        let mut all = collection.diagnostics.clone();
        all.extend(aggregated.diagnostics.iter().cloned());
        write_diagnostics(&all, path)?;
    }

    report::print_aggregate(&aggregated.table, report::REPORT_TAIL)?;
    Ok(())
}

fn export_csv(table: &Table, path: &PathBuf) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    write_csv(table, file)?;
    Ok(())
}

fn write_diagnostics(diagnostics: &[Diagnostic], path: &PathBuf) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    for diagnostic in diagnostics {
        let line = serde_json::to_string(diagnostic)?;
        writeln!(file, "{line}")?;
    }
    Ok(())
}

fn render_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        match diagnostic {
            Diagnostic::MissingIssuer { issuer, ticker } => {
                warn!("Missing issuer '{}' for {}", issuer, ticker)
            }
            Diagnostic::MissingFile { ticker } => warn!("Missing file for {}", ticker),
            Diagnostic::ParseFailure {
                issuer,
                ticker,
                message,
            } => warn!("Cannot parse {} with '{}': {}", ticker, issuer, message),
            Diagnostic::InvalidHoldings { ticker, message } => {
                warn!("Invalid holdings for {}: {}", ticker, message)
            }
            Diagnostic::WeightSum { etf, total } => {
                warn!("Total weight for {} seems invalid: {}", etf, total)
            }
            Diagnostic::UnidentifiedRow {
                etf,
                account,
                amount,
            } => error!(
                "Unidentifiable holding from {} ({}), amount {}",
                etf, account, amount
            ),
        }
    }
}
