//! Collection pipeline: resolve each portfolio position into a holdings
//! table, convert weights to dollar amounts, and concatenate everything
//! into one full table.
//!
//! Row-level problems (unknown issuer, missing download, bad file) never
//! abort the batch; they surface as [`Diagnostic`] events on the returned
//! [`Collection`] and the run simply under-reports those positions. The
//! caller decides how to render them.

use std::fs;
use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::holdings::{self, AssetType, CANONICAL_COLUMNS};
use crate::issuers::IssuerRegistry;
use crate::positions::Position;
use crate::store::{HoldingsStore, StoreError};
use crate::table::{ColumnType, Schema, SchemaError, Table, Value};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to read holdings file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Structured event describing a row-level problem or data-quality signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// No parser registered for the position's issuer; position skipped.
    MissingIssuer { issuer: String, ticker: String },

    /// No downloaded file found for the ticker; position skipped.
    MissingFile { ticker: String },

    /// The downloaded file would not parse; position skipped.
    ParseFailure {
        issuer: String,
        ticker: String,
        message: String,
    },

    /// The parsed table violated the holdings contract; position skipped.
    InvalidHoldings { ticker: String, message: String },

    /// Raw weights summed well away from 1.0 before rescaling.
    WeightSum { etf: String, total: Decimal },

    /// A holdings row reached aggregation with every identifier empty.
    UnidentifiedRow {
        etf: String,
        account: String,
        amount: Decimal,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CollectOptions {
    /// Skip positions with a negative unit count entirely.
    pub ignore_shorts: bool,
}

/// Result of a collection run: the full per-fund-holding table plus every
/// diagnostic gathered along the way.
pub struct Collection {
    pub table: Table,
    pub diagnostics: Vec<Diagnostic>,
    /// Sum of the `amount` column, for cross-checking against the expected
    /// portfolio value.
    pub total: Decimal,
}

/// Schema of the full table: canonical holdings columns with provenance,
/// `fraction` replaced by `amount`.
fn full_table_schema() -> Result<Schema, SchemaError> {
    let mut columns: Vec<(&str, ColumnType)> = CANONICAL_COLUMNS
        .into_iter()
        .filter(|name| *name != "fraction")
        .map(|name| (name, ColumnType::Text))
        .collect();
    columns.push(("amount", ColumnType::Number));
    Schema::new(columns)
}

/// Run the pipeline over all positions, in ascending (issuer, ticker) order.
pub fn collect(
    positions: &[Position],
    registry: &IssuerRegistry,
    store: &HoldingsStore,
    options: CollectOptions,
) -> Result<Collection, PipelineError> {
    let mut ordered: Vec<&Position> = positions.iter().collect();
    ordered.sort_by(|a, b| {
        (a.issuer.as_deref(), a.ticker.as_str()).cmp(&(b.issuer.as_deref(), b.ticker.as_str()))
    });

    let mut diagnostics = Vec::new();
    let mut tables = Vec::new();

    for position in ordered {
        if position.number < Decimal::ZERO && options.ignore_shorts {
            continue;
        }
        match resolve_position(position, registry, store, &mut diagnostics)? {
            Some(table) => tables.push(table),
            None => continue,
        }
    }

    let table = if tables.is_empty() {
        Table::empty(full_table_schema()?)
    } else {
        Table::concat(tables.iter())?
    };

    let total = table
        .values("amount")?
        .filter_map(Value::as_number)
        .sum::<Decimal>();

    Ok(Collection {
        table,
        diagnostics,
        total,
    })
}

/// One position's holdings, with provenance attached and weights converted
/// to dollar amounts. `None` means the position was skipped (soft error,
/// recorded in `diagnostics`).
fn resolve_position(
    position: &Position,
    registry: &IssuerRegistry,
    store: &HoldingsStore,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Option<Table>, PipelineError> {
    let holdings = match &position.issuer {
        // Direct holding, no look-through: the position is its own single
        // constituent.
        None => Table::new(
            Schema::new(vec![
                ("fraction", ColumnType::Number),
                ("asstype", ColumnType::Text),
                ("ticker", ColumnType::Text),
            ])?,
            vec![vec![
                Value::number(Decimal::ONE),
                Value::text(AssetType::Equity.as_str()),
                Value::text(&position.ticker),
            ]],
        )?,
        Some(issuer) => {
            let Some(parser) = registry.get(issuer) else {
                diagnostics.push(Diagnostic::MissingIssuer {
                    issuer: issuer.clone(),
                    ticker: position.ticker.clone(),
                });
                return Ok(None);
            };
            let Some(path) = store.latest_file_for(&position.ticker)? else {
                diagnostics.push(Diagnostic::MissingFile {
                    ticker: position.ticker.clone(),
                });
                return Ok(None);
            };
            debug!("Parsing {} with issuer '{}'", path.display(), issuer);
            let content = fs::read_to_string(&path).map_err(|source| PipelineError::ReadFile {
                path: path.clone(),
                source,
            })?;
            let parsed = match parser.parse(&content) {
                Ok(table) => table,
                Err(err) => {
                    diagnostics.push(Diagnostic::ParseFailure {
                        issuer: issuer.clone(),
                        ticker: position.ticker.clone(),
                        message: err.to_string(),
                    });
                    return Ok(None);
                }
            };
            match validate_and_normalize(parsed, position, diagnostics) {
                Some(table) => table,
                None => return Ok(None),
            }
        }
    };

    let holdings = holdings::add_missing_columns(&holdings)?;
    let holdings = holdings.create("etf", ColumnType::Text, |_| Value::text(&position.ticker))?;
    let holdings = holdings.create("account", ColumnType::Text, |_| {
        Value::text(&position.account)
    })?;
    let holdings = holdings.select(&CANONICAL_COLUMNS)?;

    // Convert the weight fraction to a dollar amount against the parent
    // position's market value, then drop the fraction.
    let dollar_amount = position.number * position.price;
    let holdings = holdings.create("amount", ColumnType::Number, |row| {
        Value::number(row.number("fraction").unwrap_or_default() * dollar_amount)
    })?;
    let holdings = holdings.delete(&["fraction"])?;

    Ok(Some(holdings))
}

fn validate_and_normalize(
    parsed: Table,
    position: &Position,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Table> {
    if let Err(err) = holdings::check_holdings(&parsed) {
        diagnostics.push(Diagnostic::InvalidHoldings {
            ticker: position.ticker.clone(),
            message: err.to_string(),
        });
        return None;
    }
    match holdings::normalize(&parsed) {
        Ok((table, warning)) => {
            if let Some(warning) = warning {
                diagnostics.push(Diagnostic::WeightSum {
                    etf: position.ticker.clone(),
                    total: warning.total,
                });
            }
            Some(table)
        }
        Err(err) => {
            diagnostics.push(Diagnostic::InvalidHoldings {
                ticker: position.ticker.clone(),
                message: err.to_string(),
            });
            None
        }
    }
}
