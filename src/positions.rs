//! Portfolio positions input: the rows that drive the collection pipeline.
//!
//! Positions come from a CSV export with `ticker`, `account`, `issuer`,
//! `price` and `number` columns (extras are ignored). A position with an
//! empty issuer is a direct holding rather than a fund; the pipeline
//! synthesizes a single-constituent table for it.

use std::io::Read;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::table::{read_csv, CsvError};

/// Columns the positions export must carry.
pub const REQUIRED_COLUMNS: [&str; 5] = ["ticker", "account", "issuer", "price", "number"];

#[derive(Debug, Error)]
pub enum PositionsError {
    #[error("positions file is missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("failed to read positions file")]
    Csv(#[from] CsvError),
}

/// One portfolio position. `number` is a signed unit count; shorts are
/// negative.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub ticker: String,
    pub account: String,
    pub issuer: Option<String>,
    pub price: Decimal,
    pub number: Decimal,
}

/// Load positions from a CSV export. The required-column check is fatal
/// before any processing begins. With `ignore_options` set, positions whose
/// ticker looks like an OCC-style option symbol are dropped.
pub fn load_positions<R: Read>(
    reader: R,
    ignore_options: bool,
) -> Result<Vec<Position>, PositionsError> {
    let table = read_csv(reader, &["price", "number"])?;

    let missing: Vec<String> = REQUIRED_COLUMNS
        .into_iter()
        .filter(|name| table.schema().index_of(name).is_none())
        .map(String::from)
        .collect();
    if !missing.is_empty() {
        return Err(PositionsError::MissingColumns(missing));
    }

    let mut positions = Vec::with_capacity(table.len());
    for row in table.rows() {
        let ticker = row.text("ticker").unwrap_or_default().to_string();
        if ignore_options && is_option_symbol(&ticker) {
            continue;
        }
        let issuer = match row.text("issuer").unwrap_or_default() {
            "" => None,
            name => Some(name.to_string()),
        };
        positions.push(Position {
            ticker,
            account: row.text("account").unwrap_or_default().to_string(),
            issuer,
            price: row.number("price").unwrap_or_default(),
            number: row.number("number").unwrap_or_default(),
        });
    }
    Ok(positions)
}

/// Compact OCC option symbol: root, six-digit expiry, C or P, eight-digit
/// strike. E.g. `SPY251219C00650000`.
pub fn is_option_symbol(ticker: &str) -> bool {
    if ticker.len() < 16 || !ticker.is_ascii() {
        return false;
    }
    let (root, tail) = ticker.split_at(ticker.len() - 15);
    let bytes = tail.as_bytes();
    root.chars().all(|c| c.is_ascii_alphanumeric())
        && bytes[..6].iter().all(u8::is_ascii_digit)
        && (bytes[6] == b'C' || bytes[6] == b'P')
        && bytes[7..].iter().all(u8::is_ascii_digit)
}
