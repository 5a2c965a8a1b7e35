//! Holdings-table contract: the schema every issuer parser must produce,
//! plus column fixup and weight normalization.
//!
//! A raw holdings table carries a `fraction` weight and `asstype` class per
//! constituent, and at least one of the identifier columns. Identifier
//! columns are listed in priority order; aggregation keys on the first
//! non-empty one.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::table::{ColumnType, SchemaError, Table, Value};

/// Identifier columns, in aggregation-priority order.
pub const ID_COLUMNS: [&str; 5] = ["name", "ticker", "sedol", "isin", "cusip"];

/// Column order of a per-position holdings table once provenance is attached.
pub const CANONICAL_COLUMNS: [&str; 9] = [
    "etf", "account", "fraction", "asstype", "name", "ticker", "sedol", "isin", "cusip",
];

/// Weight sums outside this band trigger a data-quality warning.
const WEIGHT_SUM_LOW: Decimal = Decimal::from_parts(98, 0, 0, false, 2);
const WEIGHT_SUM_HIGH: Decimal = Decimal::from_parts(102, 0, 0, false, 2);

#[derive(Debug, Error)]
pub enum HoldingsError {
    #[error("unexpected columns: {}", .0.join(", "))]
    UnexpectedColumns(Vec<String>),

    #[error("required columns missing: {}", .0.join(", "))]
    MissingRequired(Vec<String>),

    #[error("no identifier columns present")]
    NoIdentifierColumns,

    #[error("invalid asset type '{0}'")]
    InvalidAssetType(String),

    #[error("non-numeric fraction value '{0}'")]
    NonNumericFraction(String),

    #[error("holdings weights sum to {0}, cannot rescale")]
    BadWeightTotal(Decimal),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Asset class of a constituent holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
    Equity,
    FixedIncome,
    ShortTerm,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Equity => "Equity",
            AssetType::FixedIncome => "FixedIncome",
            AssetType::ShortTerm => "ShortTerm",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = HoldingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Equity" => Ok(AssetType::Equity),
            "FixedIncome" => Ok(AssetType::FixedIncome),
            "ShortTerm" => Ok(AssetType::ShortTerm),
            other => Err(HoldingsError::InvalidAssetType(other.to_string())),
        }
    }
}

/// Non-fatal signal that a table's raw weights were off before rescaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightSumWarning {
    pub total: Decimal,
}

/// Validate a raw holdings table against the contract: only known columns,
/// `asstype` and `fraction` present, at least one identifier column, every
/// asset type a known class, every fraction numeric.
pub fn check_holdings(holdings: &Table) -> Result<(), HoldingsError> {
    let actual: BTreeSet<&str> = holdings.schema().names().collect();

    let mut allowed: BTreeSet<&str> = ID_COLUMNS.into_iter().collect();
    allowed.insert("asstype");
    allowed.insert("fraction");

    let extra: Vec<String> = actual
        .difference(&allowed)
        .map(|s| s.to_string())
        .collect();
    if !extra.is_empty() {
        return Err(HoldingsError::UnexpectedColumns(extra));
    }

    let missing: Vec<String> = ["asstype", "fraction"]
        .into_iter()
        .filter(|name| !actual.contains(name))
        .map(String::from)
        .collect();
    if !missing.is_empty() {
        return Err(HoldingsError::MissingRequired(missing));
    }

    if !ID_COLUMNS.iter().any(|name| actual.contains(name)) {
        return Err(HoldingsError::NoIdentifierColumns);
    }

    for value in holdings.values("asstype")? {
        match value.as_text() {
            Some(text) => {
                AssetType::from_str(text)?;
            }
            None => return Err(HoldingsError::InvalidAssetType(value.to_string())),
        }
    }

    for value in holdings.values("fraction")? {
        if value.as_number().is_none() {
            return Err(HoldingsError::NonNumericFraction(value.to_string()));
        }
    }

    Ok(())
}

/// Add every absent identifier column, populated with empty text, so that
/// tables from heterogeneous issuers share one schema before concatenation.
/// Idempotent.
pub fn add_missing_columns(table: &Table) -> Result<Table, SchemaError> {
    let mut fixed = table.clone();
    for column in ID_COLUMNS {
        if fixed.schema().index_of(column).is_none() {
            fixed = fixed.create(column, ColumnType::Text, |_| Value::text(""))?;
        }
    }
    Ok(fixed)
}

/// Rescale the `fraction` column so it sums to exactly one. Issuer files
/// routinely omit cash sleeves or round imprecisely; a sum outside the
/// (0.98, 1.02) band is reported as a warning but still rescaled, keeping
/// downstream dollar totals reconciled to the parent position.
pub fn normalize(table: &Table) -> Result<(Table, Option<WeightSumWarning>), HoldingsError> {
    let mut total = Decimal::ZERO;
    for value in table.values("fraction")? {
        total += value
            .as_number()
            .ok_or_else(|| HoldingsError::NonNumericFraction(value.to_string()))?;
    }

    if total <= Decimal::ZERO {
        return Err(HoldingsError::BadWeightTotal(total));
    }

    let warning = if total <= WEIGHT_SUM_LOW || total >= WEIGHT_SUM_HIGH {
        Some(WeightSumWarning { total })
    } else {
        None
    };

    let scale = Decimal::ONE / total;
    let rescaled = table.map("fraction", |value| {
        Value::number(value.as_number().unwrap_or_default() * scale)
    })?;

    Ok((rescaled, warning))
}
