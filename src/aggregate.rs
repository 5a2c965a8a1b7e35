//! Aggregation of the full holdings table into one consolidated table.
//!
//! Rows group on a composite identity: the first non-empty identifier
//! column in priority order (`name`, `ticker`, `sedol`, `isin`, `cusip`).
//! Groups are further partitioned by asset class so a data error never
//! merges, say, a bond sleeve into an equity line. Dollar amounts sum per
//! partition and the result sorts by descending amount, which is what makes
//! the cumulative-threshold report truncation work.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::holdings::ID_COLUMNS;
use crate::pipeline::Diagnostic;
use crate::table::{ColumnType, Schema, SchemaError, Table, Value};

/// Consolidated holdings plus the rows that could not be keyed.
pub struct Aggregate {
    /// Columns `name`, `asstype`, `amount`, sorted by descending amount.
    pub table: Table,
    /// One [`Diagnostic::UnidentifiedRow`] per row whose identifier columns
    /// were all empty. Such rows are excluded from every group, never
    /// silently merged.
    pub diagnostics: Vec<Diagnostic>,
}

/// Group the full table by (identity, asset class) and sum amounts.
pub fn group(full: &Table) -> Result<Aggregate, SchemaError> {
    // Consult only the identifier columns this table actually carries;
    // issuer tables are sparse across identifiers.
    let id_columns: Vec<&str> = ID_COLUMNS
        .into_iter()
        .filter(|name| full.schema().index_of(name).is_some())
        .collect();

    for required in ["asstype", "amount"] {
        if full.schema().index_of(required).is_none() {
            return Err(SchemaError::UnknownColumn(required.to_string()));
        }
    }

    let mut order: Vec<(String, String)> = Vec::new();
    let mut sums: HashMap<(String, String), Decimal> = HashMap::new();
    let mut diagnostics = Vec::new();

    for row in full.rows() {
        let amount = row.number("amount").unwrap_or_default();
        let identity = id_columns
            .iter()
            .find_map(|&name| row.text(name).filter(|text| !text.is_empty()));
        let Some(identity) = identity else {
            diagnostics.push(Diagnostic::UnidentifiedRow {
                etf: row.text("etf").unwrap_or_default().to_string(),
                account: row.text("account").unwrap_or_default().to_string(),
                amount,
            });
            continue;
        };
        let asstype = row.text("asstype").unwrap_or_default();

        let key = (identity.to_string(), asstype.to_string());
        if !sums.contains_key(&key) {
            order.push(key.clone());
        }
        *sums.entry(key).or_insert(Decimal::ZERO) += amount;
    }

    // First-seen order, then a stable descending sort on summed amount.
    let mut grouped: Vec<((String, String), Decimal)> = order
        .into_iter()
        .map(|key| {
            let amount = sums[&key];
            (key, amount)
        })
        .collect();
    grouped.sort_by(|(_, a), (_, b)| b.cmp(a));

    let schema = Schema::new(vec![
        ("name", ColumnType::Text),
        ("asstype", ColumnType::Text),
        ("amount", ColumnType::Number),
    ])?;
    let rows = grouped
        .into_iter()
        .map(|((identity, asstype), amount)| {
            vec![
                Value::text(identity),
                Value::text(asstype),
                Value::number(amount),
            ]
        })
        .collect();

    Ok(Aggregate {
        table: Table::new(schema, rows)?,
        diagnostics,
    })
}

/// How many leading rows to show so that everything past them is the tail:
/// the count of rows whose running cumulative amount stays strictly below
/// `total * tail`.
pub fn cumulative_head(aggregated: &Table, tail: Decimal) -> Result<usize, SchemaError> {
    let amounts: Vec<Decimal> = aggregated
        .values("amount")?
        .filter_map(Value::as_number)
        .collect();
    let total: Decimal = amounts.iter().copied().sum();
    let threshold = total * tail;

    let mut cumulative = Decimal::ZERO;
    let mut count = 0;
    for amount in amounts {
        cumulative += amount;
        if cumulative < threshold {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn full_table(rows: Vec<Vec<Value>>) -> Table {
        let schema = Schema::new(vec![
            ("etf", ColumnType::Text),
            ("account", ColumnType::Text),
            ("asstype", ColumnType::Text),
            ("name", ColumnType::Text),
            ("ticker", ColumnType::Text),
            ("amount", ColumnType::Number),
        ])
        .unwrap();
        Table::new(schema, rows).unwrap()
    }

    fn row(name: &str, ticker: &str, asstype: &str, amount: Decimal) -> Vec<Value> {
        vec![
            Value::text("FUND"),
            Value::text("Taxable"),
            Value::text(asstype),
            Value::text(name),
            Value::text(ticker),
            Value::number(amount),
        ]
    }

    #[test]
    fn test_same_identity_and_class_merge() {
        let table = full_table(vec![
            row("", "X", "Equity", dec!(100)),
            row("", "X", "Equity", dec!(50)),
        ]);
        let aggregate = group(&table).unwrap();
        assert_eq!(aggregate.table.len(), 1);
        let merged = aggregate.table.rows().next().unwrap();
        assert_eq!(merged.text("name"), Some("X"));
        assert_eq!(merged.text("asstype"), Some("Equity"));
        assert_eq!(merged.number("amount"), Some(dec!(150)));
    }

    #[test]
    fn test_no_merge_across_asset_classes() {
        let table = full_table(vec![
            row("", "X", "Equity", dec!(100)),
            row("", "X", "FixedIncome", dec!(50)),
        ]);
        let aggregate = group(&table).unwrap();
        assert_eq!(aggregate.table.len(), 2);
    }

    #[test]
    fn test_identity_priority_prefers_name_over_ticker() {
        let table = full_table(vec![
            row("Apple Inc", "AAPL", "Equity", dec!(100)),
            row("Apple Inc", "", "Equity", dec!(50)),
        ]);
        let aggregate = group(&table).unwrap();
        // Both rows key on the name; the differing ticker does not split them.
        assert_eq!(aggregate.table.len(), 1);
        assert_eq!(
            aggregate.table.rows().next().unwrap().number("amount"),
            Some(dec!(150))
        );
    }

    #[test]
    fn test_unidentified_rows_surface_and_are_excluded() {
        let table = full_table(vec![
            row("", "", "Equity", dec!(25)),
            row("", "X", "Equity", dec!(100)),
        ]);
        let aggregate = group(&table).unwrap();
        assert_eq!(aggregate.table.len(), 1);
        assert_eq!(
            aggregate.diagnostics,
            vec![Diagnostic::UnidentifiedRow {
                etf: "FUND".to_string(),
                account: "Taxable".to_string(),
                amount: dec!(25),
            }]
        );
    }

    #[test]
    fn test_sorted_by_descending_amount() {
        let table = full_table(vec![
            row("", "SMALL", "Equity", dec!(10)),
            row("", "BIG", "Equity", dec!(1000)),
            row("", "MID", "Equity", dec!(100)),
        ]);
        let aggregate = group(&table).unwrap();
        let names: Vec<&str> = aggregate
            .table
            .rows()
            .map(|r| r.text("name").unwrap())
            .collect();
        assert_eq!(names, vec!["BIG", "MID", "SMALL"]);
    }

    #[test]
    fn test_cumulative_head_threshold_rule() {
        // Amounts 500/300/150/50 with tail 0.98: cumulative sums 500, 800,
        // 950 stay under 980, the fourth row reaches 1000 and is cut.
        let table = full_table(vec![
            row("", "A", "Equity", dec!(500)),
            row("", "B", "Equity", dec!(300)),
            row("", "C", "Equity", dec!(150)),
            row("", "D", "Equity", dec!(50)),
        ]);
        let aggregate = group(&table).unwrap();
        assert_eq!(
            cumulative_head(&aggregate.table, dec!(0.98)).unwrap(),
            3
        );
    }

    #[test]
    fn test_empty_table_aggregates_to_empty() {
        let table = full_table(vec![]);
        let aggregate = group(&table).unwrap();
        assert!(aggregate.table.is_empty());
        assert_eq!(cumulative_head(&aggregate.table, dec!(0.98)).unwrap(), 0);
    }
}
