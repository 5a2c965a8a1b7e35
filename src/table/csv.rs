//! CSV (de)serialization for `Table`.
//!
//! The header row carries the column names. Reading needs to be told which
//! columns hold numbers, since a CSV file carries no types of its own;
//! everything else is read as text. A table written by `write_csv` reads
//! back identically through `read_csv` with the same numeric column list.

use std::io::{Read, Write};
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use super::{ColumnType, Schema, SchemaError, Table, Value};

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("csv read/write failed: {0}")]
    Csv(#[from] ::csv::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("column '{column}' has non-numeric value '{value}'")]
    BadNumber { column: String, value: String },
}

/// Serialize a table: header row of column names, one record per row.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<(), CsvError> {
    let mut out = ::csv::Writer::from_writer(writer);
    out.write_record(table.schema().names())?;
    for row in table.rows() {
        let record: Vec<String> = table
            .schema()
            .names()
            .map(|name| row.get(name).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        out.write_record(&record)?;
    }
    out.flush().map_err(::csv::Error::from)?;
    Ok(())
}

/// Read a table back. Columns named in `numeric` are declared `Number` and
/// their cells parsed as decimals; all other columns are `Text`.
pub fn read_csv<R: Read>(reader: R, numeric: &[&str]) -> Result<Table, CsvError> {
    let mut input = ::csv::Reader::from_reader(reader);
    let headers = input.headers()?.clone();

    let schema = Schema::new(
        headers
            .iter()
            .map(|name| {
                let ty = if numeric.contains(&name) {
                    ColumnType::Number
                } else {
                    ColumnType::Text
                };
                (name.to_string(), ty)
            })
            .collect(),
    )?;

    let mut rows = Vec::new();
    for record in input.records() {
        let record = record?;
        let mut cells = Vec::with_capacity(schema.len());
        for (name, field) in headers.iter().zip(record.iter()) {
            let cell = match schema.column_type(name) {
                Some(ColumnType::Number) => {
                    let parsed =
                        Decimal::from_str(field.trim()).map_err(|_| CsvError::BadNumber {
                            column: name.to_string(),
                            value: field.to_string(),
                        })?;
                    Value::number(parsed)
                }
                _ => Value::text(field),
            };
            cells.push(cell);
        }
        rows.push(cells);
    }

    Ok(Table::new(schema, rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_trip() {
        let schema = Schema::new(vec![
            ("ticker", ColumnType::Text),
            ("fraction", ColumnType::Number),
        ])
        .unwrap();
        let table = Table::new(
            schema,
            vec![
                vec![Value::text("VTI"), Value::number(dec!(0.6))],
                vec![Value::text("BND"), Value::number(dec!(0.4))],
            ],
        )
        .unwrap();

        let mut buffer = Vec::new();
        write_csv(&table, &mut buffer).unwrap();
        let back = read_csv(buffer.as_slice(), &["fraction"]).unwrap();

        assert_eq!(back.columns(), table.columns());
        assert_eq!(back.len(), table.len());
        for (a, b) in back.rows().zip(table.rows()) {
            assert_eq!(a.get("ticker"), b.get("ticker"));
            assert_eq!(a.number("fraction"), b.number("fraction"));
        }
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let input = "ticker,fraction\nVTI,not-a-number\n";
        let err = read_csv(input.as_bytes(), &["fraction"]).unwrap_err();
        assert!(matches!(err, CsvError::BadNumber { .. }));
    }

    #[test]
    fn test_unlisted_columns_read_as_text() {
        let input = "ticker,note\nVTI,123\n";
        let table = read_csv(input.as_bytes(), &["fraction"]).unwrap();
        let row = table.rows().next().unwrap();
        assert_eq!(row.text("note"), Some("123"));
    }
}
