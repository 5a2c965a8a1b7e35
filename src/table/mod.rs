//! Small relational table used throughout the collection pipeline.
//!
//! A `Table` is an ordered set of named, typed columns plus an ordered list
//! of rows. Every transformation returns a new `Table`; the pipeline reuses
//! raw tables across several derived operations, so nothing mutates in
//! place. Declared column types are advisory for cell contents but drive
//! CSV (de)serialization.

use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

pub mod csv;

pub use self::csv::{read_csv, write_csv, CsvError};

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("column '{0}' already exists")]
    DuplicateColumn(String),

    #[error("row has {found} cells, schema has {expected} columns")]
    Arity { expected: usize, found: usize },

    #[error("schemas do not match: [{expected}] vs [{found}]")]
    Mismatch { expected: String, found: String },

    #[error("cannot concatenate zero tables")]
    EmptyConcat,
}

/// Declared element type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Number,
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(Decimal),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn number(d: Decimal) -> Self {
        Value::Number(d)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Number(d) => Some(*d),
            Value::Text(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Number(d) => write!(f, "{}", d),
        }
    }
}

/// Ordered list of unique column names with declared types.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    columns: Vec<(String, ColumnType)>,
}

impl Schema {
    pub fn new<S: Into<String>>(columns: Vec<(S, ColumnType)>) -> Result<Self, SchemaError> {
        let columns: Vec<(String, ColumnType)> = columns
            .into_iter()
            .map(|(name, ty)| (name.into(), ty))
            .collect();
        for (i, (name, _)) in columns.iter().enumerate() {
            if columns[..i].iter().any(|(other, _)| other == name) {
                return Err(SchemaError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Schema { columns })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(other, _)| other == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(other, _)| other == name)
            .map(|(_, ty)| *ty)
    }

    fn describe(&self) -> String {
        self.names().collect::<Vec<_>>().join(", ")
    }
}

/// Borrowed view of one row, with by-name cell access.
#[derive(Clone, Copy)]
pub struct Row<'a> {
    schema: &'a Schema,
    cells: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.schema.index_of(name).map(|i| &self.cells[i])
    }

    pub fn text(&self, name: &str) -> Option<&'a str> {
        self.get(name).and_then(Value::as_text)
    }

    pub fn number(&self, name: &str) -> Option<Decimal> {
        self.get(name).and_then(Value::as_number)
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    schema: Schema,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Result<Self, SchemaError> {
        for row in &rows {
            if row.len() != schema.len() {
                return Err(SchemaError::Arity {
                    expected: schema.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Table { schema, rows })
    }

    pub fn empty(schema: Schema) -> Self {
        Table {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn columns(&self) -> Vec<&str> {
        self.schema.names().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |cells| Row {
            schema: &self.schema,
            cells,
        })
    }

    /// Append a column computed per row. Fails if the name is taken.
    pub fn create(
        &self,
        name: &str,
        ty: ColumnType,
        f: impl Fn(Row<'_>) -> Value,
    ) -> Result<Table, SchemaError> {
        if self.schema.index_of(name).is_some() {
            return Err(SchemaError::DuplicateColumn(name.to_string()));
        }
        let mut columns = self.schema.columns.clone();
        columns.push((name.to_string(), ty));
        let rows = self
            .rows()
            .map(|row| {
                let mut cells = row.cells.to_vec();
                cells.push(f(row));
                cells
            })
            .collect();
        Ok(Table {
            schema: Schema { columns },
            rows,
        })
    }

    /// Drop the named columns. All of them must exist.
    pub fn delete(&self, names: &[&str]) -> Result<Table, SchemaError> {
        for name in names {
            if self.schema.index_of(name).is_none() {
                return Err(SchemaError::UnknownColumn(name.to_string()));
            }
        }
        let keep: Vec<usize> = (0..self.schema.len())
            .filter(|&i| !names.contains(&self.schema.columns[i].0.as_str()))
            .collect();
        self.project(&keep)
    }

    /// Restrict and reorder to exactly the named columns.
    pub fn select(&self, names: &[&str]) -> Result<Table, SchemaError> {
        let indices = names
            .iter()
            .map(|name| {
                self.schema
                    .index_of(name)
                    .ok_or_else(|| SchemaError::UnknownColumn(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.project(&indices)
    }

    fn project(&self, indices: &[usize]) -> Result<Table, SchemaError> {
        let schema = Schema::new(
            indices
                .iter()
                .map(|&i| {
                    let (name, ty) = &self.schema.columns[i];
                    (name.clone(), *ty)
                })
                .collect(),
        )?;
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(Table { schema, rows })
    }

    /// Replace one column's values. The declared type stays as-is; cell
    /// contents are whatever `f` returns.
    pub fn map(&self, name: &str, f: impl Fn(&Value) -> Value) -> Result<Table, SchemaError> {
        let index = self
            .schema
            .index_of(name)
            .ok_or_else(|| SchemaError::UnknownColumn(name.to_string()))?;
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut cells = row.clone();
                cells[index] = f(&cells[index]);
                cells
            })
            .collect();
        Ok(Table {
            schema: self.schema.clone(),
            rows,
        })
    }

    /// Stable ascending sort by a derived key.
    pub fn order_by<K: Ord>(&self, key: impl Fn(Row<'_>) -> K) -> Table {
        let mut keyed: Vec<(K, &Vec<Value>)> = self
            .rows
            .iter()
            .map(|cells| {
                (
                    key(Row {
                        schema: &self.schema,
                        cells,
                    }),
                    cells,
                )
            })
            .collect();
        keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
        Table {
            schema: self.schema.clone(),
            rows: keyed.into_iter().map(|(_, cells)| cells.clone()).collect(),
        }
    }

    /// First `n` rows (or all of them, if fewer).
    pub fn head(&self, n: usize) -> Table {
        Table {
            schema: self.schema.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// The column's values in row order.
    pub fn values<'a>(
        &'a self,
        name: &str,
    ) -> Result<impl Iterator<Item = &'a Value> + 'a, SchemaError> {
        let index = self
            .schema
            .index_of(name)
            .ok_or_else(|| SchemaError::UnknownColumn(name.to_string()))?;
        Ok(self.rows.iter().map(move |row| &row[index]))
    }

    /// Concatenate tables sharing the first table's exact schema (names,
    /// order, and declared types). Any deviation is a hard error; callers
    /// are expected to fix columns up explicitly beforehand.
    pub fn concat<'a>(tables: impl IntoIterator<Item = &'a Table>) -> Result<Table, SchemaError> {
        let mut iter = tables.into_iter();
        let first = iter.next().ok_or(SchemaError::EmptyConcat)?;
        let mut rows = first.rows.clone();
        for table in iter {
            if table.schema != first.schema {
                return Err(SchemaError::Mismatch {
                    expected: first.schema.describe(),
                    found: table.schema.describe(),
                });
            }
            rows.extend(table.rows.iter().cloned());
        }
        Ok(Table {
            schema: first.schema.clone(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> Table {
        let schema = Schema::new(vec![
            ("ticker", ColumnType::Text),
            ("amount", ColumnType::Number),
        ])
        .unwrap();
        Table::new(
            schema,
            vec![
                vec![Value::text("AAA"), Value::number(dec!(10))],
                vec![Value::text("BBB"), Value::number(dec!(5))],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_select_all_columns_is_identity() {
        let table = sample();
        let selected = table.select(&["ticker", "amount"]).unwrap();
        assert_eq!(selected.columns(), table.columns());
        assert_eq!(selected.len(), table.len());
        for (a, b) in selected.rows().zip(table.rows()) {
            assert_eq!(a.get("ticker"), b.get("ticker"));
            assert_eq!(a.get("amount"), b.get("amount"));
        }
    }

    #[test]
    fn test_select_reorders_and_restricts() {
        let table = sample();
        let selected = table.select(&["amount"]).unwrap();
        assert_eq!(selected.columns(), vec!["amount"]);
        assert!(matches!(
            table.select(&["missing"]),
            Err(SchemaError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_create_and_delete() {
        let table = sample();
        let doubled = table
            .create("double", ColumnType::Number, |row| {
                Value::number(row.number("amount").unwrap_or_default() * dec!(2))
            })
            .unwrap();
        assert_eq!(
            doubled.rows().next().unwrap().number("double"),
            Some(dec!(20))
        );

        assert!(matches!(
            doubled.create("double", ColumnType::Number, |_| Value::text("")),
            Err(SchemaError::DuplicateColumn(_))
        ));

        let trimmed = doubled.delete(&["double"]).unwrap();
        assert_eq!(trimmed.columns(), vec!["ticker", "amount"]);
        assert!(matches!(
            trimmed.delete(&["double"]),
            Err(SchemaError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_map_replaces_values() {
        let table = sample();
        let scaled = table
            .map("amount", |v| {
                Value::number(v.as_number().unwrap_or_default() * dec!(3))
            })
            .unwrap();
        let amounts: Vec<Decimal> = scaled
            .values("amount")
            .unwrap()
            .filter_map(Value::as_number)
            .collect();
        assert_eq!(amounts, vec![dec!(30), dec!(15)]);
    }

    #[test]
    fn test_order_by_is_stable_ascending() {
        let schema = Schema::new(vec![
            ("ticker", ColumnType::Text),
            ("amount", ColumnType::Number),
        ])
        .unwrap();
        let table = Table::new(
            schema,
            vec![
                vec![Value::text("C"), Value::number(dec!(2))],
                vec![Value::text("A"), Value::number(dec!(1))],
                vec![Value::text("B"), Value::number(dec!(1))],
            ],
        )
        .unwrap();
        let ordered = table.order_by(|row| row.number("amount").unwrap_or_default());
        let tickers: Vec<&str> = ordered
            .rows()
            .map(|row| row.text("ticker").unwrap())
            .collect();
        // Equal keys keep their original relative order.
        assert_eq!(tickers, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_concat_same_schema_doubles_rows() {
        let table = sample();
        let both = Table::concat([&table, &table]).unwrap();
        assert_eq!(both.len(), 2 * table.len());
        assert_eq!(both.columns(), table.columns());
    }

    #[test]
    fn test_concat_schema_mismatch_fails() {
        let table = sample();
        let other = table.select(&["ticker"]).unwrap();
        assert!(matches!(
            Table::concat([&table, &other]),
            Err(SchemaError::Mismatch { .. })
        ));
        assert!(matches!(
            Table::concat(std::iter::empty::<&Table>()),
            Err(SchemaError::EmptyConcat)
        ));
    }

    #[test]
    fn test_head_truncates() {
        let table = sample();
        assert_eq!(table.head(1).len(), 1);
        assert_eq!(table.head(10).len(), 2);
    }

    #[test]
    fn test_row_arity_enforced() {
        let schema = Schema::new(vec![("a", ColumnType::Text)]).unwrap();
        assert!(matches!(
            Table::new(schema, vec![vec![Value::text("x"), Value::text("y")]]),
            Err(SchemaError::Arity { .. })
        ));
    }

    #[test]
    fn test_duplicate_column_names_rejected() {
        assert!(matches!(
            Schema::new(vec![("a", ColumnType::Text), ("a", ColumnType::Text)]),
            Err(SchemaError::DuplicateColumn(_))
        ));
    }
}
