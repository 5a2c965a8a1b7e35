//! Generic parser for issuers whose downloads are already plain CSV in the
//! holdings-contract shape: a `fraction` column, an `asstype` column, and
//! one or more identifier columns.

use crate::table::{read_csv, Table};

use super::{IssuerParser, ParseError};

pub struct CsvFileParser;

impl IssuerParser for CsvFileParser {
    fn parse(&self, content: &str) -> Result<Table, ParseError> {
        Ok(read_csv(content.as_bytes(), &["fraction"])?)
    }
}
