//! Issuer parsers: turn a downloaded holdings file into a raw holdings table.
//!
//! Parsers are registered by issuer name in an [`IssuerRegistry`] built at
//! startup and handed to the pipeline as an explicit dependency. An
//! unregistered issuer is a soft miss: the pipeline skips that position and
//! reports a diagnostic.

use std::collections::HashMap;

use thiserror::Error;

use crate::table::{CsvError, Table};

pub mod csvfile;

pub use csvfile::CsvFileParser;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Csv(#[from] CsvError),

    #[error("malformed holdings file: {0}")]
    Malformed(String),
}

/// Parses one issuer's published holdings file format.
pub trait IssuerParser {
    fn parse(&self, content: &str) -> Result<Table, ParseError>;
}

/// Issuer name to parser mapping.
#[derive(Default)]
pub struct IssuerRegistry {
    parsers: HashMap<String, Box<dyn IssuerParser>>,
}

impl IssuerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, issuer: impl Into<String>, parser: Box<dyn IssuerParser>) {
        self.parsers.insert(issuer.into(), parser);
    }

    pub fn get(&self, issuer: &str) -> Option<&dyn IssuerParser> {
        self.parsers.get(issuer).map(Box::as_ref)
    }

    /// Registered issuer names, sorted for stable display.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Registry with every built-in parser registered.
pub fn default_registry() -> IssuerRegistry {
    let mut registry = IssuerRegistry::new();
    registry.register("csvfile", Box::new(CsvFileParser));
    registry
}
