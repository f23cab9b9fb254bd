use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

pub const PROBE_EXTENSION: &str = "ltree";
pub const PROBE_ID_UPPER_BOUND: i32 = 1000;

pub const ID_COLUMN: &str = "id";
pub const NAME_COLUMN: &str = "name";
pub const PATH_COLUMN: &str = "testLTree";

pub const PROBE_COLUMNS: [ColumnSpec; 3] = [
    ColumnSpec::new(ID_COLUMN, ColumnType::Increments),
    ColumnSpec::new(NAME_COLUMN, ColumnType::String),
    ColumnSpec::new(PATH_COLUMN, ColumnType::Custom(PROBE_EXTENSION)),
];

/// Quotes an SQL identifier, doubling any embedded quote.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn quoted(&self) -> String {
        quote_ident(&self.0)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Increments,
    String,
    /// A type provided by an extension, such as `ltree`.
    Custom(&'static str),
}

impl ColumnType {
    pub fn sql(&self) -> &'static str {
        match *self {
            Self::Increments => "serial primary key",
            Self::String => "varchar(255)",
            Self::Custom(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self { name, column_type }
    }

    /// Column definition for `CREATE TABLE`.
    pub fn definition(&self) -> String {
        format!("{} {}", quote_ident(self.name), self.column_type.sql())
    }

    /// Select-list entry. Extension types come back as text.
    pub fn projection(&self) -> String {
        let ident = quote_ident(self.name);
        match self.column_type {
            ColumnType::Custom(_) => format!("{ident}::text AS {ident}"),
            _ => ident,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRow {
    pub id: i32,
    pub name: String,
    #[serde(rename = "testLTree")]
    pub test_ltree: String,
}

impl ProbeRow {
    pub fn for_id(id: i32) -> Self {
        Self {
            id,
            name: format!("Name of {}", id),
            test_ltree: id.to_string(),
        }
    }
}

#[cfg_attr(test, automock)]
pub trait ProbeIdGenerator: Send + Sync {
    fn table_name(&self) -> TableName;
    fn row_id(&self) -> i32;
}

/// UUID v4 table names and row ids drawn from `[0, PROBE_ID_UPPER_BOUND)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomProbeIds;

impl ProbeIdGenerator for RandomProbeIds {
    fn table_name(&self) -> TableName {
        TableName::new(Uuid::new_v4().to_string())
    }

    fn row_id(&self) -> i32 {
        rand::thread_rng().gen_range(0..PROBE_ID_UPPER_BOUND)
    }
}
