//! Schema catalog
//!
//! Optional knowledge about tables: semantic column types and row counts.
//! Used for unqualified column resolution, coercion checks and scoring.
//! Without a catalog the analyzer falls back to column naming conventions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Coarse type of a column as far as comparisons are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Integer,
    Numeric,
    Text,
    Boolean,
    Temporal,
}

impl SemanticType {
    /// Maps a declared SQL column type using SQLite-style affinity rules
    pub fn from_declared(declared: &str) -> Option<Self> {
        let upper = declared.to_ascii_uppercase();
        if upper.is_empty() {
            return None;
        }
        if upper.contains("BOOL") {
            Some(Self::Boolean)
        } else if upper.contains("DATE") || upper.contains("TIME") {
            Some(Self::Temporal)
        } else if upper.contains("INT") {
            Some(Self::Integer)
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Some(Self::Text)
        } else if upper.contains("REAL")
            || upper.contains("FLOA")
            || upper.contains("DOUB")
            || upper.contains("NUMERIC")
            || upper.contains("DECIMAL")
        {
            Some(Self::Numeric)
        } else {
            None
        }
    }

    /// Guess from a column name; only confident conventions are recognised
    pub fn infer_from_name(column: &str) -> Option<Self> {
        let name = column.to_ascii_lowercase();
        if name == "id" || name.ends_with("_id") {
            Some(Self::Integer)
        } else if name.ends_with("_at") || name.ends_with("_date") || name == "date" {
            Some(Self::Temporal)
        } else if name.starts_with("is_") || name.starts_with("has_") {
            Some(Self::Boolean)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Numeric => "numeric",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Temporal => "temporal",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Numeric)
    }
}

/// One table of the catalog
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    #[serde(default)]
    pub columns: IndexMap<String, SemanticType>,
    #[serde(default)]
    pub row_count: Option<u64>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, ty: SemanticType) -> Self {
        self.columns
            .insert(name.into().to_ascii_lowercase(), ty);
        self
    }

    pub fn with_row_count(mut self, rows: u64) -> Self {
        self.row_count = Some(rows);
        self
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(&column.to_ascii_lowercase())
    }

    pub fn column_type(&self, column: &str) -> Option<SemanticType> {
        self.columns.get(&column.to_ascii_lowercase()).copied()
    }
}

/// Tables keyed by lower-cased name
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaCatalog {
    #[serde(default)]
    tables: IndexMap<String, TableSchema>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.insert(table);
        self
    }

    pub fn insert(&mut self, table: TableSchema) {
        self.tables.insert(table.name.to_ascii_lowercase(), table);
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(&name.to_ascii_lowercase())
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn row_count(&self, table: &str) -> Option<u64> {
        self.table(table).and_then(|t| t.row_count)
    }

    /// Declared type of `table.column`, if the catalog knows it
    pub fn column_type(&self, table: &str, column: &str) -> Option<SemanticType> {
        self.table(table).and_then(|t| t.column_type(column))
    }
}

#[cfg(test)]
mod tests;
