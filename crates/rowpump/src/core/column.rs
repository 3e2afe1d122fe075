//! Column metadata and the abstract type vocabulary.
//!
//! These types describe columns independently of any driver's native types.
//! Native type names only appear as the opaque `native_type` carried along
//! for diagnostics.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The closed type vocabulary used for inference and DDL synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbstractType {
    String,
    Text,
    Integer,
    Decimal,
    Bool,
    Datetime,
    Date,
    Timestamp,
    Unknown,
}

impl AbstractType {
    /// The key used in `general_type_map` lookups.
    pub fn as_key(&self) -> &'static str {
        match self {
            AbstractType::String => "string",
            AbstractType::Text => "text",
            AbstractType::Integer => "integer",
            AbstractType::Decimal => "decimal",
            AbstractType::Bool => "bool",
            AbstractType::Datetime => "datetime",
            AbstractType::Date => "date",
            AbstractType::Timestamp => "timestamp",
            AbstractType::Unknown => "unknown",
        }
    }

    /// Parse a `native_type_map` value back into the vocabulary.
    pub fn from_key(key: &str) -> AbstractType {
        match key {
            "string" => AbstractType::String,
            "text" => AbstractType::Text,
            "integer" => AbstractType::Integer,
            "decimal" => AbstractType::Decimal,
            "bool" => AbstractType::Bool,
            "datetime" => AbstractType::Datetime,
            "date" => AbstractType::Date,
            "timestamp" => AbstractType::Timestamp,
            _ => AbstractType::Unknown,
        }
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            AbstractType::Datetime | AbstractType::Date | AbstractType::Timestamp
        )
    }
}

impl std::fmt::Display for AbstractType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_key())
    }
}

/// Per-column sampling statistics accumulated during inference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnStats {
    pub min_len: usize,
    pub max_len: usize,
    /// Longest observed digit run after the decimal point.
    pub max_dec_len: usize,
    pub min: i64,
    pub max: i64,
    pub null_cnt: u64,
    pub int_cnt: u64,
    pub dec_cnt: u64,
    pub bool_cnt: u64,
    pub string_cnt: u64,
    pub date_cnt: u64,
    pub total_cnt: u64,
}

/// A column of a stream or dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// 1-based ordinal position.
    pub position: usize,
    pub name: String,
    pub typ: AbstractType,
    pub stats: ColumnStats,
    /// Driver-reported type name, kept for diagnostics only.
    pub native_type: Option<String>,
}

impl Column {
    pub fn new(position: usize, name: impl Into<String>) -> Self {
        Column {
            position,
            name: name.into(),
            typ: AbstractType::Unknown,
            stats: ColumnStats::default(),
            native_type: None,
        }
    }

    pub fn with_type(mut self, typ: AbstractType) -> Self {
        self.typ = typ;
        self
    }

    /// Build untyped columns from a list of field names.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Vec<Column> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Column::new(i + 1, n.as_ref()))
            .collect()
    }
}

/// A table (or view) entry inside [`Schemata`].
#[derive(Debug, Clone, Default)]
pub struct TableInfo {
    pub name: String,
    pub full_name: String,
    pub is_view: bool,
    pub columns: Vec<Column>,
    /// Lookup by lowercased column name.
    pub columns_map: HashMap<String, usize>,
}

impl TableInfo {
    pub fn push_column(&mut self, column: Column) {
        self.columns_map
            .insert(column.name.to_lowercase(), self.columns.len());
        self.columns.push(column);
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns_map
            .get(&name.to_lowercase())
            .map(|i| &self.columns[*i])
    }
}

/// One schema's tables, keyed by lowercased table name.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub name: String,
    pub tables: HashMap<String, TableInfo>,
}

/// All schema metadata introspected over one connection.
#[derive(Debug, Clone, Default)]
pub struct Schemata {
    /// Keyed by lowercased schema name.
    pub schemas: HashMap<String, Schema>,
    /// All tables by lowercased `schema.table`.
    pub tables: HashMap<String, TableInfo>,
}

/// Split a qualified `schema.table` name, lowercasing both parts.
/// An unqualified name yields an empty schema.
pub fn split_table_name(full: &str) -> (String, String) {
    match full.split_once('.') {
        Some((schema, table)) => (schema.to_lowercase(), table.to_lowercase()),
        None => (String::new(), full.to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abstract_type_keys() {
        assert_eq!(AbstractType::Integer.as_key(), "integer");
        assert_eq!(AbstractType::from_key("decimal"), AbstractType::Decimal);
        assert_eq!(AbstractType::from_key("geometry"), AbstractType::Unknown);
    }

    #[test]
    fn test_split_table_name() {
        assert_eq!(
            split_table_name("Public.My_Table"),
            ("public".to_string(), "my_table".to_string())
        );
        assert_eq!(
            split_table_name("solo"),
            (String::new(), "solo".to_string())
        );
    }

    #[test]
    fn test_table_info_case_insensitive_lookup() {
        let mut table = TableInfo {
            name: "place".to_string(),
            full_name: "public.place".to_string(),
            ..Default::default()
        };
        table.push_column(Column::new(1, "Country"));
        assert!(table.column("country").is_some());
        assert!(table.column("COUNTRY").is_some());
        assert!(table.column("city").is_none());
    }
}
