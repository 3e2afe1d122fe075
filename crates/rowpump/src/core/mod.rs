//! Database-agnostic value, column and dataset types.

pub mod column;
pub mod dataset;
pub mod value;

pub use column::{split_table_name, AbstractType, Column, ColumnStats, Schema, Schemata, TableInfo};
pub use dataset::{Dataset, DEFAULT_SAMPLE_SIZE};
pub use value::{cast_val, coerce_bytes, coerce_decimal, parse_string, textual, Row, Value};
