//! Finite row materializations and sample-based type inference.

use std::collections::HashMap;
use std::time::Duration;

use crate::core::column::{AbstractType, Column};
use crate::core::value::{parse_string, textual, Row, Value};

/// How many rows of a sample the inferencer examines.
pub const DEFAULT_SAMPLE_SIZE: usize = 1000;

/// A fully materialized query result or stream prelude.
///
/// Only the inferencer and introspection queries materialize datasets;
/// transfers stay streaming end to end.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    pub sql: Option<String>,
    pub duration: Option<Duration>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Dataset {
            columns,
            rows,
            sql: None,
            duration: None,
        }
    }

    /// Lowercased column names in declaration order.
    pub fn fields(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| c.name.to_lowercase())
            .collect()
    }

    /// Row-as-map view keyed by lowercased column name.
    pub fn records(&self) -> Vec<HashMap<String, Value>> {
        let fields = self.fields();
        self.rows
            .iter()
            .map(|row| {
                fields
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<HashMap<_, _>>()
            })
            .collect()
    }

    /// Infer each column's abstract type from the first
    /// [`DEFAULT_SAMPLE_SIZE`] rows. Idempotent: statistics are rebuilt
    /// from scratch on every call. An empty dataset keeps whatever types
    /// the columns already carry.
    pub fn infer_column_types(&mut self) {
        self.infer_column_types_with(DEFAULT_SAMPLE_SIZE)
    }

    pub fn infer_column_types_with(&mut self, sample_size: usize) {
        if self.rows.is_empty() {
            return;
        }

        let mut columns: Vec<Column> = self
            .fields()
            .iter()
            .enumerate()
            .map(|(i, name)| Column::new(i + 1, name).with_type(AbstractType::String))
            .collect();

        for row in self.rows.iter().take(sample_size) {
            for (j, cell) in row.iter().enumerate() {
                let Some(col) = columns.get_mut(j) else {
                    continue;
                };
                let stats = &mut col.stats;
                stats.total_cnt += 1;

                match parse_string(&textual(cell)) {
                    Value::Null => stats.null_cnt += 1,
                    Value::Timestamp(_) => stats.date_cnt += 1,
                    Value::Int(v) => {
                        stats.int_cnt += 1;
                        stats.max = stats.max.max(v);
                        stats.min = stats.min.min(v);
                    }
                    Value::Float(v) => {
                        stats.dec_cnt += 1;
                        stats.max = stats.max.max(v as i64);
                        stats.min = stats.min.min(v as i64);
                        let text = v.to_string();
                        if let Some((_, frac)) = text.split_once('.') {
                            stats.max_dec_len = stats.max_dec_len.max(frac.len());
                        }
                    }
                    Value::Bool(_) => stats.bool_cnt += 1,
                    Value::Text(s) => {
                        stats.string_cnt += 1;
                        stats.max_len = stats.max_len.max(s.len());
                        stats.min_len = stats.min_len.min(s.len());
                    }
                }
            }
        }

        for col in &mut columns {
            let s = &col.stats;
            // A single string observation pins the column to text; the
            // remaining rules only apply to homogeneous samples.
            col.typ = if s.string_cnt > 0 || s.null_cnt == s.total_cnt {
                if s.max_len > 255 {
                    AbstractType::Text
                } else {
                    AbstractType::String
                }
            } else if s.bool_cnt + s.null_cnt == s.total_cnt {
                AbstractType::Bool
            } else if s.int_cnt + s.null_cnt == s.total_cnt {
                AbstractType::Integer
            } else if s.date_cnt + s.null_cnt == s.total_cnt {
                AbstractType::Datetime
            } else if s.dec_cnt + s.null_cnt == s.total_cnt {
                AbstractType::Decimal
            } else {
                AbstractType::String
            };
        }

        self.columns = columns;
    }

    /// Write the dataset to a CSV file at `path`.
    pub fn write_csv(&self, path: &std::path::Path) -> crate::error::Result<u64> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        let mut count = 0u64;
        for row in &self.rows {
            wtr.write_record(row.iter().map(textual))?;
            count += 1;
        }
        wtr.flush()?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn dataset(names: &[&str], rows: Vec<Row>) -> Dataset {
        Dataset::new(Column::from_names(names), rows)
    }

    #[test]
    fn test_infer_mixed_shapes() {
        let mut data = dataset(
            &["name", "age", "weight", "joined", "flag"],
            vec![
                vec![
                    text("ana"),
                    text("31"),
                    text("61.5"),
                    text("2019-06-09 00:00:00"),
                    text("true"),
                ],
                vec![
                    text("bob"),
                    text("40"),
                    text("80.0"),
                    text("2020-01-01"),
                    text("false"),
                ],
            ],
        );
        data.infer_column_types();

        let types: Vec<AbstractType> = data.columns.iter().map(|c| c.typ).collect();
        assert_eq!(
            types,
            vec![
                AbstractType::String,
                AbstractType::Integer,
                AbstractType::Decimal,
                AbstractType::Datetime,
                // booleans are never parsed from text
                AbstractType::String,
            ]
        );
    }

    #[test]
    fn test_infer_null_only_column_is_string() {
        let mut data = dataset(
            &["a"],
            vec![vec![Value::Null], vec![text("")], vec![Value::Null]],
        );
        data.infer_column_types();
        assert_eq!(data.columns[0].typ, AbstractType::String);
    }

    #[test]
    fn test_infer_long_strings_become_text() {
        let long = "x".repeat(300);
        let mut data = dataset(&["a"], vec![vec![text(&long)]]);
        data.infer_column_types();
        assert_eq!(data.columns[0].typ, AbstractType::Text);
        assert_eq!(data.columns[0].stats.max_len, 300);
    }

    #[test]
    fn test_infer_nullable_integer() {
        let mut data = dataset(&["a"], vec![vec![text("5")], vec![Value::Null]]);
        data.infer_column_types();
        assert_eq!(data.columns[0].typ, AbstractType::Integer);
        assert_eq!(data.columns[0].stats.max, 5);
    }

    #[test]
    fn test_infer_is_idempotent() {
        let mut data = dataset(
            &["a", "b"],
            vec![vec![text("1"), text("x")], vec![text("2"), text("y")]],
        );
        data.infer_column_types();
        let first = data.columns.clone();
        data.infer_column_types();
        assert_eq!(data.columns, first);
    }

    #[test]
    fn test_infer_empty_dataset_keeps_columns() {
        let mut data = dataset(&["a"], vec![]);
        data.columns[0].typ = AbstractType::Integer;
        data.infer_column_types();
        assert_eq!(data.columns[0].typ, AbstractType::Integer);
    }

    #[test]
    fn test_records() {
        let data = dataset(&["Name"], vec![vec![text("ana")]]);
        let recs = data.records();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].get("name"), Some(&text("ana")));
    }

    #[test]
    fn test_decimal_scale_tracked() {
        let mut data = dataset(&["a"], vec![vec![text("1.125")], vec![text("2.5")]]);
        data.infer_column_types();
        assert_eq!(data.columns[0].typ, AbstractType::Decimal);
        assert_eq!(data.columns[0].stats.max_dec_len, 3);
    }
}
