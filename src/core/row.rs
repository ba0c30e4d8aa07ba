//! Owned result rows addressable by column name

use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::types::Value;

/// One row of a query result
///
/// Column names are shared between all rows of the same result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Build a row from `(column, value)` pairs
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) =
            pairs.into_iter().map(|(c, v)| (c.into(), v)).unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Raw value for a column; `None` if the column is not in the result
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// True when the column is absent or SQL NULL
    pub fn is_null(&self, column: &str) -> bool {
        matches!(self.get(column), None | Some(Value::Null))
    }

    pub fn get_str(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            Value::Text(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(f) => Some(f.to_string()),
            Value::Null | Value::Blob(_) => None,
        }
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            Value::Integer(i) => Some(*i),
            Value::Real(f) => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null | Value::Blob(_) => None,
        }
    }

    pub fn get_f64(&self, column: &str) -> Option<f64> {
        match self.get(column)? {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null | Value::Blob(_) => None,
        }
    }

    /// Integer flag column (0/1); anything non-zero is true
    pub fn get_bool(&self, column: &str) -> Option<bool> {
        self.get_i64(column).map(|v| v != 0)
    }

    /// ISO date column stored as text
    pub fn get_date(&self, column: &str) -> Option<NaiveDate> {
        self.get_str(column)
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let row = Row::from_pairs([
            ("wip_number", Value::Text("WIP3".into())),
            ("turns", Value::Integer(12)),
            ("efficiency1", Value::Real(0.5)),
            ("arrival_date", Value::Text("2024-03-01".into())),
            ("is_active", Value::Integer(0)),
            ("notes", Value::Null),
        ]);

        assert_eq!(row.get_str("wip_number").as_deref(), Some("WIP3"));
        assert_eq!(row.get_i64("turns"), Some(12));
        assert_eq!(row.get_f64("turns"), Some(12.0));
        assert_eq!(row.get_f64("efficiency1"), Some(0.5));
        assert_eq!(
            row.get_date("arrival_date"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(row.get_bool("is_active"), Some(false));
        assert!(row.is_null("notes"));
        assert!(row.is_null("missing"));
        assert_eq!(row.get_str("notes"), None);
    }
}
