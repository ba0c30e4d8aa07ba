//! Error taxonomy for the data-access layer
//!
//! Every storage failure is classified into one of the variants below before
//! it leaves the core. The CLI renders them through miette.

use miette::Diagnostic;
use rusqlite::types::Value;
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the store and the components built on it
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    /// A declared mapping or configuration value does not match reality
    #[error("configuration error: {0}")]
    #[diagnostic(
        code(reptracker::store::configuration),
        help("check the column mappings in reptracker.yaml against the database schema")
    )]
    Configuration(String),

    /// Any other failure reported by SQLite
    #[error("database error during {context}: {source}")]
    #[diagnostic(code(reptracker::store::database))]
    Database {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A unique constraint rejected the write
    #[error("duplicate entry for '{field}': '{value}'")]
    #[diagnostic(
        code(reptracker::store::duplicate_entry),
        help("serial numbers and WIP numbers must be unique")
    )]
    DuplicateEntry { field: String, value: String },

    /// An update was requested with nothing to set
    #[error("no data provided for updating table '{table}'")]
    #[diagnostic(code(reptracker::store::empty_update))]
    EmptyUpdate { table: String },

    /// Input references something that does not exist or is malformed
    #[error("invalid data: {0}")]
    #[diagnostic(code(reptracker::store::invalid_data))]
    InvalidData(String),
}

impl StoreError {
    /// Wrap a raw SQLite error with the operation it interrupted
    pub fn database(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Database {
            context: context.into(),
            source,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }

    /// Classify a SQLite error raised while writing `data`
    ///
    /// Unique violations become [`StoreError::DuplicateEntry`] with the field
    /// name parsed from the driver message ("UNIQUE constraint failed:
    /// table.column") and its value looked up in `data`. Foreign key
    /// violations become [`StoreError::InvalidData`].
    pub fn from_write(
        context: impl Into<String>,
        source: rusqlite::Error,
        data: &[(String, Value)],
    ) -> Self {
        let constraint = match &source {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Some(msg.clone().unwrap_or_default())
            }
            _ => None,
        };
        let Some(message) = constraint else {
            return Self::database(context, source);
        };

        if message.contains("UNIQUE constraint failed")
            || message.contains("PRIMARY KEY constraint failed")
        {
            let field = parse_constraint_field(&message);
            let value = field
                .as_deref()
                .and_then(|f| data.iter().find(|(col, _)| col == f))
                .map(|(_, v)| value_to_string(v))
                .unwrap_or_else(|| "Unknown".to_string());
            return Self::DuplicateEntry {
                field: field.unwrap_or_else(|| "Unknown".to_string()),
                value,
            };
        }

        if message.contains("FOREIGN KEY constraint failed") {
            return Self::InvalidData(format!(
                "{}: referenced row does not exist",
                context.into()
            ));
        }

        Self::database(context, source)
    }

    /// Check if this is a duplicate entry error
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateEntry { .. })
    }

    /// Check if this is an invalid data error
    pub fn is_invalid_data(&self) -> bool {
        matches!(self, Self::InvalidData(_))
    }
}

/// Extract the first column named in a constraint message
///
/// "UNIQUE constraint failed: tests.wip_number, tests.displacer_serial_number"
/// yields `wip_number`.
fn parse_constraint_field(message: &str) -> Option<String> {
    let (_, columns) = message.split_once(':')?;
    let first = columns.split(',').next()?.trim();
    let column = first.split_once('.').map(|(_, c)| c).unwrap_or(first);
    if column.is_empty() {
        None
    } else {
        Some(column.to_string())
    }
}

/// Render a SQL value for error messages
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(_) => "<blob>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_failure(msg: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::ConstraintViolation,
                extended_code: 2067,
            },
            Some(msg.to_string()),
        )
    }

    #[test]
    fn test_parse_constraint_field() {
        assert_eq!(
            parse_constraint_field("UNIQUE constraint failed: coldheads.serial_number"),
            Some("serial_number".to_string())
        );
        assert_eq!(
            parse_constraint_field(
                "UNIQUE constraint failed: tests.wip_number, tests.displacer_serial_number"
            ),
            Some("wip_number".to_string())
        );
        assert_eq!(parse_constraint_field("constraint failed"), None);
    }

    #[test]
    fn test_duplicate_entry_carries_field_and_value() {
        let data = vec![("serial_number".to_string(), Value::Text("C1".into()))];
        let err = StoreError::from_write(
            "insert into coldheads",
            unique_failure("UNIQUE constraint failed: coldheads.serial_number"),
            &data,
        );
        match err {
            StoreError::DuplicateEntry { field, value } => {
                assert_eq!(field, "serial_number");
                assert_eq!(value, "C1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_entry_falls_back_to_unknown() {
        let err = StoreError::from_write(
            "insert into coldheads",
            unique_failure("UNIQUE constraint failed"),
            &[],
        );
        match err {
            StoreError::DuplicateEntry { field, value } => {
                assert_eq!(field, "Unknown");
                assert_eq!(value, "Unknown");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_foreign_key_failure_is_invalid_data() {
        let err = StoreError::from_write(
            "insert into tests",
            unique_failure("FOREIGN KEY constraint failed"),
            &[],
        );
        assert!(err.is_invalid_data());
    }

    #[test]
    fn test_non_constraint_errors_are_database_errors() {
        let err = StoreError::from_write("insert", rusqlite::Error::InvalidQuery, &[]);
        assert!(matches!(err, StoreError::Database { .. }));
    }
}
