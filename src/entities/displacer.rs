//! Displacer record

use chrono::NaiveDate;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::core::error::StoreResult;
use crate::core::row::Row;
use crate::core::store::Fields;
use crate::entities::{push_bool, push_date, push_text, required_str};

/// Mutable displacer columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplacerData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_open_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl DisplacerData {
    pub fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        push_text(&mut fields, "status", &self.status);
        push_text(&mut fields, "notes", &self.notes);
        push_date(&mut fields, "initial_open_date", &self.initial_open_date);
        push_bool(&mut fields, "is_active", &self.is_active);
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

/// A displacer assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Displacer {
    pub displacer_serial_number: String,

    #[serde(flatten)]
    pub data: DisplacerData,
}

impl Displacer {
    pub fn new(serial_number: impl Into<String>) -> Self {
        Self {
            displacer_serial_number: serial_number.into(),
            data: DisplacerData::default(),
        }
    }

    pub fn fields(&self) -> Fields {
        let mut fields = vec![(
            "displacer_serial_number".to_string(),
            Value::Text(self.displacer_serial_number.clone()),
        )];
        fields.extend(self.data.fields());
        fields
    }

    pub fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            displacer_serial_number: required_str(row, "displacer_serial_number")?,
            data: DisplacerData {
                status: row.get_str("status"),
                notes: row.get_str("notes"),
                initial_open_date: row.get_date("initial_open_date"),
                is_active: row.get_bool("is_active"),
            },
        })
    }

    pub fn is_placeholder(&self) -> bool {
        self.data.status.as_deref() == Some(crate::core::placeholder::PLACEHOLDER_STATUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_row() {
        let row = Row::from_pairs([
            ("displacer_serial_number", Value::Text("D4".into())),
            ("status", Value::Text("Placeholder".into())),
            ("notes", Value::Null),
            ("initial_open_date", Value::Text("2023-11-02".into())),
            ("is_active", Value::Integer(1)),
        ]);
        let displacer = Displacer::from_row(&row).unwrap();
        assert_eq!(displacer.displacer_serial_number, "D4");
        assert!(displacer.is_placeholder());
        assert_eq!(displacer.data.is_active, Some(true));
        assert_eq!(displacer.data.initial_open_date, NaiveDate::from_ymd_opt(2023, 11, 2));
    }

    #[test]
    fn test_missing_serial_is_invalid() {
        let row = Row::from_pairs([("status", Value::Text("Active".into()))]);
        assert!(Displacer::from_row(&row).unwrap_err().is_invalid_data());
    }
}
