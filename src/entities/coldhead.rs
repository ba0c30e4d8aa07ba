//! Coldhead record

use serde::{Deserialize, Serialize};

use crate::core::error::StoreResult;
use crate::core::row::Row;
use crate::core::store::Fields;
use crate::entities::{push_int, push_text, required_str};
use rusqlite::types::Value;

/// Mutable coldhead columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColdheadData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ColdheadData {
    pub fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        push_text(&mut fields, "status", &self.status);
        push_text(&mut fields, "notes", &self.notes);
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

/// A coldhead assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coldhead {
    /// Surrogate key; assigned by the database when not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coldhead_id: Option<i64>,

    pub serial_number: String,

    #[serde(flatten)]
    pub data: ColdheadData,
}

impl Coldhead {
    pub fn new(serial_number: impl Into<String>) -> Self {
        Self {
            coldhead_id: None,
            serial_number: serial_number.into(),
            data: ColdheadData::default(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.data.status = Some(status.into());
        self
    }

    /// Columns for an INSERT or upsert
    pub fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        push_int(&mut fields, "coldhead_id", &self.coldhead_id);
        fields.push((
            "serial_number".to_string(),
            Value::Text(self.serial_number.clone()),
        ));
        fields.extend(self.data.fields());
        fields
    }

    pub fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            coldhead_id: row.get_i64("coldhead_id"),
            serial_number: required_str(row, "serial_number")?,
            data: ColdheadData {
                status: row.get_str("status"),
                notes: row.get_str("notes"),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_skip_unset_columns() {
        let coldhead = Coldhead::new("C1").with_status("Active");
        assert_eq!(
            coldhead.fields(),
            vec![
                ("serial_number".to_string(), Value::Text("C1".into())),
                ("status".to_string(), Value::Text("Active".into())),
            ]
        );
    }

    #[test]
    fn test_yaml_shape_is_flat() {
        let coldhead: Coldhead =
            serde_yml::from_str("serial_number: C7\nstatus: Received\nnotes: dented\n").unwrap();
        assert_eq!(coldhead.serial_number, "C7");
        assert_eq!(coldhead.data.status.as_deref(), Some("Received"));
        assert_eq!(coldhead.data.notes.as_deref(), Some("dented"));
        assert_eq!(coldhead.coldhead_id, None);
    }
}
