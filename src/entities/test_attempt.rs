//! Test attempt record

use chrono::NaiveDate;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::core::error::{StoreError, StoreResult};
use crate::core::row::Row;
use crate::core::store::Fields;
use crate::entities::{push_date, push_int, push_real, push_text, required_str};

/// Everything about a test except its id and owning WIP
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestData {
    /// Defaults to the coldhead bound to the WIP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coldhead_serial_number: Option<String>,

    /// Defaults to the displacer bound to the WIP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displacer_serial_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_date: Option<NaiveDate>,

    /// Defaults to one past the highest attempt recorded for the WIP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_attempt: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_fail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turns: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_stage_heaters: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_stage_heater: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_stage_temp: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_stage_temp: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efficiency1: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efficiency2: Option<f64>,
}

impl TestData {
    pub fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        push_text(&mut fields, "coldhead_serial_number", &self.coldhead_serial_number);
        push_text(&mut fields, "displacer_serial_number", &self.displacer_serial_number);
        push_date(&mut fields, "test_date", &self.test_date);
        push_int(&mut fields, "test_attempt", &self.test_attempt);
        push_text(&mut fields, "pass_fail", &self.pass_fail);
        push_text(&mut fields, "notes", &self.notes);
        push_text(&mut fields, "mode", &self.mode);
        push_int(&mut fields, "turns", &self.turns);
        push_real(&mut fields, "first_stage_heaters", &self.first_stage_heaters);
        push_real(&mut fields, "second_stage_heater", &self.second_stage_heater);
        push_real(&mut fields, "first_stage_temp", &self.first_stage_temp);
        push_real(&mut fields, "second_stage_temp", &self.second_stage_temp);
        push_real(&mut fields, "efficiency1", &self.efficiency1);
        push_real(&mut fields, "efficiency2", &self.efficiency2);
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

/// A stored test attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestAttempt {
    pub test_id: i64,
    pub wip_number: String,

    #[serde(flatten)]
    pub data: TestData,
}

impl TestAttempt {
    /// Columns for inserting `data` under `wip_number`
    pub fn insert_fields(wip_number: &str, data: &TestData) -> Fields {
        let mut fields = vec![(
            "wip_number".to_string(),
            Value::Text(wip_number.to_string()),
        )];
        fields.extend(data.fields());
        fields
    }

    pub fn from_row(row: &Row) -> StoreResult<Self> {
        let test_id = row
            .get_i64("test_id")
            .ok_or_else(|| StoreError::invalid("row is missing required column 'test_id'"))?;
        Ok(Self {
            test_id,
            wip_number: required_str(row, "wip_number")?,
            data: TestData {
                coldhead_serial_number: row.get_str("coldhead_serial_number"),
                displacer_serial_number: row.get_str("displacer_serial_number"),
                test_date: row.get_date("test_date"),
                test_attempt: row.get_i64("test_attempt"),
                pass_fail: row.get_str("pass_fail"),
                notes: row.get_str("notes"),
                mode: row.get_str("mode"),
                turns: row.get_i64("turns"),
                first_stage_heaters: row.get_f64("first_stage_heaters"),
                second_stage_heater: row.get_f64("second_stage_heater"),
                first_stage_temp: row.get_f64("first_stage_temp"),
                second_stage_temp: row.get_f64("second_stage_temp"),
                efficiency1: row.get_f64("efficiency1"),
                efficiency2: row.get_f64("efficiency2"),
            },
        })
    }
}
