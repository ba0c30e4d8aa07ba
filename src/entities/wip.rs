//! WIP (work-in-progress lot) record and its lifecycle

use chrono::NaiveDate;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::core::error::StoreResult;
use crate::core::row::Row;
use crate::core::store::Fields;
use crate::entities::{push_bool, push_date, push_text, required_str};

/// Mutable WIP columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WipData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coldhead_serial_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displacer_serial_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teardown_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl WipData {
    pub fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        push_text(&mut fields, "coldhead_serial_number", &self.coldhead_serial_number);
        push_text(&mut fields, "displacer_serial_number", &self.displacer_serial_number);
        push_date(&mut fields, "arrival_date", &self.arrival_date);
        push_date(&mut fields, "teardown_date", &self.teardown_date);
        push_text(&mut fields, "status", &self.status);
        push_bool(&mut fields, "is_active", &self.is_active);
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

/// A work-in-progress lot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wip {
    pub wip_number: String,

    #[serde(flatten)]
    pub data: WipData,
}

impl Wip {
    pub fn new(wip_number: impl Into<String>) -> Self {
        Self {
            wip_number: wip_number.into(),
            data: WipData::default(),
        }
    }

    pub fn fields(&self) -> Fields {
        let mut fields = vec![(
            "wip_number".to_string(),
            Value::Text(self.wip_number.clone()),
        )];
        fields.extend(self.data.fields());
        fields
    }

    pub fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            wip_number: required_str(row, "wip_number")?,
            data: WipData {
                coldhead_serial_number: row.get_str("coldhead_serial_number"),
                displacer_serial_number: row.get_str("displacer_serial_number"),
                arrival_date: row.get_date("arrival_date"),
                teardown_date: row.get_date("teardown_date"),
                status: row.get_str("status"),
                is_active: row.get_bool("is_active"),
            },
        })
    }

    pub fn is_active(&self) -> bool {
        self.data.is_active.unwrap_or(true)
    }

    pub fn state(&self) -> WipState {
        WipState::of(self)
    }
}

/// Where a stored WIP sits in its lifecycle
///
/// `Inactive -> Assigned -> Bound -> TornDown`. Status text stays editable in
/// every state; only a teardown date is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WipState {
    /// Retired placeholder waiting to be reused
    Inactive,
    /// Number handed out, no coldhead or displacer bound yet
    Assigned,
    /// Real serial data is bound
    Bound,
    /// Teardown recorded
    TornDown,
}

impl WipState {
    pub fn of(wip: &Wip) -> Self {
        let data = &wip.data;
        if data.teardown_date.is_some() {
            WipState::TornDown
        } else if data.coldhead_serial_number.is_some() || data.displacer_serial_number.is_some() {
            WipState::Bound
        } else if !wip.is_active() {
            WipState::Inactive
        } else {
            WipState::Assigned
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WipState::TornDown)
    }
}

impl std::fmt::Display for WipState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WipState::Inactive => write!(f, "inactive"),
            WipState::Assigned => write!(f, "assigned"),
            WipState::Bound => write!(f, "bound"),
            WipState::TornDown => write!(f, "torn_down"),
        }
    }
}
