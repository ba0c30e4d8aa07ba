//! Folding joined rows into per-WIP records
//!
//! A WIP-rooted left join repeats the WIP, coldhead and displacer columns once
//! per test. [`SearchResults::from_rows`] collapses those rows back into one
//! [`WipRecord`] per WIP number with its tests nested in row order.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::core::row::Row;

/// One test attempt nested under its WIP
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRecord {
    pub test_id: i64,
    pub pass_fail: Option<String>,
    pub notes: Option<String>,
    pub mode: Option<String>,
    pub turns: Option<i64>,
    pub first_stage_heaters: Option<f64>,
    pub second_stage_heater: Option<f64>,
    pub first_stage_temp: Option<f64>,
    pub second_stage_temp: Option<f64>,
    pub efficiency1: Option<f64>,
    pub efficiency2: Option<f64>,
    pub test_attempt: Option<i64>,
    pub test_date: Option<NaiveDate>,
}

impl TestRecord {
    /// `None` when the row carries no test (null `test_id`)
    pub fn from_row(row: &Row) -> Option<Self> {
        let test_id = row.get_i64("test_id")?;
        Some(Self {
            test_id,
            pass_fail: row.get_str("pass_fail"),
            notes: row.get_str("test_notes"),
            mode: row.get_str("mode"),
            turns: row.get_i64("turns"),
            first_stage_heaters: row.get_f64("first_stage_heaters"),
            second_stage_heater: row.get_f64("second_stage_heater"),
            first_stage_temp: row.get_f64("first_stage_temp"),
            second_stage_temp: row.get_f64("second_stage_temp"),
            efficiency1: row.get_f64("efficiency1"),
            efficiency2: row.get_f64("efficiency2"),
            test_attempt: row.get_i64("test_attempt"),
            test_date: row.get_date("test_date"),
        })
    }
}

/// A WIP with its joined coldhead/displacer fields and all of its tests
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WipRecord {
    pub wip_number: String,
    pub coldhead_id: Option<i64>,
    pub coldhead_serial_number: Option<String>,
    pub displacer_serial_number: Option<String>,
    pub arrival_date: Option<NaiveDate>,
    pub teardown_date: Option<NaiveDate>,
    pub wip_status: Option<String>,
    pub is_active: bool,
    pub displacer_status: Option<String>,
    pub displacer_notes: Option<String>,
    pub initial_open_date: Option<NaiveDate>,
    pub tests: Vec<TestRecord>,
}

impl WipRecord {
    fn from_row(wip_number: String, row: &Row) -> Self {
        Self {
            wip_number,
            coldhead_id: row.get_i64("coldhead_id"),
            coldhead_serial_number: row.get_str("coldhead_serial_number"),
            displacer_serial_number: row.get_str("displacer_serial_number"),
            arrival_date: row.get_date("arrival_date"),
            teardown_date: row.get_date("teardown_date"),
            wip_status: row.get_str("wip_status"),
            is_active: row.get_bool("wip_is_active").unwrap_or(true),
            displacer_status: row.get_str("displacer_status"),
            displacer_notes: row.get_str("displacer_notes"),
            initial_open_date: row.get_date("initial_open_date"),
            tests: Vec::new(),
        }
    }
}

/// Aggregated search output keyed by WIP number, in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    records: Vec<WipRecord>,
    index: HashMap<String, usize>,
}

impl SearchResults {
    /// Fold flat joined rows into one record per WIP number
    ///
    /// WIP-level fields come from the first row seen for that WIP; later rows
    /// only contribute tests.
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a Row>,
    {
        let mut results = Self::default();
        for row in rows {
            let Some(wip_number) = row.get_str("wip_number") else {
                warn!("Skipping joined row without a wip_number");
                continue;
            };

            let idx = match results.index.get(&wip_number) {
                Some(idx) => *idx,
                None => {
                    let idx = results.records.len();
                    results
                        .records
                        .push(WipRecord::from_row(wip_number.clone(), row));
                    results.index.insert(wip_number, idx);
                    idx
                }
            };

            if let Some(test) = TestRecord::from_row(row) {
                results.records[idx].tests.push(test);
            }
        }
        results
    }

    pub fn get(&self, wip_number: &str) -> Option<&WipRecord> {
        self.index.get(wip_number).map(|idx| &self.records[*idx])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WipRecord> {
        self.records.iter()
    }

    /// WIP numbers in first-seen order
    pub fn wip_numbers(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.wip_number.as_str())
    }
}

impl Serialize for SearchResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for record in &self.records {
            map.serialize_entry(&record.wip_number, record)?;
        }
        map.end()
    }
}
