//! Typed tracker records
//!
//! - [`Coldhead`] - cold head assembly, identified by serial number
//! - [`Displacer`] - displacer assembly, identified by serial number
//! - [`Wip`] - work-in-progress lot binding one coldhead and one displacer
//! - [`TestAttempt`] - one test run of a WIP
//!
//! Each record splits into its identity and a `*Data` change-set whose
//! `fields()` lists only the columns that are set. The same change-set is
//! used for inserts and for partial updates.

pub mod coldhead;
pub mod displacer;
pub mod test_attempt;
pub mod wip;

pub use coldhead::{Coldhead, ColdheadData};
pub use displacer::{Displacer, DisplacerData};
pub use test_attempt::{TestAttempt, TestData};
pub use wip::{Wip, WipData, WipState};

use chrono::NaiveDate;
use rusqlite::types::Value;

use crate::core::error::{StoreError, StoreResult};
use crate::core::row::Row;
use crate::core::store::Fields;

/// Date format used for every date column
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn push_text(fields: &mut Fields, column: &str, value: &Option<String>) {
    if let Some(v) = value {
        fields.push((column.to_string(), Value::Text(v.clone())));
    }
}

pub(crate) fn push_date(fields: &mut Fields, column: &str, value: &Option<NaiveDate>) {
    if let Some(v) = value {
        fields.push((
            column.to_string(),
            Value::Text(v.format(DATE_FORMAT).to_string()),
        ));
    }
}

pub(crate) fn push_int(fields: &mut Fields, column: &str, value: &Option<i64>) {
    if let Some(v) = value {
        fields.push((column.to_string(), Value::Integer(*v)));
    }
}

pub(crate) fn push_real(fields: &mut Fields, column: &str, value: &Option<f64>) {
    if let Some(v) = value {
        fields.push((column.to_string(), Value::Real(*v)));
    }
}

pub(crate) fn push_bool(fields: &mut Fields, column: &str, value: &Option<bool>) {
    if let Some(v) = value {
        fields.push((column.to_string(), Value::Integer(i64::from(*v))));
    }
}

/// Identity column that must be present in a stored row
pub(crate) fn required_str(row: &Row, column: &str) -> StoreResult<String> {
    row.get_str(column)
        .ok_or_else(|| StoreError::invalid(format!("row is missing required column '{}'", column)))
}

/// Parse a `YYYY-MM-DD` date argument
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| format!("Invalid date '{}'. Use YYYY-MM-DD", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-02-29"), Ok(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(parse_date("02/29/2024").is_err());
    }

    #[test]
    fn test_push_helpers_skip_unset_values() {
        let mut fields = Fields::new();
        push_text(&mut fields, "status", &None);
        push_bool(&mut fields, "is_active", &Some(false));
        push_date(&mut fields, "arrival_date", &NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(
            fields,
            vec![
                ("is_active".to_string(), Value::Integer(0)),
                ("arrival_date".to_string(), Value::Text("2024-01-05".into())),
            ]
        );
    }
}
