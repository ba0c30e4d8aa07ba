//! WIP-rooted search across coldheads, displacers and tests

use rusqlite::types::Value;
use tracing::{debug, info};

use crate::core::aggregate::SearchResults;
use crate::core::error::StoreResult;
use crate::core::mapping::{SchemaMapper, Table};
use crate::core::query::SelectQuery;
use crate::core::store::Session;

/// Logical select list; aliases are the names [`SearchResults`] reads
const SEARCH_COLUMNS: &[&str] = &[
    "wips.wip_number",
    "coldheads.coldhead_id",
    "coldheads.serial_number AS coldhead_serial_number",
    "displacers.displacer_serial_number",
    "wips.arrival_date",
    "wips.teardown_date",
    "wips.status AS wip_status",
    "wips.is_active AS wip_is_active",
    "displacers.status AS displacer_status",
    "displacers.notes AS displacer_notes",
    "displacers.initial_open_date",
    "tests.test_id",
    "tests.pass_fail",
    "tests.notes AS test_notes",
    "tests.mode",
    "tests.turns",
    "tests.first_stage_heaters",
    "tests.second_stage_heater",
    "tests.first_stage_temp",
    "tests.second_stage_temp",
    "tests.efficiency1",
    "tests.efficiency2",
    "tests.test_attempt",
    "tests.test_date",
];

/// Optional filters for [`flexible_search`]; all given filters must match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    pub coldhead_serial: Option<String>,
    pub wip_number: Option<String>,
    pub displacer_serial: Option<String>,
    pub test_id: Option<i64>,
    /// Matches either the coldhead or the displacer serial
    pub serial_number: Option<String>,
    /// Include inactive placeholder WIPs
    pub include_inactive: bool,
}

impl SearchCriteria {
    pub fn wip(wip_number: impl Into<String>) -> Self {
        Self {
            wip_number: Some(wip_number.into()),
            ..Self::default()
        }
    }

    pub fn serial(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: Some(serial_number.into()),
            ..Self::default()
        }
    }
}

/// Map one select item and alias it back to the name [`SearchResults`] reads
fn select_item(mapper: &SchemaMapper, item: &str) -> String {
    let mapped = mapper.map(item);
    if item.contains(" AS ") {
        return mapped;
    }
    let logical = item.rsplit('.').next().unwrap_or(item);
    if mapped.ends_with(&format!(".{}", logical)) {
        mapped
    } else {
        format!("{} AS {}", mapped, logical)
    }
}

fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Build the mapped SELECT for `criteria`
pub fn search_query(session: &Session<'_>, criteria: &SearchCriteria) -> SelectQuery {
    let mapper = session.mapper();

    let mut query = SelectQuery::new(Table::Wips)
        .columns(SEARCH_COLUMNS.iter().map(|c| select_item(mapper, c)))
        .left_join(
            Table::Coldheads,
            &mapper.map("wips.coldhead_serial_number"),
            &mapper.map("coldheads.serial_number"),
        )
        .left_join(
            Table::Displacers,
            &mapper.map("wips.displacer_serial_number"),
            &mapper.map("displacers.displacer_serial_number"),
        )
        .left_join(
            Table::Tests,
            &mapper.map("wips.wip_number"),
            &mapper.map("tests.wip_number"),
        );

    if let Some(serial) = given(&criteria.coldhead_serial) {
        query = query.and_eq(mapper.map("coldheads.serial_number"), serial.to_string());
    }
    if let Some(wip) = given(&criteria.wip_number) {
        query = query.and_eq(mapper.map("wips.wip_number"), wip.to_string());
    }
    if let Some(serial) = given(&criteria.displacer_serial) {
        query = query.and_eq(mapper.map("displacers.displacer_serial_number"), serial.to_string());
    }
    if let Some(test_id) = criteria.test_id {
        query = query.and_eq(mapper.map("tests.test_id"), test_id);
    }
    if !criteria.include_inactive {
        query = query.and_eq(mapper.map("wips.is_active"), Value::Integer(1));
    }
    if let Some(serial) = given(&criteria.serial_number) {
        query = query
            .or_eq(mapper.map("coldheads.serial_number"), serial.to_string())
            .or_eq(mapper.map("displacers.displacer_serial_number"), serial.to_string());
    }

    query
        .order_by(mapper.map("wips.wip_number"))
        .order_by(mapper.map("tests.test_date"))
        .order_by(mapper.map("tests.test_id"))
}

/// Search WIPs and aggregate their tests
///
/// Inactive placeholder WIPs are left out unless `include_inactive` is set.
pub fn flexible_search(
    session: &Session<'_>,
    criteria: &SearchCriteria,
) -> StoreResult<SearchResults> {
    debug!("Starting flexible search with {:?}", criteria);
    let rows = session.fetch(&search_query(session, criteria))?;
    let results = SearchResults::from_rows(&rows);
    info!(
        "Flexible search returned {} WIP(s) from {} row(s)",
        results.len(),
        rows.len()
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mapping::MappingOverrides;
    use crate::core::store::{RepStore, DEFAULT_BUSY_TIMEOUT};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn seed(store: &mut RepStore) {
        store
            .with_transaction(|s| {
                s.insert(Table::Coldheads, &[("serial_number".into(), text("C1"))])?;
                s.insert(Table::Coldheads, &[("serial_number".into(), text("C2"))])?;
                s.insert(
                    Table::Displacers,
                    &[("displacer_serial_number".into(), text("D1"))],
                )?;
                s.insert(
                    Table::Wips,
                    &[
                        ("wip_number".into(), text("WIP1")),
                        ("coldhead_serial_number".into(), text("C1")),
                        ("displacer_serial_number".into(), text("D1")),
                    ],
                )?;
                s.insert(
                    Table::Wips,
                    &[
                        ("wip_number".into(), text("WIP2")),
                        ("coldhead_serial_number".into(), text("C2")),
                    ],
                )?;
                s.insert(
                    Table::Wips,
                    &[
                        ("wip_number".into(), text("WIP3")),
                        ("status".into(), text("Placeholder")),
                        ("is_active".into(), Value::Integer(0)),
                    ],
                )?;
                for attempt in 1..=2 {
                    s.insert(
                        Table::Tests,
                        &[
                            ("wip_number".into(), text("WIP1")),
                            ("displacer_serial_number".into(), text("D1")),
                            ("test_attempt".into(), Value::Integer(attempt)),
                            ("pass_fail".into(), text("Pass")),
                        ],
                    )?;
                }
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_search_without_filters_returns_active_wips() {
        let mut store = RepStore::open_in_memory().unwrap();
        seed(&mut store);
        let results = flexible_search(&store.session(), &SearchCriteria::default()).unwrap();
        assert_eq!(results.wip_numbers().collect::<Vec<_>>(), vec!["WIP1", "WIP2"]);
        assert_eq!(results.get("WIP1").unwrap().tests.len(), 2);
        assert!(results.get("WIP2").unwrap().tests.is_empty());
    }

    #[test]
    fn test_include_inactive_shows_placeholders() {
        let mut store = RepStore::open_in_memory().unwrap();
        seed(&mut store);
        let criteria = SearchCriteria {
            include_inactive: true,
            ..SearchCriteria::default()
        };
        let results = flexible_search(&store.session(), &criteria).unwrap();
        assert_eq!(results.len(), 3);
        assert!(!results.get("WIP3").unwrap().is_active);
    }

    #[test]
    fn test_serial_number_matches_coldhead_or_displacer() {
        let mut store = RepStore::open_in_memory().unwrap();
        seed(&mut store);
        let session = store.session();

        let by_displacer = flexible_search(&session, &SearchCriteria::serial("D1")).unwrap();
        assert_eq!(by_displacer.wip_numbers().collect::<Vec<_>>(), vec!["WIP1"]);

        let by_coldhead = flexible_search(&session, &SearchCriteria::serial("C2")).unwrap();
        assert_eq!(by_coldhead.wip_numbers().collect::<Vec<_>>(), vec!["WIP2"]);
    }

    #[test]
    fn test_and_filters_combine_with_or_group() {
        let mut store = RepStore::open_in_memory().unwrap();
        seed(&mut store);
        let criteria = SearchCriteria {
            wip_number: Some("WIP2".into()),
            serial_number: Some("D1".into()),
            ..SearchCriteria::default()
        };
        let results = flexible_search(&store.session(), &criteria).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_blank_criteria_are_ignored() {
        let mut store = RepStore::open_in_memory().unwrap();
        seed(&mut store);
        let criteria = SearchCriteria {
            coldhead_serial: Some("  ".into()),
            ..SearchCriteria::default()
        };
        let results = flexible_search(&store.session(), &criteria).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_search_by_test_id() {
        let mut store = RepStore::open_in_memory().unwrap();
        seed(&mut store);
        let criteria = SearchCriteria {
            test_id: Some(2),
            ..SearchCriteria::default()
        };
        let results = flexible_search(&store.session(), &criteria).unwrap();
        let record = results.get("WIP1").unwrap();
        assert_eq!(record.tests.len(), 1);
        assert_eq!(record.tests[0].test_attempt, Some(2));
    }

    #[test]
    fn test_search_reads_renamed_columns_under_logical_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE coldheads (
                    coldhead_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    serial_number TEXT NOT NULL UNIQUE,
                    status TEXT,
                    notes TEXT
                );
                CREATE TABLE displacers (
                    displacer_serial_number TEXT PRIMARY KEY,
                    status TEXT,
                    notes TEXT,
                    initial_open_date TEXT,
                    is_active INTEGER NOT NULL DEFAULT 1
                );
                CREATE TABLE wips (
                    wip_number TEXT PRIMARY KEY,
                    coldhead_serial_number TEXT,
                    displacer_serial_number TEXT,
                    arrived TEXT,
                    teardown_date TEXT,
                    wip_status TEXT,
                    is_active INTEGER NOT NULL DEFAULT 1
                );
                CREATE TABLE tests (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    wip_number TEXT NOT NULL,
                    coldhead_serial_number TEXT,
                    displacer_serial_number TEXT,
                    test_date TEXT,
                    test_attempt INTEGER,
                    pass_fail TEXT,
                    notes TEXT,
                    mode TEXT,
                    turns INTEGER,
                    first_stage_heaters REAL,
                    second_stage_heater REAL,
                    first_stage_temp REAL,
                    second_stage_temp REAL,
                    efficiency1 REAL,
                    efficiency2 REAL
                );",
            )
            .unwrap();
        }

        let mut overrides = MappingOverrides::new();
        overrides.insert(
            "wips".to_string(),
            HashMap::from([
                ("arrival_date".to_string(), "arrived".to_string()),
                ("status".to_string(), "wip_status".to_string()),
            ]),
        );
        overrides.insert(
            "tests".to_string(),
            HashMap::from([("test_id".to_string(), "id".to_string())]),
        );
        let mapper = SchemaMapper::with_overrides(&overrides).unwrap();
        let mut store = RepStore::open(&path, mapper, DEFAULT_BUSY_TIMEOUT).unwrap();

        store
            .with_transaction(|s| {
                s.insert(Table::Coldheads, &[("serial_number".into(), text("C1"))])?;
                s.insert(
                    Table::Wips,
                    &[
                        ("wip_number".into(), text("WIP1")),
                        ("coldhead_serial_number".into(), text("C1")),
                        ("arrival_date".into(), text("2024-01-02")),
                        ("status".into(), text("Received")),
                    ],
                )?;
                s.insert(
                    Table::Tests,
                    &[
                        ("wip_number".into(), text("WIP1")),
                        ("pass_fail".into(), text("Pass")),
                    ],
                )?;
                Ok(())
            })
            .unwrap();

        let results = flexible_search(&store.session(), &SearchCriteria::serial("C1")).unwrap();
        let record = results.get("WIP1").unwrap();
        assert_eq!(record.arrival_date, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(record.wip_status.as_deref(), Some("Received"));
        assert_eq!(record.tests.len(), 1);
        assert_eq!(record.tests[0].test_id, 1);
        assert_eq!(record.tests[0].pass_fail.as_deref(), Some("Pass"));
    }
}
