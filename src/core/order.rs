//! Order assembly and single-entity write operations
//!
//! Every function here works on a [`Session`] and so runs inside the
//! caller's transaction. [`insert_new_order`] wraps the whole order in one
//! transaction of its own: any failure rolls back every row it wrote.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::error::{StoreError, StoreResult};
use crate::core::mapping::Table;
use crate::core::placeholder::{activate, allocate_displacer, allocate_wip};
use crate::core::store::{RepStore, Session};
use crate::entities::{
    Coldhead, ColdheadData, Displacer, DisplacerData, TestAttempt, TestData, Wip, WipData,
};

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

/// Displacer part of an order; a missing serial allocates a placeholder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplacerOrder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displacer_serial_number: Option<String>,

    #[serde(flatten)]
    pub data: DisplacerData,
}

/// Everything received for one physical lot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Allocated from the placeholder pool when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wip_number: Option<String>,

    #[serde(default)]
    pub wip: WipData,

    pub coldhead: Coldhead,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displacer: Option<DisplacerOrder>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<TestData>,
}

impl NewOrder {
    pub fn new(coldhead: Coldhead) -> Self {
        Self {
            wip_number: None,
            wip: WipData::default(),
            coldhead,
            displacer: None,
            tests: Vec::new(),
        }
    }
}

/// Identifiers the order ended up bound to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderReceipt {
    pub wip_number: String,
    pub coldhead_serial_number: String,
    pub displacer_serial_number: Option<String>,
    pub test_ids: Vec<i64>,
}

/// Insert a whole order atomically
pub fn insert_new_order(store: &mut RepStore, order: &NewOrder) -> StoreResult<OrderReceipt> {
    store.with_transaction(|session| assemble_order(session, order))
}

/// The order steps, on an already open transaction
pub fn assemble_order(session: &Session<'_>, order: &NewOrder) -> StoreResult<OrderReceipt> {
    // Bindings are applied after the referenced rows exist
    let details = WipData {
        coldhead_serial_number: None,
        displacer_serial_number: None,
        ..order.wip.clone()
    };

    let wip_number = match order.wip_number.as_deref().map(str::trim) {
        Some(number) if !number.is_empty() => {
            let mut wip = Wip::new(number);
            wip.data = details.clone();
            insert_wip(session, &wip)?;
            number.to_string()
        }
        _ => {
            let number = allocate_wip(session)?;
            if !details.is_empty() {
                update_wip(session, &number, &details)?;
            }
            number
        }
    };
    debug!("Order resolved to WIP {}", wip_number);

    insert_coldhead(session, &order.coldhead)?;
    bind(session, &wip_number, "coldhead_serial_number", &order.coldhead.serial_number)?;

    let displacer_serial = match &order.displacer {
        Some(displacer) => {
            let serial = match displacer.displacer_serial_number.as_deref().map(str::trim) {
                Some(serial) if !serial.is_empty() => {
                    insert_displacer(
                        session,
                        &Displacer {
                            displacer_serial_number: serial.to_string(),
                            data: displacer.data.clone(),
                        },
                    )?;
                    serial.to_string()
                }
                _ => {
                    let serial = allocate_displacer(session)?;
                    if !displacer.data.is_empty() {
                        update_displacer(session, &serial, &displacer.data)?;
                    }
                    serial
                }
            };
            bind(session, &wip_number, "displacer_serial_number", &serial)?;
            Some(serial)
        }
        None => None,
    };

    let mut test_ids = Vec::with_capacity(order.tests.len());
    for test in &order.tests {
        test_ids.push(insert_test(session, &wip_number, test)?);
    }

    info!(
        "Order for WIP {} stored with {} test(s)",
        wip_number,
        test_ids.len()
    );
    Ok(OrderReceipt {
        wip_number,
        coldhead_serial_number: order.coldhead.serial_number.clone(),
        displacer_serial_number: displacer_serial,
        test_ids,
    })
}

fn bind(session: &Session<'_>, wip_number: &str, column: &str, serial: &str) -> StoreResult<()> {
    session.update(
        Table::Wips,
        &[(column.to_string(), text(serial))],
        &[("wip_number", text(wip_number))],
    )?;
    Ok(())
}

/// Look up a WIP by number
pub fn get_wip(session: &Session<'_>, wip_number: &str) -> StoreResult<Option<Wip>> {
    session
        .find(Table::Wips, &[("wip_number", text(wip_number))])?
        .map(|row| Wip::from_row(&row))
        .transpose()
}

pub fn get_coldhead(session: &Session<'_>, serial_number: &str) -> StoreResult<Option<Coldhead>> {
    session
        .find(Table::Coldheads, &[("serial_number", text(serial_number))])?
        .map(|row| Coldhead::from_row(&row))
        .transpose()
}

pub fn get_displacer(session: &Session<'_>, serial_number: &str) -> StoreResult<Option<Displacer>> {
    session
        .find(
            Table::Displacers,
            &[("displacer_serial_number", text(serial_number))],
        )?
        .map(|row| Displacer::from_row(&row))
        .transpose()
}

/// All tests recorded for a WIP, by attempt
pub fn tests_for_wip(session: &Session<'_>, wip_number: &str) -> StoreResult<Vec<TestAttempt>> {
    let mut tests = session
        .query(Table::Tests, &[("wip_number", text(wip_number))])?
        .iter()
        .map(TestAttempt::from_row)
        .collect::<StoreResult<Vec<_>>>()?;
    tests.sort_by_key(|t| (t.data.test_attempt, t.test_id));
    Ok(tests)
}

/// Insert a WIP unless one with the same number exists; true when inserted
///
/// An existing but retired WIP is reactivated.
pub fn insert_wip(session: &Session<'_>, wip: &Wip) -> StoreResult<bool> {
    if let Some(existing) = get_wip(session, &wip.wip_number)? {
        debug!("WIP {} already exists", wip.wip_number);
        if !existing.is_active() {
            activate(session, Table::Wips, "wip_number", &wip.wip_number)?;
            info!("Reactivated WIP {}", wip.wip_number);
        }
        return Ok(false);
    }
    session.insert(Table::Wips, &wip.fields())?;
    Ok(true)
}

/// Insert a coldhead unless its serial is already known; true when inserted
pub fn insert_coldhead(session: &Session<'_>, coldhead: &Coldhead) -> StoreResult<bool> {
    if session.exists(
        Table::Coldheads,
        &[("serial_number", text(&coldhead.serial_number))],
    )? {
        debug!("Coldhead {} already exists", coldhead.serial_number);
        return Ok(false);
    }
    session.insert(Table::Coldheads, &coldhead.fields())?;
    Ok(true)
}

/// Insert a displacer unless its serial is already known; true when inserted
///
/// An existing but retired displacer is reactivated.
pub fn insert_displacer(session: &Session<'_>, displacer: &Displacer) -> StoreResult<bool> {
    let serial = &displacer.displacer_serial_number;
    if let Some(existing) = get_displacer(session, serial)? {
        debug!("Displacer {} already exists", serial);
        if existing.data.is_active == Some(false) {
            activate(session, Table::Displacers, "displacer_serial_number", serial)?;
            info!("Reactivated displacer {}", serial);
        }
        return Ok(false);
    }
    session.insert(Table::Displacers, &displacer.fields())?;
    Ok(true)
}

/// Insert a test under an existing WIP; returns the new test id
///
/// Missing serials are taken from the WIP and a missing attempt number
/// continues the WIP's attempt sequence.
pub fn insert_test(session: &Session<'_>, wip_number: &str, test: &TestData) -> StoreResult<i64> {
    let wip = get_wip(session, wip_number)?.ok_or_else(|| {
        StoreError::invalid(format!(
            "cannot add a test: WIP '{}' does not exist",
            wip_number
        ))
    })?;

    let mut data = test.clone();
    if data.coldhead_serial_number.is_none() {
        data.coldhead_serial_number = wip.data.coldhead_serial_number.clone();
    }
    if data.displacer_serial_number.is_none() {
        data.displacer_serial_number = wip.data.displacer_serial_number.clone();
    }
    if data.test_attempt.is_none() {
        let last = tests_for_wip(session, wip_number)?
            .iter()
            .filter_map(|t| t.data.test_attempt)
            .max()
            .unwrap_or(0);
        data.test_attempt = Some(last + 1);
    }

    session.insert(Table::Tests, &TestAttempt::insert_fields(wip_number, &data))
}

fn require_changes(table: Table, empty: bool) -> StoreResult<()> {
    if empty {
        warn!("No data provided for updating '{}'", table);
        return Err(StoreError::EmptyUpdate {
            table: table.to_string(),
        });
    }
    Ok(())
}

fn update_existing(
    session: &Session<'_>,
    table: Table,
    key: &str,
    id: Value,
    fields: &[(String, Value)],
    label: &str,
) -> StoreResult<()> {
    require_changes(table, fields.is_empty())?;
    let changed = session.update(table, fields, &[(key, id)])?;
    if changed == 0 {
        return Err(StoreError::invalid(format!("{} does not exist", label)));
    }
    Ok(())
}

pub fn update_wip(session: &Session<'_>, wip_number: &str, changes: &WipData) -> StoreResult<()> {
    update_existing(
        session,
        Table::Wips,
        "wip_number",
        text(wip_number),
        &changes.fields(),
        &format!("WIP '{}'", wip_number),
    )
}

pub fn update_coldhead(
    session: &Session<'_>,
    serial_number: &str,
    changes: &ColdheadData,
) -> StoreResult<()> {
    update_existing(
        session,
        Table::Coldheads,
        "serial_number",
        text(serial_number),
        &changes.fields(),
        &format!("coldhead '{}'", serial_number),
    )
}

pub fn update_displacer(
    session: &Session<'_>,
    serial_number: &str,
    changes: &DisplacerData,
) -> StoreResult<()> {
    update_existing(
        session,
        Table::Displacers,
        "displacer_serial_number",
        text(serial_number),
        &changes.fields(),
        &format!("displacer '{}'", serial_number),
    )
}

pub fn update_test(session: &Session<'_>, test_id: i64, changes: &TestData) -> StoreResult<()> {
    update_existing(
        session,
        Table::Tests,
        "test_id",
        Value::Integer(test_id),
        &changes.fields(),
        &format!("test {}", test_id),
    )
}

/// Insert or overwrite a coldhead by serial number
pub fn upsert_coldhead(session: &Session<'_>, coldhead: &Coldhead) -> StoreResult<()> {
    session.upsert(Table::Coldheads, &coldhead.fields(), &["serial_number"])
}

/// Insert or overwrite a displacer by serial number
pub fn upsert_displacer(session: &Session<'_>, displacer: &Displacer) -> StoreResult<()> {
    session.upsert(
        Table::Displacers,
        &displacer.fields(),
        &["displacer_serial_number"],
    )
}
