//! Placeholder WIP and displacer allocation
//!
//! When an order arrives before its real identity is known, a WIP number
//! (`WIP<n>`) or displacer serial (`D<n>`) is handed out instead. Retired
//! placeholders are reused before a new number is minted. All functions run
//! on a [`Session`]; callers hold an IMMEDIATE transaction so that reading
//! the current maximum and inserting the next number cannot interleave with
//! another writer.

use rusqlite::types::Value;
use tracing::{debug, info};

use crate::core::error::{StoreError, StoreResult};
use crate::core::mapping::Table;
use crate::core::query::SelectQuery;
use crate::core::store::Session;
use crate::entities::{Displacer, Wip, WipState};

/// Status text carried by placeholder rows
pub const PLACEHOLDER_STATUS: &str = "Placeholder";

pub const WIP_PREFIX: &str = "WIP";
pub const DISPLACER_PREFIX: &str = "D";

/// Numeric suffix of `value` when it is exactly `prefix` followed by digits
fn numeric_suffix(value: &str, prefix: &str) -> Option<u64> {
    let digits = value.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Next identifier after the greatest `prefix<n>` among `existing`
///
/// Values that do not match `prefix<digits>` are ignored; with no match the
/// sequence starts at 1.
pub fn next_number<'a, I>(existing: I, prefix: &str) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let max = existing
        .into_iter()
        .filter_map(|value| numeric_suffix(value, prefix))
        .max()
        .unwrap_or(0);
    format!("{}{}", prefix, max + 1)
}

fn column_values(session: &Session<'_>, table: Table, column: &str) -> StoreResult<Vec<String>> {
    let mapper = session.mapper();
    let physical = mapper.qualified(table, column);
    let query = SelectQuery::new(table).column(format!("{} AS value", physical));
    Ok(session
        .fetch(&query)?
        .iter()
        .filter_map(|row| row.get_str("value"))
        .collect())
}

/// `WIP<n+1>` for the greatest existing `WIP<n>`; `WIP1` on an empty table
pub fn next_wip_number(session: &Session<'_>) -> StoreResult<String> {
    let existing = column_values(session, Table::Wips, "wip_number")?;
    let next = next_number(existing.iter().map(String::as_str), WIP_PREFIX);
    debug!("Next WIP number: {}", next);
    Ok(next)
}

/// `D<n+1>` for the greatest existing `D<n>`; `D1` on an empty table
pub fn next_displacer_serial(session: &Session<'_>) -> StoreResult<String> {
    let existing = column_values(session, Table::Displacers, "displacer_serial_number")?;
    let next = next_number(existing.iter().map(String::as_str), DISPLACER_PREFIX);
    debug!("Next displacer serial: {}", next);
    Ok(next)
}

fn lowest_numbered<T>(items: Vec<T>, key: impl Fn(&T) -> &str, prefix: &str) -> Option<T> {
    items
        .into_iter()
        .min_by_key(|item| numeric_suffix(key(item), prefix).unwrap_or(u64::MAX))
}

/// One retired, unbound placeholder WIP, if any (lowest number first)
///
/// A placeholder that already carries a coldhead or displacer belongs to an
/// order and is never handed out again.
pub fn inactive_placeholder(session: &Session<'_>) -> StoreResult<Option<Wip>> {
    let rows = session.query(
        Table::Wips,
        &[
            ("status", Value::Text(PLACEHOLDER_STATUS.to_string())),
            ("is_active", Value::Integer(0)),
            ("coldhead_serial_number", Value::Null),
            ("displacer_serial_number", Value::Null),
        ],
    )?;
    let wips = rows.iter().map(Wip::from_row).collect::<StoreResult<Vec<_>>>()?;
    Ok(lowest_numbered(wips, |w| w.wip_number.as_str(), WIP_PREFIX))
}

fn inactive_displacer(session: &Session<'_>) -> StoreResult<Option<Displacer>> {
    let rows = session.query(
        Table::Displacers,
        &[
            ("status", Value::Text(PLACEHOLDER_STATUS.to_string())),
            ("is_active", Value::Integer(0)),
        ],
    )?;
    let mut displacers = Vec::with_capacity(rows.len());
    for row in &rows {
        let displacer = Displacer::from_row(row)?;
        // still referenced by a WIP
        if session.exists(
            Table::Wips,
            &[(
                "displacer_serial_number",
                Value::Text(displacer.displacer_serial_number.clone()),
            )],
        )? {
            continue;
        }
        displacers.push(displacer);
    }
    Ok(lowest_numbered(
        displacers,
        |d| d.displacer_serial_number.as_str(),
        DISPLACER_PREFIX,
    ))
}

/// Flip `is_active` back on for one row
pub(crate) fn activate(session: &Session<'_>, table: Table, key: &str, id: &str) -> StoreResult<()> {
    session.update(
        table,
        &[("is_active".to_string(), Value::Integer(1))],
        &[(key, Value::Text(id.to_string()))],
    )?;
    Ok(())
}

/// Hand out a WIP number: reactivate a retired placeholder or mint a new one
pub fn allocate_wip(session: &Session<'_>) -> StoreResult<String> {
    if let Some(wip) = inactive_placeholder(session)? {
        activate(session, Table::Wips, "wip_number", &wip.wip_number)?;
        info!("Reusing placeholder WIP {}", wip.wip_number);
        return Ok(wip.wip_number);
    }

    let wip_number = next_wip_number(session)?;
    session.insert(
        Table::Wips,
        &[
            ("wip_number".to_string(), Value::Text(wip_number.clone())),
            ("status".to_string(), Value::Text(PLACEHOLDER_STATUS.to_string())),
            ("is_active".to_string(), Value::Integer(1)),
        ],
    )?;
    info!("Created placeholder WIP {}", wip_number);
    Ok(wip_number)
}

/// Hand out a displacer serial, preferring a retired placeholder
pub fn allocate_displacer(session: &Session<'_>) -> StoreResult<String> {
    if let Some(displacer) = inactive_displacer(session)? {
        let serial = displacer.displacer_serial_number;
        activate(session, Table::Displacers, "displacer_serial_number", &serial)?;
        info!("Reusing placeholder displacer {}", serial);
        return Ok(serial);
    }

    let serial = next_displacer_serial(session)?;
    session.insert(
        Table::Displacers,
        &[
            ("displacer_serial_number".to_string(), Value::Text(serial.clone())),
            ("status".to_string(), Value::Text(PLACEHOLDER_STATUS.to_string())),
            ("is_active".to_string(), Value::Integer(1)),
        ],
    )?;
    info!("Created placeholder displacer {}", serial);
    Ok(serial)
}

/// Put an unbound placeholder WIP back into the reuse pool
pub fn retire_placeholder(session: &Session<'_>, wip_number: &str) -> StoreResult<()> {
    let row = session
        .find(Table::Wips, &[("wip_number", Value::Text(wip_number.to_string()))])?
        .ok_or_else(|| StoreError::invalid(format!("WIP '{}' does not exist", wip_number)))?;
    let wip = Wip::from_row(&row)?;

    if wip.data.status.as_deref() != Some(PLACEHOLDER_STATUS) {
        return Err(StoreError::invalid(format!(
            "WIP '{}' is not a placeholder",
            wip_number
        )));
    }
    if wip.state() != WipState::Assigned {
        return Err(StoreError::invalid(format!(
            "placeholder WIP '{}' is {} and cannot be retired",
            wip_number,
            wip.state()
        )));
    }
    if session.exists(Table::Tests, &[("wip_number", Value::Text(wip_number.to_string()))])? {
        return Err(StoreError::invalid(format!(
            "placeholder WIP '{}' already has tests",
            wip_number
        )));
    }

    session.update(
        Table::Wips,
        &[("is_active".to_string(), Value::Integer(0))],
        &[("wip_number", Value::Text(wip_number.to_string()))],
    )?;
    info!("Retired placeholder WIP {}", wip_number);
    Ok(())
}
