//! Typed statement model rendered to parameterized SQL
//!
//! Callers describe SELECT/INSERT/UPDATE statements as values; [`Statement`]
//! is the only thing that ever holds SQL text. Values always travel as
//! positional `?` parameters. Identifiers come from the [`SchemaMapper`]
//! allow-list and are re-checked here before being written into SQL.
//!
//! [`SchemaMapper`]: crate::core::mapping::SchemaMapper

use rusqlite::types::Value;

use crate::core::error::{StoreError, StoreResult};
use crate::core::mapping::Table;

/// Rendered SQL plus its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// `LEFT JOIN <table> ON <left> = <right>`
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: Table,
    pub left: String,
    pub right: String,
}

/// SELECT with joins, an AND group and at most one OR group
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    from: Table,
    columns: Vec<String>,
    joins: Vec<Join>,
    and_conditions: Vec<(String, Value)>,
    or_group: Vec<(String, Value)>,
    order_by: Vec<String>,
    limit: Option<usize>,
}

impl SelectQuery {
    pub fn new(from: Table) -> Self {
        Self {
            from,
            columns: Vec::new(),
            joins: Vec::new(),
            and_conditions: Vec::new(),
            or_group: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Add one (already mapped) column to the select list
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn left_join(mut self, table: Table, left: &str, right: &str) -> Self {
        self.joins.push(Join {
            table,
            left: left.to_string(),
            right: right.to_string(),
        });
        self
    }

    /// AND `column = value` (`IS NULL` for a NULL value)
    pub fn and_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and_conditions.push((column.into(), value.into()));
        self
    }

    /// Add an alternative to the single OR group
    pub fn or_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.or_group.push((column.into(), value.into()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(column.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn build(&self) -> StoreResult<Statement> {
        let mut params = Vec::new();

        let select_list = if self.columns.is_empty() {
            "*".to_string()
        } else {
            for column in &self.columns {
                check_select_item(column)?;
            }
            self.columns.join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", select_list, self.from);

        for join in &self.joins {
            check_ident(&join.left)?;
            check_ident(&join.right)?;
            sql.push_str(&format!(
                " LEFT JOIN {} ON {} = {}",
                join.table,
                join.left,
                join.right
            ));
        }

        let mut where_parts = Vec::new();
        for (column, value) in &self.and_conditions {
            where_parts.push(render_eq(column, value, &mut params)?);
        }
        if !self.or_group.is_empty() {
            let mut or_parts = Vec::new();
            for (column, value) in &self.or_group {
                or_parts.push(render_eq(column, value, &mut params)?);
            }
            where_parts.push(format!("({})", or_parts.join(" OR ")));
        }
        if !where_parts.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_parts.join(" AND "));
        }

        if !self.order_by.is_empty() {
            for item in &self.order_by {
                check_order_item(item)?;
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        Ok(Statement { sql, params })
    }
}

/// What an INSERT does when it hits a uniqueness conflict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// Plain INSERT; the constraint violation is an error
    Abort,
    /// `INSERT OR IGNORE`
    Ignore,
    /// `ON CONFLICT(keys) DO UPDATE SET col=excluded.col` for non-key columns
    Update(Vec<String>),
}

/// INSERT from an ordered column/value list
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    table: Table,
    values: Vec<(String, Value)>,
    conflict: Conflict,
}

impl InsertStatement {
    pub fn new(table: Table, values: Vec<(String, Value)>) -> Self {
        Self {
            table,
            values,
            conflict: Conflict::Abort,
        }
    }

    pub fn or_ignore(mut self) -> Self {
        self.conflict = Conflict::Ignore;
        self
    }

    pub fn on_conflict_update<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conflict = Conflict::Update(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(&self) -> StoreResult<Statement> {
        for (column, _) in &self.values {
            check_plain_ident(column)?;
        }

        let verb = match self.conflict {
            Conflict::Ignore => "INSERT OR IGNORE INTO",
            _ => "INSERT INTO",
        };

        if self.values.is_empty() {
            return Ok(Statement {
                sql: format!("{} {} DEFAULT VALUES", verb, self.table),
                params: Vec::new(),
            });
        }

        let columns: Vec<&str> = self.values.iter().map(|(c, _)| c.as_str()).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let mut sql = format!(
            "{} {} ({}) VALUES ({})",
            verb,
            self.table,
            columns.join(", "),
            placeholders
        );

        if let Conflict::Update(keys) = &self.conflict {
            if keys.is_empty() {
                return Err(StoreError::invalid(format!(
                    "upsert into '{}' needs at least one conflict key",
                    self.table
                )));
            }
            for key in keys {
                check_plain_ident(key)?;
                if !columns.contains(&key.as_str()) {
                    return Err(StoreError::invalid(format!(
                        "conflict key '{}' is not among the inserted columns of '{}'",
                        key, self.table
                    )));
                }
            }
            let updates: Vec<String> = columns
                .iter()
                .filter(|c| !keys.iter().any(|k| k == *c))
                .map(|c| format!("{c}=excluded.{c}"))
                .collect();
            if updates.is_empty() {
                sql.push_str(&format!(" ON CONFLICT({}) DO NOTHING", keys.join(", ")));
            } else {
                sql.push_str(&format!(
                    " ON CONFLICT({}) DO UPDATE SET {}",
                    keys.join(", "),
                    updates.join(", ")
                ));
            }
        }

        Ok(Statement {
            sql,
            params: self.values.iter().map(|(_, v)| v.clone()).collect(),
        })
    }
}

/// UPDATE with a SET list and an AND-ed equality WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    table: Table,
    set: Vec<(String, Value)>,
    conditions: Vec<(String, Value)>,
}

impl UpdateStatement {
    pub fn new(table: Table, set: Vec<(String, Value)>, conditions: Vec<(String, Value)>) -> Self {
        Self {
            table,
            set,
            conditions,
        }
    }

    pub fn build(&self) -> StoreResult<Statement> {
        if self.set.is_empty() {
            return Err(StoreError::EmptyUpdate {
                table: self.table.to_string(),
            });
        }
        if self.conditions.is_empty() {
            return Err(StoreError::invalid(format!(
                "refusing to update every row of '{}' without conditions",
                self.table
            )));
        }

        let mut params = Vec::with_capacity(self.set.len() + self.conditions.len());
        let mut assignments = Vec::with_capacity(self.set.len());
        for (column, value) in &self.set {
            check_plain_ident(column)?;
            assignments.push(format!("{} = ?", column));
            params.push(value.clone());
        }

        let mut where_parts = Vec::with_capacity(self.conditions.len());
        for (column, value) in &self.conditions {
            where_parts.push(render_eq(column, value, &mut params)?);
        }

        Ok(Statement {
            sql: format!(
                "UPDATE {} SET {} WHERE {}",
                self.table,
                assignments.join(", "),
                where_parts.join(" AND ")
            ),
            params,
        })
    }
}

fn render_eq(column: &str, value: &Value, params: &mut Vec<Value>) -> StoreResult<String> {
    check_ident(column)?;
    if matches!(value, Value::Null) {
        Ok(format!("{} IS NULL", column))
    } else {
        params.push(value.clone());
        Ok(format!("{} = ?", column))
    }
}

fn is_word(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `column`
fn check_plain_ident(s: &str) -> StoreResult<()> {
    if is_word(s) {
        Ok(())
    } else {
        Err(StoreError::invalid(format!("'{}' is not a valid column name", s)))
    }
}

/// `column` or `table.column`
fn check_ident(s: &str) -> StoreResult<()> {
    let valid = match s.split_once('.') {
        Some((table, column)) => is_word(table) && is_word(column),
        None => is_word(s),
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::invalid(format!("'{}' is not a valid identifier", s)))
    }
}

/// Select list item: identifier, `table.*`, optionally `AS alias`
fn check_select_item(s: &str) -> StoreResult<()> {
    let (expr, alias) = match s.split_once(" AS ") {
        Some((expr, alias)) => (expr.trim(), Some(alias.trim())),
        None => (s.trim(), None),
    };
    if let Some(alias) = alias {
        check_plain_ident(alias)?;
    }
    if expr == "*" {
        return Ok(());
    }
    if let Some(table) = expr.strip_suffix(".*") {
        return check_plain_ident(table);
    }
    check_ident(expr)
}

/// Order item: identifier with optional ASC/DESC
fn check_order_item(s: &str) -> StoreResult<()> {
    let mut parts = s.split_whitespace();
    let column = parts.next().unwrap_or_default();
    check_ident(column)?;
    match parts.next() {
        None => Ok(()),
        Some(dir) if dir.eq_ignore_ascii_case("ASC") || dir.eq_ignore_ascii_case("DESC") => {
            if parts.next().is_none() {
                Ok(())
            } else {
                Err(StoreError::invalid(format!("invalid ORDER BY item '{}'", s)))
            }
        }
        Some(_) => Err(StoreError::invalid(format!("invalid ORDER BY item '{}'", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_select_without_conditions_has_no_where() {
        let stmt = SelectQuery::new(Table::Wips).build().unwrap();
        assert_eq!(stmt.sql, "SELECT * FROM wips");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_select_with_joins_and_or_group() {
        let stmt = SelectQuery::new(Table::Wips)
            .columns(["wips.wip_number", "coldheads.serial_number AS coldhead_serial_number"])
            .left_join(
                Table::Coldheads,
                "wips.coldhead_serial_number",
                "coldheads.serial_number",
            )
            .and_eq("wips.wip_number", text("WIP1"))
            .or_eq("coldheads.serial_number", text("S1"))
            .or_eq("wips.displacer_serial_number", text("S1"))
            .build()
            .unwrap();

        assert_eq!(
            stmt.sql,
            "SELECT wips.wip_number, coldheads.serial_number AS coldhead_serial_number \
             FROM wips LEFT JOIN coldheads ON wips.coldhead_serial_number = coldheads.serial_number \
             WHERE wips.wip_number = ? AND (coldheads.serial_number = ? OR wips.displacer_serial_number = ?)"
        );
        assert_eq!(stmt.params, vec![text("WIP1"), text("S1"), text("S1")]);
    }

    #[test]
    fn test_select_or_group_alone() {
        let stmt = SelectQuery::new(Table::Coldheads)
            .or_eq("serial_number", text("A"))
            .or_eq("status", text("B"))
            .build()
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM coldheads WHERE (serial_number = ? OR status = ?)"
        );
    }

    #[test]
    fn test_null_condition_renders_is_null() {
        let stmt = SelectQuery::new(Table::Wips)
            .and_eq("coldhead_serial_number", Value::Null)
            .order_by("wip_number DESC")
            .limit(1)
            .build()
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM wips WHERE coldhead_serial_number IS NULL ORDER BY wip_number DESC LIMIT 1"
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_injection_in_identifier_is_rejected() {
        let err = SelectQuery::new(Table::Wips)
            .and_eq("wip_number; DROP TABLE wips", text("x"))
            .build()
            .unwrap_err();
        assert!(err.is_invalid_data());

        let err = SelectQuery::new(Table::Wips)
            .order_by("wip_number; --")
            .build()
            .unwrap_err();
        assert!(err.is_invalid_data());
    }

    #[test]
    fn test_values_are_never_interpolated() {
        let stmt = InsertStatement::new(
            Table::Coldheads,
            vec![("serial_number".into(), text("C1'); DROP TABLE coldheads; --"))],
        )
        .build()
        .unwrap();
        assert_eq!(stmt.sql, "INSERT INTO coldheads (serial_number) VALUES (?)");
        assert_eq!(stmt.params.len(), 1);
    }

    #[test]
    fn test_insert_or_ignore() {
        let stmt = InsertStatement::new(
            Table::Displacers,
            vec![
                ("displacer_serial_number".into(), text("D1")),
                ("status".into(), text("Placeholder")),
            ],
        )
        .or_ignore()
        .build()
        .unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT OR IGNORE INTO displacers (displacer_serial_number, status) VALUES (?, ?)"
        );
    }

    #[test]
    fn test_upsert_updates_non_key_columns() {
        let stmt = InsertStatement::new(
            Table::Coldheads,
            vec![
                ("serial_number".into(), text("C1")),
                ("status".into(), text("Active")),
                ("notes".into(), Value::Null),
            ],
        )
        .on_conflict_update(["serial_number"])
        .build()
        .unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO coldheads (serial_number, status, notes) VALUES (?, ?, ?) \
             ON CONFLICT(serial_number) DO UPDATE SET status=excluded.status, notes=excluded.notes"
        );
    }

    #[test]
    fn test_upsert_with_only_keys_does_nothing_on_conflict() {
        let stmt = InsertStatement::new(
            Table::Coldheads,
            vec![("serial_number".into(), text("C1"))],
        )
        .on_conflict_update(["serial_number"])
        .build()
        .unwrap();
        assert!(stmt.sql.ends_with("ON CONFLICT(serial_number) DO NOTHING"));
    }

    #[test]
    fn test_upsert_key_must_be_inserted() {
        let err = InsertStatement::new(Table::Coldheads, vec![("status".into(), text("x"))])
            .on_conflict_update(["serial_number"])
            .build()
            .unwrap_err();
        assert!(err.is_invalid_data());
    }

    #[test]
    fn test_update_statement() {
        let stmt = UpdateStatement::new(
            Table::Wips,
            vec![("status".into(), text("Torn down")), ("is_active".into(), Value::Integer(1))],
            vec![("wip_number".into(), text("WIP2"))],
        )
        .build()
        .unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE wips SET status = ?, is_active = ? WHERE wip_number = ?"
        );
        assert_eq!(
            stmt.params,
            vec![text("Torn down"), Value::Integer(1), text("WIP2")]
        );
    }

    #[test]
    fn test_empty_update_is_reported() {
        let err = UpdateStatement::new(
            Table::Wips,
            vec![],
            vec![("wip_number".into(), text("WIP2"))],
        )
        .build()
        .unwrap_err();
        assert!(matches!(err, StoreError::EmptyUpdate { ref table } if table == "wips"));
    }

    #[test]
    fn test_update_without_conditions_is_refused() {
        let err = UpdateStatement::new(Table::Wips, vec![("status".into(), text("x"))], vec![])
            .build()
            .unwrap_err();
        assert!(err.is_invalid_data());
    }
}
