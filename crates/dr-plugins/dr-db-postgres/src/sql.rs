//! Statement text derived from table metadata.
//!
//! Table and column names only ever come from `TableDef` constants, never
//! from request input, so they are spliced in directly.

use std::fmt::Write;

use dr_core::{TableDef, Values};

/// `SELECT t.*` plus one joined label per relation.
fn projection(table: &TableDef) -> String {
    let mut sql = String::from("SELECT t.*");
    for (i, rel) in table.relations.iter().enumerate() {
        let _ = write!(sql, ", p{i}.{} AS {}", rel.display, rel.alias);
    }
    let _ = write!(sql, " FROM {} t", table.name);
    for (i, rel) in table.relations.iter().enumerate() {
        let _ = write!(sql, " LEFT JOIN {} p{i} ON p{i}.id = t.{}", rel.table, rel.column);
    }
    sql
}

/// Binds: `$1` owner, `$2` id.
pub(crate) fn find(table: &TableDef) -> String {
    format!(
        "SELECT to_jsonb(r) FROM ({}) r WHERE r.user_id = $1 AND r.id = $2",
        projection(table)
    )
}

/// Binds: `$1` owner, then `$2` parent id when `parent_column` is set.
pub(crate) fn list(table: &TableDef, parent_column: Option<&str>) -> String {
    let mut sql = format!("SELECT to_jsonb(r) FROM ({}) r WHERE r.user_id = $1", projection(table));
    if let Some(column) = parent_column {
        let _ = write!(sql, " AND r.{column} = $2");
    }
    sql.push_str(" ORDER BY r.created_at, r.id");
    sql
}

/// Everything up to the first bound value; callers push `id, user_id, ...values)`.
pub(crate) fn insert_prefix(table: &TableDef, values: &Values) -> String {
    let mut sql = format!("INSERT INTO {} (id, user_id", table.name);
    for (name, _) in values.iter() {
        let _ = write!(sql, ", {name}");
    }
    sql.push_str(") VALUES (");
    sql
}
