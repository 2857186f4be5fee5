//! Row-level data access over the workspace database.
//!
//! Every screen goes through the same small contract: filtered/ordered/paged
//! selects, counts, insert, update by id, upsert on an explicit conflict key,
//! and delete by id. Table and column names come from a fixed whitelist; all
//! values are bound parameters.

use crate::error::{SchoolError, SchoolResult};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection};
use uuid::Uuid;

pub type Row = serde_json::Map<String, serde_json::Value>;

pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

pub const TABLES: &[TableSpec] = &[
    TableSpec {
        name: "users",
        columns: &[
            "id", "auth_id", "username", "full_name", "gender", "nip", "email", "role",
            "position", "subject_area", "birth_place", "birth_date", "address", "phone",
            "photo_url", "status", "created_at",
        ],
    },
    TableSpec {
        name: "students",
        columns: &[
            "id", "nis", "nisn", "full_name", "gender", "birth_place", "birth_date", "address",
            "phone", "email", "father_name", "mother_name", "class_id", "photo_url", "status",
            "total_achievement_points", "total_violation_points", "created_at",
        ],
    },
    TableSpec {
        name: "classes",
        columns: &[
            "id", "code", "name", "level", "major", "homeroom_teacher_id", "capacity", "room",
            "academic_year", "semester", "status",
        ],
    },
    TableSpec {
        name: "subjects",
        columns: &[
            "id", "code", "name", "category", "level", "major", "teacher_id", "class_id",
            "semester", "academic_year", "weekly_hours", "passing_grade", "description", "status",
        ],
    },
    TableSpec {
        name: "schedule_slots",
        columns: &[
            "id", "class_id", "day", "session", "subject_id", "teacher_id", "room",
            "academic_year", "semester",
        ],
    },
    TableSpec {
        name: "attendance_records",
        columns: &[
            "id", "student_id", "subject_id", "date", "session", "status", "note", "method",
        ],
    },
    TableSpec {
        name: "point_categories",
        columns: &["id", "name", "kind", "min_points", "max_points"],
    },
    TableSpec {
        name: "point_events",
        columns: &[
            "id", "student_id", "kind", "category_id", "category_label", "severity", "points",
            "date", "description", "sanction", "location", "status", "created_at",
        ],
    },
    TableSpec {
        name: "time_slots",
        columns: &["id", "session", "start_time", "end_time", "day", "kind"],
    },
    TableSpec {
        name: "academic_years",
        columns: &["id", "label", "status", "start_date", "end_date"],
    },
    TableSpec {
        name: "semesters",
        columns: &["id", "academic_year", "semester", "status"],
    },
    TableSpec {
        name: "settings",
        columns: &[
            "id", "setting_key", "setting_value", "label", "setting_type", "description",
        ],
    },
];

pub fn table(name: &str) -> SchoolResult<&'static TableSpec> {
    TABLES
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| SchoolError::bad_params(format!("unknown table {name}")))
}

impl TableSpec {
    fn column(&self, name: &str) -> SchoolResult<&'static str> {
        self.columns
            .iter()
            .copied()
            .find(|c| *c == name)
            .ok_or_else(|| SchoolError::bad_params(format!("unknown column {}.{}", self.name, name)))
    }
}

#[derive(Debug, Clone)]
pub enum Filter {
    Eq(&'static str, serde_json::Value),
    IsNull(&'static str),
    /// Case-insensitive substring match on any of the columns.
    AnyLike(Vec<&'static str>, String),
}

#[derive(Debug, Clone)]
pub struct Query {
    pub table: &'static str,
    pub filters: Vec<Filter>,
    pub order: Vec<(&'static str, bool)>,
    /// Inclusive row range `from..=to`.
    pub range: Option<(i64, i64)>,
}

impl Query {
    pub fn from(table: &'static str) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: Vec::new(),
            range: None,
        }
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<serde_json::Value>) -> Self {
        self.filters.push(Filter::Eq(column, value.into()));
        self
    }

    pub fn is_null(mut self, column: &'static str) -> Self {
        self.filters.push(Filter::IsNull(column));
        self
    }

    pub fn any_like(mut self, columns: &[&'static str], needle: &str) -> Self {
        self.filters.push(Filter::AnyLike(columns.to_vec(), needle.to_string()));
        self
    }

    pub fn order(mut self, column: &'static str, ascending: bool) -> Self {
        self.order.push((column, ascending));
        self
    }

    pub fn range(mut self, from: i64, to: i64) -> Self {
        self.range = Some((from, to));
        self
    }
}

pub fn json_to_sql(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Integer(i64::from(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Real(n.as_f64().unwrap_or(0.0)),
        },
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

fn sql_to_json(v: ValueRef<'_>) -> serde_json::Value {
    match v {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Value::from(f),
        ValueRef::Text(t) => serde_json::Value::from(String::from_utf8_lossy(t).to_string()),
        ValueRef::Blob(b) => serde_json::Value::from(hex::encode(b)),
    }
}

fn where_clause(spec: &TableSpec, filters: &[Filter]) -> SchoolResult<(String, Vec<Value>)> {
    let mut parts: Vec<String> = Vec::new();
    let mut binds: Vec<Value> = Vec::new();
    for f in filters {
        match f {
            Filter::Eq(col, v) => {
                let col = spec.column(col)?;
                if v.is_null() {
                    parts.push(format!("{col} IS NULL"));
                } else {
                    parts.push(format!("{col} = ?"));
                    binds.push(json_to_sql(v));
                }
            }
            Filter::IsNull(col) => {
                let col = spec.column(col)?;
                parts.push(format!("{col} IS NULL"));
            }
            Filter::AnyLike(cols, needle) => {
                if cols.is_empty() {
                    continue;
                }
                let escaped = needle
                    .replace('\\', "\\\\")
                    .replace('%', "\\%")
                    .replace('_', "\\_");
                let pattern = format!("%{}%", escaped.to_lowercase());
                let mut ors = Vec::with_capacity(cols.len());
                for c in cols {
                    let col = spec.column(c)?;
                    ors.push(format!("LOWER(COALESCE({col}, '')) LIKE ? ESCAPE '\\'"));
                    binds.push(Value::Text(pattern.clone()));
                }
                parts.push(format!("({})", ors.join(" OR ")));
            }
        }
    }
    if parts.is_empty() {
        Ok((String::new(), binds))
    } else {
        Ok((format!(" WHERE {}", parts.join(" AND ")), binds))
    }
}

pub fn select(conn: &Connection, q: &Query) -> SchoolResult<Vec<Row>> {
    let spec = table(q.table)?;
    let (where_sql, mut binds) = where_clause(spec, &q.filters)?;
    let mut sql = format!("SELECT {} FROM {}{}", spec.columns.join(", "), spec.name, where_sql);
    if !q.order.is_empty() {
        let mut keys = Vec::with_capacity(q.order.len());
        for (col, asc) in &q.order {
            let col = spec.column(col)?;
            keys.push(format!("{col} {}", if *asc { "ASC" } else { "DESC" }));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&keys.join(", "));
    }
    if let Some((from, to)) = q.range {
        let limit = Some(from)
            .filter(|from| *from >= 0 && to >= *from)
            .and_then(|from| (to - from).checked_add(1))
            .ok_or_else(|| SchoolError::bad_params("invalid range"))?;
        sql.push_str(" LIMIT ? OFFSET ?");
        binds.push(Value::Integer(limit));
        binds.push(Value::Integer(from));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds.iter()), |r| {
            let mut row = Row::new();
            for (i, col) in spec.columns.iter().enumerate() {
                row.insert((*col).to_string(), sql_to_json(r.get_ref(i)?));
            }
            Ok(row)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get(conn: &Connection, table_name: &'static str, id: &str) -> SchoolResult<Option<Row>> {
    let mut rows = select(conn, &Query::from(table_name).eq("id", id))?;
    Ok(rows.pop())
}

pub fn count(conn: &Connection, table_name: &'static str, filters: &[Filter]) -> SchoolResult<i64> {
    let spec = table(table_name)?;
    let (where_sql, binds) = where_clause(spec, filters)?;
    let sql = format!("SELECT COUNT(*) FROM {}{}", spec.name, where_sql);
    let n = conn.query_row(&sql, params_from_iter(binds.iter()), |r| r.get(0))?;
    Ok(n)
}

fn bound_columns(spec: &TableSpec, row: &Row) -> SchoolResult<(Vec<&'static str>, Vec<Value>)> {
    let mut cols = Vec::with_capacity(row.len());
    let mut vals = Vec::with_capacity(row.len());
    for (k, v) in row {
        cols.push(spec.column(k)?);
        vals.push(json_to_sql(v));
    }
    Ok((cols, vals))
}

/// Inserts `row`, generating an id when the row has none. Returns the id.
pub fn insert(conn: &Connection, table_name: &'static str, row: &Row) -> SchoolResult<String> {
    let spec = table(table_name)?;
    let mut row = row.clone();
    let id = match row.get("id").and_then(|v| v.as_str()) {
        Some(id) => id.to_string(),
        None => {
            let id = Uuid::new_v4().to_string();
            row.insert("id".into(), serde_json::Value::from(id.clone()));
            id
        }
    };
    let (cols, vals) = bound_columns(spec, &row)?;
    let sql = format!(
        "INSERT INTO {}({}) VALUES({})",
        spec.name,
        cols.join(", "),
        vec!["?"; cols.len()].join(", ")
    );
    conn.execute(&sql, params_from_iter(vals.iter()))?;
    Ok(id)
}

/// Full-row update by primary key. Returns false when no row matched.
pub fn update(conn: &Connection, table_name: &'static str, id: &str, row: &Row) -> SchoolResult<bool> {
    let spec = table(table_name)?;
    let mut row = row.clone();
    row.remove("id");
    if row.is_empty() {
        return Err(SchoolError::bad_params("nothing to update"));
    }
    let (cols, mut vals) = bound_columns(spec, &row)?;
    let sets: Vec<String> = cols.iter().map(|c| format!("{c} = ?")).collect();
    let sql = format!("UPDATE {} SET {} WHERE id = ?", spec.name, sets.join(", "));
    vals.push(Value::Text(id.to_string()));
    let n = conn.execute(&sql, params_from_iter(vals.iter()))?;
    Ok(n > 0)
}

/// Insert-or-overwrite keyed on `conflict_key`, which must match a UNIQUE
/// index of the table. The existing row keeps its id.
pub fn upsert(
    conn: &Connection,
    table_name: &'static str,
    row: &Row,
    conflict_key: &[&str],
) -> SchoolResult<()> {
    let spec = table(table_name)?;
    if conflict_key.is_empty() {
        return Err(SchoolError::bad_params("upsert needs a conflict key"));
    }
    let mut key_cols = Vec::with_capacity(conflict_key.len());
    for k in conflict_key {
        key_cols.push(spec.column(k)?);
        if !row.contains_key(*k) {
            return Err(SchoolError::bad_params(format!("upsert row is missing key column {k}")));
        }
    }
    let mut row = row.clone();
    if !row.contains_key("id") {
        row.insert("id".into(), serde_json::Value::from(Uuid::new_v4().to_string()));
    }
    let (cols, vals) = bound_columns(spec, &row)?;
    let updates: Vec<String> = cols
        .iter()
        .filter(|c| **c != "id" && !key_cols.contains(*c))
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    let action = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    let sql = format!(
        "INSERT INTO {}({}) VALUES({}) ON CONFLICT({}) {}",
        spec.name,
        cols.join(", "),
        vec!["?"; cols.len()].join(", "),
        key_cols.join(", "),
        action
    );
    conn.execute(&sql, params_from_iter(vals.iter()))?;
    Ok(())
}

/// Hard delete by primary key. Returns false when no row matched.
pub fn delete(conn: &Connection, table_name: &'static str, id: &str) -> SchoolResult<bool> {
    let spec = table(table_name)?;
    let sql = format!("DELETE FROM {} WHERE id = ?", spec.name);
    let n = conn.execute(&sql, [id])?;
    Ok(n > 0)
}

pub fn str_field<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    row.get(key).and_then(|v| v.as_str())
}

pub fn int_field(row: &Row, key: &str) -> Option<i64> {
    row.get(key).and_then(|v| v.as_i64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = crate::db::open_db(dir.path()).expect("open db");
        (dir, conn)
    }

    fn row(v: serde_json::Value) -> Row {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn select_filters_orders_and_pages() {
        let (_dir, conn) = open();
        for (i, name) in ["Citra", "Adi", "Budi", "Dewi"].iter().enumerate() {
            let class_id = if i % 2 == 0 { json!("c1") } else { json!(null) };
            insert(
                &conn,
                "students",
                &row(json!({
                    "nis": format!("00{i}"),
                    "full_name": name,
                    "class_id": class_id,
                    "created_at": format!("2024-01-0{}", i + 1),
                })),
            )
            .expect("insert");
        }

        let page = select(&conn, &Query::from("students").order("full_name", true).range(1, 2))
            .expect("select");
        let names: Vec<&str> = page.iter().filter_map(|r| str_field(r, "full_name")).collect();
        assert_eq!(names, vec!["Budi", "Citra"]);

        let in_c1 = count(&conn, "students", &[Filter::Eq("class_id", json!("c1"))]).expect("count");
        assert_eq!(in_c1, 2);
        let unassigned = count(&conn, "students", &[Filter::IsNull("class_id")]).expect("count");
        assert_eq!(unassigned, 2);

        let found = select(&conn, &Query::from("students").any_like(&["full_name", "nis"], "EW"))
            .expect("select");
        assert_eq!(found.len(), 1);
        assert_eq!(str_field(&found[0], "full_name"), Some("Dewi"));
    }

    #[test]
    fn like_filter_escapes_wildcards() {
        let (_dir, conn) = open();
        insert(&conn, "students", &row(json!({"nis": "1", "full_name": "Adi", "created_at": "x"})))
            .expect("insert");
        let found = select(&conn, &Query::from("students").any_like(&["full_name"], "%"))
            .expect("select");
        assert!(found.is_empty());
    }

    #[test]
    fn upsert_overwrites_on_conflict_key() {
        let (_dir, conn) = open();
        let key = ["student_id", "subject_id", "date", "session"];
        let mut r = row(json!({
            "student_id": "s1", "subject_id": "m1", "date": "2024-08-01", "session": 1, "status": "present"
        }));
        upsert(&conn, "attendance_records", &r, &key).expect("first");
        r.insert("status".into(), json!("sick"));
        upsert(&conn, "attendance_records", &r, &key).expect("second");

        let rows = select(&conn, &Query::from("attendance_records")).expect("select");
        assert_eq!(rows.len(), 1);
        assert_eq!(str_field(&rows[0], "status"), Some("sick"));
    }

    #[test]
    fn unknown_table_or_column_is_rejected() {
        let (_dir, conn) = open();
        assert!(select(&conn, &Query::from("auth_identities")).is_err());
        let e = select(&conn, &Query::from("students").eq("password", "x")).expect_err("column");
        assert_eq!(e.code(), "bad_params");
    }

    #[test]
    fn update_and_delete_report_missing_rows() {
        let (_dir, conn) = open();
        let id = insert(&conn, "point_categories", &row(json!({"name": "Late", "kind": "violation"})))
            .expect("insert");
        assert!(update(&conn, "point_categories", &id, &row(json!({"min_points": 5}))).expect("update"));
        assert_eq!(int_field(&get(&conn, "point_categories", &id).unwrap().unwrap(), "min_points"), Some(5));
        assert!(delete(&conn, "point_categories", &id).expect("delete"));
        assert!(!delete(&conn, "point_categories", &id).expect("delete again"));
        assert!(!update(&conn, "point_categories", "missing", &row(json!({"name": "x"}))).expect("update"));
    }

    #[test]
    fn oversized_range_is_rejected_not_overflowed() {
        let (_dir, conn) = open();
        let err = select(&conn, &Query::from("students").range(0, i64::MAX)).unwrap_err();
        assert_eq!(err.code(), "bad_params");
        let err = select(&conn, &Query::from("students").range(i64::MIN, 0)).unwrap_err();
        assert_eq!(err.code(), "bad_params");
    }
}
