use crate::config::Config;
use crate::error::{SchoolError, SchoolResult};
use crate::model::{ActiveStatus, Semester, YearStatus};
use crate::store::{self, Query, Row};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::Value;
use std::collections::HashMap;

pub fn req_str(params: &Value, key: &str) -> SchoolResult<String> {
    opt_str(params, key).ok_or_else(|| SchoolError::bad_params(format!("missing {key}")))
}

/// Trimmed string param; blank counts as absent.
pub fn opt_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn opt_i64(params: &Value, key: &str) -> SchoolResult<Option<i64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => int_value(v)
            .map(Some)
            .ok_or_else(|| SchoolError::bad_params(format!("{key} must be an integer"))),
    }
}

fn int_value(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub fn parse_date(raw: &str) -> SchoolResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| SchoolError::bad_params(format!("date must be YYYY-MM-DD, got {raw:?}")))
}

pub fn parse_choice<T>(raw: &str, parse: fn(&str) -> Option<T>, what: &str) -> SchoolResult<T> {
    parse(raw).ok_or_else(|| SchoolError::bad_params(format!("unknown {what} {raw:?}")))
}

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Text,
    Int,
    Date,
    /// Closed set of wire values, matched case-insensitively.
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub param: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

pub const fn text(param: &'static str, column: &'static str) -> Field {
    Field {
        param,
        column,
        kind: FieldKind::Text,
    }
}

pub const fn int(param: &'static str, column: &'static str) -> Field {
    Field {
        param,
        column,
        kind: FieldKind::Int,
    }
}

pub const fn date(param: &'static str, column: &'static str) -> Field {
    Field {
        param,
        column,
        kind: FieldKind::Date,
    }
}

pub const fn choice(
    param: &'static str,
    column: &'static str,
    values: &'static [&'static str],
) -> Field {
    Field {
        param,
        column,
        kind: FieldKind::Choice(values),
    }
}

/// Builds a column row from form params. Only fields present in `params`
/// are included; null or blank clears the column.
pub fn form_row(params: &Value, fields: &[Field]) -> SchoolResult<Row> {
    let mut row = Row::new();
    for f in fields {
        let Some(raw) = params.get(f.param) else {
            continue;
        };
        let text = match raw {
            Value::Null => None,
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => {
                return Err(SchoolError::bad_params(format!(
                    "{} must be a scalar value",
                    f.param
                )))
            }
        };
        let Some(text) = text else {
            row.insert(f.column.to_string(), Value::Null);
            continue;
        };
        let value = match f.kind {
            FieldKind::Text => Value::from(text),
            FieldKind::Int => {
                let n = text.parse::<i64>().map_err(|_| {
                    SchoolError::bad_params(format!("{} must be an integer", f.param))
                })?;
                Value::from(n)
            }
            FieldKind::Date => Value::from(parse_date(&text)?.format("%Y-%m-%d").to_string()),
            FieldKind::Choice(values) => {
                let canonical = values
                    .iter()
                    .find(|v| v.eq_ignore_ascii_case(&text))
                    .ok_or_else(|| {
                        SchoolError::bad_params(format!(
                            "{} must be one of {}",
                            f.param,
                            values.join(", ")
                        ))
                    })?;
                Value::from(*canonical)
            }
        };
        row.insert(f.column.to_string(), value);
    }
    Ok(row)
}

/// Rejects a create whose row lacks any of `columns`.
pub fn require(row: &Row, fields: &[Field], columns: &[&str]) -> SchoolResult<()> {
    for col in columns {
        if row.get(*col).map(Value::is_null).unwrap_or(true) {
            let param = fields
                .iter()
                .find(|f| f.column == *col)
                .map(|f| f.param)
                .unwrap_or(*col);
            return Err(SchoolError::bad_params(format!("missing {param}")));
        }
    }
    Ok(())
}

pub fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Store row with camelCase keys, as the UI expects.
pub fn to_wire(row: Row) -> Value {
    Value::Object(row.into_iter().map(|(k, v)| (camel_case(&k), v)).collect())
}

/// id → label for every row of `table`, used to join names into lists.
pub fn label_map(
    conn: &Connection,
    table: &'static str,
    label_column: &str,
) -> SchoolResult<HashMap<String, String>> {
    let rows = store::select(conn, &Query::from(table))?;
    Ok(rows
        .iter()
        .filter_map(|r| {
            Some((
                store::str_field(r, "id")?.to_string(),
                store::str_field(r, label_column)?.to_string(),
            ))
        })
        .collect())
}

pub fn ensure_exists(
    conn: &Connection,
    table: &'static str,
    what: &'static str,
    id: &str,
) -> SchoolResult<Row> {
    store::get(conn, table, id)?.ok_or(SchoolError::NotFound(what))
}

/// Academic year marked active, else the configured default.
pub fn active_academic_year(conn: &Connection, config: &Config) -> SchoolResult<String> {
    let rows = store::select(
        conn,
        &Query::from("academic_years")
            .eq("status", YearStatus::Active.as_str())
            .order("label", false),
    )?;
    Ok(rows
        .first()
        .and_then(|r| store::str_field(r, "label"))
        .map(str::to_string)
        .unwrap_or_else(|| config.default_academic_year.clone()))
}

/// Semester marked active for `year`, else odd.
pub fn active_semester(conn: &Connection, year: &str) -> SchoolResult<Semester> {
    let rows = store::select(
        conn,
        &Query::from("semesters")
            .eq("academic_year", year)
            .eq("status", YearStatus::Active.as_str()),
    )?;
    Ok(rows
        .first()
        .and_then(|r| store::str_field(r, "semester"))
        .and_then(Semester::parse)
        .unwrap_or(Semester::Odd))
}

pub fn is_active(row: &Row) -> bool {
    store::str_field(row, "status") == Some(ActiveStatus::Active.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIELDS: &[Field] = &[
        text("fullName", "full_name"),
        int("capacity", "capacity"),
        choice("level", "level", &["X", "XI", "XII"]),
        date("birthDate", "birth_date"),
    ];

    #[test]
    fn form_row_maps_params_and_normalizes() {
        let row = form_row(
            &json!({"fullName": "  Budi ", "capacity": "32", "level": "xi", "birthDate": "2008-02-01", "extra": 1}),
            FIELDS,
        )
        .expect("row");
        assert_eq!(row["full_name"], "Budi");
        assert_eq!(row["capacity"], 32);
        assert_eq!(row["level"], "XI");
        assert_eq!(row.len(), 4);
    }

    #[test]
    fn form_row_rejects_bad_values_and_clears_blanks() {
        assert!(form_row(&json!({"level": "XIII"}), FIELDS).is_err());
        assert!(form_row(&json!({"capacity": "many"}), FIELDS).is_err());
        assert!(form_row(&json!({"birthDate": "01/02/2008"}), FIELDS).is_err());
        let row = form_row(&json!({"fullName": " "}), FIELDS).expect("row");
        assert!(row["full_name"].is_null());
        assert_eq!(
            require(&row, FIELDS, &["full_name"]).expect_err("missing").to_string(),
            "missing fullName"
        );
    }

    #[test]
    fn wire_keys_are_camel_case() {
        assert_eq!(camel_case("homeroom_teacher_id"), "homeroomTeacherId");
        assert_eq!(camel_case("id"), "id");
    }
}
