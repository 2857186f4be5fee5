//! School settings screen: key/value settings, academic years, semesters,
//! lesson time slots and point categories.

use crate::error::{is_unique_violation, SchoolError, SchoolResult};
use crate::ipc::error::respond;
use crate::ipc::helpers::{
    choice, ensure_exists, form_row, int, opt_i64, opt_str, parse_choice, req_str, require, text,
    to_wire, Field,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{DayTag, PointKind, Semester, SettingType, TimeSlotKind, YearStatus};
use crate::store::{self, Query, Row};
use chrono::NaiveTime;
use rusqlite::Connection;
use serde_json::json;
use tracing::info;

fn unique_as_conflict(e: SchoolError, message: &str) -> SchoolError {
    match e {
        SchoolError::Db(db) if is_unique_violation(&db) => SchoolError::conflict(message, None),
        other => other,
    }
}

fn wire_rows(rows: Vec<Row>) -> Vec<serde_json::Value> {
    rows.into_iter().map(to_wire).collect()
}

// settings

fn settings_list(state: &AppState) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let rows = store::select(conn, &Query::from("settings").order("setting_key", true))?;
    Ok(json!({ "settings": wire_rows(rows) }))
}

/// Checks `value` against the setting's declared type and returns the
/// stored text form.
pub fn setting_text(kind: SettingType, value: &serde_json::Value) -> SchoolResult<String> {
    let raw = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Null => return Err(SchoolError::bad_params("missing value")),
        other => other.to_string(),
    };
    let valid = match kind {
        SettingType::Text => true,
        SettingType::Number => raw.parse::<f64>().is_ok(),
        SettingType::Boolean => matches!(raw.as_str(), "true" | "false"),
        SettingType::Json => serde_json::from_str::<serde_json::Value>(&raw).is_ok(),
    };
    if !valid {
        return Err(SchoolError::bad_params(format!("value is not a valid {kind}")));
    }
    Ok(raw)
}

fn settings_update(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "id")?;
    let existing = ensure_exists(conn, "settings", "setting", &id)?;
    let kind = store::str_field(&existing, "setting_type")
        .and_then(SettingType::parse)
        .unwrap_or(SettingType::Text);
    let value = setting_text(kind, params.get("value").unwrap_or(&serde_json::Value::Null))?;
    let mut row = Row::new();
    row.insert("setting_value".into(), value.clone().into());
    store::update(conn, "settings", &id, &row)?;
    info!(key = store::str_field(&existing, "setting_key").unwrap_or_default(), "setting updated");
    Ok(json!({ "id": id, "value": value }))
}

// academic years

/// `YYYY/YYYY` with consecutive years.
pub fn parse_year_label(label: &str) -> SchoolResult<(i32, i32)> {
    let bad = || SchoolError::bad_params(format!("academic year must look like 2024/2025, got {label:?}"));
    let (a, b) = label.split_once('/').ok_or_else(bad)?;
    if a.len() != 4 || b.len() != 4 {
        return Err(bad());
    }
    let first = a.parse::<i32>().map_err(|_| bad())?;
    let second = b.parse::<i32>().map_err(|_| bad())?;
    if second != first + 1 {
        return Err(bad());
    }
    Ok((first, second))
}

fn academic_years_list(state: &AppState) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let rows = store::select(conn, &Query::from("academic_years").order("label", false))?;
    Ok(json!({ "academicYears": wire_rows(rows) }))
}

fn academic_years_create(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let label = req_str(params, "label")?;
    let (first, second) = parse_year_label(&label)?;
    let mut row = Row::new();
    row.insert("label".into(), label.clone().into());
    row.insert("status".into(), YearStatus::Upcoming.as_str().into());
    row.insert("start_date".into(), format!("{first}-07-01").into());
    row.insert("end_date".into(), format!("{second}-06-30").into());
    let id = store::insert(conn, "academic_years", &row)
        .map_err(|e| unique_as_conflict(e, "academic year already exists"))?;
    Ok(json!({ "id": id, "label": label }))
}

/// Finishes every other active row of `table` (scoped by `scope` when set)
/// so at most one stays active.
fn finish_other_active(
    conn: &Connection,
    table: &'static str,
    keep_id: &str,
    scope: Option<(&'static str, &str)>,
) -> SchoolResult<()> {
    let mut q = Query::from(table).eq("status", YearStatus::Active.as_str());
    if let Some((col, val)) = scope {
        q = q.eq(col, val);
    }
    let mut finished = Row::new();
    finished.insert("status".into(), YearStatus::Finished.as_str().into());
    for r in store::select(conn, &q)? {
        if let Some(id) = store::str_field(&r, "id").filter(|id| *id != keep_id) {
            store::update(conn, table, id, &finished)?;
        }
    }
    Ok(())
}

fn academic_years_set_status(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "id")?;
    let status = parse_choice(&req_str(params, "status")?, YearStatus::parse, "status")?;
    ensure_exists(conn, "academic_years", "academic year", &id)?;
    let tx = conn.unchecked_transaction()?;
    if status == YearStatus::Active {
        finish_other_active(&tx, "academic_years", &id, None)?;
    }
    let mut row = Row::new();
    row.insert("status".into(), status.as_str().into());
    store::update(&tx, "academic_years", &id, &row)?;
    tx.commit()?;
    Ok(json!({ "id": id, "status": status }))
}

// semesters

fn semesters_list(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let mut q = Query::from("semesters")
        .order("academic_year", false)
        .order("semester", false);
    if let Some(year) = opt_str(params, "academicYear") {
        q = q.eq("academic_year", year);
    }
    Ok(json!({ "semesters": wire_rows(store::select(conn, &q)?) }))
}

fn semesters_create(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let year = req_str(params, "academicYear")?;
    parse_year_label(&year)?;
    let semester = parse_choice(&req_str(params, "semester")?, Semester::parse, "semester")?;
    let status = match opt_str(params, "status") {
        Some(raw) => parse_choice(&raw, YearStatus::parse, "status")?,
        None => YearStatus::Upcoming,
    };
    let tx = conn.unchecked_transaction()?;
    let mut row = Row::new();
    row.insert("academic_year".into(), year.clone().into());
    row.insert("semester".into(), semester.as_str().into());
    row.insert("status".into(), status.as_str().into());
    let id = store::insert(&tx, "semesters", &row)
        .map_err(|e| unique_as_conflict(e, "semester already exists for this academic year"))?;
    if status == YearStatus::Active {
        finish_other_active(&tx, "semesters", &id, Some(("academic_year", year.as_str())))?;
    }
    tx.commit()?;
    Ok(json!({ "id": id }))
}

// time slots

const TIME_SLOT_FIELDS: &[Field] = &[
    int("session", "session"),
    text("startTime", "start_time"),
    text("endTime", "end_time"),
    choice("day", "day", DayTag::WIRE),
    choice("kind", "kind", TimeSlotKind::WIRE),
];

const DEFAULT_START: &str = "07:00";
const DEFAULT_END: &str = "07:45";

fn parse_clock(raw: &str) -> SchoolResult<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| SchoolError::bad_params(format!("time must be HH:MM, got {raw:?}")))
}

fn check_time_range(row: &Row) -> SchoolResult<()> {
    let start = parse_clock(store::str_field(row, "start_time").unwrap_or_default())?;
    let end = parse_clock(store::str_field(row, "end_time").unwrap_or_default())?;
    if start >= end {
        return Err(SchoolError::bad_params("start time must be before end time"));
    }
    if store::int_field(row, "session").is_some_and(|s| s < 1) {
        return Err(SchoolError::bad_params("session must be positive"));
    }
    Ok(())
}

fn time_slots_list(state: &AppState) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let rows = store::select(
        conn,
        &Query::from("time_slots").order("session", true).order("day", true),
    )?;
    Ok(json!({ "timeSlots": wire_rows(rows) }))
}

/// Appends the next session with default times unless given.
fn time_slots_add(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let mut row = form_row(params, TIME_SLOT_FIELDS)?;
    row.retain(|_, v| !v.is_null());
    if !row.contains_key("session") {
        let next = store::select(conn, &Query::from("time_slots"))?
            .iter()
            .filter_map(|r| store::int_field(r, "session"))
            .max()
            .unwrap_or(0)
            + 1;
        row.insert("session".into(), next.into());
    }
    row.entry("start_time").or_insert_with(|| DEFAULT_START.into());
    row.entry("end_time").or_insert_with(|| DEFAULT_END.into());
    row.entry("day").or_insert_with(|| DayTag::All.as_str().into());
    row.entry("kind")
        .or_insert_with(|| TimeSlotKind::Normal.as_str().into());
    check_time_range(&row)?;
    let id = store::insert(conn, "time_slots", &row)?;
    Ok(json!({ "id": id, "session": row.get("session") }))
}

fn time_slots_update(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "id")?;
    let existing = ensure_exists(conn, "time_slots", "time slot", &id)?;
    let row = form_row(params, TIME_SLOT_FIELDS)?;
    if row.values().any(|v| v.is_null()) {
        return Err(SchoolError::bad_params("time slot fields must not be empty"));
    }
    let mut merged = existing;
    merged.extend(row.clone());
    check_time_range(&merged)?;
    store::update(conn, "time_slots", &id, &row)?;
    Ok(json!({ "id": id }))
}

fn time_slots_delete(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "id")?;
    if !store::delete(conn, "time_slots", &id)? {
        return Err(SchoolError::NotFound("time slot"));
    }
    Ok(json!({ "deleted": true }))
}

// point categories

const CATEGORY_FIELDS: &[Field] = &[
    text("name", "name"),
    choice("kind", "kind", PointKind::WIRE),
    int("minPoints", "min_points"),
    int("maxPoints", "max_points"),
];

fn check_point_range(row: &Row) -> SchoolResult<()> {
    let min = store::int_field(row, "min_points").unwrap_or(0);
    let max = store::int_field(row, "max_points").unwrap_or(0);
    if min < 0 || max < min {
        return Err(SchoolError::bad_params(
            "point range must satisfy 0 <= minPoints <= maxPoints",
        ));
    }
    Ok(())
}

fn categories_list(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let mut q = Query::from("point_categories").order("kind", true).order("name", true);
    if let Some(kind) = opt_str(params, "kind") {
        q = q.eq("kind", parse_choice(&kind, PointKind::parse, "kind")?.as_str());
    }
    Ok(json!({ "categories": wire_rows(store::select(conn, &q)?) }))
}

fn categories_create(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let mut row = form_row(params, CATEGORY_FIELDS)?;
    require(&row, CATEGORY_FIELDS, &["name", "kind"])?;
    row.retain(|_, v| !v.is_null());
    if let Some(min) = opt_i64(params, "minPoints")? {
        row.entry("max_points").or_insert_with(|| min.into());
    }
    check_point_range(&row)?;
    let id = store::insert(conn, "point_categories", &row)?;
    Ok(json!({ "id": id }))
}

fn categories_update(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "id")?;
    let existing = ensure_exists(conn, "point_categories", "point category", &id)?;
    let row = form_row(params, CATEGORY_FIELDS)?;
    if row.values().any(|v| v.is_null()) {
        return Err(SchoolError::bad_params("category fields must not be empty"));
    }
    let mut merged = existing;
    merged.extend(row.clone());
    check_point_range(&merged)?;
    store::update(conn, "point_categories", &id, &row)?;
    Ok(json!({ "id": id }))
}

fn categories_delete(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "id")?;
    if !store::delete(conn, "point_categories", &id)? {
        return Err(SchoolError::NotFound("point category"));
    }
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let p = &req.params;
    let result = match req.method.as_str() {
        "settings.list" => settings_list(state),
        "settings.update" => settings_update(state, p),
        "academicYears.list" => academic_years_list(state),
        "academicYears.create" => academic_years_create(state, p),
        "academicYears.setStatus" => academic_years_set_status(state, p),
        "semesters.list" => semesters_list(state, p),
        "semesters.create" => semesters_create(state, p),
        "timeSlots.list" => time_slots_list(state),
        "timeSlots.add" => time_slots_add(state, p),
        "timeSlots.update" => time_slots_update(state, p),
        "timeSlots.delete" => time_slots_delete(state, p),
        "pointCategories.list" => categories_list(state, p),
        "pointCategories.create" => categories_create(state, p),
        "pointCategories.update" => categories_update(state, p),
        "pointCategories.delete" => categories_delete(state, p),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_labels_must_be_consecutive() {
        assert_eq!(parse_year_label("2024/2025").expect("label"), (2024, 2025));
        assert!(parse_year_label("2024/2026").is_err());
        assert!(parse_year_label("24/25").is_err());
        assert!(parse_year_label("2024-2025").is_err());
    }

    #[test]
    fn setting_values_follow_their_type() {
        assert_eq!(setting_text(SettingType::Number, &json!(12)).expect("number"), "12");
        assert!(setting_text(SettingType::Number, &json!("twelve")).is_err());
        assert_eq!(setting_text(SettingType::Boolean, &json!(true)).expect("bool"), "true");
        assert!(setting_text(SettingType::Boolean, &json!("yes")).is_err());
        assert!(setting_text(SettingType::Json, &json!("{\"a\":1}")).is_ok());
        assert!(setting_text(SettingType::Json, &json!("{oops")).is_err());
        assert!(setting_text(SettingType::Text, &json!(null)).is_err());
    }

    #[test]
    fn time_ranges_are_ordered() {
        let mut row = Row::new();
        row.insert("start_time".into(), json!("07:45"));
        row.insert("end_time".into(), json!("07:00"));
        assert!(check_time_range(&row).is_err());
        row.insert("end_time".into(), json!("08:30"));
        assert!(check_time_range(&row).is_ok());
        row.insert("start_time".into(), json!("7 am"));
        assert!(check_time_range(&row).is_err());
    }
}
