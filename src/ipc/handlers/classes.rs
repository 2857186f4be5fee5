use crate::aggregate::join_label;
use crate::error::{SchoolError, SchoolResult};
use crate::ipc::error::respond;
use crate::ipc::helpers::{
    active_academic_year, active_semester, choice, ensure_exists, form_row, int, label_map,
    opt_str, parse_choice, req_str, require, text, to_wire, Field,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{ActiveStatus, Level, Semester};
use crate::rules::class_code;
use crate::store::{self, Query, Row};
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;

const CLASS_FIELDS: &[Field] = &[
    text("name", "name"),
    choice("level", "level", Level::WIRE),
    text("major", "major"),
    text("homeroomTeacherId", "homeroom_teacher_id"),
    int("capacity", "capacity"),
    text("room", "room"),
    text("academicYear", "academic_year"),
    choice("semester", "semester", Semester::WIRE),
    choice("status", "status", ActiveStatus::WIRE),
];

fn student_counts(conn: &Connection) -> SchoolResult<HashMap<String, i64>> {
    let mut counts = HashMap::new();
    for s in store::select(conn, &Query::from("students"))? {
        if let Some(cid) = store::str_field(&s, "class_id") {
            *counts.entry(cid.to_string()).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

fn list(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let mut q = Query::from("classes").order("level", true).order("name", true);
    if let Some(status) = opt_str(params, "status") {
        q = q.eq("status", parse_choice(&status, ActiveStatus::parse, "status")?.as_str());
    }
    let teachers = label_map(conn, "users", "full_name")?;
    let counts = student_counts(conn)?;
    let classes: Vec<serde_json::Value> = store::select(conn, &q)?
        .into_iter()
        .map(|row| {
            let teacher = join_label(&teachers, store::str_field(&row, "homeroom_teacher_id"));
            let n = store::str_field(&row, "id")
                .and_then(|id| counts.get(id))
                .copied()
                .unwrap_or(0);
            let mut v = to_wire(row);
            v["homeroomTeacherName"] = json!(teacher);
            v["studentCount"] = json!(n);
            v
        })
        .collect();
    Ok(json!({ "classes": classes }))
}

fn level_of(row: &Row) -> SchoolResult<Level> {
    let raw = store::str_field(row, "level").unwrap_or_default();
    parse_choice(raw, Level::parse, "level")
}

fn create(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let mut row = form_row(params, CLASS_FIELDS)?;
    require(&row, CLASS_FIELDS, &["name", "level"])?;
    row.retain(|_, v| !v.is_null());
    let name = store::str_field(&row, "name").unwrap_or_default().to_string();
    let code = class_code(level_of(&row)?, &name);
    row.insert("code".into(), code.clone().into());
    if !row.contains_key("academic_year") {
        row.insert("academic_year".into(), active_academic_year(conn, &state.config)?.into());
    }
    if !row.contains_key("semester") {
        let year = store::str_field(&row, "academic_year").unwrap_or_default().to_string();
        row.insert("semester".into(), active_semester(conn, &year)?.as_str().into());
    }
    let id = store::insert(conn, "classes", &row)?;
    Ok(json!({ "id": id, "code": code }))
}

fn update(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "id")?;
    let existing = ensure_exists(conn, "classes", "class", &id)?;
    let mut row = form_row(params, CLASS_FIELDS)?;
    for col in ["name", "level", "capacity", "semester", "status"] {
        if row.get(col).is_some_and(|v| v.is_null()) {
            return Err(SchoolError::bad_params(format!("{col} must not be empty")));
        }
    }
    if row.contains_key("name") || row.contains_key("level") {
        let mut merged = existing.clone();
        merged.extend(row.clone());
        let name = store::str_field(&merged, "name").unwrap_or_default().to_string();
        row.insert("code".into(), class_code(level_of(&merged)?, &name).into());
    }
    store::update(conn, "classes", &id, &row)?;
    Ok(json!({ "id": id }))
}

/// Removes the class only. Students, subjects and slots keep the dangling id.
fn delete(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "id")?;
    if !store::delete(conn, "classes", &id)? {
        return Err(SchoolError::NotFound("class"));
    }
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "classes.list" => list(state, &req.params),
        "classes.create" => create(state, &req.params),
        "classes.update" => update(state, &req.params),
        "classes.delete" => delete(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
