use crate::aggregate::join_label;
use crate::config::MAX_STUDENT_PAGE_SIZE;
use crate::db;
use crate::error::{SchoolError, SchoolResult};
use crate::ipc::error::respond;
use crate::ipc::helpers::{
    choice, date, ensure_exists, form_row, label_map, opt_i64, opt_str, req_str, require, text,
    to_wire, Field,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Gender, StudentStatus};
use crate::store::{self, Query, Row};
use serde_json::json;
use std::collections::HashMap;

const STUDENT_FIELDS: &[Field] = &[
    text("nis", "nis"),
    text("nisn", "nisn"),
    text("fullName", "full_name"),
    choice("gender", "gender", Gender::WIRE),
    text("birthPlace", "birth_place"),
    date("birthDate", "birth_date"),
    text("address", "address"),
    text("phone", "phone"),
    text("email", "email"),
    text("fatherName", "father_name"),
    text("motherName", "mother_name"),
    text("classId", "class_id"),
    text("photoUrl", "photo_url"),
    choice("status", "status", StudentStatus::WIRE),
];

fn with_class_name(row: Row, classes: &HashMap<String, String>) -> serde_json::Value {
    let class_name = join_label(classes, store::str_field(&row, "class_id"));
    let mut v = to_wire(row);
    v["className"] = json!(class_name);
    v
}

fn list(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let page = opt_i64(params, "page")?.unwrap_or(1);
    let page_size = opt_i64(params, "pageSize")?.unwrap_or(state.config.student_page_size);
    if page < 1 || page_size < 1 {
        return Err(SchoolError::bad_params("page and pageSize must be positive"));
    }
    if page_size > MAX_STUDENT_PAGE_SIZE {
        return Err(SchoolError::bad_params(format!(
            "pageSize may not exceed {MAX_STUDENT_PAGE_SIZE}"
        )));
    }

    let mut q = Query::from("students");
    if let Some(class_id) = opt_str(params, "classId") {
        q = q.eq("class_id", class_id);
    } else if params.get("unassigned").and_then(|v| v.as_bool()) == Some(true) {
        q = q.is_null("class_id");
    }
    if let Some(search) = opt_str(params, "search") {
        q = q.any_like(&["full_name", "nis"], &search);
    }
    let total = store::count(conn, "students", &q.filters)?;
    let (from, to) = (page - 1)
        .checked_mul(page_size)
        .and_then(|from| Some((from, from.checked_add(page_size - 1)?)))
        .ok_or_else(|| SchoolError::bad_params("page is out of range"))?;
    let q = q
        .order("created_at", false)
        .order("full_name", true)
        .range(from, to);

    let classes = label_map(conn, "classes", "name")?;
    let students: Vec<serde_json::Value> = store::select(conn, &q)?
        .into_iter()
        .map(|r| with_class_name(r, &classes))
        .collect();
    Ok(json!({
        "students": students,
        "total": total,
        "page": page,
        "pageSize": page_size,
    }))
}

fn get(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "id")?;
    let row = ensure_exists(conn, "students", "student", &id)?;
    let classes = label_map(conn, "classes", "name")?;
    Ok(json!({ "student": with_class_name(row, &classes) }))
}

fn create(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let mut row = form_row(params, STUDENT_FIELDS)?;
    require(&row, STUDENT_FIELDS, &["nis", "full_name"])?;
    row.retain(|_, v| !v.is_null());
    row.insert("created_at".into(), db::now_rfc3339().into());
    let id = store::insert(conn, "students", &row)?;
    Ok(json!({ "id": id }))
}

fn update(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "id")?;
    ensure_exists(conn, "students", "student", &id)?;
    let row = form_row(params, STUDENT_FIELDS)?;
    for col in ["nis", "full_name", "gender", "status"] {
        if row.get(col).is_some_and(|v| v.is_null()) {
            return Err(SchoolError::bad_params(format!("{col} must not be empty")));
        }
    }
    store::update(conn, "students", &id, &row)?;
    Ok(json!({ "id": id }))
}

fn delete(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "id")?;
    if !store::delete(conn, "students", &id)? {
        return Err(SchoolError::NotFound("student"));
    }
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => list(state, &req.params),
        "students.get" => get(state, &req.params),
        "students.create" => create(state, &req.params),
        "students.update" => update(state, &req.params),
        "students.delete" => delete(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
