use crate::aggregate::join_label;
use crate::error::{SchoolError, SchoolResult};
use crate::ipc::error::respond;
use crate::ipc::helpers::{
    choice, ensure_exists, form_row, int, label_map, opt_str, parse_choice, req_str, require,
    text, to_wire, Field,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{ActiveStatus, LevelTag, SubjectCategory, SubjectSemester};
use crate::store::{self, Query};
use serde_json::json;

const SUBJECT_FIELDS: &[Field] = &[
    text("code", "code"),
    text("name", "name"),
    choice("category", "category", SubjectCategory::WIRE),
    choice("level", "level", LevelTag::WIRE),
    text("major", "major"),
    text("teacherId", "teacher_id"),
    text("classId", "class_id"),
    choice("semester", "semester", SubjectSemester::WIRE),
    text("academicYear", "academic_year"),
    int("weeklyHours", "weekly_hours"),
    int("passingGrade", "passing_grade"),
    text("description", "description"),
    choice("status", "status", ActiveStatus::WIRE),
];

fn list(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let mut q = Query::from("subjects").order("name", true);
    if let Some(level) = opt_str(params, "level") {
        q = q.eq("level", parse_choice(&level, LevelTag::parse, "level")?.as_str());
    }
    if let Some(search) = opt_str(params, "search") {
        q = q.any_like(&["name", "code"], &search);
    }
    let teachers = label_map(conn, "users", "full_name")?;
    let classes = label_map(conn, "classes", "name")?;
    let subjects: Vec<serde_json::Value> = store::select(conn, &q)?
        .into_iter()
        .map(|row| {
            let teacher = join_label(&teachers, store::str_field(&row, "teacher_id"));
            let class = join_label(&classes, store::str_field(&row, "class_id"));
            let mut v = to_wire(row);
            v["teacherName"] = json!(teacher);
            v["className"] = json!(class);
            v
        })
        .collect();
    Ok(json!({ "subjects": subjects }))
}

fn create(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let mut row = form_row(params, SUBJECT_FIELDS)?;
    require(&row, SUBJECT_FIELDS, &["name"])?;
    row.retain(|_, v| !v.is_null());
    let id = store::insert(conn, "subjects", &row)?;
    Ok(json!({ "id": id }))
}

fn update(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "id")?;
    ensure_exists(conn, "subjects", "subject", &id)?;
    let row = form_row(params, SUBJECT_FIELDS)?;
    for col in [
        "name",
        "category",
        "level",
        "semester",
        "weekly_hours",
        "passing_grade",
        "status",
    ] {
        if row.get(col).is_some_and(|v| v.is_null()) {
            return Err(SchoolError::bad_params(format!("{col} must not be empty")));
        }
    }
    store::update(conn, "subjects", &id, &row)?;
    Ok(json!({ "id": id }))
}

fn delete(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "id")?;
    if !store::delete(conn, "subjects", &id)? {
        return Err(SchoolError::NotFound("subject"));
    }
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "subjects.list" => list(state, &req.params),
        "subjects.create" => create(state, &req.params),
        "subjects.update" => update(state, &req.params),
        "subjects.delete" => delete(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
