//! Option lists for form dropdowns. Open to every signed-in role.

use crate::error::SchoolResult;
use crate::ipc::error::respond;
use crate::ipc::helpers::{active_academic_year, active_semester};
use crate::ipc::types::{AppState, Request};
use crate::model::{ActiveStatus, Role, UserStatus};
use crate::store::{self, Query};
use serde_json::json;

fn teachers(state: &AppState) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let rows = store::select(
        conn,
        &Query::from("users")
            .eq("role", Role::Teacher.as_str())
            .eq("status", UserStatus::Active.as_str())
            .order("full_name", true),
    )?;
    let teachers: Vec<serde_json::Value> = rows
        .iter()
        .map(|r| {
            json!({
                "id": store::str_field(r, "id"),
                "fullName": store::str_field(r, "full_name"),
                "subjectArea": store::str_field(r, "subject_area"),
            })
        })
        .collect();
    Ok(json!({ "teachers": teachers }))
}

fn classes(state: &AppState) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let rows = store::select(
        conn,
        &Query::from("classes")
            .eq("status", ActiveStatus::Active.as_str())
            .order("level", true)
            .order("name", true),
    )?;
    let classes: Vec<serde_json::Value> = rows
        .iter()
        .map(|r| {
            json!({
                "id": store::str_field(r, "id"),
                "name": store::str_field(r, "name"),
                "level": store::str_field(r, "level"),
            })
        })
        .collect();
    Ok(json!({ "classes": classes }))
}

fn subjects(state: &AppState) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let rows = store::select(
        conn,
        &Query::from("subjects")
            .eq("status", ActiveStatus::Active.as_str())
            .order("name", true),
    )?;
    let subjects: Vec<serde_json::Value> = rows
        .iter()
        .map(|r| {
            json!({
                "id": store::str_field(r, "id"),
                "name": store::str_field(r, "name"),
                "level": store::str_field(r, "level"),
                "classId": store::str_field(r, "class_id"),
                "teacherId": store::str_field(r, "teacher_id"),
            })
        })
        .collect();
    Ok(json!({ "subjects": subjects }))
}

fn active_year(state: &AppState) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let year = active_academic_year(conn, &state.config)?;
    let semester = active_semester(conn, &year)?;
    Ok(json!({ "academicYear": year, "semester": semester }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "lookup.teachers" => teachers(state),
        "lookup.classes" => classes(state),
        "lookup.subjects" => subjects(state),
        "lookup.activeYear" => active_year(state),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
