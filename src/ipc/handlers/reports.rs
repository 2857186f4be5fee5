//! Tabular report models (title, columns, numbered rows) for the printable
//! lists. Rendering is left to the caller.

use super::points::list_events;
use super::schedule::schedule_rows;
use crate::aggregate::{join_label, Report};
use crate::error::SchoolResult;
use crate::ipc::error::respond;
use crate::ipc::helpers::{label_map, opt_str, parse_choice};
use crate::ipc::types::{AppState, Request};
use crate::model::{PointKind, Role};
use crate::store::{self, Query, Row};

fn field(row: &Row, key: &str) -> Option<String> {
    store::str_field(row, key).map(str::to_string)
}

fn wire_field(v: &serde_json::Value, key: &str) -> Option<String> {
    match v.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn students(state: &AppState, params: &serde_json::Value) -> SchoolResult<Report> {
    let conn = state.conn()?;
    let classes = label_map(conn, "classes", "name")?;
    let mut q = Query::from("students").order("full_name", true);
    let class_id = opt_str(params, "classId");
    let title = match &class_id {
        Some(id) => {
            q = q.eq("class_id", id.as_str());
            format!("Student List {}", join_label(&classes, Some(id.as_str())))
        }
        None => "Student List".to_string(),
    };
    let mut report = Report::new(
        &title,
        &["NIS", "NISN", "Full Name", "Gender", "Class", "Status"],
    );
    for r in store::select(conn, &q)? {
        report.push(vec![
            field(&r, "nis"),
            field(&r, "nisn"),
            field(&r, "full_name"),
            field(&r, "gender"),
            Some(join_label(&classes, store::str_field(&r, "class_id"))),
            field(&r, "status"),
        ]);
    }
    Ok(report)
}

fn users(state: &AppState, params: &serde_json::Value) -> SchoolResult<Report> {
    let conn = state.conn()?;
    let mut q = Query::from("users").order("full_name", true);
    if let Some(role) = opt_str(params, "role") {
        q = q.eq("role", parse_choice(&role, Role::parse, "role")?.as_str());
    }
    let mut report = Report::new(
        "Staff and Teacher List",
        &["Full Name", "Username", "NIP", "Role", "Position", "Status"],
    );
    for r in store::select(conn, &q)? {
        report.push(vec![
            field(&r, "full_name"),
            field(&r, "username"),
            field(&r, "nip"),
            field(&r, "role"),
            field(&r, "position"),
            field(&r, "status"),
        ]);
    }
    Ok(report)
}

fn schedule(state: &AppState, params: &serde_json::Value) -> SchoolResult<Report> {
    let conn = state.conn()?;
    let class_id = opt_str(params, "classId");
    let mut report = Report::new(
        "Lesson Schedule",
        &["Day", "Time", "Class", "Subject", "Teacher", "Room"],
    );
    for slot in schedule_rows(conn, class_id.as_deref(), None, None)? {
        report.push(vec![
            wire_field(&slot, "day"),
            wire_field(&slot, "timeLabel"),
            wire_field(&slot, "className"),
            wire_field(&slot, "subjectName"),
            wire_field(&slot, "teacherName"),
            wire_field(&slot, "room"),
        ]);
    }
    Ok(report)
}

fn violations(state: &AppState, params: &serde_json::Value) -> SchoolResult<Report> {
    let conn = state.conn()?;
    let student_id = opt_str(params, "studentId");
    let mut report = Report::new(
        "Student Violations",
        &["Date", "Student", "Class", "Category", "Severity", "Points", "Description"],
    );
    for e in list_events(conn, Some(PointKind::Violation), student_id.as_deref())? {
        report.push(vec![
            wire_field(&e, "date"),
            wire_field(&e, "studentName"),
            wire_field(&e, "className"),
            wire_field(&e, "categoryLabel"),
            wire_field(&e, "severity"),
            wire_field(&e, "points"),
            wire_field(&e, "description"),
        ]);
    }
    Ok(report)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let report = match req.method.as_str() {
        "reports.students" => students(state, &req.params),
        "reports.users" => users(state, &req.params),
        "reports.schedule" => schedule(state, &req.params),
        "reports.violations" => violations(state, &req.params),
        _ => return None,
    };
    let result = report.map(|r| serde_json::to_value(r).unwrap_or_default());
    Some(respond(&req.id, result))
}
