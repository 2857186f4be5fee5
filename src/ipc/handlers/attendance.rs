use crate::error::{SchoolError, SchoolResult};
use crate::ipc::error::respond;
use crate::ipc::helpers::{ensure_exists, is_active, opt_str, parse_choice, parse_date, req_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceStatus, Level, LevelTag, StudentStatus};
use crate::rules::{
    applicable_subjects, resolve_submitted_statuses, roster_with_defaults, ClassRef, SubjectRef,
    ATTENDANCE_SESSION,
};
use crate::store::{self, Query, Row};
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;
use tracing::info;

struct SubjectOption {
    id: String,
    name: String,
}

fn class_level(row: &Row) -> SchoolResult<Level> {
    parse_choice(
        store::str_field(row, "level").unwrap_or_default(),
        Level::parse,
        "class level",
    )
}

/// Active subjects applicable to the class, ordered by name.
fn subjects_for_class(conn: &Connection, class_id: &str) -> SchoolResult<Vec<SubjectOption>> {
    let class_row = ensure_exists(conn, "classes", "class", class_id)?;
    let class = ClassRef {
        id: class_id,
        level: class_level(&class_row)?,
    };
    let rows: Vec<Row> = store::select(conn, &Query::from("subjects").order("name", true))?
        .into_iter()
        .filter(is_active)
        .collect();
    let refs: Vec<SubjectRef<'_>> = rows
        .iter()
        .filter_map(|r| {
            Some(SubjectRef {
                id: store::str_field(r, "id")?,
                class_id: store::str_field(r, "class_id"),
                level: LevelTag::parse(store::str_field(r, "level")?)?,
            })
        })
        .collect();
    let names: HashMap<&str, &str> = rows
        .iter()
        .filter_map(|r| Some((store::str_field(r, "id")?, store::str_field(r, "name")?)))
        .collect();
    Ok(applicable_subjects(&refs, &class)
        .into_iter()
        .map(|s| SubjectOption {
            id: s.id.to_string(),
            name: names.get(s.id).copied().unwrap_or_default().to_string(),
        })
        .collect())
}

/// Active students of the class, ordered by name.
fn roster(conn: &Connection, class_id: &str) -> SchoolResult<Vec<Row>> {
    store::select(
        conn,
        &Query::from("students")
            .eq("class_id", class_id)
            .eq("status", StudentStatus::Active.as_str())
            .order("full_name", true),
    )
}

fn subjects(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let class_id = req_str(params, "classId")?;
    let subjects: Vec<serde_json::Value> = subjects_for_class(conn, &class_id)?
        .into_iter()
        .map(|s| json!({ "id": s.id, "name": s.name }))
        .collect();
    Ok(json!({ "subjects": subjects }))
}

fn open(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let class_id = req_str(params, "classId")?;
    let date = parse_date(&req_str(params, "date")?)?.format("%Y-%m-%d").to_string();
    let options = subjects_for_class(conn, &class_id)?;
    let subject_list: Vec<serde_json::Value> = options
        .iter()
        .map(|s| json!({ "id": s.id, "name": s.name }))
        .collect();

    let subject_id = match opt_str(params, "subjectId") {
        Some(id) => {
            if !options.iter().any(|s| s.id == id) {
                return Err(SchoolError::bad_params("subject does not apply to this class"));
            }
            Some(id)
        }
        None => options.first().map(|s| s.id.clone()),
    };
    let Some(subject_id) = subject_id else {
        return Ok(json!({
            "classId": class_id,
            "date": date,
            "session": ATTENDANCE_SESSION,
            "subjectId": null,
            "subjects": subject_list,
            "roster": [],
        }));
    };

    let students = roster(conn, &class_id)?;
    let ids: Vec<String> = students
        .iter()
        .filter_map(|r| store::str_field(r, "id").map(str::to_string))
        .collect();
    let existing: HashMap<String, AttendanceStatus> = store::select(
        conn,
        &Query::from("attendance_records")
            .eq("subject_id", subject_id.as_str())
            .eq("date", date.as_str())
            .eq("session", ATTENDANCE_SESSION),
    )?
    .iter()
    .filter_map(|r| {
        Some((
            store::str_field(r, "student_id")?.to_string(),
            AttendanceStatus::parse(store::str_field(r, "status")?)?,
        ))
    })
    .collect();

    let by_id: HashMap<&str, &Row> = students
        .iter()
        .filter_map(|r| Some((store::str_field(r, "id")?, r)))
        .collect();
    let entries: Vec<serde_json::Value> = roster_with_defaults(&ids, &existing)
        .into_iter()
        .map(|e| {
            let row = by_id.get(e.student_id.as_str());
            json!({
                "studentId": e.student_id,
                "nis": row.and_then(|r| store::str_field(r, "nis")),
                "fullName": row.and_then(|r| store::str_field(r, "full_name")),
                "status": e.status,
            })
        })
        .collect();
    Ok(json!({
        "classId": class_id,
        "date": date,
        "session": ATTENDANCE_SESSION,
        "subjectId": subject_id,
        "subjects": subject_list,
        "roster": entries,
    }))
}

fn submitted_statuses(params: &serde_json::Value) -> SchoolResult<HashMap<String, String>> {
    let Some(raw) = params.get("statuses") else {
        return Ok(HashMap::new());
    };
    let map = raw
        .as_object()
        .ok_or_else(|| SchoolError::bad_params("statuses must be an object"))?;
    map.iter()
        .map(|(sid, v)| {
            v.as_str()
                .map(|s| (sid.clone(), s.to_string()))
                .ok_or_else(|| SchoolError::bad_params(format!("status for {sid} must be a string")))
        })
        .collect()
}

/// Writes one record per roster student in a single transaction.
fn save(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let class_id = req_str(params, "classId")?;
    let subject_id = req_str(params, "subjectId")?;
    let date = parse_date(&req_str(params, "date")?)?.format("%Y-%m-%d").to_string();
    ensure_exists(conn, "classes", "class", &class_id)?;
    ensure_exists(conn, "subjects", "subject", &subject_id)?;
    if !subjects_for_class(conn, &class_id)?.iter().any(|s| s.id == subject_id) {
        return Err(SchoolError::bad_params("subject does not apply to this class"));
    }

    let submitted = submitted_statuses(params)?;
    let ids: Vec<String> = roster(conn, &class_id)?
        .iter()
        .filter_map(|r| store::str_field(r, "id").map(str::to_string))
        .collect();
    let entries = resolve_submitted_statuses(&ids, &submitted).map_err(SchoolError::BadParams)?;

    let tx = conn.unchecked_transaction()?;
    for e in &entries {
        let mut row = Row::new();
        row.insert("student_id".into(), e.student_id.clone().into());
        row.insert("subject_id".into(), subject_id.clone().into());
        row.insert("date".into(), date.clone().into());
        row.insert("session".into(), ATTENDANCE_SESSION.into());
        row.insert("status".into(), e.status.as_str().into());
        row.insert("method".into(), "manual".into());
        store::upsert(
            &tx,
            "attendance_records",
            &row,
            &["student_id", "subject_id", "date", "session"],
        )?;
    }
    tx.commit()?;

    info!(
        class_id = %class_id,
        subject_id = %subject_id,
        date = %date,
        saved = entries.len(),
        "attendance saved"
    );
    Ok(json!({
        "saved": entries.len(),
        "classId": class_id,
        "subjectId": subject_id,
        "date": date,
        "session": ATTENDANCE_SESSION,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.subjects" => subjects(state, &req.params),
        "attendance.open" => open(state, &req.params),
        "attendance.save" => save(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
