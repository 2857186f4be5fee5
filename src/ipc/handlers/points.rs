use crate::aggregate::{join_label, PLACEHOLDER};
use crate::db;
use crate::error::{SchoolError, SchoolResult};
use crate::ipc::error::respond;
use crate::ipc::helpers::{
    choice, ensure_exists, form_row, label_map, opt_i64, opt_str, parse_choice, parse_date,
    req_str, text, to_wire, Field,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{PointKind, Severity};
use crate::rules::resolve_point_value;
use crate::store::{self, Query, Row};
use chrono::Local;
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;
use tracing::info;

const EVENT_FIELDS: &[Field] = &[
    choice("severity", "severity", Severity::WIRE),
    text("description", "description"),
    text("sanction", "sanction"),
    text("location", "location"),
    text("status", "status"),
];

/// student id → (name, class id)
fn student_classes(conn: &Connection) -> SchoolResult<HashMap<String, (String, Option<String>)>> {
    Ok(store::select(conn, &Query::from("students"))?
        .iter()
        .filter_map(|r| {
            Some((
                store::str_field(r, "id")?.to_string(),
                (
                    store::str_field(r, "full_name")?.to_string(),
                    store::str_field(r, "class_id").map(str::to_string),
                ),
            ))
        })
        .collect())
}

pub fn list_events(
    conn: &Connection,
    kind: Option<PointKind>,
    student_id: Option<&str>,
) -> SchoolResult<Vec<serde_json::Value>> {
    let mut q = Query::from("point_events")
        .order("date", false)
        .order("created_at", false);
    if let Some(k) = kind {
        q = q.eq("kind", k.as_str());
    }
    if let Some(s) = student_id {
        q = q.eq("student_id", s);
    }
    let students = student_classes(conn)?;
    let classes = label_map(conn, "classes", "name")?;
    Ok(store::select(conn, &q)?
        .into_iter()
        .map(|row| {
            let student = store::str_field(&row, "student_id").and_then(|id| students.get(id));
            let student_name = student
                .map(|(name, _)| name.clone())
                .unwrap_or_else(|| PLACEHOLDER.to_string());
            let class_name = join_label(&classes, student.and_then(|(_, c)| c.as_deref()));
            let mut v = to_wire(row);
            v["studentName"] = json!(student_name);
            v["className"] = json!(class_name);
            v
        })
        .collect())
}

fn parse_kind(params: &serde_json::Value) -> SchoolResult<Option<PointKind>> {
    opt_str(params, "kind")
        .map(|raw| parse_choice(&raw, PointKind::parse, "kind"))
        .transpose()
}

fn list(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let student_id = opt_str(params, "studentId");
    let events = list_events(conn, parse_kind(params)?, student_id.as_deref())?;
    Ok(json!({ "events": events }))
}

/// Appends one event. Stored student totals are left alone.
fn create(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let student_id = req_str(params, "studentId")?;
    let kind = parse_kind(params)?.ok_or_else(|| SchoolError::bad_params("missing kind"))?;
    ensure_exists(conn, "students", "student", &student_id)?;

    let category = match opt_str(params, "categoryId") {
        Some(id) => Some(ensure_exists(conn, "point_categories", "point category", &id)?),
        None => None,
    };
    if let Some(cat) = &category {
        if store::str_field(cat, "kind") != Some(kind.as_str()) {
            return Err(SchoolError::bad_params("category belongs to the other kind"));
        }
    }
    let entered = opt_i64(params, "points")?;
    let points = resolve_point_value(
        entered,
        category.as_ref().and_then(|c| store::int_field(c, "min_points")),
    )
    .ok_or_else(|| SchoolError::bad_params("missing points"))?;
    if points < 0 {
        return Err(SchoolError::bad_params("points must not be negative"));
    }
    let date = match opt_str(params, "date") {
        Some(raw) => parse_date(&raw)?,
        None => Local::now().date_naive(),
    };

    let mut row: Row = form_row(params, EVENT_FIELDS)?;
    row.retain(|_, v| !v.is_null());
    row.insert("student_id".into(), student_id.clone().into());
    row.insert("kind".into(), kind.as_str().into());
    row.insert("points".into(), points.into());
    row.insert("date".into(), date.format("%Y-%m-%d").to_string().into());
    row.insert("created_at".into(), db::now_rfc3339().into());
    let label = opt_str(params, "category").or_else(|| {
        category
            .as_ref()
            .and_then(|c| store::str_field(c, "name"))
            .map(str::to_string)
    });
    if let Some(label) = label {
        row.insert("category_label".into(), label.into());
    }
    if let Some(cat) = &category {
        row.insert("category_id".into(), cat.get("id").cloned().unwrap_or_default());
    }
    let id = store::insert(conn, "point_events", &row)?;
    info!(student_id = %student_id, kind = %kind, points, "point event recorded");
    Ok(json!({ "id": id, "points": points }))
}

fn suggest(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "categoryId")?;
    let cat = ensure_exists(conn, "point_categories", "point category", &id)?;
    Ok(json!({
        "categoryId": id,
        "name": store::str_field(&cat, "name"),
        "kind": store::str_field(&cat, "kind"),
        "points": store::int_field(&cat, "min_points"),
        "minPoints": store::int_field(&cat, "min_points"),
        "maxPoints": store::int_field(&cat, "max_points"),
    }))
}

fn delete(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "id")?;
    if !store::delete(conn, "point_events", &id)? {
        return Err(SchoolError::NotFound("point event"));
    }
    Ok(json!({ "deleted": true }))
}

/// Per-kind counts and sums recomputed from the log, next to the stored
/// totals (which no write path maintains).
fn student_summary(
    state: &AppState,
    params: &serde_json::Value,
) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let student_id = req_str(params, "studentId")?;
    let student = ensure_exists(conn, "students", "student", &student_id)?;
    let events = store::select(
        conn,
        &Query::from("point_events").eq("student_id", student_id.as_str()),
    )?;
    let mut per_kind: HashMap<PointKind, (i64, i64)> = HashMap::new();
    for e in &events {
        let Some(kind) = store::str_field(e, "kind").and_then(PointKind::parse) else {
            continue;
        };
        let entry = per_kind.entry(kind).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += store::int_field(e, "points").unwrap_or(0);
    }
    let summary = |k: PointKind| {
        let (count, points) = per_kind.get(&k).copied().unwrap_or((0, 0));
        json!({ "count": count, "points": points })
    };
    Ok(json!({
        "studentId": student_id,
        "fullName": store::str_field(&student, "full_name"),
        "violation": summary(PointKind::Violation),
        "achievement": summary(PointKind::Achievement),
        "storedTotals": {
            "violation": store::int_field(&student, "total_violation_points"),
            "achievement": store::int_field(&student, "total_achievement_points"),
        },
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "points.list" => list(state, &req.params),
        "points.create" => create(state, &req.params),
        "points.suggest" => suggest(state, &req.params),
        "points.delete" => delete(state, &req.params),
        "points.studentSummary" => student_summary(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
