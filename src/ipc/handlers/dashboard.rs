use crate::aggregate::{
    attendance_breakdown, class_distribution, monthly_points_trend, trend_window_start,
};
use crate::error::SchoolResult;
use crate::ipc::error::respond;
use crate::ipc::helpers::{opt_str, parse_date};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceStatus, PointKind, Role, StudentStatus, UserStatus};
use crate::store::{self, Filter, Query};
use chrono::{Local, NaiveDate};
use serde_json::json;

/// Everything the dashboard shows, recomputed from fresh queries.
fn load(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let today = match opt_str(params, "today") {
        Some(raw) => parse_date(&raw)?,
        None => Local::now().date_naive(),
    };
    let today_key = today.format("%Y-%m-%d").to_string();

    let students = store::count(
        conn,
        "students",
        &[Filter::Eq("status", StudentStatus::Active.as_str().into())],
    )?;
    let teachers = store::count(
        conn,
        "users",
        &[
            Filter::Eq("role", Role::Teacher.as_str().into()),
            Filter::Eq("status", UserStatus::Active.as_str().into()),
        ],
    )?;
    let classes = store::count(conn, "classes", &[])?;
    let violations = store::count(
        conn,
        "point_events",
        &[Filter::Eq("kind", PointKind::Violation.as_str().into())],
    )?;

    let class_rows = store::select(conn, &Query::from("classes").order("name", true))?;
    let class_pairs: Vec<(&str, &str)> = class_rows
        .iter()
        .filter_map(|r| Some((store::str_field(r, "id")?, store::str_field(r, "name")?)))
        .collect();
    let student_rows = store::select(conn, &Query::from("students"))?;
    let distribution = class_distribution(
        &class_pairs,
        student_rows.iter().map(|r| store::str_field(r, "class_id")),
    );

    let attendance_rows = store::select(
        conn,
        &Query::from("attendance_records").eq("date", today_key.as_str()),
    )?;
    let breakdown = attendance_breakdown(
        attendance_rows
            .iter()
            .filter_map(|r| store::str_field(r, "status").and_then(AttendanceStatus::parse)),
    );

    let window_start = trend_window_start(today);
    let violation_rows = store::select(
        conn,
        &Query::from("point_events").eq("kind", PointKind::Violation.as_str()),
    )?;
    let trend = monthly_points_trend(
        today,
        violation_rows.iter().filter_map(|r| {
            let date = NaiveDate::parse_from_str(store::str_field(r, "date")?, "%Y-%m-%d").ok()?;
            (date >= window_start).then(|| (date, store::int_field(r, "points").unwrap_or(0)))
        }),
    );

    Ok(json!({
        "today": today_key,
        "counts": {
            "students": students,
            "teachers": teachers,
            "classes": classes,
            "violations": violations,
        },
        "classDistribution": distribution,
        "attendanceToday": breakdown,
        "violationTrend": trend,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.load" => Some(respond(&req.id, load(state, &req.params))),
        _ => None,
    }
}
