use crate::aggregate::join_label;
use crate::error::{is_unique_violation, SchoolError, SchoolResult};
use crate::ipc::error::respond;
use crate::ipc::helpers::{
    active_academic_year, active_semester, ensure_exists, label_map, opt_i64, opt_str,
    parse_choice, req_str,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Day, DayTag, Semester};
use crate::rules::{check_slot_conflict, sort_by_day_then_session, SlotKey};
use crate::store::{self, Query, Row};
use rusqlite::Connection;
use serde_json::json;
use tracing::debug;

struct TimeSlot {
    session: i64,
    day: DayTag,
    start: String,
    end: String,
}

fn load_time_slots(conn: &Connection) -> SchoolResult<Vec<TimeSlot>> {
    let rows = store::select(conn, &Query::from("time_slots").order("session", true))?;
    Ok(rows
        .iter()
        .filter_map(|r| {
            Some(TimeSlot {
                session: store::int_field(r, "session")?,
                day: DayTag::parse(store::str_field(r, "day")?)?,
                start: store::str_field(r, "start_time")?.to_string(),
                end: store::str_field(r, "end_time")?.to_string(),
            })
        })
        .collect())
}

/// `HH:MM - HH:MM` from the definition for this day (a day-specific one
/// wins over `all`), else `Session N`.
fn time_label(slots: &[TimeSlot], day: Option<Day>, session: i64) -> String {
    let matching = |specific: bool| {
        slots.iter().find(|t| {
            t.session == session
                && match (t.day, day) {
                    (DayTag::Only(d), Some(day)) => specific && d == day,
                    (DayTag::All, _) => !specific,
                    _ => false,
                }
        })
    };
    match matching(true).or_else(|| matching(false)) {
        Some(t) => format!("{} - {}", t.start, t.end),
        None => format!("Session {session}"),
    }
}

/// Schedule rows joined with names and sorted Monday first.
pub fn schedule_rows(
    conn: &Connection,
    class_id: Option<&str>,
    year: Option<&str>,
    semester: Option<&str>,
) -> SchoolResult<Vec<serde_json::Value>> {
    let mut q = Query::from("schedule_slots");
    if let Some(c) = class_id {
        q = q.eq("class_id", c);
    }
    if let Some(y) = year {
        q = q.eq("academic_year", y);
    }
    if let Some(s) = semester {
        q = q.eq("semester", s);
    }
    let mut rows = store::select(conn, &q)?;
    sort_by_day_then_session(&mut rows, |r| {
        (
            store::str_field(r, "day").and_then(Day::parse),
            store::int_field(r, "session").unwrap_or(0),
        )
    });

    let classes = label_map(conn, "classes", "name")?;
    let subjects = label_map(conn, "subjects", "name")?;
    let teachers = label_map(conn, "users", "full_name")?;
    let times = load_time_slots(conn)?;
    Ok(rows
        .into_iter()
        .map(|r| {
            let day = store::str_field(&r, "day").and_then(Day::parse);
            let session = store::int_field(&r, "session").unwrap_or(0);
            json!({
                "id": store::str_field(&r, "id"),
                "classId": store::str_field(&r, "class_id"),
                "className": join_label(&classes, store::str_field(&r, "class_id")),
                "day": store::str_field(&r, "day"),
                "session": session,
                "timeLabel": time_label(&times, day, session),
                "subjectId": store::str_field(&r, "subject_id"),
                "subjectName": join_label(&subjects, store::str_field(&r, "subject_id")),
                "teacherId": store::str_field(&r, "teacher_id"),
                "teacherName": join_label(&teachers, store::str_field(&r, "teacher_id")),
                "room": store::str_field(&r, "room"),
                "academicYear": store::str_field(&r, "academic_year"),
                "semester": store::str_field(&r, "semester"),
            })
        })
        .collect())
}

fn list(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let class_id = opt_str(params, "classId");
    let year = opt_str(params, "academicYear");
    let semester = match opt_str(params, "semester") {
        Some(raw) => Some(parse_choice(&raw, Semester::parse, "semester")?.as_str()),
        None => None,
    };
    let slots = schedule_rows(conn, class_id.as_deref(), year.as_deref(), semester)?;
    Ok(json!({ "slots": slots }))
}

fn slot_key(
    state: &AppState,
    conn: &Connection,
    params: &serde_json::Value,
) -> SchoolResult<SlotKey> {
    let class_id = req_str(params, "classId")?;
    let day = parse_choice(&req_str(params, "day")?, Day::parse, "day")?;
    let session = opt_i64(params, "session")?
        .ok_or_else(|| SchoolError::bad_params("missing session"))?;
    if session < 1 {
        return Err(SchoolError::bad_params("session must be positive"));
    }
    let academic_year = match opt_str(params, "academicYear") {
        Some(y) => y,
        None => active_academic_year(conn, &state.config)?,
    };
    let semester = match opt_str(params, "semester") {
        Some(raw) => parse_choice(&raw, Semester::parse, "semester")?,
        None => active_semester(conn, &academic_year)?,
    };
    Ok(SlotKey {
        class_id,
        day,
        session,
        academic_year,
        semester: semester.as_str().to_string(),
    })
}

fn conflict_for(key: &SlotKey, existing_id: Option<&str>) -> SchoolError {
    SchoolError::conflict(
        format!(
            "class already has a slot on {} session {} in {} {}",
            key.day, key.session, key.academic_year, key.semester
        ),
        Some(json!({
            "existingId": existing_id,
            "classId": key.class_id,
            "day": key.day,
            "session": key.session,
        })),
    )
}

fn save(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let editing = opt_str(params, "id");
    if let Some(id) = &editing {
        ensure_exists(conn, "schedule_slots", "schedule slot", id)?;
    }
    let key = slot_key(state, conn, params)?;
    let subject_id = req_str(params, "subjectId")?;
    ensure_exists(conn, "classes", "class", &key.class_id)?;
    ensure_exists(conn, "subjects", "subject", &subject_id)?;

    let holders = store::select(
        conn,
        &Query::from("schedule_slots")
            .eq("class_id", key.class_id.as_str())
            .eq("day", key.day.as_str())
            .eq("session", key.session)
            .eq("academic_year", key.academic_year.as_str())
            .eq("semester", key.semester.as_str()),
    )?;
    let holder_ids: Vec<&str> = holders.iter().filter_map(|r| store::str_field(r, "id")).collect();
    if let Err(c) = check_slot_conflict(holder_ids.iter().copied(), editing.as_deref()) {
        return Err(conflict_for(&key, Some(&c.existing_id)));
    }

    let mut row = Row::new();
    row.insert("class_id".into(), key.class_id.clone().into());
    row.insert("day".into(), key.day.as_str().into());
    row.insert("session".into(), key.session.into());
    row.insert("subject_id".into(), subject_id.into());
    row.insert("teacher_id".into(), opt_str(params, "teacherId").into());
    row.insert("room".into(), opt_str(params, "room").into());
    row.insert("academic_year".into(), key.academic_year.clone().into());
    row.insert("semester".into(), key.semester.clone().into());

    let written = match &editing {
        Some(id) => store::update(conn, "schedule_slots", id, &row).map(|_| id.clone()),
        None => store::insert(conn, "schedule_slots", &row),
    };
    // A concurrent writer can still take the slot between check and write.
    let id = written.map_err(|e| match e {
        SchoolError::Db(db) if is_unique_violation(&db) => {
            debug!(class_id = %key.class_id, "slot taken at write time");
            conflict_for(&key, None)
        }
        other => other,
    })?;
    Ok(json!({
        "id": id,
        "academicYear": key.academic_year,
        "semester": key.semester,
    }))
}

fn delete(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "id")?;
    if !store::delete(conn, "schedule_slots", &id)? {
        return Err(SchoolError::NotFound("schedule slot"));
    }
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "schedule.list" => list(state, &req.params),
        "schedule.save" => save(state, &req.params),
        "schedule.delete" => delete(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
