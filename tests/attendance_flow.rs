mod support;

use serde_json::json;
use std::collections::HashMap;
use support::{id_of, Sidecar};

struct School {
    class_id: String,
    general: String,
    advanced: String,
    andi: String,
    budi: String,
}

fn setup(sc: &mut Sidecar) -> School {
    sc.sign_in_as("admin@school.test", "admin");
    let class_id = id_of(&sc.ok("classes.create", json!({ "name": "IPA 1", "level": "X" })));
    let other_class = id_of(&sc.ok("classes.create", json!({ "name": "IPA 2", "level": "X" })));

    let general = id_of(&sc.ok("subjects.create", json!({ "name": "Bahasa", "level": "all" })));
    let advanced = id_of(&sc.ok(
        "subjects.create",
        json!({ "name": "Kimia Lanjut", "level": "XI" }),
    ));
    sc.ok(
        "subjects.create",
        json!({ "name": "Biologi", "level": "X", "classId": other_class }),
    );
    sc.ok(
        "subjects.create",
        json!({ "name": "Arsip", "level": "all", "status": "inactive" }),
    );

    let andi = id_of(&sc.ok(
        "students.create",
        json!({ "nis": "1", "fullName": "Andi", "classId": class_id }),
    ));
    let budi = id_of(&sc.ok(
        "students.create",
        json!({ "nis": "2", "fullName": "Budi", "classId": class_id }),
    ));
    sc.ok(
        "students.create",
        json!({ "nis": "3", "fullName": "Citra", "classId": class_id, "status": "transferred" }),
    );
    School {
        class_id,
        general,
        advanced,
        andi,
        budi,
    }
}

fn statuses(open: &serde_json::Value) -> HashMap<String, String> {
    open["roster"]
        .as_array()
        .expect("roster")
        .iter()
        .map(|e| {
            (
                e["studentId"].as_str().expect("studentId").to_string(),
                e["status"].as_str().expect("status").to_string(),
            )
        })
        .collect()
}

#[test]
fn only_applicable_active_subjects_are_offered() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();
    sc.select_workspace(workspace.path());
    let school = setup(&mut sc);

    let subjects = sc.ok("attendance.subjects", json!({ "classId": school.class_id }));
    let names: Vec<&str> = subjects["subjects"]
        .as_array()
        .expect("subjects")
        .iter()
        .map(|s| s["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["Bahasa"]);
}

#[test]
fn roster_defaults_to_present_and_saves_overwrite() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();
    sc.select_workspace(workspace.path());
    let school = setup(&mut sc);

    let open = sc.ok(
        "attendance.open",
        json!({ "classId": school.class_id, "date": "2025-03-10" }),
    );
    assert_eq!(open["subjectId"], json!(school.general));
    assert_eq!(open["session"], json!(1));
    let roster = statuses(&open);
    assert_eq!(roster.len(), 2, "inactive students stay off the roster");
    assert!(roster.values().all(|s| s == "present"));

    let saved = sc.ok(
        "attendance.save",
        json!({
            "classId": school.class_id,
            "subjectId": school.general,
            "date": "2025-03-10",
            "statuses": { (school.budi.clone()): "sick" },
        }),
    );
    assert_eq!(saved["saved"], json!(2));

    let reopened = statuses(&sc.ok(
        "attendance.open",
        json!({ "classId": school.class_id, "subjectId": school.general, "date": "2025-03-10" }),
    ));
    assert_eq!(reopened[&school.andi], "present");
    assert_eq!(reopened[&school.budi], "sick");

    sc.ok(
        "attendance.save",
        json!({
            "classId": school.class_id,
            "subjectId": school.general,
            "date": "2025-03-10",
            "statuses": { (school.budi.clone()): "late", (school.andi.clone()): "absent" },
        }),
    );
    let dashboard = sc.ok("dashboard.load", json!({ "today": "2025-03-10" }));
    let buckets: HashMap<String, i64> = dashboard["attendanceToday"]
        .as_array()
        .expect("buckets")
        .iter()
        .map(|b| {
            (
                b["name"].as_str().expect("name").to_string(),
                b["value"].as_i64().expect("value"),
            )
        })
        .collect();
    assert_eq!(buckets["absent"], 1);
    assert_eq!(buckets["late"], 1);
    assert_eq!(buckets["present"], 0);
    assert_eq!(buckets.values().sum::<i64>(), 2, "one record per student per day");
}

#[test]
fn invalid_submissions_write_nothing() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();
    sc.select_workspace(workspace.path());
    let school = setup(&mut sc);

    assert_eq!(
        sc.err_code(
            "attendance.save",
            json!({
                "classId": school.class_id,
                "subjectId": school.general,
                "date": "2025-03-10",
                "statuses": { (school.andi.clone()): "sick", (school.budi.clone()): "asleep" },
            }),
        ),
        "bad_params"
    );
    assert_eq!(
        sc.err_code(
            "attendance.open",
            json!({ "classId": school.class_id, "date": "10/03/2025" }),
        ),
        "bad_params"
    );
    assert_eq!(
        sc.err_code(
            "attendance.save",
            json!({
                "classId": school.class_id,
                "subjectId": school.advanced,
                "date": "2025-03-10",
                "statuses": { (school.andi.clone()): "present" },
            }),
        ),
        "bad_params"
    );

    let dashboard = sc.ok("dashboard.load", json!({ "today": "2025-03-10" }));
    assert_eq!(
        dashboard["attendanceToday"],
        json!([{ "name": "no_data", "value": 1 }])
    );
}

#[test]
fn class_without_applicable_subjects_opens_empty() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();
    sc.select_workspace(workspace.path());
    sc.sign_in_as("admin@school.test", "admin");
    let class_id = id_of(&sc.ok("classes.create", json!({ "name": "IPS 1", "level": "X" })));
    sc.ok("subjects.create", json!({ "name": "Ekonomi Lanjut", "level": "XI" }));
    sc.ok(
        "students.create",
        json!({ "nis": "7", "fullName": "Eka", "classId": class_id }),
    );

    let open = sc.ok(
        "attendance.open",
        json!({ "classId": class_id, "date": "2025-03-10" }),
    );
    assert!(open["subjectId"].is_null());
    assert_eq!(open["subjects"], json!([]));
    assert_eq!(open["roster"], json!([]));
}
