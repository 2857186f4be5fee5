mod support;

use serde_json::json;
use support::{id_of, Sidecar};

fn setup(sc: &mut Sidecar) -> (String, String) {
    sc.sign_in_as("admin@school.test", "admin");
    let class_id = id_of(&sc.ok("classes.create", json!({ "name": "IPS 2", "level": "XI" })));
    let subject_id = id_of(&sc.ok("subjects.create", json!({ "name": "Sejarah" })));
    (class_id, subject_id)
}

#[test]
fn one_subject_per_class_day_and_session() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();
    sc.select_workspace(workspace.path());
    let (class_id, subject_id) = setup(&mut sc);

    let slot = json!({
        "classId": class_id,
        "day": "Tuesday",
        "session": 2,
        "subjectId": subject_id,
        "academicYear": "2024/2025",
        "semester": "odd",
    });
    let first = sc.ok("schedule.save", slot.clone());
    let first_id = id_of(&first);

    let clash = sc.request("schedule.save", slot.clone());
    assert_eq!(clash["error"]["code"], json!("conflict"));
    assert_eq!(clash["error"]["details"]["existingId"], json!(first_id));
    assert_eq!(clash["error"]["details"]["day"], json!("tuesday"));

    // Re-saving the holder itself is an edit, not a clash.
    let mut edit = slot.clone();
    edit["id"] = json!(first_id);
    edit["room"] = json!("R-12");
    sc.ok("schedule.save", edit);

    let mut other_semester = slot.clone();
    other_semester["semester"] = json!("even");
    sc.ok("schedule.save", other_semester);

    let mut other_session = slot;
    other_session["session"] = json!(3);
    let moved = sc.ok("schedule.save", other_session.clone());
    other_session["id"] = json!(id_of(&moved));
    other_session["session"] = json!(2);
    assert_eq!(sc.err_code("schedule.save", other_session), "conflict");
}

#[test]
fn schedule_lists_monday_first_with_time_labels() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();
    sc.select_workspace(workspace.path());
    let (class_id, subject_id) = setup(&mut sc);

    sc.ok("timeSlots.add", json!({ "startTime": "07:00", "endTime": "07:45" }));
    sc.ok(
        "timeSlots.add",
        json!({ "session": 1, "day": "friday", "startTime": "07:30", "endTime": "08:10" }),
    );

    for (day, session) in [("saturday", 1), ("monday", 2), ("friday", 1), ("monday", 1)] {
        sc.ok(
            "schedule.save",
            json!({ "classId": class_id, "day": day, "session": session, "subjectId": subject_id }),
        );
    }
    let list = sc.ok("schedule.list", json!({ "classId": class_id }));
    let slots = list["slots"].as_array().expect("slots");
    let order: Vec<(String, i64)> = slots
        .iter()
        .map(|s| {
            (
                s["day"].as_str().expect("day").to_string(),
                s["session"].as_i64().expect("session"),
            )
        })
        .collect();
    assert_eq!(
        order,
        vec![
            ("monday".to_string(), 1),
            ("monday".to_string(), 2),
            ("friday".to_string(), 1),
            ("saturday".to_string(), 1),
        ]
    );
    assert_eq!(slots[0]["timeLabel"], json!("07:00 - 07:45"));
    assert_eq!(slots[1]["timeLabel"], json!("Session 2"));
    assert_eq!(slots[2]["timeLabel"], json!("07:30 - 08:10"));
    assert_eq!(slots[0]["subjectName"], json!("Sejarah"));
    assert_eq!(slots[0]["academicYear"], json!("2024/2025"));
    assert_eq!(slots[0]["semester"], json!("odd"));
}
