mod support;

use serde_json::json;
use support::{id_of, Sidecar};

#[test]
fn gate_order_is_workspace_then_session() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();

    let health = sc.ok("health", json!({}));
    assert_eq!(health["signedIn"], json!(false));
    assert!(health["workspacePath"].is_null());

    assert_eq!(sc.err_code("students.list", json!({})), "no_workspace");
    assert_eq!(sc.err_code("auth.signIn", json!({ "email": "a@b.c", "password": "x" })), "no_workspace");

    sc.select_workspace(workspace.path());
    assert_eq!(sc.err_code("students.list", json!({})), "unauthenticated");
    assert_eq!(sc.err_code("no.suchMethod", json!({})), "unauthenticated");

    sc.sign_in_as("admin@school.test", "admin");
    assert_eq!(sc.err_code("no.suchMethod", json!({})), "not_implemented");
    assert_eq!(sc.ok("health", json!({}))["signedIn"], json!(true));
}

#[test]
fn bad_json_line_gets_an_error_reply() {
    use std::io::{BufRead, BufReader, Write};
    use std::process::{Command, Stdio};

    let mut child = Command::new(env!("CARGO_BIN_EXE_sekolahd"))
        .env_remove("SEKOLAHD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn sekolahd");
    let mut stdin = child.stdin.take().expect("stdin");
    let mut reader = BufReader::new(child.stdout.take().expect("stdout"));
    writeln!(stdin, "{{not json").expect("write");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("reply json");
    assert_eq!(value["ok"], json!(false));
    assert_eq!(value["error"]["code"], json!("bad_json"));
    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();
    sc.select_workspace(workspace.path());
    sc.sign_in_as("admin@school.test", "admin");

    let teacher = sc.ok(
        "users.create",
        json!({
            "email": "guru@school.test",
            "password": "rahasia123",
            "fullName": "Bu Sari",
            "role": "teacher",
        }),
    );
    let teacher_id = id_of(&teacher);
    let class = sc.ok(
        "classes.create",
        json!({ "name": "IPA 1", "level": "X", "homeroomTeacherId": teacher_id }),
    );
    assert_eq!(class["code"], json!("X-IPA1"));
    let class_id = id_of(&class);
    let subject = sc.ok("subjects.create", json!({ "name": "Matematika", "teacherId": teacher_id }));
    let subject_id = id_of(&subject);
    let student = sc.ok(
        "students.create",
        json!({ "nis": "1001", "fullName": "Andi", "classId": class_id }),
    );
    let student_id = id_of(&student);

    let classes = sc.ok("classes.list", json!({}));
    assert_eq!(classes["classes"][0]["homeroomTeacherName"], json!("Bu Sari"));
    assert_eq!(classes["classes"][0]["studentCount"], json!(1));

    sc.ok("users.list", json!({ "role": "teacher" }));
    sc.ok("students.list", json!({ "classId": class_id }));
    sc.ok("students.get", json!({ "id": student_id }));
    sc.ok("subjects.list", json!({}));
    sc.ok("lookup.teachers", json!({}));
    sc.ok("lookup.classes", json!({}));
    sc.ok("lookup.subjects", json!({}));
    sc.ok("lookup.activeYear", json!({}));
    sc.ok(
        "schedule.save",
        json!({ "classId": class_id, "day": "monday", "session": 1, "subjectId": subject_id }),
    );
    sc.ok("schedule.list", json!({ "classId": class_id }));
    sc.ok("attendance.subjects", json!({ "classId": class_id }));
    sc.ok("attendance.open", json!({ "classId": class_id, "date": "2025-03-10" }));
    sc.ok(
        "points.create",
        json!({ "studentId": student_id, "kind": "violation", "points": 5, "date": "2025-03-10" }),
    );
    sc.ok("points.list", json!({}));
    sc.ok("points.studentSummary", json!({ "studentId": student_id }));
    sc.ok("dashboard.load", json!({ "today": "2025-03-10" }));
    sc.ok("settings.list", json!({}));
    sc.ok("academicYears.list", json!({}));
    sc.ok("semesters.list", json!({}));
    sc.ok("timeSlots.list", json!({}));
    sc.ok("pointCategories.list", json!({}));
    for method in ["reports.students", "reports.users", "reports.schedule", "reports.violations"] {
        let report = sc.ok(method, json!({}));
        assert!(report["title"].is_string(), "{} title", method);
        assert!(report["columns"].is_array(), "{} columns", method);
    }
    sc.ok("auth.session", json!({}));
    sc.ok("auth.signOut", json!({}));
}

#[test]
fn upload_stores_content_addressed_objects() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();
    sc.select_workspace(workspace.path());
    sc.sign_in_as("staff@school.test", "staff");

    let first = sc.ok(
        "objects.upload",
        json!({ "bucket": "avatars", "fileName": "Foto.PNG", "contentBase64": "aGVsbG8=" }),
    );
    let path = first["path"].as_str().expect("path").to_string();
    assert!(path.starts_with("objects/avatars/"), "{}", path);
    assert!(path.ends_with(".png"), "{}", path);
    let stored_name = path.trim_start_matches("objects/");
    assert!(first["publicUrl"].as_str().expect("url").ends_with(stored_name));
    assert_eq!(
        std::fs::read(workspace.path().join(&path)).expect("stored bytes"),
        b"hello"
    );

    let again = sc.ok(
        "objects.upload",
        json!({ "bucket": "avatars", "fileName": "other.png", "contentBase64": "aGVsbG8=" }),
    );
    assert_eq!(again["path"], first["path"]);

    assert_eq!(
        sc.err_code(
            "objects.upload",
            json!({ "bucket": "../etc", "fileName": "x.png", "contentBase64": "aGVsbG8=" }),
        ),
        "bad_params"
    );
    assert_eq!(
        sc.err_code(
            "objects.upload",
            json!({ "bucket": "avatars", "fileName": "x.png", "contentBase64": "***" }),
        ),
        "bad_params"
    );
}

#[test]
fn student_paging_rejects_pages_past_the_integer_range() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();
    sc.select_workspace(workspace.path());
    sc.sign_in_as("admin@school.test", "admin");
    for (nis, name) in [("1", "Andi"), ("2", "Budi"), ("3", "Citra")] {
        sc.ok("students.create", json!({ "nis": nis, "fullName": name }));
    }

    assert_eq!(
        sc.err_code("students.list", json!({ "page": i64::MAX, "pageSize": 2 })),
        "bad_params"
    );
    assert_eq!(
        sc.err_code("students.list", json!({ "page": 1, "pageSize": i64::MAX })),
        "bad_params"
    );

    let second = sc.ok("students.list", json!({ "page": 2, "pageSize": 2 }));
    assert_eq!(second["total"], json!(3));
    assert_eq!(second["students"].as_array().map(|s| s.len()), Some(1));
}
