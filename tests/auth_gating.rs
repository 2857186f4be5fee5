mod support;

use serde_json::json;
use support::Sidecar;

#[test]
fn roles_only_reach_their_screens() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();
    sc.select_workspace(workspace.path());
    sc.sign_in_as("guru@school.test", "teacher");

    let session = sc.ok("auth.session", json!({}));
    assert_eq!(session["session"]["role"], json!("teacher"));
    assert_eq!(session["entries"], json!(["dashboard", "attendance", "points"]));
    assert!(session["session"].get("token").is_none());

    let denied = sc.request("users.list", json!({}));
    assert_eq!(denied["error"]["code"], json!("forbidden"));
    assert_eq!(denied["error"]["details"]["entry"], json!("users"));
    assert_eq!(denied["error"]["details"]["role"], json!("teacher"));

    assert_eq!(sc.err_code("settings.list", json!({})), "forbidden");
    assert_eq!(sc.err_code("reports.students", json!({})), "forbidden");
    sc.ok("dashboard.load", json!({}));
    sc.ok("points.list", json!({}));
    sc.ok("pointCategories.list", json!({}));
    sc.ok("lookup.classes", json!({}));

    sc.ok("auth.signOut", json!({}));
    assert_eq!(sc.err_code("dashboard.load", json!({})), "unauthenticated");

    sc.sign_in_as("tu@school.test", "staff");
    sc.ok("students.list", json!({}));
    sc.ok("schedule.list", json!({}));
    assert_eq!(sc.err_code("points.list", json!({})), "forbidden");
    assert_eq!(sc.err_code("attendance.open", json!({})), "forbidden");
}

#[test]
fn sign_in_rejects_bad_credentials_and_duplicates() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();
    sc.select_workspace(workspace.path());
    sc.sign_in_as("admin@school.test", "admin");

    assert_eq!(
        sc.err_code(
            "auth.signIn",
            json!({ "email": "admin@school.test", "password": "wrong-password" }),
        ),
        "invalid_credentials"
    );
    assert_eq!(
        sc.err_code(
            "auth.signIn",
            json!({ "email": "nobody@school.test", "password": "rahasia123" }),
        ),
        "invalid_credentials"
    );
    assert_eq!(
        sc.err_code(
            "auth.signUp",
            json!({
                "email": " ADMIN@school.test ",
                "password": "rahasia123",
                "fullName": "Second",
            }),
        ),
        "conflict"
    );
    assert_eq!(
        sc.err_code(
            "auth.signUp",
            json!({ "email": "short@school.test", "password": "123", "fullName": "Short" }),
        ),
        "bad_params"
    );
}

#[test]
fn session_survives_a_restart() {
    let workspace = tempfile::tempdir().expect("tempdir");
    {
        let mut sc = Sidecar::spawn();
        sc.select_workspace(workspace.path());
        sc.sign_in_as("admin@school.test", "admin");
    }

    let mut sc = Sidecar::spawn();
    sc.select_workspace(workspace.path());
    let session = sc.ok("auth.session", json!({}));
    assert_eq!(session["session"]["email"], json!("admin@school.test"));
    sc.ok("users.list", json!({}));

    sc.ok("auth.signOut", json!({}));
    drop(sc);

    let mut sc = Sidecar::spawn();
    sc.select_workspace(workspace.path());
    assert!(sc.ok("auth.session", json!({}))["session"].is_null());
}

#[test]
fn profile_edits_cannot_move_the_sign_in_address() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let mut sc = Sidecar::spawn();
    sc.select_workspace(workspace.path());
    sc.sign_in_as("admin@school.test", "admin");
    let created = sc.ok(
        "users.create",
        json!({ "email": "guru@school.test", "password": "rahasia123", "fullName": "Guru", "role": "teacher" }),
    );
    let id = created["id"].as_str().expect("id").to_string();

    assert_eq!(
        sc.err_code("users.update", json!({ "id": id, "email": "baru@school.test" })),
        "bad_params"
    );
    sc.ok("users.update", json!({ "id": id, "fullName": "Guru Baru" }));

    sc.ok("auth.signOut", json!({}));
    assert_eq!(
        sc.err_code("auth.signIn", json!({ "email": "baru@school.test", "password": "rahasia123" })),
        "invalid_credentials"
    );
    let signed_in = sc.ok("auth.signIn", json!({ "email": "guru@school.test", "password": "rahasia123" }));
    assert_eq!(signed_in["session"]["email"], json!("guru@school.test"));
}
