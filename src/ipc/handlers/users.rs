use crate::auth::{self, NewIdentity};
use crate::error::{SchoolError, SchoolResult};
use crate::ipc::error::respond;
use crate::ipc::helpers::{
    choice, date, ensure_exists, form_row, opt_str, parse_choice, req_str, text, to_wire, Field,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Gender, Role, UserStatus};
use crate::store::{self, Query};
use serde_json::json;

const USER_FIELDS: &[Field] = &[
    text("username", "username"),
    text("fullName", "full_name"),
    choice("gender", "gender", Gender::WIRE),
    text("nip", "nip"),
    text("email", "email"),
    choice("role", "role", Role::WIRE),
    text("position", "position"),
    text("subjectArea", "subject_area"),
    text("birthPlace", "birth_place"),
    date("birthDate", "birth_date"),
    text("address", "address"),
    text("phone", "phone"),
    text("photoUrl", "photo_url"),
    choice("status", "status", UserStatus::WIRE),
];

fn list(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let mut q = Query::from("users").order("full_name", true);
    if let Some(search) = opt_str(params, "search") {
        q = q.any_like(&["full_name", "username"], &search);
    }
    if let Some(role) = opt_str(params, "role") {
        q = q.eq("role", parse_choice(&role, Role::parse, "role")?.as_str());
    }
    let users: Vec<serde_json::Value> = store::select(conn, &q)?.into_iter().map(to_wire).collect();
    Ok(json!({ "users": users }))
}

fn create(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let mut profile = form_row(params, USER_FIELDS)?;
    // The identity supplies the normalized address.
    profile.remove("email");
    profile.retain(|_, v| !v.is_null());
    let role = match opt_str(params, "role") {
        Some(raw) => parse_choice(&raw, Role::parse, "role")?,
        None => return Err(SchoolError::bad_params("missing role")),
    };
    let new = NewIdentity {
        email: req_str(params, "email")?,
        password: params
            .get("password")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        full_name: req_str(params, "fullName")?,
        role,
    };
    let (identity_id, user_id) = auth::create_identity_with_profile(conn, &new, &profile)?;
    Ok(json!({ "id": user_id, "authId": identity_id }))
}

fn update(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "id")?;
    ensure_exists(conn, "users", "user", &id)?;
    for key in ["password", "email"] {
        if params.get(key).is_some() {
            return Err(SchoolError::bad_params(format!("{key} cannot be changed here")));
        }
    }
    let row = form_row(params, USER_FIELDS)?;
    for col in ["full_name", "username", "role", "gender", "status"] {
        if row.get(col).is_some_and(|v| v.is_null()) {
            return Err(SchoolError::bad_params(format!("{col} must not be empty")));
        }
    }
    store::update(conn, "users", &id, &row)?;
    Ok(json!({ "id": id }))
}

fn delete(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let id = req_str(params, "id")?;
    if !store::delete(conn, "users", &id)? {
        return Err(SchoolError::NotFound("user"));
    }
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "users.list" => list(state, &req.params),
        "users.create" => create(state, &req.params),
        "users.update" => update(state, &req.params),
        "users.delete" => delete(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
