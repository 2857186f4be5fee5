use crate::auth::{self, NewIdentity};
use crate::error::SchoolResult;
use crate::ipc::error::respond;
use crate::ipc::helpers::{opt_str, parse_choice, req_str};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::permissions;
use serde_json::json;
use tracing::info;

fn new_identity(params: &serde_json::Value) -> SchoolResult<NewIdentity> {
    let role = match opt_str(params, "role") {
        Some(raw) => parse_choice(&raw, Role::parse, "role")?,
        None => Role::Staff,
    };
    Ok(NewIdentity {
        email: req_str(params, "email")?,
        // Passwords are taken verbatim, surrounding spaces included.
        password: params
            .get("password")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        full_name: req_str(params, "fullName")?,
        role,
    })
}

fn sign_up(state: &mut AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let conn = state.conn()?;
    let new = new_identity(params)?;
    let (identity_id, user_id) = auth::sign_up(conn, &new)?;
    info!(email = %auth::normalize_email(&new.email), role = %new.role, "identity registered");
    Ok(json!({ "identityId": identity_id, "userId": user_id }))
}

fn sign_in(state: &mut AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let email = req_str(params, "email")?;
    let password = params
        .get("password")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let ttl = state.config.session_ttl_hours;
    let conn = state.db.as_ref().ok_or(crate::error::SchoolError::NoWorkspace)?;
    let session = state
        .auth
        .sign_in(conn, &email, &password, ttl, chrono::Utc::now())?;
    info!(email = %session.email, role = %session.role, "signed in");
    Ok(json!({
        "session": session,
        "entries": permissions::allowed_entries(session.role),
    }))
}

fn sign_out(state: &mut AppState) -> SchoolResult<serde_json::Value> {
    state.auth.sign_out(state.db.as_ref())?;
    Ok(json!({ "signedOut": true }))
}

fn session(state: &AppState) -> serde_json::Value {
    match state.auth.current() {
        Some(s) => json!({ "session": s, "entries": permissions::allowed_entries(s.role) }),
        None => json!({ "session": null, "entries": [] }),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.signUp" => sign_up(state, &req.params),
        "auth.signIn" => sign_in(state, &req.params),
        "auth.signOut" => sign_out(state),
        "auth.session" => Ok(session(state)),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
