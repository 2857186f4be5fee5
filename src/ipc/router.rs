use super::handlers;
use super::types::{AppState, Request};
use crate::error::{SchoolError, SchoolResult};
use crate::ipc::error::{err, school_err};
use crate::permissions::{allows, entry_for_method};
use tracing::{debug, warn};

type Handler = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

/// Handlers behind the sign-in gate, tried in order.
const GATED: &[Handler] = &[
    handlers::dashboard::try_handle,
    handlers::users::try_handle,
    handlers::students::try_handle,
    handlers::classes::try_handle,
    handlers::subjects::try_handle,
    handlers::lookup::try_handle,
    handlers::schedule::try_handle,
    handlers::attendance::try_handle,
    handlers::points::try_handle,
    handlers::settings::try_handle,
    handlers::reports::try_handle,
    handlers::objects::try_handle,
];

/// Workspace first, then a session, then the role's screen table.
fn gate(state: &AppState, method: &str) -> SchoolResult<()> {
    state.conn()?;
    let session = state.session()?;
    if let Some(entry) = entry_for_method(method) {
        if !allows(session.role, entry) {
            return Err(SchoolError::Forbidden {
                role: session.role.to_string(),
                entry: entry.as_str().to_string(),
            });
        }
    }
    Ok(())
}

fn dispatch(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::auth::try_handle(state, req) {
        return resp;
    }
    if let Err(e) = gate(state, &req.method) {
        return school_err(&req.id, &e);
    }
    for handler in GATED {
        if let Some(resp) = handler(state, req) {
            return resp;
        }
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    debug!(id = %req.id, method = %req.method, "request");
    let resp = dispatch(state, &req);
    if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let error = resp.get("error");
        warn!(
            method = %req.method,
            code = error.and_then(|e| e.get("code")).and_then(|v| v.as_str()).unwrap_or(""),
            message = error.and_then(|e| e.get("message")).and_then(|v| v.as_str()).unwrap_or(""),
            "request failed"
        );
    }
    resp
}
