use crate::error::{SchoolError, SchoolResult};
use crate::ipc::error::respond;
use crate::ipc::helpers::req_str;
use crate::ipc::types::{AppState, Request};
use crate::objects;
use base64::Engine;
use serde_json::json;
use tracing::info;

fn upload(state: &AppState, params: &serde_json::Value) -> SchoolResult<serde_json::Value> {
    let workspace = state.workspace.as_deref().ok_or(SchoolError::NoWorkspace)?;
    let bucket = req_str(params, "bucket")?;
    let file_name = req_str(params, "fileName")?;
    let encoded = req_str(params, "contentBase64")?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| SchoolError::bad_params(format!("contentBase64 is not base64: {e}")))?;
    let stored = objects::upload(
        workspace,
        &state.config.public_base_url,
        &bucket,
        &file_name,
        &bytes,
    )?;
    info!(bucket = %bucket, path = %stored.path, size = bytes.len(), "object stored");
    Ok(json!({ "path": stored.path, "publicUrl": stored.public_url }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "objects.upload" => Some(respond(&req.id, upload(state, &req.params))),
        _ => None,
    }
}
