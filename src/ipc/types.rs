use std::path::PathBuf;

use crate::auth::{AuthContext, AuthSession};
use crate::config::Config;
use crate::error::{SchoolError, SchoolResult};
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub auth: AuthContext,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: None,
            db: None,
            auth: AuthContext::default(),
        }
    }

    pub fn conn(&self) -> SchoolResult<&Connection> {
        self.db.as_ref().ok_or(SchoolError::NoWorkspace)
    }

    pub fn session(&self) -> SchoolResult<&AuthSession> {
        self.auth.current().ok_or(SchoolError::Unauthenticated)
    }
}
