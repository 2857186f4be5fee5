use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum SchoolError {
    #[error("{0}")]
    BadParams(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{message}")]
    Conflict {
        message: String,
        details: Option<serde_json::Value>,
    },
    #[error("select a workspace first")]
    NoWorkspace,
    #[error("sign in required")]
    Unauthenticated,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("role {role} may not open {entry}")]
    Forbidden { role: String, entry: String },
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type SchoolResult<T> = Result<T, SchoolError>;

impl SchoolError {
    pub fn bad_params(message: impl Into<String>) -> Self {
        SchoolError::BadParams(message.into())
    }

    pub fn conflict(message: impl Into<String>, details: Option<serde_json::Value>) -> Self {
        SchoolError::Conflict {
            message: message.into(),
            details,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SchoolError::BadParams(_) => "bad_params",
            SchoolError::NotFound(_) => "not_found",
            SchoolError::Conflict { .. } => "conflict",
            SchoolError::NoWorkspace => "no_workspace",
            SchoolError::Unauthenticated => "unauthenticated",
            SchoolError::InvalidCredentials => "invalid_credentials",
            SchoolError::Forbidden { .. } => "forbidden",
            SchoolError::PasswordHash(_) => "password_hash_failed",
            SchoolError::Db(_) => "db_query_failed",
            SchoolError::Io(_) => "io_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            SchoolError::Conflict { details, .. } => details.clone(),
            SchoolError::Forbidden { role, entry } => Some(json!({ "role": role, "entry": entry })),
            _ => None,
        }
    }
}

/// True when SQLite rejected a write because of a UNIQUE index.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
