//! Local identity provider and the process-wide authentication context.

use crate::db::timestamp;
use crate::error::{is_unique_violation, SchoolError, SchoolResult};
use crate::model::{Role, UserStatus};
use crate::store::{self, Row};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    #[serde(skip_serializing)]
    pub token: String,
    pub identity_id: String,
    pub email: String,
    pub user_id: Option<String>,
    pub full_name: String,
    pub role: Role,
    pub expires_at: String,
}

#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

struct IdentityRow {
    id: String,
    email: String,
    password_hash: String,
    full_name: String,
    role: String,
}

/// Argon2id PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> SchoolResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| SchoolError::PasswordHash(e.to_string()))
}

/// False for a wrong password and for a stored value that is not a PHC string.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

fn validate_identity(new: &NewIdentity) -> SchoolResult<()> {
    let email = normalize_email(&new.email);
    if email.is_empty() || !email.contains('@') {
        return Err(SchoolError::bad_params("email must be a valid address"));
    }
    if new.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(SchoolError::bad_params(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if new.full_name.trim().is_empty() {
        return Err(SchoolError::bad_params("full name must not be empty"));
    }
    Ok(())
}

fn insert_identity(conn: &Connection, new: &NewIdentity) -> SchoolResult<String> {
    validate_identity(new)?;
    let id = Uuid::new_v4().to_string();
    let password_hash = hash_password(&new.password)?;
    conn.execute(
        "INSERT INTO auth_identities(id, email, password_hash, full_name, role, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &id,
            normalize_email(&new.email),
            &password_hash,
            new.full_name.trim(),
            new.role.as_str(),
            crate::db::now_rfc3339(),
        ),
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            SchoolError::conflict("email already registered", None)
        } else {
            SchoolError::Db(e)
        }
    })?;
    Ok(id)
}

/// Creates an identity and its `users` profile row in one transaction.
/// `profile` carries the profile columns; identity-derived fields
/// (auth_id, email, full_name, role) are filled in when absent.
pub fn create_identity_with_profile(
    conn: &Connection,
    new: &NewIdentity,
    profile: &Row,
) -> SchoolResult<(String, String)> {
    let tx = conn.unchecked_transaction()?;
    let identity_id = insert_identity(&tx, new)?;

    let mut row = profile.clone();
    row.insert("auth_id".into(), identity_id.clone().into());
    row.entry("email")
        .or_insert_with(|| normalize_email(&new.email).into());
    row.entry("full_name")
        .or_insert_with(|| new.full_name.trim().to_string().into());
    row.entry("role").or_insert_with(|| new.role.as_str().into());
    row.entry("username").or_insert_with(|| {
        let email = normalize_email(&new.email);
        email.split('@').next().unwrap_or(&email).to_string().into()
    });
    row.entry("status")
        .or_insert_with(|| UserStatus::Active.as_str().into());
    row.entry("created_at")
        .or_insert_with(|| crate::db::now_rfc3339().into());
    let user_id = store::insert(&tx, "users", &row)?;

    tx.commit()?;
    Ok((identity_id, user_id))
}

fn load_identity_by_email(conn: &Connection, email: &str) -> SchoolResult<Option<IdentityRow>> {
    let row = conn
        .query_row(
            "SELECT id, email, password_hash, full_name, role
             FROM auth_identities WHERE email = ?",
            [normalize_email(email)],
            |r| {
                Ok(IdentityRow {
                    id: r.get(0)?,
                    email: r.get(1)?,
                    password_hash: r.get(2)?,
                    full_name: r.get(3)?,
                    role: r.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn load_identity_by_id(conn: &Connection, id: &str) -> SchoolResult<Option<IdentityRow>> {
    let row = conn
        .query_row(
            "SELECT id, email, password_hash, full_name, role
             FROM auth_identities WHERE id = ?",
            [id],
            |r| {
                Ok(IdentityRow {
                    id: r.get(0)?,
                    email: r.get(1)?,
                    password_hash: r.get(2)?,
                    full_name: r.get(3)?,
                    role: r.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Profile for an identity: linked by auth_id first, then by email.
pub fn resolve_profile(conn: &Connection, identity_id: &str, email: &str) -> SchoolResult<Option<Row>> {
    let by_auth = store::select(conn, &store::Query::from("users").eq("auth_id", identity_id))?;
    if let Some(row) = by_auth.into_iter().next() {
        return Ok(Some(row));
    }
    let by_email = store::select(
        conn,
        &store::Query::from("users").eq("email", normalize_email(email)),
    )?;
    Ok(by_email.into_iter().next())
}

fn build_session(
    conn: &Connection,
    identity: &IdentityRow,
    token: String,
    expires_at: String,
) -> SchoolResult<AuthSession> {
    let profile = resolve_profile(conn, &identity.id, &identity.email)?;
    let role = profile
        .as_ref()
        .and_then(|p| store::str_field(p, "role"))
        .and_then(Role::parse)
        .or_else(|| Role::parse(&identity.role))
        .unwrap_or(Role::Staff);
    let full_name = profile
        .as_ref()
        .and_then(|p| store::str_field(p, "full_name"))
        .unwrap_or(identity.full_name.as_str())
        .to_string();
    Ok(AuthSession {
        token,
        identity_id: identity.id.clone(),
        email: identity.email.clone(),
        user_id: profile
            .as_ref()
            .and_then(|p| store::str_field(p, "id"))
            .map(|s| s.to_string()),
        full_name,
        role,
        expires_at,
    })
}

fn is_expired(expires_at: &str, now: DateTime<Utc>) -> bool {
    match DateTime::parse_from_rfc3339(expires_at) {
        Ok(t) => t.with_timezone(&Utc) <= now,
        Err(_) => true,
    }
}

/// The single signed-in session of this process. Routes read it; only
/// sign-in, sign-out and restore change it.
#[derive(Debug, Default)]
pub struct AuthContext {
    current: Option<AuthSession>,
}

impl AuthContext {
    pub fn current(&self) -> Option<&AuthSession> {
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Restores the newest unexpired session stored in the workspace.
    pub fn restore(&mut self, conn: &Connection, now: DateTime<Utc>) -> SchoolResult<Option<&AuthSession>> {
        self.current = None;
        let mut stmt = conn.prepare(
            "SELECT token, identity_id, expires_at FROM auth_sessions ORDER BY created_at DESC",
        )?;
        let candidates = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (token, identity_id, expires_at) in candidates {
            if is_expired(&expires_at, now) {
                continue;
            }
            let Some(identity) = load_identity_by_id(conn, &identity_id)? else {
                continue;
            };
            self.current = Some(build_session(conn, &identity, token, expires_at)?);
            break;
        }
        conn.execute(
            "DELETE FROM auth_sessions WHERE expires_at <= ?",
            [timestamp(now)],
        )?;
        Ok(self.current.as_ref())
    }

    pub fn sign_in(
        &mut self,
        conn: &Connection,
        email: &str,
        password: &str,
        ttl_hours: i64,
        now: DateTime<Utc>,
    ) -> SchoolResult<&AuthSession> {
        let identity = load_identity_by_email(conn, email)?.ok_or(SchoolError::InvalidCredentials)?;
        if !verify_password(password, &identity.password_hash) {
            return Err(SchoolError::InvalidCredentials);
        }
        let expires_at = Duration::try_hours(ttl_hours)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .map(timestamp)
            .ok_or_else(|| {
                SchoolError::bad_params(format!("session lifetime of {ttl_hours}h is out of range"))
            })?;
        let token = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO auth_sessions(token, identity_id, created_at, expires_at) VALUES(?, ?, ?, ?)",
            (&token, &identity.id, timestamp(now), &expires_at),
        )?;
        let session = build_session(conn, &identity, token, expires_at)?;
        let session: &AuthSession = self.current.insert(session);
        Ok(session)
    }

    pub fn sign_out(&mut self, conn: Option<&Connection>) -> SchoolResult<()> {
        if let (Some(conn), Some(session)) = (conn, self.current.as_ref()) {
            conn.execute("DELETE FROM auth_sessions WHERE token = ?", [&session.token])?;
        }
        self.current = None;
        Ok(())
    }
}

/// Self-service registration: identity plus a profile carrying the
/// requested role.
pub fn sign_up(conn: &Connection, new: &NewIdentity) -> SchoolResult<(String, String)> {
    create_identity_with_profile(conn, new, &Row::new())
}
