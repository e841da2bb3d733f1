//! Session manager: per-user, per-state conversational records.
//!
//! This is the storage substrate the conversation state machine is built on.
//! The states themselves and the transitions between them live in the
//! telegram handlers; this module only manages lifecycle and expiry.
//!
//! A session is logically expired when `expires_at <= now` or
//! `is_active = 0`, regardless of row presence. Reads apply lazy expiry:
//! fetching an expired session deactivates it and reports "no session".

use rusqlite::{params, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::db::{self, now_ts, ts_in_secs, DbConnection};

/// Session state labels used by the conversation flow.
pub mod state {
    /// Ждём текст нового поста
    pub const WAITING_FOR_POST_TEXT: &str = "waiting_for_post_text";
    /// Черновик поста собран, идёт настройка кнопок/раскладки/канала
    pub const CREATING_POST: &str = "creating_post";
    /// Ждём строку "<название> | <ссылка>" с очередной кнопкой
    pub const ADDING_BUTTONS: &str = "adding_buttons";
    /// Ждём название канала для привязки
    pub const CLAIMING_CHANNEL: &str = "claiming_channel";
}

/// One conversational session row.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub id: String,
    /// Telegram id of the owning user
    pub user_id: i64,
    pub state: String,
    /// JSON payload, shape depends on `state`
    pub data: Option<String>,
    pub expires_at: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl UserSession {
    /// Logically expired: past the deadline or deactivated.
    pub fn is_expired(&self) -> bool {
        !self.is_active || self.expires_at.as_str() <= now_ts().as_str()
    }
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<UserSession> {
    Ok(UserSession {
        id: row.get(0)?,
        user_id: row.get(1)?,
        state: row.get(2)?,
        data: row.get(3)?,
        expires_at: row.get(4)?,
        is_active: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const SESSION_COLUMNS: &str = "id, user_id, state, data, expires_at, is_active, created_at, updated_at";

/// Creates a new active session for (user, state).
///
/// Prior sessions for the same pair are deactivated first, so at most one
/// stays active. Fails with [`AppError::UserNotFound`] if the user has no
/// row in the database.
pub fn create_session<T: Serialize>(
    conn: &DbConnection,
    user_id: i64,
    state: &str,
    payload: Option<&T>,
    ttl: Option<Duration>,
) -> AppResult<UserSession> {
    if db::get_user(conn, user_id)?.is_none() {
        return Err(AppError::UserNotFound(user_id));
    }

    clear_session(conn, user_id, Some(state))?;

    let data = match payload {
        Some(value) => Some(serde_json::to_string(value)?),
        None => None,
    };

    let id = Uuid::new_v4().to_string();
    let now = now_ts();
    let ttl = ttl.unwrap_or_else(config::session::default_ttl);
    let expires_at = ts_in_secs(ttl.as_secs() as i64);

    conn.execute(
        "INSERT INTO user_sessions (id, user_id, state, data, expires_at, is_active, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
        params![id, user_id, state, data, expires_at, now],
    )?;

    log::info!(
        "Session created: user_id={}, state={}, expires_at={}",
        user_id,
        state,
        expires_at
    );

    let mut stmt = conn.prepare(&format!("SELECT {SESSION_COLUMNS} FROM user_sessions WHERE id = ?1"))?;
    let session = stmt.query_row(params![id], session_from_row)?;
    Ok(session)
}

/// Returns the most recently created active, unexpired session for the user,
/// optionally scoped to one state.
///
/// Lazy expiry: when the freshest active row turns out to be expired, it is
/// deactivated as a side effect and `None` is returned.
pub fn get_active_session(conn: &DbConnection, user_id: i64, state: Option<&str>) -> AppResult<Option<UserSession>> {
    let session = match state {
        Some(state) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM user_sessions \
                 WHERE user_id = ?1 AND state = ?2 AND is_active = 1 \
                 ORDER BY created_at DESC, rowid DESC LIMIT 1"
            ))?;
            stmt.query_row(params![user_id, state], session_from_row).optional()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM user_sessions \
                 WHERE user_id = ?1 AND is_active = 1 \
                 ORDER BY created_at DESC, rowid DESC LIMIT 1"
            ))?;
            stmt.query_row(params![user_id], session_from_row).optional()?
        }
    };

    match session {
        Some(session) if session.is_expired() => {
            clear_session(conn, user_id, Some(&session.state))?;
            log::debug!("Expired session cleared: user_id={}, state={}", user_id, session.state);
            Ok(None)
        }
        other => Ok(other),
    }
}

/// Fetches the active session for (user, state) and deserializes its payload.
///
/// Returns `None` on missing session, missing payload, or a payload that no
/// longer decodes as `T`; never propagates a decode error to the caller.
pub fn get_session_data<T: DeserializeOwned>(conn: &DbConnection, user_id: i64, state: &str) -> AppResult<Option<T>> {
    let Some(session) = get_active_session(conn, user_id, Some(state))? else {
        return Ok(None);
    };
    let Some(data) = session.data else {
        return Ok(None);
    };

    match serde_json::from_str(&data) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            log::warn!(
                "Failed to decode session payload: user_id={}, state={}: {}",
                user_id,
                state,
                e
            );
            Ok(None)
        }
    }
}

/// Overwrites the payload of the existing active session for (user, state).
///
/// No-op with a warning when there is no such session.
pub fn update_session_data<T: Serialize>(conn: &DbConnection, user_id: i64, state: &str, payload: &T) -> AppResult<()> {
    let Some(session) = get_active_session(conn, user_id, Some(state))? else {
        log::warn!("Session not found for update: user_id={}, state={}", user_id, state);
        return Ok(());
    };

    let data = serde_json::to_string(payload)?;
    conn.execute(
        "UPDATE user_sessions SET data = ?1, updated_at = ?2 WHERE id = ?3",
        params![data, now_ts(), session.id],
    )?;

    log::debug!("Session data updated: user_id={}, state={}", user_id, state);
    Ok(())
}

/// Deactivates all active sessions for the user, optionally scoped to one
/// state.
pub fn clear_session(conn: &DbConnection, user_id: i64, state: Option<&str>) -> AppResult<usize> {
    let changed = match state {
        Some(state) => conn.execute(
            "UPDATE user_sessions SET is_active = 0, updated_at = ?1 \
             WHERE user_id = ?2 AND state = ?3 AND is_active = 1",
            params![now_ts(), user_id, state],
        )?,
        None => conn.execute(
            "UPDATE user_sessions SET is_active = 0, updated_at = ?1 \
             WHERE user_id = ?2 AND is_active = 1",
            params![now_ts(), user_id],
        )?,
    };
    Ok(changed)
}

/// Bulk deactivation sweep across all users.
///
/// Returns the number of sessions deactivated.
pub fn clear_expired_sessions(conn: &DbConnection) -> AppResult<usize> {
    let changed = conn.execute(
        "UPDATE user_sessions SET is_active = 0, updated_at = ?1 \
         WHERE is_active = 1 AND expires_at <= ?1",
        params![now_ts()],
    )?;
    Ok(changed)
}

/// Whether the user currently has an active, unexpired session in `state`.
pub fn has_active_session(conn: &DbConnection, user_id: i64, state: &str) -> AppResult<bool> {
    Ok(get_active_session(conn, user_id, Some(state))?.is_some())
}
