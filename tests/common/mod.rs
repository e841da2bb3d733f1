//! Common test utilities
//!
//! Shared across all integration tests: a tempfile-backed SQLite pool with
//! the real schema applied, plus seed helpers.

// Not every test file uses every helper
#![allow(dead_code)]

use knopka::storage::db::{self, TelegramUserInfo, User};
use knopka::storage::migrations::run_migrations_for_test;
use knopka::storage::{DbConnection, DbPool};
use r2d2_sqlite::SqliteConnectionManager;
use tempfile::TempDir;

/// Builds a pooled test database. Keep the returned `TempDir` alive for the
/// duration of the test, it owns the database file.
pub fn test_pool() -> (TempDir, DbPool) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.sqlite");

    let manager = SqliteConnectionManager::file(&path);
    let pool = r2d2::Pool::builder().max_size(2).build(manager).unwrap();

    let mut conn = pool.get().unwrap();
    run_migrations_for_test(&mut conn).unwrap();

    (dir, pool)
}

/// Inserts (or refreshes) a user with the given Telegram id.
pub fn seed_user(conn: &DbConnection, telegram_id: i64) -> User {
    db::get_or_create_user(
        conn,
        &TelegramUserInfo {
            telegram_id,
            username: Some(format!("user{telegram_id}")),
            first_name: "Test".to_string(),
            ..Default::default()
        },
    )
    .unwrap()
}

/// Number of active session rows for (user, state), straight from the table.
pub fn active_session_count(conn: &DbConnection, user_id: i64, state: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM user_sessions WHERE user_id = ?1 AND state = ?2 AND is_active = 1",
        rusqlite::params![user_id, state],
        |row| row.get(0),
    )
    .unwrap()
}

/// Forces a session's expiry into the past, bypassing the manager.
pub fn force_expire(conn: &DbConnection, session_id: &str) {
    conn.execute(
        "UPDATE user_sessions SET expires_at = '2000-01-01 00:00:00' WHERE id = ?1",
        rusqlite::params![session_id],
    )
    .unwrap();
}
