//! Integration tests for the session manager
//!
//! Run with: cargo test --test session_manager_test

mod common;

use common::{active_session_count, force_expire, seed_user, test_pool};
use knopka::core::types::PostDraft;
use knopka::core::AppError;
use knopka::storage::sessions::{
    clear_expired_sessions, clear_session, create_session, get_active_session, get_session_data, has_active_session,
    update_session_data,
};
use pretty_assertions::assert_eq;

const STATE: &str = "creating_post";

#[test]
fn create_session_requires_existing_user() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();

    let result = create_session::<()>(&conn, 999, STATE, None, None);
    assert!(matches!(result, Err(AppError::UserNotFound(999))));
}

#[test]
fn create_session_twice_leaves_exactly_one_active() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();
    let user = seed_user(&conn, 100);

    let first = create_session::<()>(&conn, user.telegram_id, STATE, None, None).unwrap();
    let second = create_session::<()>(&conn, user.telegram_id, STATE, None, None).unwrap();

    assert_eq!(active_session_count(&conn, user.telegram_id, STATE), 1);

    let active = get_active_session(&conn, user.telegram_id, Some(STATE)).unwrap().unwrap();
    assert_eq!(active.id, second.id);

    // The earlier session was deactivated, not deleted
    let first_active: i64 = conn
        .query_row(
            "SELECT is_active FROM user_sessions WHERE id = ?1",
            rusqlite::params![first.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(first_active, 0);
}

#[test]
fn expired_session_reads_as_none_and_gets_deactivated() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();
    let user = seed_user(&conn, 101);

    let session = create_session::<()>(&conn, user.telegram_id, STATE, None, None).unwrap();
    force_expire(&conn, &session.id);

    // Lazy expiry: the read both reports "no session" and writes the
    // deactivation
    assert!(get_active_session(&conn, user.telegram_id, Some(STATE)).unwrap().is_none());

    let is_active: i64 = conn
        .query_row(
            "SELECT is_active FROM user_sessions WHERE id = ?1",
            rusqlite::params![session.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(is_active, 0);
}

#[test]
fn payload_roundtrips_through_session_data() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();
    let user = seed_user(&conn, 102);

    let draft = PostDraft::new("Hello world");
    create_session(&conn, user.telegram_id, STATE, Some(&draft), None).unwrap();

    let loaded: PostDraft = get_session_data(&conn, user.telegram_id, STATE).unwrap().unwrap();
    assert_eq!(loaded.text, "Hello world");
    assert!(loaded.buttons.is_empty());
}

#[test]
fn missing_payload_reads_as_none() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();
    let user = seed_user(&conn, 103);

    create_session::<()>(&conn, user.telegram_id, STATE, None, None).unwrap();

    let loaded: Option<PostDraft> = get_session_data(&conn, user.telegram_id, STATE).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn undecodable_payload_reads_as_none() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();
    let user = seed_user(&conn, 104);

    let session = create_session::<()>(&conn, user.telegram_id, STATE, None, None).unwrap();
    conn.execute(
        "UPDATE user_sessions SET data = '{not json' WHERE id = ?1",
        rusqlite::params![session.id],
    )
    .unwrap();

    let loaded: Option<PostDraft> = get_session_data(&conn, user.telegram_id, STATE).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn update_session_data_overwrites_payload() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();
    let user = seed_user(&conn, 105);

    create_session(&conn, user.telegram_id, STATE, Some(&PostDraft::new("v1")), None).unwrap();
    update_session_data(&conn, user.telegram_id, STATE, &PostDraft::new("v2")).unwrap();

    let loaded: PostDraft = get_session_data(&conn, user.telegram_id, STATE).unwrap().unwrap();
    assert_eq!(loaded.text, "v2");
}

#[test]
fn update_without_session_is_a_noop() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();
    let user = seed_user(&conn, 106);

    // No session exists; must not error
    update_session_data(&conn, user.telegram_id, STATE, &PostDraft::new("ghost")).unwrap();
    assert!(get_active_session(&conn, user.telegram_id, Some(STATE)).unwrap().is_none());
}

#[test]
fn clear_session_scopes_to_state() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();
    let user = seed_user(&conn, 107);

    create_session::<()>(&conn, user.telegram_id, "creating_post", None, None).unwrap();
    create_session::<()>(&conn, user.telegram_id, "claiming_channel", None, None).unwrap();

    clear_session(&conn, user.telegram_id, Some("creating_post")).unwrap();
    assert!(!has_active_session(&conn, user.telegram_id, "creating_post").unwrap());
    assert!(has_active_session(&conn, user.telegram_id, "claiming_channel").unwrap());

    clear_session(&conn, user.telegram_id, None).unwrap();
    assert!(!has_active_session(&conn, user.telegram_id, "claiming_channel").unwrap());
}

#[test]
fn bulk_sweep_deactivates_only_expired_rows() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();
    let user = seed_user(&conn, 108);

    let stale = create_session::<()>(&conn, user.telegram_id, "claiming_channel", None, None).unwrap();
    create_session::<()>(&conn, user.telegram_id, "creating_post", None, None).unwrap();
    force_expire(&conn, &stale.id);

    let swept = clear_expired_sessions(&conn).unwrap();
    assert_eq!(swept, 1);

    assert!(!has_active_session(&conn, user.telegram_id, "claiming_channel").unwrap());
    assert!(has_active_session(&conn, user.telegram_id, "creating_post").unwrap());
}

#[test]
fn unscoped_get_returns_most_recent_session() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();
    let user = seed_user(&conn, 109);

    create_session::<()>(&conn, user.telegram_id, "creating_post", None, None).unwrap();
    create_session::<()>(&conn, user.telegram_id, "adding_buttons", None, None).unwrap();

    let latest = get_active_session(&conn, user.telegram_id, None).unwrap().unwrap();
    assert_eq!(latest.state, "adding_buttons");
}
