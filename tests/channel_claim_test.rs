//! Integration tests for channel registration and the claim workflow
//!
//! Run with: cargo test --test channel_claim_test

mod common;

use common::{seed_user, test_pool};
use knopka::storage::db::{
    claim_channel, deactivate_channel, expire_stale_claims, find_pending_by_title, get_channel_by_chat_id,
    get_channel_by_username, get_owned_channels, get_user, is_user_channel_owner, register_channel,
    soft_delete_user, ClaimStatus,
};
use pretty_assertions::assert_eq;

#[test]
fn register_creates_ownerless_pending_channel_with_claim_window() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();

    let channel = register_channel(&conn, -100200, "Новости", Some("newschan"))
        .unwrap()
        .unwrap();

    assert_eq!(channel.claim_status, ClaimStatus::Pending);
    assert_eq!(channel.owner_id, None);
    assert!(channel.claim_expires_at.is_some());
    assert!(channel.is_active);
    assert!(channel.is_public);
}

#[test]
fn public_channels_are_findable_by_username() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();

    register_channel(&conn, -100210, "Новости", Some("newschan")).unwrap().unwrap();

    let found = get_channel_by_username(&conn, "newschan").unwrap().unwrap();
    assert_eq!(found.chat_id, -100210);
    assert!(get_channel_by_username(&conn, "nosuchchan").unwrap().is_none());
}

#[test]
fn repeat_register_is_a_noop() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();

    register_channel(&conn, -100201, "Новости", None).unwrap().unwrap();
    assert!(register_channel(&conn, -100201, "Новости", None).unwrap().is_none());
}

#[test]
fn claiming_duplicate_titles_binds_exactly_one() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();
    let user = seed_user(&conn, 200);

    let first = register_channel(&conn, -100300, "MyChan", None).unwrap().unwrap();
    let second = register_channel(&conn, -100301, "MyChan", None).unwrap().unwrap();

    let pending = find_pending_by_title(&conn, "MyChan").unwrap();
    assert_eq!(pending.len(), 2);

    // The handler binds the first of the result order
    let target = &pending[0];
    let other_chat_id = if target.chat_id == first.chat_id {
        second.chat_id
    } else {
        first.chat_id
    };
    assert!(claim_channel(&conn, &target.id, user.telegram_id).unwrap());

    let claimed = get_channel_by_chat_id(&conn, target.chat_id).unwrap().unwrap();
    assert_eq!(claimed.claim_status, ClaimStatus::Claimed);
    assert_eq!(claimed.owner_id, Some(user.telegram_id));
    // Claiming clears the expiry window
    assert!(claimed.claim_expires_at.is_none());

    // The duplicate stays pending and claimable
    let untouched = get_channel_by_chat_id(&conn, other_chat_id).unwrap().unwrap();
    assert_eq!(untouched.claim_status, ClaimStatus::Pending);
    assert_eq!(untouched.owner_id, None);

    assert_eq!(find_pending_by_title(&conn, "MyChan").unwrap().len(), 1);
}

#[test]
fn claim_only_works_on_pending_channels() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();
    let owner = seed_user(&conn, 201);
    let intruder = seed_user(&conn, 202);

    let channel = register_channel(&conn, -100302, "Личный", None).unwrap().unwrap();
    assert!(claim_channel(&conn, &channel.id, owner.telegram_id).unwrap());

    // Second claim must not steal the channel
    assert!(!claim_channel(&conn, &channel.id, intruder.telegram_id).unwrap());
    let stored = get_channel_by_chat_id(&conn, channel.chat_id).unwrap().unwrap();
    assert_eq!(stored.owner_id, Some(owner.telegram_id));
}

#[test]
fn sweep_expires_stale_pending_channels() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();
    let user = seed_user(&conn, 203);

    let channel = register_channel(&conn, -100303, "Старый", None).unwrap().unwrap();
    conn.execute(
        "UPDATE channels SET claim_expires_at = '2000-01-01 00:00:00' WHERE id = ?1",
        rusqlite::params![channel.id],
    )
    .unwrap();

    assert_eq!(expire_stale_claims(&conn).unwrap(), 1);

    let expired = get_channel_by_chat_id(&conn, channel.chat_id).unwrap().unwrap();
    assert_eq!(expired.claim_status, ClaimStatus::Expired);

    // Expired channels are no longer claimable
    assert!(!claim_channel(&conn, &channel.id, user.telegram_id).unwrap());
    assert!(find_pending_by_title(&conn, "Старый").unwrap().is_empty());
}

#[test]
fn owned_channels_lists_only_active_channels_of_the_owner() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();
    let user = seed_user(&conn, 204);
    let other = seed_user(&conn, 205);

    let mine = register_channel(&conn, -100304, "Мой", None).unwrap().unwrap();
    let theirs = register_channel(&conn, -100305, "Чужой", None).unwrap().unwrap();
    let gone = register_channel(&conn, -100306, "Бывший", None).unwrap().unwrap();

    claim_channel(&conn, &mine.id, user.telegram_id).unwrap();
    claim_channel(&conn, &theirs.id, other.telegram_id).unwrap();
    claim_channel(&conn, &gone.id, user.telegram_id).unwrap();
    deactivate_channel(&conn, gone.chat_id).unwrap();

    let owned = get_owned_channels(&conn, user.telegram_id).unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].chat_id, mine.chat_id);

    assert!(is_user_channel_owner(&conn, mine.chat_id, user.telegram_id).unwrap());
    assert!(!is_user_channel_owner(&conn, theirs.chat_id, user.telegram_id).unwrap());
}

#[test]
fn soft_deleted_user_frees_the_telegram_id() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();

    let user = seed_user(&conn, 206);
    assert!(soft_delete_user(&conn, user.telegram_id).unwrap());

    // Read paths apply the is_deleted predicate
    assert!(get_user(&conn, user.telegram_id).unwrap().is_none());

    // A fresh row can be created for the same Telegram id; the partial
    // unique index only covers non-deleted rows
    let reborn = seed_user(&conn, 206);
    assert_ne!(reborn.id, user.id);

    let total: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM users WHERE telegram_id = 206",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(total, 2);
}

#[test]
fn profile_changes_sync_on_repeat_interactions() {
    let (_dir, pool) = test_pool();
    let conn = pool.get().unwrap();

    use knopka::storage::db::{get_or_create_user, TelegramUserInfo};

    let info = TelegramUserInfo {
        telegram_id: 207,
        username: Some("before".to_string()),
        first_name: "Аня".to_string(),
        ..Default::default()
    };
    let created = get_or_create_user(&conn, &info).unwrap();
    assert_eq!(created.username.as_deref(), Some("before"));

    let renamed = TelegramUserInfo {
        username: Some("after".to_string()),
        ..info
    };
    let updated = get_or_create_user(&conn, &renamed).unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.username.as_deref(), Some("after"));
}
