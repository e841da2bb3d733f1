//! Channel registration, the claim workflow, and permission checks.
//!
//! A channel registers itself through an in-channel /register post, which
//! creates an ownerless pending row with a 24h claim window. A user then
//! binds the channel to themselves by naming it in the claim flow.

use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::Message;

use crate::storage::db::{self, DbConnection, DbPool};
use crate::storage::sessions::{self, state};
use crate::telegram::menu;

/// Handles a post published inside a channel.
///
/// The only recognized channel command is /register; everything else is
/// ignored.
pub async fn handle_channel_post(bot: &Bot, post: &Message, db_pool: &Arc<DbPool>) {
    let Some(text) = post.text() else { return };
    let command = text
        .split_whitespace()
        .next()
        .and_then(|c| c.split('@').next())
        .unwrap_or_default();

    if command != "/register" {
        return;
    }

    register_chat(bot, post, db_pool).await;
}

/// Registers the chat a /register command was posted in.
///
/// Works for channels and supergroups; a repeat registration is a no-op.
pub async fn register_chat(bot: &Bot, msg: &Message, db_pool: &Arc<DbPool>) {
    let chat = &msg.chat;
    if !(chat.is_channel() || chat.is_supergroup()) {
        let _ = bot
            .send_message(chat.id, "❌ Эта команда работает только внутри канала.")
            .await;
        return;
    }

    let conn = match db::get_connection(db_pool) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get DB connection for channel registration: {}", e);
            return;
        }
    };

    let title = chat.title().unwrap_or("Unknown Channel");
    match db::register_channel(&conn, chat.id.0, title, chat.username()) {
        Ok(Some(_)) => {
            let _ = bot
                .send_message(
                    chat.id,
                    "✅ Канал зарегистрирован!\n\n\
                     Чтобы публиковать сюда посты, напиши боту в личку /claim \
                     и пришли точное название канала. На привязку есть 24 часа.",
                )
                .await;
        }
        Ok(None) => {
            log::debug!("Channel {} already registered, ignoring /register", chat.id.0);
        }
        Err(e) => {
            log::error!("Failed to register channel {}: {}", chat.id.0, e);
            let _ = bot
                .send_message(chat.id, "❌ Не получилось зарегистрировать канал. Попробуй позже.")
                .await;
        }
    }
}

/// Resolves a claim attempt: exact trimmed-title match among pending
/// channels.
///
/// One match binds the channel; several matches bind the first registered
/// one with a warning (result order is registration order); zero matches
/// leave the claim session active so the user can retry or /cancel.
pub async fn claim_channel_by_title(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    title: &str,
    conn: &DbConnection,
) {
    let title = title.trim();

    let candidates = match db::find_pending_by_title(conn, title) {
        Ok(candidates) => candidates,
        Err(e) => {
            log::error!("Failed to look up pending channels titled {:?}: {}", title, e);
            let _ = bot
                .send_message(chat_id, "❌ Что-то пошло не так. Попробуй позже.")
                .await;
            return;
        }
    };

    let Some(channel) = candidates.first() else {
        log::warn!("Claim failed: no pending channel titled {:?} (user {})", title, user_id);
        let _ = bot
            .send_message(
                chat_id,
                "❌ Не нашла непривязанный канал с таким названием.\n\n\
                 Проверь, что в канале отправлена команда /register, и пришли \
                 название ещё раз. Отменить — /cancel.",
            )
            .await;
        return;
    };

    if candidates.len() > 1 {
        log::warn!(
            "Ambiguous claim: {} pending channels titled {:?}, binding the first registered (chat_id {})",
            candidates.len(),
            title,
            channel.chat_id
        );
    }

    match db::claim_channel(conn, &channel.id, user_id) {
        Ok(true) => {
            let _ = sessions::clear_session(conn, user_id, Some(state::CLAIMING_CHANNEL));
            log::info!("Channel {} claimed by user {}", channel.chat_id, user_id);
            let _ = bot
                .send_message(
                    chat_id,
                    format!(
                        "✅ Канал «{}» привязан к тебе!\n\nТеперь можно публиковать в него посты.",
                        channel.title
                    ),
                )
                .reply_markup(menu::main_menu())
                .await;

            refresh_channel_info(bot, conn, channel.chat_id).await;
        }
        Ok(false) => {
            // Raced with another claim or the sweep
            log::warn!("Claim lost the race for channel {} (user {})", channel.chat_id, user_id);
            let _ = bot
                .send_message(chat_id, "❌ Канал уже привязан или окно привязки истекло.")
                .await;
        }
        Err(e) => {
            log::error!("Failed to claim channel {}: {}", channel.chat_id, e);
            let _ = bot
                .send_message(chat_id, "❌ Что-то пошло не так. Попробуй позже.")
                .await;
        }
    }
}

/// Refreshes locally cached channel metadata from the live chat.
pub async fn refresh_channel_info(bot: &Bot, conn: &DbConnection, chat_id: i64) {
    let chat = match bot.get_chat(ChatId(chat_id)).await {
        Ok(chat) => chat,
        Err(e) => {
            log::warn!("Failed to fetch chat {} for metadata refresh: {}", chat_id, e);
            return;
        }
    };

    let member_count = bot.get_chat_member_count(ChatId(chat_id)).await.ok();

    if let Err(e) = db::update_channel_info(
        conn,
        chat_id,
        chat.title().unwrap_or("Unknown Channel"),
        chat.username(),
        chat.description(),
        member_count.map(i64::from),
        chat.invite_link(),
    ) {
        log::warn!("Failed to store refreshed metadata for chat {}: {}", chat_id, e);
    }
}

/// Live authorization check: the bot must be an administrator of the target
/// chat AND the requesting user must be administrator or creator there.
///
/// Checked against live Telegram membership, not the locally cached owner;
/// the two can disagree when channel admins changed after registration.
pub async fn can_send_to_channel(bot: &Bot, chat_id: ChatId, user_id: i64, bot_id: UserId) -> bool {
    let bot_member = match bot.get_chat_member(chat_id, bot_id).await {
        Ok(member) => member,
        Err(e) => {
            log::warn!("Failed to check bot membership in chat {}: {}", chat_id.0, e);
            return false;
        }
    };
    if !bot_member.is_administrator() {
        return false;
    }

    let Ok(user_id) = u64::try_from(user_id) else {
        return false;
    };
    let user_member = match bot.get_chat_member(chat_id, UserId(user_id)).await {
        Ok(member) => member,
        Err(e) => {
            log::warn!(
                "Failed to check membership of user {} in chat {}: {}",
                user_id,
                chat_id.0,
                e
            );
            return false;
        }
    };

    user_member.is_administrator() || user_member.is_owner()
}
