//! Freeform-text handler: routes a message by the user's active session
//! state.
//!
//! Text means different things at different steps of the flow — a channel
//! title while claiming, a button line while adding buttons, the post body
//! right after /newpost. Outside any flow it gets a gentle hint.

use teloxide::prelude::*;
use teloxide::types::Message;

use crate::core::types::{PostButton, PostDraft};
use crate::core::validation::{self, ButtonParseError, PostTextError};
use crate::storage::db::{self, DbConnection};
use crate::storage::sessions::{self, state};
use crate::telegram::commands::user_info;
use crate::telegram::handlers::HandlerDeps;
use crate::telegram::{channels, menu};

/// Handles a non-command text message from a user.
pub async fn handle_text_message(bot: &Bot, msg: &Message, deps: &HandlerDeps) {
    let Some(from) = msg.from.as_ref() else { return };
    let Some(text) = msg.text() else { return };

    let conn = match db::get_connection(&deps.db_pool) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get DB connection for text message: {}", e);
            let _ = bot
                .send_message(msg.chat.id, "❌ Что-то пошло не так. Попробуй позже.")
                .await;
            return;
        }
    };

    let user = match db::get_or_create_user(&conn, &user_info(from)) {
        Ok(user) => user,
        Err(e) => {
            log::error!("Failed to get or create user {}: {}", from.id, e);
            let _ = bot
                .send_message(msg.chat.id, "❌ Что-то пошло не так. Попробуй позже.")
                .await;
            return;
        }
    };
    let user_id = user.telegram_id;

    if has_state(&conn, user_id, state::CLAIMING_CHANNEL) {
        channels::claim_channel_by_title(bot, msg.chat.id, user_id, text, &conn).await;
    } else if has_state(&conn, user_id, state::ADDING_BUTTONS) {
        handle_button_line(bot, msg.chat.id, &conn, user_id, text).await;
    } else if has_state(&conn, user_id, state::WAITING_FOR_POST_TEXT) {
        handle_post_text(bot, msg.chat.id, &conn, user_id, text).await;
    } else {
        let _ = bot
            .send_message(
                msg.chat.id,
                "🤔 Не понимаю, что с этим делать.\n\nНачни с /start или создай пост: /newpost",
            )
            .await;
    }
}

fn has_state(conn: &DbConnection, user_id: i64, state: &str) -> bool {
    sessions::has_active_session(conn, user_id, state).unwrap_or_else(|e| {
        log::error!("Failed to check session {} for user {}: {}", state, user_id, e);
        false
    })
}

/// The post body arriving right after /newpost.
async fn handle_post_text(bot: &Bot, chat_id: ChatId, conn: &DbConnection, user_id: i64, text: &str) {
    let text = match validation::validate_post_text(text) {
        Ok(text) => text,
        Err(PostTextError::Empty) => {
            let _ = bot
                .send_message(chat_id, "❌ Текст поста не может быть пустым. Пришли текст ещё раз.")
                .await;
            return;
        }
        Err(PostTextError::TooLong(len)) => {
            let _ = bot
                .send_message(
                    chat_id,
                    format!("❌ Текст поста не должен превышать 4096 символов.\n\nСейчас: {len}."),
                )
                .await;
            return;
        }
    };

    let text_len = text.chars().count();
    let draft = PostDraft::new(text);
    let created = sessions::create_session(conn, user_id, state::CREATING_POST, Some(&draft), None)
        .and_then(|_| sessions::clear_session(conn, user_id, Some(state::WAITING_FOR_POST_TEXT)));
    if let Err(e) = created {
        log::error!("Failed to store post draft for user {}: {}", user_id, e);
        let _ = bot
            .send_message(chat_id, "❌ Что-то пошло не так. Попробуй позже.")
            .await;
        return;
    }

    let _ = bot
        .send_message(
            chat_id,
            format!("✅ Текст сохранён!\n\n📝 Длина: {text_len} симв.\n\nДобавим кнопки?"),
        )
        .reply_markup(menu::button_decision_menu())
        .await;
}

/// One `"<label> | <url>"` line while in the adding-buttons step.
async fn handle_button_line(bot: &Bot, chat_id: ChatId, conn: &DbConnection, user_id: i64, text: &str) {
    let (label, url) = match validation::parse_button_input(text) {
        Ok(parsed) => parsed,
        Err(ButtonParseError::InvalidFormat) => {
            let _ = bot
                .send_message(
                    chat_id,
                    "❌ Неверный формат.\n\n\
                     Пришли кнопку так: Название | https://example.com\n\
                     Например: Купить | https://myshop.com",
                )
                .await;
            return;
        }
        Err(ButtonParseError::InvalidUrl) => {
            let _ = bot
                .send_message(
                    chat_id,
                    "❌ Неверная ссылка.\n\n\
                     Подойдут:\n\
                     • https://example.com\n\
                     • http://example.com\n\
                     • t.me/username",
                )
                .await;
            return;
        }
        Err(ButtonParseError::InvalidLabel) => {
            let _ = bot
                .send_message(chat_id, "❌ Название кнопки должно быть от 1 до 64 символов.")
                .await;
            return;
        }
    };

    let draft = match sessions::get_session_data::<PostDraft>(conn, user_id, state::CREATING_POST) {
        Ok(Some(draft)) => draft,
        Ok(None) => {
            log::warn!("Button input without a post draft from user {}", user_id);
            let _ = sessions::clear_session(conn, user_id, None);
            let _ = bot
                .send_message(chat_id, "❌ Черновик поста потерялся. Начни заново: /newpost")
                .await;
            return;
        }
        Err(e) => {
            log::error!("Failed to load post draft for user {}: {}", user_id, e);
            let _ = bot
                .send_message(chat_id, "❌ Что-то пошло не так. Попробуй позже.")
                .await;
            return;
        }
    };

    let mut draft = draft;
    let mut button = PostButton::new(label.clone(), url.clone());
    // Keep input order meaningful for the custom layout too
    button.row = draft.buttons.len() as i32;
    draft.buttons.push(button);
    let total = draft.buttons.len();

    if let Err(e) = sessions::update_session_data(conn, user_id, state::CREATING_POST, &draft) {
        log::error!("Failed to store button for user {}: {}", user_id, e);
        let _ = bot
            .send_message(chat_id, "❌ Что-то пошло не так. Попробуй позже.")
            .await;
        return;
    }

    let _ = bot
        .send_message(
            chat_id,
            format!("✅ Кнопка добавлена!\n\n📝 {label}\n🔗 {url}\n\nВсего кнопок: {total}. Ещё одну?"),
        )
        .reply_markup(menu::more_buttons_menu())
        .await;
}
