//! Slash-command handlers.

use teloxide::prelude::*;
use teloxide::types::{Message, User as TgUser};

use crate::core::error::AppResult;
use crate::storage::db::{self, DbConnection, TelegramUserInfo};
use crate::storage::sessions::{self, state};
use crate::telegram::bot::Command;
use crate::telegram::handlers::HandlerDeps;
use crate::telegram::{channels, menu};

const WELCOME_TEXT: &str = "👋 Привет! Я помогаю публиковать в каналы посты с инлайн-кнопками.\n\n\
🎯 Что я умею:\n\
• собрать пост с кнопками-ссылками\n\
• разложить кнопки по строкам как тебе удобно\n\
• отправить пост в твой канал\n\n\
📚 С чего начать:\n\
1. Добавь меня админом в канал\n\
2. Отправь в канале /register\n\
3. Привяжи канал через /claim\n\
4. Создай пост и опубликуй!\n\n\
Выбирай:";

const HELP_TEXT: &str = "📖 Помощь\n\n\
🤖 Команды:\n\
/start — главное меню\n\
/newpost — создать пост\n\
/mychannels — мои каналы\n\
/claim — привязать канал\n\
/cancel — отменить текущее действие\n\
/help — это сообщение\n\n\
📺 Как добавить канал:\n\
1. Сделай бота администратором канала\n\
2. Отправь в канале команду /register\n\
3. В личке с ботом отправь /claim и пришли точное название канала\n\n\
📝 Как создать пост:\n\
1. Нажми «Новый пост» и пришли текст\n\
2. Добавь кнопки в формате «Название | https://ссылка»\n\
3. Выбери раскладку кнопок\n\
4. Выбери канал — и готово!\n\n\
Если что-то пошло не так — /cancel и попробуй заново.";

pub const POST_TEXT_PROMPT: &str = "🆕 Новый пост\n\n\
Пришли текст поста.\n\n\
📝 Подсказки:\n\
• можно использовать эмодзи\n\
• максимум 4096 символов\n\n\
Отменить — /cancel.";

pub const CLAIM_PROMPT: &str = "🔗 Привязка канала\n\n\
Пришли точное название канала, в котором отправлена команда /register.\n\n\
Отменить — /cancel.";

/// Extracts the profile fields we sync into the users table.
pub fn user_info(user: &TgUser) -> TelegramUserInfo {
    TelegramUserInfo {
        telegram_id: i64::try_from(user.id.0).unwrap_or(0),
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        language_code: user.language_code.clone(),
        is_premium: user.is_premium,
    }
}

/// Clears any in-flight flow and opens the post-text step.
pub fn begin_post_draft(conn: &DbConnection, user_id: i64) -> AppResult<()> {
    sessions::clear_session(conn, user_id, None)?;
    sessions::create_session::<()>(conn, user_id, state::WAITING_FOR_POST_TEXT, None, None)?;
    Ok(())
}

/// Opens the claim-channel step.
pub fn begin_claim(conn: &DbConnection, user_id: i64) -> AppResult<()> {
    sessions::create_session::<()>(conn, user_id, state::CLAIMING_CHANNEL, None, None)?;
    Ok(())
}

/// Dispatches a parsed command.
pub async fn handle_command(bot: &Bot, msg: &Message, cmd: Command, deps: &HandlerDeps) {
    let Some(from) = msg.from.as_ref() else {
        // Channel /register posts carry no sender and are handled by the
        // channel-post branch
        if cmd == Command::Register {
            channels::register_chat(bot, msg, &deps.db_pool).await;
        }
        return;
    };

    log::info!("Handling command {:?} from user {}", cmd, from.id);

    if cmd == Command::Register {
        channels::register_chat(bot, msg, &deps.db_pool).await;
        return;
    }

    let conn = match db::get_connection(&deps.db_pool) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get DB connection for command {:?}: {}", cmd, e);
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

    match cmd {
        Command::Start => {
            let _ = bot
                .send_message(msg.chat.id, WELCOME_TEXT)
                .reply_markup(menu::main_menu())
                .await;
        }
        Command::Help => {
            let _ = bot.send_message(msg.chat.id, HELP_TEXT).await;
        }
        Command::Newpost => {
            if let Err(e) = begin_post_draft(&conn, user.telegram_id) {
                log::error!("Failed to start post draft for user {}: {}", user.telegram_id, e);
                let _ = bot
                    .send_message(msg.chat.id, "❌ Что-то пошло не так. Попробуй позже.")
                    .await;
                return;
            }
            let _ = bot.send_message(msg.chat.id, POST_TEXT_PROMPT).await;
        }
        Command::Mychannels => {
            show_my_channels(bot, msg.chat.id, &conn, user.telegram_id).await;
        }
        Command::Claim => {
            if let Err(e) = begin_claim(&conn, user.telegram_id) {
                log::error!("Failed to start claim flow for user {}: {}", user.telegram_id, e);
                let _ = bot
                    .send_message(msg.chat.id, "❌ Что-то пошло не так. Попробуй позже.")
                    .await;
                return;
            }
            let _ = bot.send_message(msg.chat.id, CLAIM_PROMPT).await;
        }
        Command::Cancel => {
            if let Err(e) = sessions::clear_session(&conn, user.telegram_id, None) {
                log::error!("Failed to clear sessions for user {}: {}", user.telegram_id, e);
            }
            let _ = bot
                .send_message(msg.chat.id, "❌ Текущее действие отменено.\n\nВыбирай:")
                .reply_markup(menu::main_menu())
                .await;
        }
        // Register returns early above
        Command::Register => {}
    }
}

/// Sends the owned-channel list, or onboarding instructions when empty.
async fn show_my_channels(bot: &Bot, chat_id: ChatId, conn: &DbConnection, user_id: i64) {
    let channels = match db::get_owned_channels(conn, user_id) {
        Ok(channels) => channels,
        Err(e) => {
            log::error!("Failed to list channels of user {}: {}", user_id, e);
            let _ = bot
                .send_message(chat_id, "❌ Что-то пошло не так. Попробуй позже.")
                .await;
            return;
        }
    };

    if channels.is_empty() {
        let _ = bot
            .send_message(
                chat_id,
                "📺 У тебя пока нет каналов.\n\n\
                 Как добавить:\n\
                 1. Сделай бота администратором канала\n\
                 2. Отправь в канале /register\n\
                 3. Привяжи канал через /claim",
            )
            .await;
        return;
    }

    let _ = bot
        .send_message(chat_id, "📺 Твои каналы:")
        .reply_markup(menu::channel_list_menu(&channels))
        .await;
}
