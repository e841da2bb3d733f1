//! Update routing: classifies inbound updates and dispatches them to the
//! command, text, channel-post, and callback handlers.
//!
//! The same `route_update` entry point serves both transports: the webhook
//! endpoint calls it directly, and the long-polling dispatcher wraps it in a
//! single-endpoint handler tree.

use std::sync::Arc;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{Message, Update, UpdateKind};

use crate::core::types::{ButtonLayout, PostDraft};
use crate::storage::db::{self, DbConnection, DbPool};
use crate::storage::sessions::{self, state};
use crate::telegram::bot::Command;
use crate::telegram::callback::{commands as cb, CallbackData};
use crate::telegram::commands::{self, user_info, CLAIM_PROMPT, POST_TEXT_PROMPT};
use crate::telegram::{channels, keyboard, menu, messages};
use teloxide::utils::command::BotCommands;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub bot_username: Option<String>,
    pub bot_id: UserId,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(db_pool: Arc<DbPool>, bot_username: Option<String>, bot_id: UserId) -> Self {
        Self {
            db_pool,
            bot_username,
            bot_id,
        }
    }
}

/// Creates the dispatcher handler tree for long-polling mode.
///
/// A single endpoint funnels every update through [`route_update`], so both
/// transports share one code path.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry().endpoint(move |bot: Bot, update: Update| {
        let deps = deps.clone();
        async move {
            route_update(&bot, update, &deps).await;
            Ok(())
        }
    })
}

/// Classifies one inbound update and dispatches it.
///
/// Never returns an error; failures are logged and answered with generic
/// apologies so the webhook boundary can always acknowledge receipt.
pub async fn route_update(bot: &Bot, update: Update, deps: &HandlerDeps) {
    log::debug!("Processing update {:?}", update.id);

    match update.kind {
        UpdateKind::Message(msg) => handle_message_update(bot, &msg, deps).await,
        UpdateKind::EditedMessage(msg) => {
            // Edited messages are routed like fresh ones
            log::debug!("Edited message from user {:?}", msg.from.as_ref().map(|u| u.id));
            handle_message_update(bot, &msg, deps).await;
        }
        UpdateKind::ChannelPost(post) => channels::handle_channel_post(bot, &post, &deps.db_pool).await,
        UpdateKind::CallbackQuery(query) => handle_callback_update(bot, query, deps).await,
        other => {
            log::debug!("Unsupported update kind: {:?}", other);
        }
    }
}

/// Plain and edited messages: commands or freeform text.
async fn handle_message_update(bot: &Bot, msg: &Message, deps: &HandlerDeps) {
    if msg.from.as_ref().map(|u| u.is_bot).unwrap_or(false) {
        log::debug!("Ignoring message from bot {:?}", msg.from.as_ref().map(|u| u.id));
        return;
    }

    let Some(text) = msg.text() else { return };

    if text.starts_with('/') {
        let bot_name = deps.bot_username.as_deref().unwrap_or("");
        match Command::parse(text, bot_name) {
            Ok(cmd) => commands::handle_command(bot, msg, cmd, deps).await,
            Err(_) => {
                log::warn!(
                    "Unknown command {:?} from user {:?}",
                    text,
                    msg.from.as_ref().map(|u| u.id)
                );
                let _ = bot
                    .send_message(msg.chat.id, "❓ Неизвестная команда. Список команд: /help")
                    .await;
            }
        }
    } else {
        messages::handle_text_message(bot, msg, deps).await;
    }
}

/// Inline keyboard taps.
async fn handle_callback_update(bot: &Bot, query: CallbackQuery, deps: &HandlerDeps) {
    if query.from.is_bot {
        log::debug!("Ignoring callback from bot {}", query.from.id);
        return;
    }

    let Some(data) = query.data.clone() else {
        let _ = bot.answer_callback_query(query.id.clone()).await;
        return;
    };

    log::info!("Handling callback {:?} from user {}", data, query.from.id);

    // Answer right away so the client stops the loading spinner
    let _ = bot.answer_callback_query(query.id.clone()).await;

    let Some((chat_id, message_id)) = query.message.as_ref().map(|m| (m.chat().id, m.id())) else {
        log::warn!("Callback {:?} without an attached message", data);
        return;
    };

    let conn = match db::get_connection(&deps.db_pool) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to get DB connection for callback: {}", e);
            let _ = bot
                .send_message(chat_id, "❌ Что-то пошло не так. Попробуй позже.")
                .await;
            return;
        }
    };

    let user = match db::get_or_create_user(&conn, &user_info(&query.from)) {
        Ok(user) => user,
        Err(e) => {
            log::error!("Failed to get or create user {}: {}", query.from.id, e);
            let _ = bot
                .send_message(chat_id, "❌ Что-то пошло не так. Попробуй позже.")
                .await;
            return;
        }
    };
    let user_id = user.telegram_id;

    let parsed = CallbackData::parse(&data);
    match parsed.command.as_str() {
        cb::NEW_POST => {
            if let Err(e) = commands::begin_post_draft(&conn, user_id) {
                log::error!("Failed to start post draft for user {}: {}", user_id, e);
                let _ = bot
                    .send_message(chat_id, "❌ Что-то пошло не так. Попробуй позже.")
                    .await;
                return;
            }
            let _ = bot.edit_message_text(chat_id, message_id, POST_TEXT_PROMPT).await;
        }
        cb::MY_CHANNELS => {
            show_channel_overview(bot, chat_id, message_id, &conn, user_id).await;
        }
        cb::CLAIM_CHANNEL => {
            if let Err(e) = commands::begin_claim(&conn, user_id) {
                log::error!("Failed to start claim flow for user {}: {}", user_id, e);
                let _ = bot
                    .send_message(chat_id, "❌ Что-то пошло не так. Попробуй позже.")
                    .await;
                return;
            }
            let _ = bot.edit_message_text(chat_id, message_id, CLAIM_PROMPT).await;
        }
        cb::ADD_BUTTONS => {
            if !draft_exists(&conn, user_id) {
                let _ = bot
                    .edit_message_text(chat_id, message_id, "❌ Сначала создай пост: /newpost")
                    .await;
                return;
            }
            if let Err(e) = sessions::create_session::<()>(&conn, user_id, state::ADDING_BUTTONS, None, None) {
                log::error!("Failed to open button input for user {}: {}", user_id, e);
                return;
            }
            let _ = bot
                .edit_message_text(
                    chat_id,
                    message_id,
                    "🔘 Добавление кнопки\n\n\
                     Пришли название и ссылку в формате:\n\
                     Название | https://example.com\n\n\
                     Например: Купить | https://myshop.com",
                )
                .await;
        }
        cb::SKIP_BUTTONS => {
            if !draft_exists(&conn, user_id) {
                let _ = bot
                    .edit_message_text(chat_id, message_id, "❌ Сначала создай пост: /newpost")
                    .await;
                return;
            }
            show_channel_selection(bot, chat_id, message_id, &conn, user_id).await;
        }
        cb::FINISH_BUTTONS => {
            let _ = sessions::clear_session(&conn, user_id, Some(state::ADDING_BUTTONS));
            let _ = bot
                .edit_message_text(chat_id, message_id, "📐 Как расположить кнопки?")
                .reply_markup(menu::layout_menu())
                .await;
        }
        cb::LAYOUT_SINGLE => handle_layout_selection(bot, chat_id, message_id, &conn, user_id, ButtonLayout::SingleColumn).await,
        cb::LAYOUT_DOUBLE => handle_layout_selection(bot, chat_id, message_id, &conn, user_id, ButtonLayout::TwoColumns).await,
        cb::LAYOUT_TRIPLE => handle_layout_selection(bot, chat_id, message_id, &conn, user_id, ButtonLayout::ThreeColumns).await,
        cb::LAYOUT_ONEROW => handle_layout_selection(bot, chat_id, message_id, &conn, user_id, ButtonLayout::AllInOneRow).await,
        cb::LAYOUT_CUSTOM => handle_layout_selection(bot, chat_id, message_id, &conn, user_id, ButtonLayout::Custom).await,
        cb::SELECT_CHANNEL => {
            let channel_uuid = parsed.uuid_param(0);
            if channel_uuid.is_nil() {
                // Zero value reads as "absent": re-prompt instead of failing
                log::warn!("select_channel with unparsable id: {:?}", data);
                show_channel_selection(bot, chat_id, message_id, &conn, user_id).await;
                return;
            }
            publish_to_channel(bot, chat_id, message_id, &conn, deps, user_id, &channel_uuid.to_string()).await;
        }
        cb::CANCEL_POST => {
            let _ = sessions::clear_session(&conn, user_id, None);
            let _ = bot
                .edit_message_text(chat_id, message_id, "❌ Создание поста отменено.\n\nВыбирай:")
                .reply_markup(menu::main_menu())
                .await;
        }
        cb::BACK_MENU => {
            let _ = bot
                .edit_message_text(chat_id, message_id, "🏠 Главное меню\n\nВыбирай:")
                .reply_markup(menu::main_menu())
                .await;
        }
        other => {
            log::warn!("Unknown callback data {:?} from user {}", other, user_id);
            let _ = bot
                .answer_callback_query(query.id)
                .text("❓ Неизвестная команда")
                .show_alert(true)
                .await;
        }
    }
}

fn draft_exists(conn: &DbConnection, user_id: i64) -> bool {
    sessions::has_active_session(conn, user_id, state::CREATING_POST).unwrap_or_else(|e| {
        log::error!("Failed to check post draft for user {}: {}", user_id, e);
        false
    })
}

/// /mychannels via callback: list owned channels in place.
async fn show_channel_overview(
    bot: &Bot,
    chat_id: ChatId,
    message_id: teloxide::types::MessageId,
    conn: &DbConnection,
    user_id: i64,
) {
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
            .edit_message_text(
                chat_id,
                message_id,
                "📺 У тебя пока нет каналов.\n\n\
                 Как добавить:\n\
                 1. Сделай бота администратором канала\n\
                 2. Отправь в канале /register\n\
                 3. Привяжи канал через /claim",
            )
            .reply_markup(menu::main_menu())
            .await;
        return;
    }

    let _ = bot
        .edit_message_text(chat_id, message_id, "📺 Твои каналы:")
        .reply_markup(menu::channel_list_menu(&channels))
        .await;
}

/// Stores the chosen layout in the draft and moves on to channel selection.
async fn handle_layout_selection(
    bot: &Bot,
    chat_id: ChatId,
    message_id: teloxide::types::MessageId,
    conn: &DbConnection,
    user_id: i64,
    layout: ButtonLayout,
) {
    let draft = match sessions::get_session_data::<PostDraft>(conn, user_id, state::CREATING_POST) {
        Ok(Some(mut draft)) => {
            draft.layout = layout;
            draft
        }
        Ok(None) => {
            let _ = bot
                .edit_message_text(chat_id, message_id, "❌ Черновик поста потерялся. Начни заново: /newpost")
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

    if let Err(e) = sessions::update_session_data(conn, user_id, state::CREATING_POST, &draft) {
        log::error!("Failed to store layout for user {}: {}", user_id, e);
        let _ = bot
            .send_message(chat_id, "❌ Что-то пошло не так. Попробуй позже.")
            .await;
        return;
    }
    let _ = sessions::clear_session(conn, user_id, Some(state::ADDING_BUTTONS));

    log::info!("User {} picked layout {}", user_id, draft.layout);
    show_channel_selection(bot, chat_id, message_id, conn, user_id).await;
}

/// Lists the user's channels as publish targets; without any, points at the
/// onboarding steps instead of showing a keyboard.
async fn show_channel_selection(
    bot: &Bot,
    chat_id: ChatId,
    message_id: teloxide::types::MessageId,
    conn: &DbConnection,
    user_id: i64,
) {
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
            .edit_message_text(
                chat_id,
                message_id,
                "❌ Сначала добавь канал!\n\n\
                 1. Сделай бота администратором канала\n\
                 2. Отправь в канале /register\n\
                 3. Привяжи канал через /claim\n\n\
                 Черновик поста сохранён — вернись к нему после привязки.",
            )
            .await;
        return;
    }

    let _ = bot
        .edit_message_text(chat_id, message_id, "📺 Куда публикуем?\n\nВыбери канал:")
        .reply_markup(menu::channel_list_menu(&channels))
        .await;
}

/// Terminal step: checks permissions and sends the drafted post into the
/// chosen channel.
async fn publish_to_channel(
    bot: &Bot,
    chat_id: ChatId,
    message_id: teloxide::types::MessageId,
    conn: &DbConnection,
    deps: &HandlerDeps,
    user_id: i64,
    channel_id: &str,
) {
    let draft = match sessions::get_session_data::<PostDraft>(conn, user_id, state::CREATING_POST) {
        Ok(Some(draft)) => draft,
        Ok(None) => {
            let _ = bot
                .edit_message_text(chat_id, message_id, "❌ Черновик поста потерялся. Начни заново: /newpost")
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

    let channel = match db::get_channel_by_id(conn, channel_id) {
        Ok(Some(channel)) if channel.is_active && channel.owner_id == Some(user_id) => channel,
        Ok(_) => {
            log::warn!("User {} selected channel {} they do not own", user_id, channel_id);
            let _ = bot.edit_message_text(chat_id, message_id, "❌ Канал не найден.").await;
            return;
        }
        Err(e) => {
            log::error!("Failed to load channel {}: {}", channel_id, e);
            let _ = bot
                .send_message(chat_id, "❌ Что-то пошло не так. Попробуй позже.")
                .await;
            return;
        }
    };

    if !channels::can_send_to_channel(bot, ChatId(channel.chat_id), user_id, deps.bot_id).await {
        let _ = bot
            .edit_message_text(
                chat_id,
                message_id,
                "❌ Не хватает прав.\n\n\
                 Проверь, что бот — администратор канала, а ты — администратор или владелец.",
            )
            .await;
        return;
    }

    let markup = keyboard::build_post_markup(&draft);
    match bot
        .send_message(ChatId(channel.chat_id), draft.text.clone())
        .reply_markup(markup)
        .await
    {
        Ok(_) => {
            let _ = sessions::clear_session(conn, user_id, None);
            log::info!("User {} published a post to channel {}", user_id, channel.chat_id);
            let _ = bot
                .edit_message_text(
                    chat_id,
                    message_id,
                    format!("✅ Пост опубликован в «{}»!", channel.title),
                )
                .await;
            let _ = bot
                .send_message(chat_id, "Что дальше?")
                .reply_markup(menu::main_menu())
                .await;
        }
        Err(e) => {
            log::error!(
                "Failed to publish post of user {} to channel {}: {}",
                user_id,
                channel.chat_id,
                e
            );
            // Draft stays so the user can retry or pick another channel
            let _ = bot
                .edit_message_text(
                    chat_id,
                    message_id,
                    "❌ Не получилось отправить пост. Попробуй позже или выбери другой канал.",
                )
                .await;
        }
    }
}
