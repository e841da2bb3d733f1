//! Canned inline menus for the conversation flow.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::core::types::ButtonLayout;
use crate::storage::db::Channel;
use crate::telegram::callback::{commands, encode};

/// Main menu shown on /start and after cancellation.
pub fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("🆕 Новый пост", commands::NEW_POST),
            InlineKeyboardButton::callback("📺 Мои каналы", commands::MY_CHANNELS),
        ],
        vec![InlineKeyboardButton::callback(
            "🔗 Привязать канал",
            commands::CLAIM_CHANNEL,
        )],
    ])
}

/// Shown right after the post text is saved: add buttons or skip.
pub fn button_decision_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("🔘 Добавить кнопку", commands::ADD_BUTTONS),
            InlineKeyboardButton::callback("⏭ Без кнопок", commands::SKIP_BUTTONS),
        ],
        vec![InlineKeyboardButton::callback("❌ Отмена", commands::CANCEL_POST)],
    ])
}

/// Shown after each accepted button: add another or finish.
pub fn more_buttons_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("➕ Ещё кнопку", commands::ADD_BUTTONS),
            InlineKeyboardButton::callback("✅ Готово", commands::FINISH_BUTTONS),
        ],
        vec![InlineKeyboardButton::callback("❌ Отмена", commands::CANCEL_POST)],
    ])
}

/// Layout picker, one option per row.
pub fn layout_menu() -> InlineKeyboardMarkup {
    let options = [
        ("1️⃣", ButtonLayout::SingleColumn, commands::LAYOUT_SINGLE),
        ("2️⃣", ButtonLayout::TwoColumns, commands::LAYOUT_DOUBLE),
        ("3️⃣", ButtonLayout::ThreeColumns, commands::LAYOUT_TRIPLE),
        ("🔄", ButtonLayout::AllInOneRow, commands::LAYOUT_ONEROW),
        ("✏️", ButtonLayout::Custom, commands::LAYOUT_CUSTOM),
    ];

    let mut rows: Vec<Vec<InlineKeyboardButton>> = options
        .into_iter()
        .map(|(emoji, layout, data)| {
            vec![InlineKeyboardButton::callback(
                format!("{emoji} {}", layout.title()),
                data,
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback("🔙 Назад", commands::BACK_MENU)]);

    InlineKeyboardMarkup::new(rows)
}

/// Channel picker: one owned channel per row plus navigation.
pub fn channel_list_menu(channels: &[Channel]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = channels
        .iter()
        .map(|channel| {
            vec![InlineKeyboardButton::callback(
                format!("📺 {}", channel.title),
                encode(commands::SELECT_CHANNEL, &[channel.id.as_str()]),
            )]
        })
        .collect();

    rows.push(vec![InlineKeyboardButton::callback(
        "🔗 Привязать канал",
        commands::CLAIM_CHANNEL,
    )]);
    rows.push(vec![InlineKeyboardButton::callback("🔙 Назад", commands::BACK_MENU)]);

    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_menu_lists_all_five_layouts_and_back() {
        let menu = layout_menu();
        assert_eq!(menu.inline_keyboard.len(), 6);
    }

    #[test]
    fn channel_list_menu_encodes_channel_ids() {
        use crate::storage::db::ClaimStatus;

        let channel = Channel {
            id: "abc".to_string(),
            chat_id: -100123,
            title: "Новости".to_string(),
            username: None,
            description: None,
            member_count: None,
            is_active: true,
            is_public: false,
            invite_link: None,
            last_checked: None,
            claim_status: ClaimStatus::Claimed,
            claim_expires_at: None,
            owner_id: Some(42),
            created_at: String::new(),
            updated_at: String::new(),
            is_deleted: false,
        };

        let menu = channel_list_menu(std::slice::from_ref(&channel));
        // channel row + claim row + back row
        assert_eq!(menu.inline_keyboard.len(), 3);
        match &menu.inline_keyboard[0][0].kind {
            teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => {
                assert_eq!(data, "select_channel_abc");
            }
            other => panic!("expected callback button, got {other:?}"),
        }
    }
}
