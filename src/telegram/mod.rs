//! Telegram bot integration: routing, handlers, menus, and the webhook
//! server

pub mod bot;
pub mod callback;
pub mod channels;
pub mod commands;
pub mod handlers;
pub mod keyboard;
pub mod menu;
pub mod messages;
pub mod webhook;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{route_update, schema, HandlerDeps};
pub use keyboard::{build_button_rows, build_post_markup};
