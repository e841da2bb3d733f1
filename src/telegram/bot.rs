//! Bot initialization and command definitions

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Я умею:")]
pub enum Command {
    #[command(description = "показать главное меню")]
    Start,
    #[command(description = "помощь")]
    Help,
    #[command(description = "создать новый пост")]
    Newpost,
    #[command(description = "мои каналы")]
    Mychannels,
    #[command(description = "привязать зарегистрированный канал")]
    Claim,
    #[command(description = "отменить текущее действие")]
    Cancel,
    #[command(description = "зарегистрировать канал (отправь внутри канала)")]
    Register,
}

/// Creates a Bot instance with a custom request timeout
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Missing token or failed client construction
pub fn create_bot() -> anyhow::Result<Bot> {
    let token = config::BOT_TOKEN.clone();
    if token.is_empty() {
        return Err(anyhow::anyhow!("BOT_TOKEN environment variable not set"));
    }

    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    Ok(Bot::with_client(token, client))
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "показать главное меню"),
        BotCommand::new("help", "помощь"),
        BotCommand::new("newpost", "создать новый пост"),
        BotCommand::new("mychannels", "мои каналы"),
        BotCommand::new("claim", "привязать зарегистрированный канал"),
        BotCommand::new("cancel", "отменить текущее действие"),
    ])
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_descriptions_present() {
        let commands = Command::descriptions();
        let command_list = format!("{}", commands);

        assert!(command_list.contains("Я умею"));
        assert!(command_list.contains("start"));
        assert!(command_list.contains("newpost"));
        assert!(command_list.contains("claim"));
    }

    #[test]
    fn parses_commands_with_bot_mention() {
        let cmd = Command::parse("/newpost@knopka_bot", "knopka_bot").unwrap();
        assert_eq!(cmd, Command::Newpost);
    }
}
