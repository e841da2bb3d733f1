use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::time::interval;

use knopka::cli::{Cli, Commands};
use knopka::core::{config, init_logger};
use knopka::storage::db::expire_stale_claims;
use knopka::storage::sessions::clear_expired_sessions;
use knopka::storage::{create_pool, get_connection};
use knopka::telegram::{create_bot, schema, setup_bot_commands, webhook, HandlerDeps};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Set up global panic handler to catch panics in handler tasks
    // This allows us to log the panic and continue working instead of terminating
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Load environment variables from .env before the config statics are
    // first read
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run { webhook }) => {
            log::info!("Running bot in normal mode (webhook: {})", webhook);
            run_bot(webhook).await
        }
        Some(Commands::Sweep) => run_sweep(),
        None => {
            // No command specified - default to running the bot
            log::info!("No command specified, running bot in default mode");
            run_bot(false).await
        }
    }
}

/// One-shot maintenance sweep over sessions and channel claims
fn run_sweep() -> Result<()> {
    let db_pool = create_pool(&config::DATABASE_PATH)
        .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;
    let conn = get_connection(&db_pool)?;

    let sessions = clear_expired_sessions(&conn)?;
    let claims = expire_stale_claims(&conn)?;
    log::info!(
        "Sweep complete: {} session(s) deactivated, {} claim(s) expired",
        sessions,
        claims
    );

    Ok(())
}

/// Run the Telegram bot
async fn run_bot(use_webhook: bool) -> Result<()> {
    log::info!("Starting bot...");

    // Create bot instance
    let bot = create_bot()?;

    let me = bot
        .get_me()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to Bot API: {}", e))?;
    let bot_username = me.username.clone();
    log::info!("Bot username: {:?}, Bot ID: {}", bot_username, me.id);

    // Set up the bot command list in the Telegram UI
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    // Create database connection pool
    let db_pool = Arc::new(
        create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?,
    );

    // Periodic maintenance: deactivate expired sessions and expire stale
    // channel claims
    let db_pool_sweep = Arc::clone(&db_pool);
    tokio::spawn(async move {
        let mut interval = interval(config::session::sweep_interval());
        loop {
            interval.tick().await;
            match get_connection(&db_pool_sweep) {
                Ok(conn) => {
                    match clear_expired_sessions(&conn) {
                        Ok(count) if count > 0 => {
                            log::info!("Deactivated {} expired session(s)", count);
                        }
                        Ok(_) => {} // Nothing expired
                        Err(e) => log::error!("Failed to clear expired sessions: {}", e),
                    }
                    match expire_stale_claims(&conn) {
                        Ok(count) if count > 0 => {
                            log::info!("Expired {} stale channel claim(s)", count);
                        }
                        Ok(_) => {}
                        Err(e) => log::error!("Failed to expire stale claims: {}", e),
                    }
                }
                Err(e) => log::error!("Failed to get DB connection for sweep: {}", e),
            }
        }
    });

    let deps = HandlerDeps::new(Arc::clone(&db_pool), bot_username, me.id);

    if use_webhook {
        // Webhook mode: register with Telegram and serve updates over HTTP
        webhook::set_webhook(&bot).await?;

        let port = *config::WEBHOOK_PORT;
        log::info!("Starting bot in webhook mode on port {}", port);
        webhook::run_webhook_server(bot, deps, port).await
    } else {
        // Long polling mode (default). An active webhook blocks getUpdates,
        // so drop it first.
        let _ = bot.delete_webhook().await;

        log::info!("Starting bot in long polling mode");
        log::info!("📡 Ready to receive updates!");

        Dispatcher::builder(bot, schema(deps))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}
