use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "knopka")]
#[command(
    author,
    version,
    about = "Telegram bot for publishing channel posts with inline URL buttons",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot in normal mode
    Run {
        /// Use webhook mode instead of long polling
        #[arg(long)]
        webhook: bool,
    },

    /// One-shot maintenance sweep: deactivate expired sessions and expire
    /// stale channel claims
    Sweep,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
