use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "castbot")]
#[command(author, version, about = "Telegram broadcast bot with an admin dashboard API", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot, the dashboard API and the scheduler
    Run {
        /// Receive updates through a webhook on the dashboard port instead of long polling
        #[arg(long)]
        webhook: bool,
    },

    /// Apply pending database migrations and exit
    Migrate,

    /// Print dashboard statistics as JSON and exit
    Stats,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
