use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "feedbot")]
#[command(about = "Polls RSS/Atom feeds and posts new entries to Telegram chats")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a feed to poll
    Add {
        /// Source label shown in notifications
        name: String,

        /// RSS or Atom feed URL
        url: String,

        /// Store the feed without fetching it first
        #[arg(long)]
        no_validate: bool,
    },

    /// Remove a feed by name
    Remove {
        /// Name the feed was added under
        name: String,
    },

    /// List configured feeds in polling order
    List,

    /// Show the persisted poll state
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a single poll cycle and exit
    Check {
        /// Print messages instead of sending them; state is not saved
        #[arg(long)]
        dry_run: bool,
    },

    /// Poll continuously until `quit` is entered on stdin
    Run {
        /// Print messages instead of sending them; state is not saved
        #[arg(long)]
        dry_run: bool,
    },
}
