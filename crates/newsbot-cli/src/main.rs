use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use newsbot_core::{storage::Database, AppConfig};

mod commands;

#[derive(Parser)]
#[command(name = "newsbot")]
#[command(author, version, about = "Broadcast new RSS/Atom articles to subscribed Telegram chats")]
struct Cli {
    /// Configuration file (default: ~/.config/newsbot/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start polling feeds and answering chat commands
    Run,
    /// List configured feeds with subscriber counts
    Feeds,
    /// Subscribe a chat to a feed
    Subscribe {
        /// Telegram chat id
        #[arg(short, long, allow_negative_numbers = true)]
        chat: i64,
        /// Feed id from the configuration
        #[arg(short, long)]
        feed: i64,
    },
    /// Unsubscribe a chat from a feed
    Unsubscribe {
        /// Telegram chat id
        #[arg(short, long, allow_negative_numbers = true)]
        chat: i64,
        /// Feed id from the configuration
        #[arg(short, long)]
        feed: i64,
    },
    /// List the feeds a chat is subscribed to
    Subscriptions {
        /// Telegram chat id
        #[arg(short, long, allow_negative_numbers = true)]
        chat: i64,
    },
    /// Validate the configuration and fetch every enabled feed once
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load(cli.config.as_deref())?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Some(Commands::Run) | None => commands::run::run(config).await,
        Some(Commands::Check) => commands::check::run(&config).await,
        Some(Commands::Feeds) => {
            let db = open_database(&config).await?;
            commands::feeds::run(&db, &config).await
        }
        Some(Commands::Subscribe { chat, feed }) => {
            let db = open_database(&config).await?;
            commands::subscribe::run(&db, &config, chat, feed).await
        }
        Some(Commands::Unsubscribe { chat, feed }) => {
            let db = open_database(&config).await?;
            commands::unsubscribe::run(&db, &config, chat, feed).await
        }
        Some(Commands::Subscriptions { chat }) => {
            let db = open_database(&config).await?;
            commands::subscriptions::run(&db, &config, chat).await
        }
    }
}

async fn open_database(config: &AppConfig) -> Result<Database> {
    config.validate()?;
    Ok(Database::new(config).await?)
}
