//! # chat-cli
//!
//! CLI tool for exercising a chatsync server.
//!
//! ## Commands
//!
//! - `listen`: Stay connected and print inbound events
//! - `send`: Send one message to a peer
//! - `conversations`: Hydrate from the REST backend and list conversations
//!
//! ## Example
//!
//! ```bash
//! # Watch everything addressed to u1
//! chat-cli --user u1 listen
//!
//! # In another terminal
//! chat-cli --user u2 send u1 "hello"
//!
//! # Show u1's conversations from the backend
//! chat-cli --user u1 conversations
//! ```

use anyhow::{Context, Result};
use chat_client::Config;
use clap::{Parser, Subcommand, ValueEnum};
use chat_types::{MessageKind, UserId};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{conversations, listen, send};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "chatsync.toml";

/// CLI tool for exercising a chatsync server.
#[derive(Parser, Debug)]
#[command(name = "chat-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ./chatsync.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Identity to connect as
    #[arg(long, short, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stay connected and print inbound events until Ctrl-C
    Listen {
        /// Hydrate from the REST backend before listening
        #[arg(long)]
        hydrate: bool,
    },

    /// Send one message to a peer
    Send {
        /// Receiving user id
        to: String,

        /// Message text
        text: String,

        /// Message type
        #[arg(long, value_enum, default_value_t = KindArg::Text)]
        kind: KindArg,
    },

    /// Hydrate from the REST backend and list conversations
    Conversations,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Text,
    Image,
    Emoji,
}

impl From<KindArg> for MessageKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Text => MessageKind::Text,
            KindArg::Image => MessageKind::Image,
            KindArg::Emoji => MessageKind::Emoji,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;
    let user = cli
        .user
        .filter(|u| !u.is_empty())
        .map(UserId::new)
        .context("--user is required")?;

    match cli.command {
        Commands::Listen { hydrate } => {
            listen::run(&config, user, hydrate).await?;
        }
        Commands::Send { to, text, kind } => {
            send::run(&config, user, UserId::new(to), &text, kind.into()).await?;
        }
        Commands::Conversations => {
            conversations::run(&config, user).await?;
        }
    }

    Ok(())
}

/// Load the explicit config file, else `./chatsync.toml`, else defaults.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            let local = Path::new(DEFAULT_CONFIG_FILE);
            if local.exists() {
                Config::from_file(local).context("Failed to load ./chatsync.toml")
            } else {
                Ok(Config::default())
            }
        }
    }
}
