//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::{self, Config};
use crate::core::interrupt;

mod commands;

#[derive(Parser)]
#[command(name = "rill")]
#[command(version)]
#[command(about = "Streaming chat client")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override the backend base URL from config
    #[arg(long, env = "RILL_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Override the session cookie from config ("name=value")
    #[arg(long, env = "RILL_SESSION", global = true)]
    session_cookie: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Starts the interactive chat
    Chat,

    /// Sends a single message and prints the streamed response
    Send {
        /// The message to send
        message: String,
    },

    /// Shows the signed-in user
    Whoami,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Set the backend base URL in the config file
    SetUrl {
        /// The backend base URL
        url: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    interrupt::init();
    let _log_guard = init_logging();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let mut config = Config::load().context("load config")?;

    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(cookie) = cli.session_cookie {
        config.session_cookie = Some(cookie);
    }

    // default to chat mode
    let Some(command) = cli.command else {
        return commands::chat::run(&config).await;
    };

    match command {
        Commands::Chat => commands::chat::run(&config).await,
        Commands::Send { message } => commands::send::run(&config, &message).await,
        Commands::Whoami => commands::whoami::run(&config).await,
        Commands::Config { command } => match command {
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::SetUrl { url } => commands::config::set_url(&url),
        },
    }
}

/// Sends tracing output to daily-rolling files under ${RILL_HOME}/logs.
///
/// Stdout belongs to the chat surface, so nothing is logged there. Logging
/// is best-effort: an unwritable home directory disables it silently.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let logs_dir = config::paths::logs_dir();
    std::fs::create_dir_all(&logs_dir).ok()?;

    let appender = tracing_appender::rolling::daily(logs_dir, "rill.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = tracing_subscriber::EnvFilter::try_from_env("RILL_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Some(guard)
}
