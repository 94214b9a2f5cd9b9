//! Aifredo terminal chat client.
//!
//! Drives a `ChatSession` from the command line: connects to the
//! gateway, streams bot replies to stdout as they arrive, and gates
//! sends on the client-side daily quota.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::warn;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use aifredo_chat::{
    ChatError, ChatSession, FileStore, GatewayConfig, SessionEvent, config::default_config_path,
    fetch_bot_profile,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Aifredo terminal chat client.",
    propagate_version = true
)]
struct Cli {
    /// Gateway WebSocket endpoint
    #[arg(long, value_name = "URL")]
    gateway_url: Option<String>,
    /// Gateway auth token
    #[arg(
        long,
        value_name = "TOKEN",
        env = "AIFREDO_GATEWAY_TOKEN",
        hide_env_values = true
    )]
    token: Option<String>,
    /// Public bot id, used to print the chat header
    #[arg(long, value_name = "ID")]
    bot_id: Option<String>,
    /// Override the config file path
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
    /// Reduce output to only errors
    #[arg(short, long)]
    quiet: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a default config file and print its location
    InitConfig,
}

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(std::io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Some(Command::InitConfig) => init_config(cli.config.as_deref()),
        None => run_chat(cli),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("aifredo_chat={level},aifredo_protocol={level}"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn init_config(path: Option<&std::path::Path>) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };
    GatewayConfig::write_default(&path)?;
    println!("wrote default config to {}", path.display());
    Ok(())
}

#[tokio::main]
async fn run_chat(cli: Cli) -> Result<()> {
    let mut config = GatewayConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.gateway_url {
        config.gateway_url = url;
    }
    if let Some(token) = cli.token {
        config.gateway_token = token;
    }
    if config.gateway_url.is_empty() {
        bail!("no gateway URL configured; pass --gateway-url or set AIFREDO_GATEWAY_URL");
    }
    if config.gateway_token.is_empty() {
        bail!("no gateway token configured; pass --token or set AIFREDO_GATEWAY_TOKEN");
    }

    print_header(&cli.bot_id, &config).await;

    let store = FileStore::new(FileStore::default_path()?);
    let session = ChatSession::new(config.clone(), Arc::new(store));
    session
        .connect(&config.gateway_url, &config.gateway_token)
        .await
        .context("opening gateway connection")?;

    // Wait out the handshake. A silent gateway leaves this pending
    // indefinitely, same as the web client's connecting state.
    let mut status_rx = session.watch_status();
    let status = status_rx
        .wait_for(|status| !status.is_connecting())
        .await
        .context("session ended during handshake")?
        .clone();
    if !status.is_connected() {
        bail!(
            "{} Run again to retry.",
            status.error().unwrap_or("Unable to connect to the AI gateway.")
        );
    }
    println!(
        "connected ({} of {} messages left today)",
        session.quota_remaining(),
        session.quota_limit()
    );
    println!("type a message, /abort to stop a reply, /quit to leave");

    let events = session.subscribe();
    let printer = tokio::spawn(print_events(events));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush().ok();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => {}
            "/quit" | "/exit" => break,
            "/abort" => session.abort_chat().await?,
            text => match session.send_message(text).await {
                Ok(()) => {}
                Err(ChatError::QuotaExhausted) => {
                    println!(
                        "daily limit of {} messages reached; resets at local midnight",
                        session.quota_limit()
                    );
                }
                Err(ChatError::TurnInFlight) => {
                    println!("still streaming a reply; /abort to stop it");
                }
                Err(ChatError::NotConnected) => {
                    println!(
                        "not connected{}",
                        session
                            .status()
                            .error()
                            .map(|e| format!(": {e}"))
                            .unwrap_or_default()
                    );
                    break;
                }
                Err(err) => return Err(err.into()),
            },
        }
    }

    session.close().await;
    printer.abort();
    Ok(())
}

async fn print_header(bot_id: &Option<String>, config: &GatewayConfig) {
    let Some(bot_id) = bot_id else {
        return;
    };
    if config.api_base.is_empty() {
        warn!("--bot-id given but no api_base configured; skipping header");
        return;
    }
    match fetch_bot_profile(&config.api_base, bot_id).await {
        Ok(bot) if bot.model.is_empty() => println!("chatting with {}", bot.name),
        Ok(bot) => println!("chatting with {} ({})", bot.name, bot.model),
        Err(err) => warn!("bot lookup failed: {err:#}"),
    }
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Delta { fragment, .. }) => {
                print!("{fragment}");
                std::io::stdout().flush().ok();
            }
            Ok(SessionEvent::TurnFinished { .. }) => println!(),
            Ok(SessionEvent::TurnFailed { text }) => println!("\n! {text}"),
            Ok(SessionEvent::TurnAborted) => println!("\n[stopped]"),
            Ok(SessionEvent::StatusChanged(status)) => {
                if let Some(error) = status.error() {
                    eprintln!("\nconnection lost: {error}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
