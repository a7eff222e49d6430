// Ava CLI - Command Line Interface Entry Point

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ava_cancel::CancellationToken;
use ava_config::{Config, ConfigLoader, parse_override};
use ava_core::{AssistantsClient, Ava, AvaError, Conversation, TurnOutcome, open_store};
use ava_protocol::{ChatMessage, ThreadId};
use ava_relay::RelayServer;
use ava_state::SessionStore;

/// Ava - senior care assistant CLI
#[derive(Parser, Debug)]
#[command(name = "ava")]
#[command(version, about, long_about = None)]
struct TopCli {
    #[clap(flatten)]
    config_overrides: CliConfigOverrides,

    #[clap(subcommand)]
    command: Commands,
}

/// CLI configuration overrides
#[derive(Debug, clap::Args)]
struct CliConfigOverrides {
    /// Configuration override in key=value format
    #[arg(short = 'c', long = "config", value_name = "KEY=VALUE", global = true)]
    overrides: Vec<String>,
}

/// Available commands
#[derive(Debug, Subcommand)]
enum Commands {
    /// Chat interactively; Ctrl-C cancels the reply in flight
    Chat {
        /// Render each reply as a talking-head video
        #[arg(long)]
        animate: bool,
    },

    /// Send a single message and print the reply
    Ask {
        /// Message text
        text: String,

        /// Render the reply as a talking-head video
        #[arg(long)]
        animate: bool,
    },

    /// Run the realtime WebSocket relay until Ctrl-C
    Relay {
        /// Listen address, overriding relay.listen
        #[arg(long)]
        listen: Option<String>,
    },

    /// Inspect or reset the stored assistant thread
    Thread {
        #[command(subcommand)]
        thread_command: ThreadCommands,
    },

    /// Print the transcript of the current thread
    History {
        /// Fetch from the Assistants API instead of the local store
        #[arg(long)]
        remote: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },
}

/// Thread commands
#[derive(Debug, Subcommand)]
enum ThreadCommands {
    /// Show the stored thread id
    Show,

    /// Forget the stored thread; the next message starts a new one
    Reset,
}

/// Configuration commands
#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so replies stay pipeable
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = TopCli::parse();

    let loader = config_loader(std::env::current_dir()?);
    let config = load_config(&loader, &cli.config_overrides.overrides)?;
    let home = loader.global_dir().to_path_buf();

    match cli.command {
        Commands::Chat { animate } => run_chat(config, &home, animate).await,
        Commands::Ask { text, animate } => run_ask(config, &home, &text, animate).await,
        Commands::Relay { listen } => run_relay(config, listen).await,
        Commands::Thread { thread_command } => {
            handle_thread_command(thread_command, &config, &home).await
        }
        Commands::History { remote } => show_history(&config, &home, remote).await,
        Commands::Config { config_command } => handle_config_command(config_command, &config),
    }
}

/// Loader for `~/.ava` plus the project's `.ava/` under `project_dir`
fn config_loader(project_dir: PathBuf) -> ConfigLoader {
    ConfigLoader::new().with_project_dir(project_dir)
}

fn load_config(loader: &ConfigLoader, raw_overrides: &[String]) -> Result<Config> {
    let overrides = raw_overrides
        .iter()
        .map(|raw| parse_override(raw))
        .collect::<Result<Vec<_>, _>>()?;
    loader
        .load_with_cli_overrides(overrides)
        .context("failed to load configuration")
}

/// Run interactive chat
async fn run_chat(config: Config, home: &Path, animate: bool) -> Result<()> {
    let ava = Ava::from_config(config, home, animate).await?;
    let conversation = Arc::clone(ava.conversation());

    let restored = conversation.restore().await?;
    println!("Ava - type 'help' for commands, 'exit' to quit");
    if restored > 0 {
        println!("(restored {restored} messages)");
    }
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "exit" | "quit" => break,
            "help" => {
                println!("Commands:");
                println!("  help     - Show this help");
                println!("  history  - Show this conversation");
                println!("  reset    - Start a new thread");
                println!("  exit     - Exit Ava");
                println!();
                println!("Anything else is sent to the assistant. Ctrl-C cancels a pending reply.");
                continue;
            }
            "history" => {
                print_transcript(&conversation.messages().await);
                continue;
            }
            "reset" => {
                conversation.reset().await?;
                println!("Started a new conversation.");
                continue;
            }
            _ => {}
        }

        match send_with_interrupt(&conversation, line).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(AvaError::Cancelled) => println!("(cancelled)"),
            Err(err) => eprintln!("error: {err}"),
        }
        println!();
    }

    Ok(())
}

/// Run a single turn
async fn run_ask(config: Config, home: &Path, text: &str, animate: bool) -> Result<()> {
    let ava = Ava::from_config(config, home, animate).await?;
    let outcome = send_with_interrupt(ava.conversation(), text).await?;
    print_outcome(&outcome);
    Ok(())
}

async fn send_with_interrupt(
    conversation: &Conversation,
    text: &str,
) -> Result<TurnOutcome, AvaError> {
    let cancel = CancellationToken::new();
    let turn = conversation.send(text, &cancel);
    tokio::pin!(turn);

    tokio::select! {
        result = &mut turn => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, cancelling turn");
            cancel.cancel();
            turn.await
        }
    }
}

async fn run_relay(mut config: Config, listen: Option<String>) -> Result<()> {
    if let Some(listen) = listen {
        config.relay.listen = listen;
    }
    let server = RelayServer::from_config(&config.relay)?;
    let listener = server
        .bind()
        .await
        .with_context(|| format!("failed to bind {}", config.relay.listen))?;
    println!("Relay listening on ws://{}", listener.local_addr()?);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    server.serve(listener, cancel).await?;
    Ok(())
}

/// Handle thread commands
async fn handle_thread_command(cmd: ThreadCommands, config: &Config, home: &Path) -> Result<()> {
    let store = open_store(&config.storage, home).await?;
    let key = &config.storage.session_key;
    match cmd {
        ThreadCommands::Show => match store.load_thread(key).await? {
            Some(thread_id) => println!("{thread_id}"),
            None => println!("(no thread for session '{key}')"),
        },
        ThreadCommands::Reset => {
            store.clear_thread(key).await?;
            println!("Cleared thread for session '{key}'.");
        }
    }
    Ok(())
}

async fn show_history(config: &Config, home: &Path, remote: bool) -> Result<()> {
    let store = open_store(&config.storage, home).await?;
    let Some(thread_id) = store.load_thread(&config.storage.session_key).await? else {
        println!("(no conversation yet)");
        return Ok(());
    };

    let messages = if remote {
        fetch_remote_history(config, &thread_id).await?
    } else {
        store.messages(&thread_id).await?
    };
    print_transcript(&messages);
    Ok(())
}

async fn fetch_remote_history(
    config: &Config,
    thread_id: &ThreadId,
) -> Result<Vec<ChatMessage>> {
    let client = AssistantsClient::from_config(config)?;
    Ok(client.history(thread_id, 100).await?)
}

/// Handle config commands
fn handle_config_command(cmd: ConfigCommands, config: &Config) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            print!("{}", toml::to_string_pretty(config)?);
        }
    }
    Ok(())
}

fn print_outcome(outcome: &TurnOutcome) {
    println!("ava> {}", outcome.assistant.content);
    if let Some(url) = &outcome.video_url {
        println!("video: {url}");
    }
}

fn print_transcript(messages: &[ChatMessage]) {
    if messages.is_empty() {
        println!("(empty)");
        return;
    }
    for message in messages {
        println!("{}> {}", speaker(message), message.content);
    }
}

fn speaker(message: &ChatMessage) -> &'static str {
    match message.role {
        ava_protocol::MessageRole::User => "you",
        ava_protocol::MessageRole::Assistant => "ava",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn cli_definition_is_valid() {
        TopCli::command().debug_assert();
    }

    #[test]
    fn config_overrides_are_global() {
        let cli = TopCli::try_parse_from(["ava", "ask", "hi", "-c", "openai.message_limit=5"])
            .unwrap();
        assert_eq!(
            cli.config_overrides.overrides,
            vec!["openai.message_limit=5".to_string()]
        );
        assert!(matches!(cli.command, Commands::Ask { ref text, animate: false } if text == "hi"));
    }

    #[test]
    fn project_config_is_layered_under_cli_overrides() {
        let global = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(project.path().join(".ava")).unwrap();
        std::fs::write(
            project.path().join(".ava").join("config.toml"),
            "[openai]\nmessage_limit = 7\n\n[relay]\nmodel = \"project-model\"\n",
        )
        .unwrap();

        let loader = config_loader(project.path().to_path_buf())
            .with_global_dir(global.path().to_path_buf());

        let config = load_config(&loader, &[]).unwrap();
        assert_eq!(config.openai.message_limit, 7);
        assert_eq!(config.relay.model, "project-model");

        let config = load_config(&loader, &["openai.message_limit=9".to_string()]).unwrap();
        assert_eq!(config.openai.message_limit, 9);
        assert_eq!(config.relay.model, "project-model");
    }

    #[test]
    fn malformed_override_is_rejected() {
        let global = tempfile::tempdir().unwrap();
        let loader = config_loader(global.path().to_path_buf())
            .with_global_dir(global.path().to_path_buf());
        assert!(load_config(&loader, &["no-equals-sign".to_string()]).is_err());
    }

    #[test]
    fn speaker_labels() {
        assert_eq!(speaker(&ChatMessage::user("hi")), "you");
        assert_eq!(speaker(&ChatMessage::assistant("m", "hello")), "ava");
    }
}
