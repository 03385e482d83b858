mod chat;
mod config;
mod terminal_output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::info;

use chatframe_bridge::{DocumentEvents, ParentLink};
use chatframe_client::{BackendClient, ConversationBackend};
use chatframe_config::{config_file_path, load_layered, WidgetConfig};
use chatframe_core::{CredentialProvider, Credentials, StaticCredentials};
use chatframe_logging::init_logger;
use chatframe_session::ConversationSession;
use chatframe_store::{FileStorage, Store, WidgetState};
use chatframe_stream::WebSocketConnector;

use config::Config;
use terminal_output::note_success;

/// Origin the terminal client reports for itself.
const CLI_ORIGIN: &str = "chatframe://cli";

#[derive(Parser)]
#[command(name = "chatframe")]
#[command(about = "Terminal client for the chatframe widget backend")]
#[command(version)]
struct Cli {
    /// Config file (YAML or JSON); defaults to the one in the config directory
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Page URL whose `widgetConfig` query parameter overrides the file
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved widget config
    Config {
        /// Print JSON instead of YAML
        #[arg(long)]
        json: bool,
    },
    /// Start or end a backend session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Chat with the bot in the terminal
    Chat,
}

#[derive(Subcommand)]
enum SessionAction {
    /// PUT /session
    Start,
    /// DELETE /session
    Delete,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let env = Config::from_env();
    init_logger(env.log_dir(), &env.log_level);

    let file = cli.config.clone().unwrap_or_else(|| config_file_path(&env.home));
    let layered = load_layered(Some(file.as_path()), cli.url.as_deref().unwrap_or_default())
        .await
        .with_context(|| format!("Failed to load config from {}", file.display()))?;
    let widget = layered.config;

    match cli.command {
        Commands::Config { json } => {
            let value = widget.to_value();
            if json {
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print!("{}", serde_yaml::to_string(&value)?);
            }
        }
        Commands::Session { action } => {
            let client = backend(&widget, &env)?;
            let reply = match action {
                SessionAction::Start => client.start_session().await,
                SessionAction::Delete => client.delete_session().await,
            }?;
            note_success(&format!("session {}", client.session_id().await));
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
        Commands::Chat => {
            let session = chat_session(widget, &env)?;
            chat::run(session).await?;
        }
    }

    Ok(())
}

fn credentials(env: &Config) -> Arc<dyn CredentialProvider> {
    match &env.identity_id {
        Some(id) => Arc::new(StaticCredentials::identity(id.clone())),
        None => {
            let mut map = Map::new();
            map.insert("source".into(), Value::String("cli".into()));
            Arc::new(StaticCredentials::new(Credentials(map)))
        }
    }
}

fn backend(widget: &WidgetConfig, env: &Config) -> Result<BackendClient> {
    BackendClient::new(&widget.backend, credentials(env)).context("Failed to build the backend client")
}

fn chat_session(widget: WidgetConfig, env: &Config) -> Result<ConversationSession> {
    let client = Arc::new(backend(&widget, env)?);
    let streaming = widget.backend.allow_streaming_responses
        && !widget.backend.streaming_web_socket_endpoint.is_empty();
    let endpoint = widget.backend.streaming_web_socket_endpoint.clone();
    info!(api_url = %widget.backend.api_url, streaming, "Starting chat");

    let store = Store::new(WidgetState::new(widget, CLI_ORIGIN));
    let parent = ParentLink::full_page(DocumentEvents::new(), CLI_ORIGIN);
    let mut session = ConversationSession::new(store, client, parent)
        .with_session_storage(Arc::new(FileStorage::new(env.session_dir())))
        .with_sound(Arc::new(chat::TerminalBell));
    if streaming {
        session = session.with_stream_connector(Arc::new(WebSocketConnector::new(endpoint)));
    }
    Ok(session)
}
