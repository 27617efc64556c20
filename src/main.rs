use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use supportline::api::{validate_message, ChatClient, MessageExchange};
use supportline::config::Config;
use supportline::session::ConversationId;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "supportline")]
#[command(version)]
#[command(about = "Chat with an AI customer-support service from the terminal", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.supportline/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Chat service URL, overrides the config file and SUPPORTLINE_BASE_URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// Send a single message and print the reply
    Send {
        message: String,
        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Check that the chat service is up
    Health,
    /// List the service's agents and their capabilities
    Agents,
    /// Print the effective configuration
    Config,
}

fn init_tracing(config: &Config) -> Result<()> {
    fs::create_dir_all(&config.home)
        .with_context(|| format!("Failed to create {}", config.home.display()))?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())
        .context("Failed to open log file")?;

    // The chat screen owns stdout, so logs go to a file
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config = config.with_base_url(base_url)?;
    }
    init_tracing(&config)?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => supportline::ui::run(config).await,
        Commands::Send { message, conversation } => {
            validate_message(&message)?;
            let client = ChatClient::new(config)?;
            let conversation = conversation.map(ConversationId::from);
            let reply = client.send_message(&message, conversation.as_ref()).await?;

            println!("{}", reply.content);
            println!();
            println!(
                "agent: {}  conversation: {}  message: {}",
                reply.agent.as_deref().unwrap_or("-"),
                reply.conversation_id,
                reply.message_id
            );
            Ok(())
        }
        Commands::Health => {
            let client = ChatClient::new(config)?;
            let health = client
                .health()
                .await
                .with_context(|| format!("{} is not reachable", client.base_url()))?;

            println!(
                "{}: {} {} ({})",
                health.status,
                health.app.as_deref().unwrap_or("chat service"),
                health.version.as_deref().unwrap_or(""),
                health.environment.as_deref().unwrap_or("unknown environment")
            );
            Ok(())
        }
        Commands::Agents => {
            let client = ChatClient::new(config)?;
            let agents = client.list_agents().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&agents).context("Failed to format agent list")?
            );
            Ok(())
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
