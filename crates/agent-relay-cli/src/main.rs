mod logging;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use agent_relay_core::config::{Config, DEFAULT_TOOL_NAME, ToolNaming};
use agent_relay_core::session::SessionId;
use agent_relay_normalizer::http::HttpTransport;
use agent_relay_normalizer::reader::ReaderTransport;
use agent_relay_normalizer::{InvokeRequest, Transport, encode_frames, normalize, relay};
use agent_relay_transcript::{Conversation, Strictness, Transcript, TurnOutcome, decode_frames};

use crate::render::LiveRenderer;

#[derive(Parser)]
#[command(
    name = "agent-relay",
    about = "Relay an agent runtime's event stream as tool-aware chat frames",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a raw upstream body into relay frames
    Normalize {
        /// Body to read (default: stdin)
        #[arg(short, long)]
        input: Option<String>,

        /// How tool-use events are named
        #[arg(long, value_enum)]
        tool_naming: Option<NamingArg>,
    },

    /// Rebuild a transcript from recorded relay frames
    Replay {
        /// Frames to read (default: stdin)
        #[arg(short, long)]
        input: Option<String>,

        /// User prompt that opened the turn
        #[arg(short, long, default_value = "(replay)")]
        prompt: String,

        /// Print the transcript as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send one message to the configured agent runtime
    Chat {
        /// Message to send
        #[arg(short, long)]
        message: String,

        /// Tool API key, used when the config has none
        #[arg(long)]
        tool_api_key: Option<String>,

        /// Print the final transcript as JSON instead of streaming it
        #[arg(long)]
        json: bool,
    },

    /// Report whether a tool API key is available
    CheckEnv,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show version and config status
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a specific config value
    Get { key: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum NamingArg {
    /// Always report the default tool name
    Fixed,
    /// Use the name carried by the upstream event
    Payload,
}

impl From<NamingArg> for ToolNaming {
    fn from(arg: NamingArg) -> Self {
        match arg {
            NamingArg::Fixed => ToolNaming::Fixed {
                name: DEFAULT_TOOL_NAME.into(),
            },
            NamingArg::Payload => ToolNaming::FromPayload {
                fallback: DEFAULT_TOOL_NAME.into(),
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_dir);
    let config = Config::load(&config_path)?;

    logging::init(&config.logging.clone().unwrap_or_default(), cli.verbose)?;

    match cli.command {
        Commands::Normalize { input, tool_naming } => {
            let naming = tool_naming.map(ToolNaming::from).unwrap_or_else(|| config.tool_naming());
            let body = ReaderTransport::from_arg(input.as_deref())
                .open(&recorded_request("(normalize)"))
                .await?;
            let mut frames = std::pin::pin!(encode_frames(normalize(body, naming)));
            let mut stdout = tokio::io::stdout();
            while let Some(frame) = frames.next().await {
                stdout.write_all(frame.as_bytes()).await?;
                stdout.flush().await?;
            }
        }
        Commands::Replay {
            input,
            prompt,
            json,
        } => {
            let body = ReaderTransport::from_arg(input.as_deref())
                .open(&recorded_request(&prompt))
                .await?;
            let mut conversation = Conversation::with_strictness(Strictness::Lenient);
            let outcome = conversation
                .run_turn(&prompt, decode_frames(body), |_| {})
                .await;
            print_transcript(conversation.transcript(), json)?;
            report(&outcome);
        }
        Commands::Chat {
            message,
            tool_api_key,
            json,
        } => {
            let Some(url) = config.upstream_url() else {
                anyhow::bail!("No upstream URL configured (set upstream.url or upstream.url_env)");
            };
            let request = InvokeRequest::new(&config, &message, tool_api_key.as_deref())?;
            let transport = Arc::new(HttpTransport::new(&url, config.upstream_timeout())?);
            tracing::info!(session_id = %request.session_id, "Starting chat turn");

            let frames = relay(transport, request, config.tool_naming())
                .map(Ok::<String, anyhow::Error>);
            let mut conversation = Conversation::new();

            let outcome = if json {
                let outcome = conversation.run_turn(&message, decode_frames(frames), |_| {}).await;
                print_transcript(conversation.transcript(), true)?;
                outcome
            } else {
                let mut renderer = LiveRenderer::new(std::io::stdout());
                let outcome = conversation
                    .run_turn(&message, decode_frames(frames), |messages| {
                        if let Err(e) = renderer.update(messages) {
                            tracing::warn!(%e, "Failed to render transcript");
                        }
                    })
                    .await;
                renderer.finish()?;
                outcome
            };
            report(&outcome);
        }
        Commands::CheckEnv => {
            let status = serde_json::json!({
                "hasTavilyKey": config.has_server_tool_api_key(),
            });
            println!("{status}");
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&config.redacted_value())?);
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(serde_json::Value::String(s)) => println!("{s}"),
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("No config value at '{key}'"),
            },
        },
        Commands::Status => {
            println!("agent-relay v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Config: {}{}",
                config_path.display(),
                if config_path.exists() { "" } else { " (not found, using defaults)" }
            );
            println!(
                "Upstream: {}",
                config.upstream_url().unwrap_or_else(|| "not configured".into())
            );
            println!(
                "Tool API key: {}",
                if config.has_server_tool_api_key() { "configured" } else { "client-supplied" }
            );

            let (warnings, errors) = config.validate();
            for warning in &warnings {
                println!("  warning: {warning}");
            }
            for error in &errors {
                println!("  error: {error}");
            }
        }
    }

    Ok(())
}

/// Request handed to a transport that replays a recorded body.
fn recorded_request(prompt: &str) -> InvokeRequest {
    InvokeRequest {
        prompt: prompt.to_string(),
        tool_api_key: String::new(),
        session_id: SessionId::generate(),
    }
}

fn print_transcript(transcript: &Transcript, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(transcript)?);
    } else {
        print!("{}", render::render(transcript.messages()));
    }
    Ok(())
}

fn report(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Completed { events } => tracing::debug!(events, "Turn completed"),
        TurnOutcome::Failed { events, error } => {
            tracing::error!(events, error = %error, "Turn failed");
        }
    }
}
