//! # Messaging CLI
//!
//! Command-line interface for inspecting messaging configuration.
//!
//! This module provides CLI commands for:
//! - Listing configured queues per backend
//! - Checking that a queue's adapter can be constructed
//! - Previewing the wire properties a message would be published with
//!
//! The CLI never talks to a real broker. Adapters are built against an
//! in-process broker so construction and conversion can be checked offline.

use clap::{Parser, Subcommand};
use messaging_runtime::providers::rabbitmq::{self, converter, RabbitMqAdapterConstructor};
use messaging_runtime::providers::InMemoryBroker;
use messaging_runtime::{
    prepare_message, CallContextFactory, ConfigurationError, ConfigurationsList,
    EmptyCallContextFactory, Message, MessageAdapterConstructor, MessagingComponentFactory,
    MessagingError,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application name stamped on messages built by the CLI
pub const APPLICATION_NAME: &str = "messaging-cli";

// ============================================================================
// CLI Structure
// ============================================================================

/// Messaging CLI - inspect queue configuration and message conversion
#[derive(Parser, Debug)]
#[command(name = "messaging")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect messaging queue configuration")]
pub struct Cli {
    /// Configuration file path (YAML, TOML or JSON)
    #[arg(short, long, env = "MESSAGING_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List configured queues
    Queues,

    /// Build and dispose the adapter for a queue
    Check {
        /// Queue id to check
        queue_id: String,
    },

    /// Print the wire properties a message would be published with
    Preview {
        /// Queue id the message is sent to
        queue_id: String,

        /// Message body
        #[arg(short, long, default_value = "")]
        body: String,

        /// Send the body as raw bytes instead of text
        #[arg(long)]
        bytes: bool,

        /// Correlation id of the message
        #[arg(long)]
        correlation_id: Option<String>,

        /// Message id; generated when omitted
        #[arg(long)]
        message_id: Option<String>,

        /// Extra header as KEY=VALUE, may be repeated
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },
}

fn parse_header(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, _)) if key.trim().is_empty() => Err("header key must not be empty".to_string()),
        Some((key, header)) => Ok((key.trim().to_string(), header.to_string())),
        None => Err(format!("expected KEY=VALUE, got '{}'", value)),
    }
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),

    #[error("Logging setup failed: {message}")]
    Logging { message: String },
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Messaging(MessagingError::Configuration(_)) => 1,
            Self::Messaging(_) => 2,
            Self::Io(_) | Self::Output(_) | Self::Logging { .. } => 3,
        }
    }
}

// ============================================================================
// Backends
// ============================================================================

/// Adapter constructors built from the loaded configuration
pub struct Backends {
    broker: InMemoryBroker,
    rabbitmq: Arc<RabbitMqAdapterConstructor>,
    factory: MessagingComponentFactory,
}

impl Backends {
    /// Bind every backend section of `config`
    pub fn from_config(config: &config::Config) -> Self {
        let broker = InMemoryBroker::new();
        let rabbitmq = Arc::new(rabbitmq::constructor(config, Arc::new(broker.clone())));
        let factory =
            MessagingComponentFactory::new(Arc::new(EmptyCallContextFactory), APPLICATION_NAME)
                .with_constructor(rabbitmq.clone());

        Self {
            broker,
            rabbitmq,
            factory,
        }
    }

    /// Component factory over all backends
    pub fn factory(&self) -> &MessagingComponentFactory {
        &self.factory
    }

    /// In-process broker the adapters are bound to
    pub fn broker(&self) -> &InMemoryBroker {
        &self.broker
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let output = execute(&cli).await?;
    println!("{}", output);
    Ok(())
}

/// Load configuration and run the selected command, returning its output
pub async fn execute(cli: &Cli) -> Result<String, CliError> {
    let config = messaging_runtime::settings::load(cli.config.as_deref())?;
    let backends = Backends::from_config(&config);

    match &cli.command {
        Commands::Queues => Ok(execute_queues_command(&backends)),
        Commands::Check { queue_id } => execute_check_command(&backends, queue_id).await,
        Commands::Preview {
            queue_id,
            body,
            bytes,
            correlation_id,
            message_id,
            headers,
        } => {
            let mut message = if *bytes {
                Message::bytes(body.clone().into_bytes())
            } else {
                Message::text(body.clone())
            };
            if let Some(id) = message_id {
                message = message.with_message_id(id.clone());
            }
            if let Some(id) = correlation_id {
                message = message.with_correlation_id(id.clone());
            }
            for (key, value) in headers {
                message = message.with_property(key.clone(), value.clone());
            }

            execute_preview_command(&backends, queue_id, message)
        }
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Initialize logging based on CLI arguments
fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if cli.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::Logging {
        message: e.to_string(),
    })
}

/// Execute queues command
fn execute_queues_command(backends: &Backends) -> String {
    let lines: Vec<String> = backends
        .factory()
        .constructors()
        .iter()
        .flat_map(|constructor| {
            constructor
                .queue_ids()
                .into_iter()
                .map(move |id| format!("{}\t{}", constructor.backend_name(), id))
        })
        .collect();

    if lines.is_empty() {
        "No queues configured".to_string()
    } else {
        lines.join("\n")
    }
}

/// Execute check command
async fn execute_check_command(backends: &Backends, queue_id: &str) -> Result<String, CliError> {
    info!(queue_id = %queue_id, "Checking queue");

    let backend = backends
        .factory()
        .constructors()
        .iter()
        .find(|c| c.has_queue(queue_id))
        .map(|c| c.backend_name().to_string())
        .ok_or_else(|| MessagingError::ConfigurationNotFound {
            queue_id: queue_id.to_string(),
        })?;

    let mut adapter = backends.factory().create_message_adapter(queue_id)?;
    adapter.dispose().await?;

    Ok(format!("Queue '{}' is valid ({})", queue_id, backend))
}

/// Execute preview command
fn execute_preview_command(
    backends: &Backends,
    queue_id: &str,
    message: Message,
) -> Result<String, CliError> {
    let configuration = backends
        .rabbitmq
        .configuration()
        .and_then(|list| list.queue_configuration(queue_id))
        .ok_or_else(|| MessagingError::ConfigurationNotFound {
            queue_id: queue_id.to_string(),
        })?;
    configuration.validate()?;

    let context = EmptyCallContextFactory.create();
    let message = prepare_message(message, configuration, APPLICATION_NAME, &context);
    let properties = converter::to_wire_properties(&message, configuration)?;
    debug!(
        queue_id = %queue_id,
        message_id = %properties.message_id,
        "Built wire properties"
    );

    Ok(serde_json::to_string_pretty(&properties)?)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
