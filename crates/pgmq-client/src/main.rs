//! Command-line interface for pgmq: manage queues and messages.
//!
//! ## What
//!
//! - Installs the extension, manages queue lifecycle and sends, reads and settles messages.
//! - Prints results as a table or as JSON.
//!
//! ## How
//!
//! Run the CLI with a subcommand. See `--help` for usage details.
//!
//! ### Example
//!
//! ```sh
//! pgmq install
//! pgmq queue create jobs
//! pgmq message send --queue jobs --payload '{"foo": "bar"}'
//! pgmq message read --queue jobs --vt 30
//! ```
use clap::{Parser, Subcommand};
use pgmq_client::config::Config;
use pgmq_client::{JsonValue, PgExecutor, PgmqClient};

use std::fs::File;
use std::process;

mod output;

use crate::output::{MessageId, Outcome, OutputWriter};

type Client = PgmqClient<PgExecutor>;

#[derive(Parser)]
#[command(name = "pgmq")]
#[command(about = "Manage pgmq queues and messages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database URL (highest priority, overrides all other config sources)
    #[arg(long, short = 'd')]
    dsn: Option<String>,

    /// Config file path (overrides environment variables and defaults)
    #[arg(long, short = 'c')]
    config: Option<String>,

    /// Log destination: stderr or file path
    #[arg(long, default_value = "stderr")]
    log_dest: String,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output format: json, table
    #[arg(long, default_value = "table")]
    format: String,

    /// Output destination: stdout or file path
    #[arg(long, default_value = "stdout")]
    out: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the pgmq extension
    Install,
    /// Queue Commands
    Queue {
        #[command(subcommand)]
        queue_command: QueueCommands,
    },
    /// Message Commands
    Message {
        #[command(subcommand)]
        message_command: MessageCommands,
    },
}

#[derive(Subcommand)]
enum QueueCommands {
    /// Create a new queue
    Create {
        /// Name of the queue
        name: String,
        /// Back the queue with an unlogged table
        #[arg(long)]
        unlogged: bool,
    },
    /// Create a partitioned queue (requires pg_partman)
    CreatePartitioned {
        /// Name of the queue
        name: String,
        /// Partition size, in message ids ("10000") or time ("1 day")
        #[arg(long, default_value = "10000")]
        partition_interval: String,
        /// How much history to keep, same units as the partition interval
        #[arg(long, default_value = "100000")]
        retention_interval: String,
    },
    /// Drop a queue and its archive
    Drop {
        /// Name of the queue to drop
        name: String,
    },
    /// Purge all messages from a queue
    Purge {
        /// Name of the queue to purge
        name: String,
    },
    /// Detach the archive table so it survives a drop
    DetachArchive {
        /// Name of the queue
        name: String,
    },
    /// List all queues
    List,
    /// Show queue metrics
    Metrics {
        /// Name of the queue (if not provided, shows all queues)
        name: Option<String>,
    },
}

#[derive(Subcommand)]
enum MessageCommands {
    /// Send a message
    Send {
        /// Name of the queue
        #[arg(long, short = 'q')]
        queue: String,
        /// JSON payload
        #[arg(long, short = 'p')]
        payload: String,
        /// Seconds before the message becomes visible
        #[arg(long, default_value = "0")]
        delay: i32,
    },
    /// Send several messages at once
    SendBatch {
        /// Name of the queue
        #[arg(long, short = 'q')]
        queue: String,
        /// JSON payloads, one per message
        #[arg(long = "payload", short = 'p', required = true)]
        payloads: Vec<String>,
        /// Seconds before the messages become visible
        #[arg(long, default_value = "0")]
        delay: i32,
    },
    /// Read messages and hide them for a visibility timeout
    Read {
        /// Name of the queue
        #[arg(long, short = 'q')]
        queue: String,
        /// Visibility timeout in seconds (default from configuration)
        #[arg(long)]
        vt: Option<i32>,
        /// Number of messages to read (default from configuration)
        #[arg(long)]
        qty: Option<i32>,
    },
    /// Read and delete the next message
    Pop {
        /// Name of the queue
        #[arg(long, short = 'q')]
        queue: String,
    },
    /// Change when a message becomes visible again
    SetVt {
        /// Name of the queue
        #[arg(long, short = 'q')]
        queue: String,
        /// Message ID
        #[arg(long)]
        id: i64,
        /// Seconds from now
        #[arg(long)]
        vt: i32,
    },
    /// Move messages to the archive
    Archive {
        /// Name of the queue
        #[arg(long, short = 'q')]
        queue: String,
        /// Message IDs
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Delete messages
    Delete {
        /// Name of the queue
        #[arg(long, short = 'q')]
        queue: String,
        /// Message IDs
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        other => {
            eprintln!("Unknown log level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let writer: Box<dyn Fn() -> Box<dyn std::io::Write + Send> + Send + Sync> =
        if cli.log_dest == "stderr" {
            Box::new(|| Box::new(std::io::stderr()))
        } else {
            let file = match File::create(&cli.log_dest) {
                Ok(file) => file,
                Err(e) => {
                    eprintln!("Failed to create log file '{}': {}", cli.log_dest, e);
                    process::exit(1);
                }
            };
            Box::new(move || match file.try_clone() {
                Ok(file) => Box::new(file),
                Err(_) => Box::new(std::io::stderr()),
            })
        };

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(writer)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {}", e);
    }

    if let Err(e) = run_cli(cli).await {
        tracing::error!("Error: {}", e);
        process::exit(1);
    }
}

/// Load configuration, connect and dispatch to the command handlers.
///
/// Configuration priority:
/// 1. --dsn CLI argument
/// 2. --config CLI argument
/// 3. PGMQ_CONFIG_FILE environment variable
/// 4. PGMQ_DSN and other environment variables
/// 5. Default config files (pgmq.yaml, pgmq.yml)
async fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load_with_options(cli.dsn, cli.config)
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    let client = pgmq_client::connect_with_config(&config).await?;

    let writer = OutputWriter::for_format(&cli.format);
    let mut out_writer: Box<dyn std::io::Write> = match cli.out.as_str() {
        "stdout" => Box::new(std::io::stdout()),
        _ => Box::new(File::create(&cli.out)?),
    };
    let out: &mut dyn std::io::Write = out_writer.as_mut();

    match cli.command {
        Commands::Install => {
            tracing::info!("Installing pgmq extension ...");
            client.install().await?;
            tracing::info!("Installation completed successfully");
        }
        Commands::Queue { queue_command } => {
            handle_queue_commands(&client, queue_command, writer, out).await?
        }
        Commands::Message { message_command } => {
            handle_message_commands(&client, &config, message_command, writer, out).await?
        }
    }
    Ok(())
}

async fn handle_queue_commands(
    client: &Client,
    command: QueueCommands,
    writer: OutputWriter,
    out: &mut dyn std::io::Write,
) -> anyhow::Result<()> {
    match command {
        QueueCommands::Create { name, unlogged } => {
            tracing::info!("Creating queue '{}' ...", &name);
            if unlogged {
                client.create_unlogged_queue(&name).await?;
            } else {
                client.create_queue(&name).await?;
            }
            tracing::info!("Queue '{}' created successfully", name);
        }

        QueueCommands::CreatePartitioned {
            name,
            partition_interval,
            retention_interval,
        } => {
            tracing::info!("Creating partitioned queue '{}' ...", &name);
            client
                .create_partitioned_queue(&name, &partition_interval, &retention_interval)
                .await?;
            tracing::info!("Queue '{}' created successfully", name);
        }

        QueueCommands::Drop { name } => {
            tracing::info!("Dropping queue '{}'...", name);
            client.drop_queue(&name).await?;
            tracing::info!("Queue '{}' dropped successfully", name);
        }

        QueueCommands::Purge { name } => {
            tracing::info!("Purging queue '{}'...", name);
            let purged = client.purge_queue(&name).await?;
            tracing::info!("Purged {} messages from queue '{}'", purged, name);
            writeln!(out, "Purged {} messages from queue '{}'", purged, name)?;
        }

        QueueCommands::DetachArchive { name } => {
            tracing::info!("Detaching archive of queue '{}'...", name);
            client.detach_archive(&name).await?;
            tracing::info!("Archive of queue '{}' detached", name);
        }

        QueueCommands::List => {
            tracing::info!("Listing all queues...");
            let queues = client.list_queues().await?;
            writer.write_list(&queues, out)?;
        }

        QueueCommands::Metrics { name } => {
            if let Some(queue_name) = name {
                tracing::info!("Getting metrics for queue '{}'...", queue_name);
                let metrics = client.metrics(&queue_name).await?;
                writer.write_item(&metrics, out)?;
            } else {
                tracing::info!("Getting metrics for all queues...");
                let metrics = client.metrics_all().await?;
                writer.write_list(&metrics, out)?;
            }
        }
    }
    Ok(())
}

async fn handle_message_commands(
    client: &Client,
    config: &Config,
    command: MessageCommands,
    writer: OutputWriter,
    out: &mut dyn std::io::Write,
) -> anyhow::Result<()> {
    match command {
        MessageCommands::Send {
            queue,
            payload,
            delay,
        } => {
            let payload: JsonValue = payload
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid payload: {}", e))?;
            let msg_id = client.send(&queue, &payload, delay).await?;
            tracing::info!("Sent message {} to queue '{}'", msg_id, queue);
            writer.write_item(&MessageId { msg_id }, out)?;
        }

        MessageCommands::SendBatch {
            queue,
            payloads,
            delay,
        } => {
            let payloads = payloads
                .iter()
                .map(|p| p.parse::<JsonValue>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| anyhow::anyhow!("Invalid payload: {}", e))?;
            let ids = client.send_batch(&queue, &payloads, delay).await?;
            tracing::info!("Sent {} messages to queue '{}'", ids.len(), queue);
            writer.write_list(&MessageId::list(&ids), out)?;
        }

        MessageCommands::Read { queue, vt, qty } => {
            let vt = vt.unwrap_or(config.default_visibility_timeout);
            let qty = qty.unwrap_or(config.default_batch_size);
            tracing::info!("Reading up to {} messages from queue '{}'...", qty, queue);
            let messages = client.read_batch(&queue, vt, qty).await?;
            writer.write_list(&messages, out)?;
        }

        MessageCommands::Pop { queue } => {
            tracing::info!("Popping a message from queue '{}'...", queue);
            let message = client.pop(&queue).await?;
            writer.write_optional(message.as_ref(), "No message available", out)?;
        }

        MessageCommands::SetVt { queue, id, vt } => {
            let message = client.set_vt(&queue, id, vt).await?;
            writer.write_optional(message.as_ref(), "Message not found", out)?;
        }

        MessageCommands::Archive { queue, ids } => {
            if let [msg_id] = ids[..] {
                let success = client.archive(&queue, msg_id).await?;
                writer.write_item(
                    &Outcome {
                        queue,
                        msg_id,
                        success,
                    },
                    out,
                )?;
            } else {
                let archived = client.archive_batch(&queue, &ids).await?;
                tracing::info!("Archived {}/{} messages", archived.len(), ids.len());
                writer.write_list(&MessageId::list(&archived), out)?;
            }
        }

        MessageCommands::Delete { queue, ids } => {
            if let [msg_id] = ids[..] {
                let success = client.delete(&queue, msg_id).await?;
                writer.write_item(
                    &Outcome {
                        queue,
                        msg_id,
                        success,
                    },
                    out,
                )?;
            } else {
                let deleted = client.delete_batch(&queue, &ids).await?;
                tracing::info!("Deleted {}/{} messages", deleted.len(), ids.len());
                writer.write_list(&MessageId::list(&deleted), out)?;
            }
        }
    }
    Ok(())
}
