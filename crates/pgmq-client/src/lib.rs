//! # pgmq-client
//!
//! **pgmq-client** is an async Rust client for [pgmq](https://github.com/pgmq/pgmq), the lightweight
//! message queue that lives inside PostgreSQL as an extension.
//!
//! ## Features
//!
//! - **Dynamic payloads**: [`JsonValue`] carries any JSON document, keeping integers and doubles apart.
//! - **Typed results**: every procedure's rows decode into [`Message`], [`QueueMetrics`] or [`QueueInfo`].
//! - **Pluggable execution**: [`PgmqClient`] runs on any [`Executor`](executor::Executor); the default
//!   one wraps a sqlx connection pool.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pgmq_client::json_value;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = pgmq_client::connect("postgresql://localhost/mydb").await?;
//!
//! // Setup (run once)
//! client.install().await?;
//! client.create_queue("tasks").await?;
//!
//! // Producer
//! let id = client
//!     .send("tasks", &json_value!({"task": "send_email", "to": "user@example.com"}), 0)
//!     .await?;
//!
//! // Consumer
//! if let Some(msg) = client.read("tasks", 30).await? {
//!     println!("Processing {}: {}", msg.msg_id, msg.message);
//!     client.archive("tasks", msg.msg_id).await?;
//! }
//! # let _ = id;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod executor;
pub mod json;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod row;
pub mod types;

pub use crate::client::PgmqClient;
pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::json::{JsonArray, JsonObject, JsonValue};
pub use crate::types::{Message, QueueInfo, QueueMetrics};

#[cfg(feature = "postgres")]
pub use crate::postgres::PgExecutor;

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}

/// Connect to a database using a DSN string, with default pool settings.
///
/// For pool sizing and timeouts use [`connect_with_config`].
///
/// # Example
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = pgmq_client::connect("postgresql://localhost/mydb").await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "postgres")]
pub async fn connect(dsn: &str) -> Result<PgmqClient<PgExecutor>> {
    connect_with_config(&Config::from_dsn(dsn)).await
}

/// Connect to a database using a configuration object.
///
/// # Example
/// ```no_run
/// # use pgmq_client::Config;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::from_dsn("postgresql://localhost/mydb").with_max_connections(20);
/// let client = pgmq_client::connect_with_config(&config).await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "postgres")]
pub async fn connect_with_config(config: &Config) -> Result<PgmqClient<PgExecutor>> {
    Ok(PgmqClient::new(PgExecutor::connect(config).await?))
}
