//! Core types for pgmq-client: queue messages, metrics, and queue metadata.
//!
//! ## What
//!
//! - [`Message`] is a message delivered by `read`, `pop` or `set_vt`.
//! - [`QueueMetrics`] is a point-in-time snapshot of one queue's statistics.
//! - [`QueueInfo`] describes a queue as listed by `pgmq.list_queues()`.
//!
//! All of them are disconnected snapshots; nothing here refers back to engine state.
//!
//! ## How
//!
//! These types are returned by [`PgmqClient`](crate::PgmqClient). Each implements
//! [`DecodeRow`] for the column shape of the procedure that produces it.
//!
//! ### Example
//!
//! ```rust
//! use pgmq_client::types::Message;
//! fn print_message(msg: &Message) {
//!     println!("{}", msg);
//! }
//! ```
use crate::error::Result;
use crate::json::JsonValue;
use crate::row::{ColumnType, DecodeRow, Row};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

/// A message in a queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tabled)]
pub struct Message {
    /// Message id, unique and increasing within its queue
    pub msg_id: i64,
    /// Number of times the message has been delivered to a reader
    pub read_ct: i64,
    /// Timestamp when the message was sent
    pub enqueued_at: DateTime<Utc>,
    /// Visibility deadline: the message is hidden from readers until then
    pub vt: DateTime<Utc>,
    /// The message payload
    pub message: JsonValue,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message {{ msg_id: {}, read_ct: {}, enqueued_at: {}, vt: {}, message: {} }}",
            self.msg_id, self.read_ct, self.enqueued_at, self.vt, self.message
        )
    }
}

/// `(msg_id, read_ct, enqueued_at, vt, message)` as returned by read, pop and set_vt.
impl DecodeRow for Message {
    const COLUMNS: &'static [ColumnType] = &[
        ColumnType::BigInt,
        ColumnType::BigInt,
        ColumnType::Timestamp,
        ColumnType::Timestamp,
        ColumnType::Json,
    ];

    fn decode_row(mut row: Row) -> Result<Self> {
        Ok(Self {
            msg_id: row.take(0)?,
            read_ct: row.take(1)?,
            enqueued_at: row.take(2)?,
            vt: row.take(3)?,
            message: row.take(4)?,
        })
    }
}

/// Queue metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMetrics {
    /// Name of the queue
    pub queue_name: String,
    /// Messages currently in the queue, visible or not
    pub queue_length: i64,
    /// Age of the newest message in seconds; `None` when the queue is empty
    pub newest_msg_age_sec: Option<i64>,
    /// Age of the oldest message in seconds; `None` when the queue is empty
    pub oldest_msg_age_sec: Option<i64>,
    /// Messages ever sent to the queue
    pub total_messages: i64,
    /// When the snapshot was taken
    pub scrape_time: DateTime<Utc>,
}

impl Tabled for QueueMetrics {
    const LENGTH: usize = 6;

    fn fields(&self) -> Vec<std::borrow::Cow<'_, str>> {
        vec![
            self.queue_name.as_str().into(),
            self.queue_length.to_string().into(),
            display_option(&self.newest_msg_age_sec).into(),
            display_option(&self.oldest_msg_age_sec).into(),
            self.total_messages.to_string().into(),
            self.scrape_time.to_rfc3339().into(),
        ]
    }

    fn headers() -> Vec<std::borrow::Cow<'static, str>> {
        vec![
            "queue_name",
            "queue_length",
            "newest_msg_age_sec",
            "oldest_msg_age_sec",
            "total_messages",
            "scrape_time",
        ]
        .into_iter()
        .map(|s| s.into())
        .collect()
    }
}

/// Helper function to format optional values for Tabled
pub fn display_option<T: fmt::Display>(o: &Option<T>) -> String {
    match o {
        Some(v) => v.to_string(),
        None => "N/A".to_string(),
    }
}

/// `(queue_name, queue_length, newest_msg_age_sec, oldest_msg_age_sec, total_messages, scrape_time)`
/// as returned by `pgmq.metrics`.
impl DecodeRow for QueueMetrics {
    const COLUMNS: &'static [ColumnType] = &[
        ColumnType::Text,
        ColumnType::BigInt,
        ColumnType::BigInt,
        ColumnType::BigInt,
        ColumnType::BigInt,
        ColumnType::Timestamp,
    ];

    fn decode_row(mut row: Row) -> Result<Self> {
        Ok(Self {
            queue_name: row.take(0)?,
            queue_length: row.take(1)?,
            newest_msg_age_sec: row.take(2)?,
            oldest_msg_age_sec: row.take(3)?,
            total_messages: row.take(4)?,
            scrape_time: row.take(5)?,
        })
    }
}

/// A `pgmq.metrics_all()` row, where every column arrives as text.
///
/// Parsing is lenient. NULL or non-numeric counts become `0` and such ages become `None`. An
/// unreadable scrape time becomes the time of decoding.
pub(crate) struct LenientQueueMetrics(pub(crate) QueueMetrics);

impl DecodeRow for LenientQueueMetrics {
    const COLUMNS: &'static [ColumnType] = &[ColumnType::Text; 6];

    fn decode_row(mut row: Row) -> Result<Self> {
        let queue_name: Option<String> = row.take(0)?;
        let queue_length: Option<String> = row.take(1)?;
        let newest: Option<String> = row.take(2)?;
        let oldest: Option<String> = row.take(3)?;
        let total: Option<String> = row.take(4)?;
        let scrape_time: Option<String> = row.take(5)?;

        let queue_name = queue_name.unwrap_or_default();
        let scrape_time = match scrape_time.as_deref().and_then(parse_timestamp) {
            Some(ts) => ts,
            None => {
                tracing::warn!(
                    "Unreadable scrape_time {:?} for queue '{}', using current time",
                    scrape_time,
                    queue_name
                );
                Utc::now()
            }
        };

        Ok(Self(QueueMetrics {
            queue_length: parse_count(queue_length.as_deref()).unwrap_or(0),
            newest_msg_age_sec: parse_count(newest.as_deref()),
            oldest_msg_age_sec: parse_count(oldest.as_deref()),
            total_messages: parse_count(total.as_deref()).unwrap_or(0),
            scrape_time,
            queue_name,
        }))
    }
}

fn parse_count(text: Option<&str>) -> Option<i64> {
    text.and_then(|s| s.trim().parse().ok())
}

/// RFC 3339, or PostgreSQL's text rendering of `timestamptz` (`2024-05-01 12:30:00.123456+00`).
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|ts| ts.and_utc())
}

/// A queue as listed by `pgmq.list_queues()`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Tabled)]
pub struct QueueInfo {
    /// Name of the queue
    pub queue_name: String,
    /// Timestamp when the queue was created
    pub created_at: DateTime<Utc>,
    /// Whether the queue table is partitioned
    pub is_partitioned: bool,
    /// Whether the queue table is unlogged
    pub is_unlogged: bool,
}

impl fmt::Display for QueueInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QueueInfo {{ queue_name: {}, created_at: {}, is_partitioned: {}, is_unlogged: {} }}",
            self.queue_name, self.created_at, self.is_partitioned, self.is_unlogged
        )
    }
}

impl DecodeRow for QueueInfo {
    const COLUMNS: &'static [ColumnType] = &[
        ColumnType::Text,
        ColumnType::Timestamp,
        ColumnType::Bool,
        ColumnType::Bool,
    ];

    fn decode_row(mut row: Row) -> Result<Self> {
        Ok(Self {
            queue_name: row.take(0)?,
            created_at: row.take(1)?,
            is_partitioned: row.take(2)?,
            is_unlogged: row.take(3)?,
        })
    }
}
