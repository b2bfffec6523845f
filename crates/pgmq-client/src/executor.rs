//! The boundary between [`PgmqClient`](crate::PgmqClient) and whatever runs its SQL.
//!
//! A [`Call`] names a [`Procedure`], carries its ordered operands and the column types its rows are
//! expected to have. An [`Executor`] runs the call and hands back rows lazily. The client never sees
//! a connection, a pool or a driver type, which keeps it testable against an in-memory engine.
//!
//! ## Example
//!
//! ```rust
//! use pgmq_client::executor::{Call, Procedure};
//! use pgmq_client::row::SqlValue;
//!
//! let call = Call::new(Procedure::Pop, vec![SqlValue::Text("jobs".into())]);
//! assert_eq!(call.procedure.name(), "pgmq.pop");
//! ```
use crate::error::Result;
use crate::row::{ColumnType, DecodeRow, Row, SqlValue};
use async_trait::async_trait;
use futures::stream::{BoxStream, TryStreamExt};
use std::sync::Arc;

// SQL Constants
const INSTALL: &str = r#"
    CREATE EXTENSION IF NOT EXISTS pgmq CASCADE;
"#;

const SEND: &str = r#"
    SELECT * FROM pgmq.send($1::text, $2::jsonb, $3::integer);
"#;

const SEND_BATCH: &str = r#"
    SELECT * FROM pgmq.send_batch($1::text, $2::jsonb[], $3::integer);
"#;

const READ: &str = r#"
    SELECT msg_id, read_ct::bigint, enqueued_at, vt, message
    FROM pgmq.read($1::text, $2::integer, $3::integer);
"#;

const POP: &str = r#"
    SELECT msg_id, read_ct::bigint, enqueued_at, vt, message
    FROM pgmq.pop($1::text);
"#;

const SET_VT: &str = r#"
    SELECT msg_id, read_ct::bigint, enqueued_at, vt, message
    FROM pgmq.set_vt($1::text, $2::bigint, $3::integer);
"#;

const ARCHIVE: &str = r#"
    SELECT pgmq.archive($1::text, $2::bigint);
"#;

const ARCHIVE_BATCH: &str = r#"
    SELECT * FROM pgmq.archive($1::text, $2::bigint[]);
"#;

const DELETE: &str = r#"
    SELECT pgmq.delete($1::text, $2::bigint);
"#;

const DELETE_BATCH: &str = r#"
    SELECT * FROM pgmq.delete($1::text, $2::bigint[]);
"#;

const PURGE_QUEUE: &str = r#"
    SELECT pgmq.purge_queue($1::text);
"#;

const METRICS: &str = r#"
    SELECT queue_name, queue_length, newest_msg_age_sec::bigint, oldest_msg_age_sec::bigint,
           total_messages, scrape_time
    FROM pgmq.metrics($1::text);
"#;

const METRICS_ALL: &str = r#"
    SELECT queue_name::text, queue_length::text, newest_msg_age_sec::text, oldest_msg_age_sec::text,
           total_messages::text, scrape_time::text
    FROM pgmq.metrics_all();
"#;

const CREATE: &str = r#"
    SELECT pgmq.create($1::text);
"#;

const CREATE_UNLOGGED: &str = r#"
    SELECT pgmq.create_unlogged($1::text);
"#;

const CREATE_PARTITIONED: &str = r#"
    SELECT pgmq.create_partitioned($1::text, $2::text, $3::text);
"#;

const DROP_QUEUE: &str = r#"
    SELECT pgmq.drop_queue($1::text);
"#;

const DETACH_ARCHIVE: &str = r#"
    SELECT pgmq.detach_archive($1::text);
"#;

const LIST_QUEUES: &str = r#"
    SELECT queue_name::text, created_at, is_partitioned, is_unlogged
    FROM pgmq.list_queues();
"#;

/// A procedure exposed by the `pgmq` extension.
///
/// Operands, in order, are documented per variant. `queue` is always `TEXT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    /// Install the extension. No operands.
    Install,
    /// `(queue, message JSONB, delay INTEGER)`
    Send,
    /// `(queue, messages JSONB[], delay INTEGER)`
    SendBatch,
    /// `(queue, vt INTEGER, qty INTEGER)`
    Read,
    /// `(queue)`
    Pop,
    /// `(queue, msg_id BIGINT, vt INTEGER)`
    SetVt,
    /// `(queue, msg_id BIGINT)`
    Archive,
    /// `(queue, msg_ids BIGINT[])`
    ArchiveBatch,
    /// `(queue, msg_id BIGINT)`
    Delete,
    /// `(queue, msg_ids BIGINT[])`
    DeleteBatch,
    /// `(queue)`
    PurgeQueue,
    /// `(queue)`
    Metrics,
    /// No operands. Every column is returned as `TEXT`.
    MetricsAll,
    /// `(queue)`
    Create,
    /// `(queue)`
    CreateUnlogged,
    /// `(queue, partition_interval TEXT, retention_interval TEXT)`
    CreatePartitioned,
    /// `(queue)`
    DropQueue,
    /// `(queue)`
    DetachArchive,
    /// No operands.
    ListQueues,
}

impl Procedure {
    /// Qualified procedure name, for logs and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Procedure::Install => "install",
            Procedure::Send => "pgmq.send",
            Procedure::SendBatch => "pgmq.send_batch",
            Procedure::Read => "pgmq.read",
            Procedure::Pop => "pgmq.pop",
            Procedure::SetVt => "pgmq.set_vt",
            Procedure::Archive | Procedure::ArchiveBatch => "pgmq.archive",
            Procedure::Delete | Procedure::DeleteBatch => "pgmq.delete",
            Procedure::PurgeQueue => "pgmq.purge_queue",
            Procedure::Metrics => "pgmq.metrics",
            Procedure::MetricsAll => "pgmq.metrics_all",
            Procedure::Create => "pgmq.create",
            Procedure::CreateUnlogged => "pgmq.create_unlogged",
            Procedure::CreatePartitioned => "pgmq.create_partitioned",
            Procedure::DropQueue => "pgmq.drop_queue",
            Procedure::DetachArchive => "pgmq.detach_archive",
            Procedure::ListQueues => "pgmq.list_queues",
        }
    }

    /// Parameterized SQL statement for this procedure.
    pub fn sql(&self) -> &'static str {
        match self {
            Procedure::Install => INSTALL,
            Procedure::Send => SEND,
            Procedure::SendBatch => SEND_BATCH,
            Procedure::Read => READ,
            Procedure::Pop => POP,
            Procedure::SetVt => SET_VT,
            Procedure::Archive => ARCHIVE,
            Procedure::ArchiveBatch => ARCHIVE_BATCH,
            Procedure::Delete => DELETE,
            Procedure::DeleteBatch => DELETE_BATCH,
            Procedure::PurgeQueue => PURGE_QUEUE,
            Procedure::Metrics => METRICS,
            Procedure::MetricsAll => METRICS_ALL,
            Procedure::Create => CREATE,
            Procedure::CreateUnlogged => CREATE_UNLOGGED,
            Procedure::CreatePartitioned => CREATE_PARTITIONED,
            Procedure::DropQueue => DROP_QUEUE,
            Procedure::DetachArchive => DETACH_ARCHIVE,
            Procedure::ListQueues => LIST_QUEUES,
        }
    }
}

/// One parameterized call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub procedure: Procedure,
    pub args: Vec<SqlValue>,
    /// Expected column types of each result row. Empty when the result is ignored.
    pub columns: &'static [ColumnType],
}

impl Call {
    pub fn new(procedure: Procedure, args: Vec<SqlValue>) -> Self {
        Self {
            procedure,
            args,
            columns: &[],
        }
    }

    /// Declare that rows decode into `T`.
    pub fn returning<T: DecodeRow>(mut self) -> Self {
        self.columns = T::COLUMNS;
        self
    }

    pub fn sql(&self) -> &'static str {
        self.procedure.sql()
    }

    /// The queue operand, when the procedure takes one.
    pub fn queue(&self) -> Option<&str> {
        match self.args.first() {
            Some(SqlValue::Text(queue)) => Some(queue),
            _ => None,
        }
    }
}

/// Lazily produced, ordered rows. Transport failures arrive as `Err` items.
pub type RowStream<'a> = BoxStream<'a, Result<Row>>;

/// Runs calls against a `pgmq` engine.
///
/// Implementations must be safe to share between concurrent operations.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `call` and stream its result rows.
    ///
    /// Zero rows is an empty stream, never an error.
    fn fetch<'a>(&'a self, call: &'a Call) -> RowStream<'a>;

    /// Run `call` for its side effect, discarding any rows.
    async fn execute(&self, call: &Call) -> Result<()> {
        let mut rows = self.fetch(call);
        while rows.try_next().await?.is_some() {}
        Ok(())
    }
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn fetch<'a>(&'a self, call: &'a Call) -> RowStream<'a> {
        (**self).fetch(call)
    }

    async fn execute(&self, call: &Call) -> Result<()> {
        (**self).execute(call).await
    }
}
