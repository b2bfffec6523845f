//! The queue operation surface.
//!
//! ## What
//!
//! [`PgmqClient`] exposes one async method per `pgmq` procedure. Each method builds a [`Call`], runs
//! it on the client's [`Executor`] and decodes the rows under one of four shapes:
//!
//! - **must exist**: `send`, `purge_queue` and `metrics` fail with
//!   [`Error::MissingIdentifier`] / [`Error::QueueNotFound`] on an empty result.
//! - **may be absent**: `read`, `pop` and `set_vt` return `None` on an empty result.
//! - **many**: batch operations, `metrics_all` and `list_queues` return a possibly empty `Vec`.
//! - **flag**: single `archive` and `delete` return `false` on an empty result.
//!
//! ## How
//!
//! ```no_run
//! # async fn example() -> pgmq_client::error::Result<()> {
//! use pgmq_client::json_value;
//!
//! let client = pgmq_client::connect("postgresql://localhost/mydb").await?;
//! client.create_queue("jobs").await?;
//! let id = client.send("jobs", &json_value!({"task": "email"}), 0).await?;
//! if let Some(msg) = client.read("jobs", 30).await? {
//!     assert_eq!(msg.msg_id, id);
//!     client.archive("jobs", msg.msg_id).await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Errors propagate unchanged and nothing is retried here.
use crate::error::{Error, Result};
use crate::executor::{Call, Executor, Procedure};
use crate::json::JsonValue;
use crate::row::{DecodeRow, SqlValue};
use crate::types::{LenientQueueMetrics, Message, QueueInfo, QueueMetrics};
use futures::future;
use futures::stream::TryStreamExt;

/// Client for the `pgmq` extension.
///
/// Holds only the executor handle, so cloning is as cheap as cloning `E`.
#[derive(Clone, Debug)]
pub struct PgmqClient<E> {
    executor: E,
}

impl<E: Executor> PgmqClient<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Install the `pgmq` extension if it is not installed yet.
    pub async fn install(&self) -> Result<()> {
        self.executor
            .execute(&Call::new(Procedure::Install, vec![]))
            .await?;
        tracing::debug!("Installed pgmq extension");
        Ok(())
    }

    /// Send one message, visible after `delay` seconds. Returns its id.
    ///
    /// # Errors
    /// [`Error::MissingIdentifier`] if the engine returns no id.
    pub async fn send(&self, queue: &str, message: &JsonValue, delay: i32) -> Result<i64> {
        let call = Call::new(
            Procedure::Send,
            vec![queue.into(), message.clone().into(), delay.into()],
        );
        let id = self
            .fetch_optional::<i64>(call)
            .await?
            .ok_or_else(|| Error::MissingIdentifier {
                queue: queue.to_string(),
            })?;
        tracing::debug!("Sent message {} to queue '{}'", id, queue);
        Ok(id)
    }

    /// Send several messages at once. Ids are returned in the order the engine reports them.
    pub async fn send_batch(
        &self,
        queue: &str,
        messages: &[JsonValue],
        delay: i32,
    ) -> Result<Vec<i64>> {
        let call = Call::new(
            Procedure::SendBatch,
            vec![queue.into(), messages.to_vec().into(), delay.into()],
        );
        let ids = self.fetch_all::<i64>(call).await?;
        tracing::debug!("Sent {} messages to queue '{}'", ids.len(), queue);
        Ok(ids)
    }

    /// Read the next visible message and hide it for `vt` seconds.
    ///
    /// `None` when no message is visible.
    pub async fn read(&self, queue: &str, vt: i32) -> Result<Option<Message>> {
        let call = Call::new(
            Procedure::Read,
            vec![queue.into(), vt.into(), SqlValue::Int(1)],
        );
        let message = self.fetch_optional::<Message>(call).await?;
        if let Some(msg) = &message {
            tracing::debug!("Read message {} from queue '{}'", msg.msg_id, queue);
        }
        Ok(message)
    }

    /// Read up to `qty` visible messages and hide them for `vt` seconds.
    pub async fn read_batch(&self, queue: &str, vt: i32, qty: i32) -> Result<Vec<Message>> {
        let call = Call::new(Procedure::Read, vec![queue.into(), vt.into(), qty.into()]);
        let messages = self.fetch_all::<Message>(call).await?;
        tracing::debug!("Read {} messages from queue '{}'", messages.len(), queue);
        Ok(messages)
    }

    /// Read and delete the next visible message.
    pub async fn pop(&self, queue: &str) -> Result<Option<Message>> {
        let call = Call::new(Procedure::Pop, vec![queue.into()]);
        let message = self.fetch_optional::<Message>(call).await?;
        if let Some(msg) = &message {
            tracing::debug!("Popped message {} from queue '{}'", msg.msg_id, queue);
        }
        Ok(message)
    }

    /// Make message `msg_id` visible again `vt` seconds from now.
    ///
    /// `None` when the message no longer exists.
    pub async fn set_vt(&self, queue: &str, msg_id: i64, vt: i32) -> Result<Option<Message>> {
        let call = Call::new(
            Procedure::SetVt,
            vec![queue.into(), msg_id.into(), vt.into()],
        );
        let message = self.fetch_optional::<Message>(call).await?;
        tracing::debug!(
            "Set vt of message {} in queue '{}' to {}s (found: {})",
            msg_id,
            queue,
            vt,
            message.is_some()
        );
        Ok(message)
    }

    /// Move a message to the queue's archive table. `false` if it was not in the queue.
    pub async fn archive(&self, queue: &str, msg_id: i64) -> Result<bool> {
        let call = Call::new(Procedure::Archive, vec![queue.into(), msg_id.into()]);
        let archived = self.fetch_optional::<bool>(call).await?.unwrap_or(false);
        tracing::debug!(
            "Archive message {} in queue '{}': {}",
            msg_id,
            queue,
            archived
        );
        Ok(archived)
    }

    /// Archive several messages. Returns the ids the engine actually archived.
    ///
    /// An id missing from the result may never have existed or may already be gone; the two
    /// cases are not told apart.
    pub async fn archive_batch(&self, queue: &str, msg_ids: &[i64]) -> Result<Vec<i64>> {
        let call = Call::new(
            Procedure::ArchiveBatch,
            vec![queue.into(), msg_ids.to_vec().into()],
        );
        let archived = self.fetch_all::<i64>(call).await?;
        tracing::debug!(
            "Archived {}/{} messages in queue '{}'",
            archived.len(),
            msg_ids.len(),
            queue
        );
        Ok(archived)
    }

    /// Delete a message. `false` if it was not in the queue.
    pub async fn delete(&self, queue: &str, msg_id: i64) -> Result<bool> {
        let call = Call::new(Procedure::Delete, vec![queue.into(), msg_id.into()]);
        let deleted = self.fetch_optional::<bool>(call).await?.unwrap_or(false);
        tracing::debug!(
            "Delete message {} in queue '{}': {}",
            msg_id,
            queue,
            deleted
        );
        Ok(deleted)
    }

    /// Delete several messages. Returns the ids the engine actually deleted.
    pub async fn delete_batch(&self, queue: &str, msg_ids: &[i64]) -> Result<Vec<i64>> {
        let call = Call::new(
            Procedure::DeleteBatch,
            vec![queue.into(), msg_ids.to_vec().into()],
        );
        let deleted = self.fetch_all::<i64>(call).await?;
        tracing::debug!(
            "Deleted {}/{} messages in queue '{}'",
            deleted.len(),
            msg_ids.len(),
            queue
        );
        Ok(deleted)
    }

    /// Delete every message in the queue. Returns how many were removed.
    ///
    /// # Errors
    /// [`Error::QueueNotFound`] if the engine returns no count.
    pub async fn purge_queue(&self, queue: &str) -> Result<i64> {
        let call = Call::new(Procedure::PurgeQueue, vec![queue.into()]);
        let purged = self
            .fetch_optional::<i64>(call)
            .await?
            .ok_or_else(|| Error::QueueNotFound {
                name: queue.to_string(),
            })?;
        tracing::debug!("Purged {} messages from queue '{}'", purged, queue);
        Ok(purged)
    }

    /// Statistics for one queue.
    ///
    /// # Errors
    /// [`Error::QueueNotFound`] if the engine returns no row.
    pub async fn metrics(&self, queue: &str) -> Result<QueueMetrics> {
        let call = Call::new(Procedure::Metrics, vec![queue.into()]);
        self.fetch_optional::<QueueMetrics>(call)
            .await?
            .ok_or_else(|| Error::QueueNotFound {
                name: queue.to_string(),
            })
    }

    /// Statistics for every queue.
    ///
    /// Counts that cannot be read default to zero, ages to `None`, and an unreadable scrape time to
    /// the current time, so one bad row does not fail the listing.
    pub async fn metrics_all(&self) -> Result<Vec<QueueMetrics>> {
        let call = Call::new(Procedure::MetricsAll, vec![]);
        let metrics = self.fetch_all::<LenientQueueMetrics>(call).await?;
        Ok(metrics.into_iter().map(|m| m.0).collect())
    }

    /// Every queue known to the extension.
    pub async fn list_queues(&self) -> Result<Vec<QueueInfo>> {
        self.fetch_all::<QueueInfo>(Call::new(Procedure::ListQueues, vec![]))
            .await
    }

    pub async fn create_queue(&self, queue: &str) -> Result<()> {
        self.run(Procedure::Create, vec![queue.into()]).await?;
        tracing::debug!("Created queue '{}'", queue);
        Ok(())
    }

    /// Create a queue backed by an unlogged table: faster, not crash safe.
    pub async fn create_unlogged_queue(&self, queue: &str) -> Result<()> {
        self.run(Procedure::CreateUnlogged, vec![queue.into()])
            .await?;
        tracing::debug!("Created unlogged queue '{}'", queue);
        Ok(())
    }

    /// Create a queue partitioned by message id or time.
    ///
    /// Intervals are passed through as text, e.g. `"10000"` ids or `"1 day"`. Requires `pg_partman`.
    pub async fn create_partitioned_queue(
        &self,
        queue: &str,
        partition_interval: &str,
        retention_interval: &str,
    ) -> Result<()> {
        self.run(
            Procedure::CreatePartitioned,
            vec![
                queue.into(),
                partition_interval.into(),
                retention_interval.into(),
            ],
        )
        .await?;
        tracing::debug!(
            "Created partitioned queue '{}' (partition={}, retention={})",
            queue,
            partition_interval,
            retention_interval
        );
        Ok(())
    }

    /// Drop a queue with its archive. The engine's success flag is not inspected.
    pub async fn drop_queue(&self, queue: &str) -> Result<()> {
        self.run(Procedure::DropQueue, vec![queue.into()]).await?;
        tracing::debug!("Dropped queue '{}'", queue);
        Ok(())
    }

    /// Detach the archive table from the extension so `drop_queue` leaves it in place.
    pub async fn detach_archive(&self, queue: &str) -> Result<()> {
        self.run(Procedure::DetachArchive, vec![queue.into()])
            .await?;
        tracing::debug!("Detached archive of queue '{}'", queue);
        Ok(())
    }

    async fn run(&self, procedure: Procedure, args: Vec<SqlValue>) -> Result<()> {
        self.executor.execute(&Call::new(procedure, args)).await
    }

    /// First row, if any. Remaining rows are not pulled.
    async fn fetch_optional<T: DecodeRow>(&self, call: Call) -> Result<Option<T>> {
        let call = call.returning::<T>();
        let mut rows = self.executor.fetch(&call);
        match rows.try_next().await? {
            Some(row) => T::decode_row(row).map(Some),
            None => Ok(None),
        }
    }

    async fn fetch_all<T: DecodeRow>(&self, call: Call) -> Result<Vec<T>> {
        let call = call.returning::<T>();
        self.executor
            .fetch(&call)
            .and_then(|row| future::ready(T::decode_row(row)))
            .try_collect()
            .await
    }
}
