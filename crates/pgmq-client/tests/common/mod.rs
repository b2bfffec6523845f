//! Test executors: an in-memory pgmq engine and a scripted executor with canned responses.
#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use pgmq_client::error::{Error, Result};
use pgmq_client::executor::{Call, Executor, Procedure, RowStream};
use pgmq_client::row::{Row, SqlValue};
use pgmq_client::{JsonValue, PgmqClient};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// An error as the database would raise it, e.g. for a queue table that does not exist.
pub fn engine_error(message: impl Into<String>) -> Error {
    #[cfg(feature = "postgres")]
    {
        Error::Database(sqlx::Error::Protocol(message.into()))
    }
    #[cfg(not(feature = "postgres"))]
    {
        Error::ConnectionFailed {
            source: message.into().into(),
            context: "engine".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredMessage {
    msg_id: i64,
    read_ct: i64,
    enqueued_at: DateTime<Utc>,
    vt: DateTime<Utc>,
    message: JsonValue,
}

impl StoredMessage {
    fn row(&self) -> Row {
        Row::new(vec![
            SqlValue::BigInt(self.msg_id),
            SqlValue::BigInt(self.read_ct),
            SqlValue::Timestamp(self.enqueued_at),
            SqlValue::Timestamp(self.vt),
            SqlValue::Json(self.message.clone()),
        ])
    }
}

#[derive(Debug)]
struct QueueState {
    messages: BTreeMap<i64, StoredMessage>,
    archive: BTreeMap<i64, StoredMessage>,
    next_id: i64,
    total_messages: i64,
    created_at: DateTime<Utc>,
    is_unlogged: bool,
    is_partitioned: bool,
    archive_detached: bool,
}

impl QueueState {
    fn new(is_unlogged: bool, is_partitioned: bool) -> Self {
        Self {
            messages: BTreeMap::new(),
            archive: BTreeMap::new(),
            next_id: 1,
            total_messages: 0,
            created_at: Utc::now(),
            is_unlogged,
            is_partitioned,
            archive_detached: false,
        }
    }

    fn enqueue(&mut self, message: JsonValue, delay: i64) -> i64 {
        let now = Utc::now();
        let msg_id = self.next_id;
        self.next_id += 1;
        self.total_messages += 1;
        self.messages.insert(
            msg_id,
            StoredMessage {
                msg_id,
                read_ct: 0,
                enqueued_at: now,
                vt: now + Duration::seconds(delay),
                message,
            },
        );
        msg_id
    }

    fn visible_ids(&self, limit: usize) -> Vec<i64> {
        let now = Utc::now();
        self.messages
            .values()
            .filter(|m| m.vt <= now)
            .take(limit)
            .map(|m| m.msg_id)
            .collect()
    }

    fn archive(&mut self, msg_id: i64) -> bool {
        match self.messages.remove(&msg_id) {
            Some(msg) => {
                self.archive.insert(msg_id, msg);
                true
            }
            None => false,
        }
    }
}

/// A minimal pgmq engine kept in memory.
///
/// Rows come back in the shapes the SQL in `executor.rs` selects: message rows with a `BIGINT`
/// read count, `metrics_all` rows as text. Calls on a queue that does not exist fail like the
/// database does, except `pgmq.metrics`, which returns no row.
#[derive(Default)]
pub struct InMemoryPgmq {
    queues: Mutex<BTreeMap<String, QueueState>>,
    calls: Mutex<Vec<Call>>,
}

impl InMemoryPgmq {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn archived_ids(&self, queue: &str) -> Vec<i64> {
        self.queues
            .lock()
            .unwrap()
            .get(queue)
            .map(|q| q.archive.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn archive_detached(&self, queue: &str) -> bool {
        self.queues
            .lock()
            .unwrap()
            .get(queue)
            .map(|q| q.archive_detached)
            .unwrap_or(false)
    }

    /// Push a message's visibility deadline into the past.
    pub fn expire_vt(&self, queue: &str, msg_id: i64) {
        if let Some(msg) = self
            .queues
            .lock()
            .unwrap()
            .get_mut(queue)
            .and_then(|q| q.messages.get_mut(&msg_id))
        {
            msg.vt = Utc::now() - Duration::seconds(1);
        }
    }

    fn run(&self, call: &Call) -> Result<Vec<Row>> {
        self.calls.lock().unwrap().push(call.clone());
        let mut queues = self.queues.lock().unwrap();
        let args = &call.args;

        match call.procedure {
            Procedure::Install => Ok(vec![]),
            Procedure::Create | Procedure::CreateUnlogged | Procedure::CreatePartitioned => {
                let name = text(args, 0);
                queues.entry(name).or_insert_with(|| {
                    QueueState::new(
                        call.procedure == Procedure::CreateUnlogged,
                        call.procedure == Procedure::CreatePartitioned,
                    )
                });
                Ok(vec![Row::new(vec![SqlValue::Null])])
            }
            Procedure::DropQueue => {
                let existed = queues.remove(&text(args, 0)).is_some();
                Ok(vec![Row::new(vec![SqlValue::Bool(existed)])])
            }
            Procedure::ListQueues => Ok(queues
                .iter()
                .map(|(name, q)| {
                    Row::new(vec![
                        SqlValue::Text(name.clone()),
                        SqlValue::Timestamp(q.created_at),
                        SqlValue::Bool(q.is_partitioned),
                        SqlValue::Bool(q.is_unlogged),
                    ])
                })
                .collect()),
            Procedure::MetricsAll => {
                let now = Utc::now();
                Ok(queues
                    .iter()
                    .map(|(name, q)| {
                        let (newest, oldest) = ages(q, now);
                        let opt = |v: Option<i64>| {
                            v.map(|v| SqlValue::Text(v.to_string()))
                                .unwrap_or(SqlValue::Null)
                        };
                        Row::new(vec![
                            SqlValue::Text(name.clone()),
                            SqlValue::Text(q.messages.len().to_string()),
                            opt(newest),
                            opt(oldest),
                            SqlValue::Text(q.total_messages.to_string()),
                            SqlValue::Text(now.format("%Y-%m-%d %H:%M:%S%.6f+00").to_string()),
                        ])
                    })
                    .collect())
            }
            Procedure::Metrics => {
                let name = text(args, 0);
                let Some(q) = queues.get(&name) else {
                    return Ok(vec![]);
                };
                let now = Utc::now();
                let (newest, oldest) = ages(q, now);
                Ok(vec![Row::new(vec![
                    SqlValue::Text(name),
                    SqlValue::BigInt(q.messages.len() as i64),
                    newest.map(SqlValue::BigInt).unwrap_or(SqlValue::Null),
                    oldest.map(SqlValue::BigInt).unwrap_or(SqlValue::Null),
                    SqlValue::BigInt(q.total_messages),
                    SqlValue::Timestamp(now),
                ])])
            }
            _ => {
                let name = text(args, 0);
                let q = queues
                    .get_mut(&name)
                    .ok_or_else(|| engine_error(format!("relation \"pgmq.q_{}\" does not exist", name)))?;
                Ok(run_on_queue(q, call))
            }
        }
    }
}

fn run_on_queue(q: &mut QueueState, call: &Call) -> Vec<Row> {
    let args = &call.args;
    let now = Utc::now();
    match call.procedure {
        Procedure::Send => {
            let id = q.enqueue(json(args, 1), int(args, 2));
            vec![Row::new(vec![SqlValue::BigInt(id)])]
        }
        Procedure::SendBatch => {
            let SqlValue::JsonArray(messages) = &args[1] else {
                panic!("send_batch expects JSONB[]");
            };
            let delay = int(args, 2);
            messages
                .iter()
                .map(|m| Row::new(vec![SqlValue::BigInt(q.enqueue(m.clone(), delay))]))
                .collect()
        }
        Procedure::Read => {
            let vt = int(args, 1);
            let qty = int(args, 2).max(0) as usize;
            let mut rows = Vec::new();
            for id in q.visible_ids(qty) {
                if let Some(msg) = q.messages.get_mut(&id) {
                    msg.read_ct += 1;
                    msg.vt = now + Duration::seconds(vt);
                    rows.push(msg.row());
                }
            }
            rows
        }
        Procedure::Pop => q
            .visible_ids(1)
            .into_iter()
            .filter_map(|id| q.messages.remove(&id))
            .map(|msg| msg.row())
            .collect(),
        Procedure::SetVt => {
            let (msg_id, vt) = (int(args, 1), int(args, 2));
            q.messages
                .get_mut(&msg_id)
                .map(|msg| {
                    msg.vt = now + Duration::seconds(vt);
                    vec![msg.row()]
                })
                .unwrap_or_default()
        }
        Procedure::Archive => {
            let archived = q.archive(int(args, 1));
            vec![Row::new(vec![SqlValue::Bool(archived)])]
        }
        Procedure::ArchiveBatch => ids(args, 1)
            .into_iter()
            .filter(|&id| q.archive(id))
            .map(|id| Row::new(vec![SqlValue::BigInt(id)]))
            .collect(),
        Procedure::Delete => {
            let deleted = q.messages.remove(&int(args, 1)).is_some();
            vec![Row::new(vec![SqlValue::Bool(deleted)])]
        }
        Procedure::DeleteBatch => ids(args, 1)
            .into_iter()
            .filter(|id| q.messages.remove(id).is_some())
            .map(|id| Row::new(vec![SqlValue::BigInt(id)]))
            .collect(),
        Procedure::PurgeQueue => {
            let purged = q.messages.len() as i64;
            q.messages.clear();
            vec![Row::new(vec![SqlValue::BigInt(purged)])]
        }
        Procedure::DetachArchive => {
            q.archive_detached = true;
            vec![Row::new(vec![SqlValue::Null])]
        }
        other => panic!("{:?} is not a per-queue procedure", other),
    }
}

fn ages(q: &QueueState, now: DateTime<Utc>) -> (Option<i64>, Option<i64>) {
    let age = |m: &StoredMessage| (now - m.enqueued_at).num_seconds();
    (
        q.messages.values().next_back().map(age),
        q.messages.values().next().map(age),
    )
}

fn text(args: &[SqlValue], index: usize) -> String {
    match &args[index] {
        SqlValue::Text(v) => v.clone(),
        other => panic!("argument {} should be TEXT, got {:?}", index, other),
    }
}

fn int(args: &[SqlValue], index: usize) -> i64 {
    match &args[index] {
        SqlValue::Int(v) => i64::from(*v),
        SqlValue::BigInt(v) => *v,
        other => panic!("argument {} should be an integer, got {:?}", index, other),
    }
}

fn json(args: &[SqlValue], index: usize) -> JsonValue {
    match &args[index] {
        SqlValue::Json(v) => v.clone(),
        other => panic!("argument {} should be JSONB, got {:?}", index, other),
    }
}

fn ids(args: &[SqlValue], index: usize) -> Vec<i64> {
    match &args[index] {
        SqlValue::BigIntArray(v) => v.clone(),
        other => panic!("argument {} should be BIGINT[], got {:?}", index, other),
    }
}

impl Executor for InMemoryPgmq {
    fn fetch<'a>(&'a self, call: &'a Call) -> RowStream<'a> {
        match self.run(call) {
            Ok(rows) => stream::iter(rows.into_iter().map(Ok)).boxed(),
            Err(e) => stream::once(async move { Err(e) }).boxed(),
        }
    }
}

/// A client over a fresh in-memory engine, sharing the engine for inspection.
pub fn in_memory_client() -> (PgmqClient<Arc<InMemoryPgmq>>, Arc<InMemoryPgmq>) {
    let engine = Arc::new(InMemoryPgmq::new());
    (PgmqClient::new(engine.clone()), engine)
}

/// Replays canned responses, one per call, and counts the rows the client pulls.
#[derive(Default)]
pub struct ScriptedExecutor {
    responses: Mutex<VecDeque<Result<Vec<Row>>>>,
    calls: Mutex<Vec<Call>>,
    rows_pulled: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue rows for the next call.
    pub fn respond(self, rows: Vec<Vec<SqlValue>>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(rows.into_iter().map(Row::new).collect()));
        self
    }

    /// Fail the next call.
    pub fn fail(self, error: Error) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn rows_pulled(&self) -> usize {
        self.rows_pulled.load(Ordering::SeqCst)
    }
}

impl Executor for ScriptedExecutor {
    fn fetch<'a>(&'a self, call: &'a Call) -> RowStream<'a> {
        self.calls.lock().unwrap().push(call.clone());
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response for {}", call.procedure.name()));
        match response {
            Ok(rows) => stream::iter(rows)
                .map(move |row| {
                    self.rows_pulled.fetch_add(1, Ordering::SeqCst);
                    Ok(row)
                })
                .boxed(),
            Err(e) => stream::once(async move { Err(e) }).boxed(),
        }
    }
}
