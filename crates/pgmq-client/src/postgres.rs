//! [`Executor`] backed by a sqlx PostgreSQL pool.
//!
//! Operands are bound in order with their natural PostgreSQL types and every result column is read
//! as the [`ColumnType`] the call declares. Column decode failures reported by sqlx become
//! [`Error::Decode`]; everything else from the driver is [`Error::Database`].
use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::{Call, Executor, RowStream};
use crate::json::JsonValue;
use crate::row::{ColumnType, Row, SqlValue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row as _};
use std::time::Duration;

/// Runs `pgmq` procedures on a [`PgPool`].
#[derive(Clone, Debug)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool sized and timed per `config`.
    ///
    /// # Errors
    /// [`Error::ConnectionFailed`] if no connection can be established.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .connect(&config.dsn)
            .await
            .map_err(|e| Error::ConnectionFailed {
                source: Box::new(e),
                context: "Failed to open connection pool".to_string(),
            })?;

        tracing::debug!(
            "Connected to PostgreSQL (max_connections={})",
            config.max_connections
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Executor for PgExecutor {
    fn fetch<'a>(&'a self, call: &'a Call) -> RowStream<'a> {
        let columns = call.columns;
        bind_all(sqlx::query(call.sql()), &call.args)
            .fetch(&self.pool)
            .map(move |row| {
                row.map_err(map_sqlx_error)
                    .and_then(|row| decode_pg_row(&row, columns))
            })
            .boxed()
    }

    async fn execute(&self, call: &Call) -> Result<()> {
        bind_all(sqlx::query(call.sql()), &call.args)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    args: &[SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for arg in args {
        query = match arg.clone() {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Int(v) => query.bind(v),
            SqlValue::BigInt(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
            SqlValue::Timestamp(v) => query.bind(v),
            SqlValue::Json(v) => query.bind(v),
            SqlValue::BigIntArray(v) => query.bind(v),
            SqlValue::JsonArray(v) => query.bind(v),
        };
    }
    query
}

fn decode_pg_row(row: &PgRow, columns: &[ColumnType]) -> Result<Row> {
    let mut values = Vec::with_capacity(columns.len());
    for (index, column) in columns.iter().enumerate() {
        let value = match column {
            ColumnType::Bool => try_column::<bool>(row, index)?.map(SqlValue::Bool),
            ColumnType::BigInt => try_column::<i64>(row, index)?.map(SqlValue::BigInt),
            ColumnType::Text => try_column::<String>(row, index)?.map(SqlValue::Text),
            ColumnType::Timestamp => {
                try_column::<DateTime<Utc>>(row, index)?.map(SqlValue::Timestamp)
            }
            ColumnType::Json => try_column::<JsonValue>(row, index)?.map(SqlValue::Json),
        };
        values.push(value.unwrap_or_default());
    }
    Ok(Row::new(values))
}

fn try_column<T>(row: &PgRow, index: usize) -> Result<Option<T>>
where
    T: for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index).map_err(map_sqlx_error)
}

fn map_sqlx_error(err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::ColumnDecode { index, source } => {
            let column = index.trim_matches('"').parse().ok();
            // Keep the codec's own message rather than its Display wrapper.
            let message = match source.downcast::<Error>() {
                Ok(inner) => match *inner {
                    Error::Decode { message, .. } => message,
                    other => other.to_string(),
                },
                Err(source) => source.to_string(),
            };
            Error::Decode { column, message }
        }
        sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
            Error::column(index, format!("row has only {} columns", len))
        }
        sqlx::Error::ColumnNotFound(name) => Error::Decode {
            column: None,
            message: format!("column '{}' not found", name),
        },
        other => Error::Database(other),
    }
}
