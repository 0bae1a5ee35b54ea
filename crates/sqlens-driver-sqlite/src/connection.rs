//! SQLite connection implementation

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection as RusqliteConnection, ErrorCode, InterruptHandle, params_from_iter};
use sqlens_core::{
    ColumnMeta, Connection, PlanTree, QueryCancelHandle, QueryResult, Result, Row,
    SchemaIntrospection, SqlensError, StatementResult, TableStats, Value,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::explain::{ExplainRow, build_plan_tree};

/// Cancel handle for SQLite queries.
///
/// This wraps the rusqlite `InterruptHandle` and can be called from any thread
/// to interrupt a running query. The interrupted query fails with
/// [`SqlensError::Cancelled`].
pub struct SqliteCancelHandle {
    interrupt_handle: Arc<InterruptHandle>,
}

impl QueryCancelHandle for SqliteCancelHandle {
    fn cancel(&self) {
        tracing::debug!("interrupting SQLite query");
        self.interrupt_handle.interrupt();
    }
}

/// SQLite connection wrapper
///
/// Statements run on tokio's blocking pool under one mutex, so executions on
/// a connection are serialized and never stall the async workers. Dropping a
/// pending future does not stop its statement; use the cancel handle for that.
pub struct SqliteConnection {
    conn: Arc<Mutex<RusqliteConnection>>,
    interrupt_handle: Arc<InterruptHandle>,
    closed: AtomicBool,
}

impl SqliteConnection {
    /// Open a SQLite database file
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path = %path, "opening SQLite database");
        if path == ":memory:" {
            return Self::open_in_memory();
        }

        let expanded_path = Self::expand_path(path)?;
        if let Some(parent) = expanded_path.parent()
            && !parent.exists()
        {
            return Err(SqlensError::Connection(format!(
                "Parent directory does not exist: {}",
                parent.display()
            )));
        }

        let conn = RusqliteConnection::open(&expanded_path).map_err(|e| {
            SqlensError::Connection(format!(
                "Failed to open SQLite database at '{}': {}",
                expanded_path.display(),
                e
            ))
        })?;
        Ok(Self::from_rusqlite(conn))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = RusqliteConnection::open_in_memory().map_err(|e| {
            SqlensError::Connection(format!("Failed to open in-memory database: {}", e))
        })?;
        Ok(Self::from_rusqlite(conn))
    }

    /// Wrap an already opened rusqlite connection
    pub fn from_rusqlite(conn: RusqliteConnection) -> Self {
        // Taken before the connection moves into the mutex so it stays usable
        // while a query holds the lock.
        let interrupt_handle = Arc::new(conn.get_interrupt_handle());
        Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt_handle,
            closed: AtomicBool::new(false),
        }
    }

    /// Expand `~/` and make relative paths absolute
    pub(crate) fn expand_path(path: &str) -> Result<PathBuf> {
        let expanded = if let Some(rest) = path.strip_prefix("~/") {
            let home = dirs::home_dir().ok_or_else(|| {
                SqlensError::Configuration("Unable to determine HOME directory".into())
            })?;
            home.join(rest)
        } else if path.starts_with('~') {
            return Err(SqlensError::Configuration(
                "User-specific home directories (~user) are not supported".into(),
            ));
        } else {
            PathBuf::from(path)
        };

        if expanded.is_relative() {
            Ok(std::env::current_dir()?.join(expanded))
        } else {
            Ok(expanded)
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SqlensError::Connection("connection is closed".into()));
        }
        Ok(())
    }

    /// Run `task` against the locked connection on the blocking pool
    async fn run_blocking<T, F>(&self, task: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&RusqliteConnection) -> Result<T> + Send + 'static,
    {
        self.ensure_open()?;
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            task(&guard)
        })
            .await
            .map_err(|e| SqlensError::Other(format!("SQLite task failed: {}", e)))?
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let sql = sql.to_string();
        let rusqlite_params = values_to_rusqlite(params);

        let rows_affected = self
            .run_blocking(move |conn| {
                conn.execute(&sql, params_from_iter(rusqlite_params.iter()))
                    .map_err(|e| query_error("Failed to execute statement", e))
            })
            .await?;

        tracing::debug!(affected_rows = rows_affected, "statement executed");
        Ok(StatementResult {
            affected_rows: rows_affected as u64,
        })
    }

    async fn execute_batch(&self, sql: &str) -> Result<()> {
        tracing::debug!("executing SQL batch");
        let sql = sql.to_string();
        self.run_blocking(move |conn| {
            conn.execute_batch(&sql)
                .map_err(|e| query_error("Failed to execute batch", e))
        })
        .await
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let sql = sql.to_string();
        let rusqlite_params = values_to_rusqlite(params);

        let result = self
            .run_blocking(move |conn| run_query(conn, &sql, &rusqlite_params))
            .await?;

        tracing::debug!(
            row_count = result.rows.len(),
            execution_time_ms = result.execution_time.as_millis() as u64,
            "query executed successfully"
        );
        Ok(result)
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn explain(&self, sql: &str) -> Result<PlanTree> {
        let explain_sql = format!("EXPLAIN QUERY PLAN {}", sql.trim().trim_end_matches(';'));

        let rows = self
            .run_blocking(move |conn| {
                let mut stmt = conn
                    .prepare(&explain_sql)
                    .map_err(|e| query_error("Failed to prepare EXPLAIN QUERY PLAN", e))?;
                stmt.query_map([], |row| {
                    Ok(ExplainRow {
                        id: row.get(0)?,
                        parent: row.get(1)?,
                        detail: row.get(3)?,
                    })
                })
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(|e| query_error("Failed to read EXPLAIN QUERY PLAN", e))
            })
            .await?;

        tracing::debug!(rows = rows.len(), "plan retrieved");
        Ok(build_plan_tree(&rows))
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("closing SQLite connection");
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        Some(Arc::new(SqliteCancelHandle {
            interrupt_handle: self.interrupt_handle.clone(),
        }))
    }

    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        Some(self)
    }
}

#[async_trait]
impl SchemaIntrospection for SqliteConnection {
    #[tracing::instrument(skip(self))]
    async fn table_stats(&self) -> Result<Vec<TableStats>> {
        self.run_blocking(read_table_stats).await
    }
}

fn run_query(
    conn: &RusqliteConnection,
    sql: &str,
    params: &[rusqlite::types::Value],
) -> Result<QueryResult> {
    let start_time = std::time::Instant::now();

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| query_error("Failed to prepare query", e))?;

    let mut column_names = Vec::with_capacity(stmt.column_count());
    let mut columns = Vec::with_capacity(stmt.column_count());
    for (idx, col) in stmt.columns().iter().enumerate() {
        let name = col.name().to_string();
        column_names.push(name.clone());
        columns.push(ColumnMeta {
            name,
            data_type: col.decl_type().unwrap_or("DYNAMIC").to_string(),
            ordinal: idx,
        });
    }

    let mut rows = Vec::new();
    let mut query_rows = stmt
        .query(params_from_iter(params.iter()))
        .map_err(|e| query_error("Failed to execute query", e))?;

    while let Some(row) = query_rows
        .next()
        .map_err(|e| query_error("Failed to fetch row", e))?
    {
        let mut values = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            values.push(rusqlite_to_value(row, i)?);
        }
        rows.push(Row::new(column_names.clone(), values));
    }

    Ok(QueryResult {
        columns,
        rows,
        execution_time: start_time.elapsed(),
    })
}

fn read_table_stats(conn: &RusqliteConnection) -> Result<Vec<TableStats>> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .map_err(|e| query_error("Failed to list tables", e))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(|e| query_error("Failed to list tables", e))?;

    let mut stats = Vec::with_capacity(names.len());
    for name in names {
        let mut stmt = conn
            .prepare("SELECT name, type FROM pragma_table_info(?1)")
            .map_err(|e| query_error("Failed to read columns", e))?;
        let columns = stmt
            .query_map([&name], |row| Ok((row.get(0)?, row.get(1)?)))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<(String, String)>>>())
            .map_err(|e| query_error("Failed to read columns", e))?;

        let row_count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM \"{}\"", name.replace('"', "\"\"")),
                [],
                |row| row.get(0),
            )
            .map_err(|e| query_error("Failed to count rows", e))?;

        stats.push(TableStats {
            name,
            columns,
            row_count: row_count.max(0) as u64,
        });
    }
    Ok(stats)
}

fn query_error(context: &str, error: rusqlite::Error) -> SqlensError {
    if error.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) {
        return SqlensError::Cancelled;
    }
    SqlensError::Query(format!("{}: {}", context, error))
}

/// Convert our Value types to rusqlite-compatible types
fn values_to_rusqlite(values: &[Value]) -> Vec<rusqlite::types::Value> {
    values.iter().map(value_to_rusqlite).collect()
}

fn value_to_rusqlite(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(i64::from(*b)),
        Value::Int64(i) => rusqlite::types::Value::Integer(*i),
        Value::Float64(f) => rusqlite::types::Value::Real(*f),
        Value::String(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Bytes(b) => rusqlite::types::Value::Blob(b.clone()),
    }
}

/// Convert rusqlite row value to our Value type
fn rusqlite_to_value(row: &rusqlite::Row, idx: usize) -> Result<Value> {
    use rusqlite::types::ValueRef;

    let value_ref = row
        .get_ref(idx)
        .map_err(|e| SqlensError::Query(e.to_string()))?;

    Ok(match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    })
}
