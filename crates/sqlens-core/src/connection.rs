//! Connection trait consumed by benchmarking and plan retrieval

use crate::{PlanTree, QueryResult, Result, SqlensError, StatementResult, TableStats, Value};
use async_trait::async_trait;
use std::sync::Arc;

/// Handle for cancelling a running query from any thread.
///
/// The handle is safe to call from any thread and can be called multiple
/// times (subsequent calls are no-ops).
pub trait QueryCancelHandle: Send + Sync {
    /// Cancel the currently running query on the associated connection.
    fn cancel(&self);
}

/// A database connection
///
/// SQLens never manages production connections itself; it only needs to
/// execute read queries against a reference dataset and to retrieve
/// execution plans.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite")
    fn driver_name(&self) -> &str;

    /// Execute a statement that does not return rows
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute several statements separated by semicolons
    async fn execute_batch(&self, sql: &str) -> Result<()> {
        let _ = sql;
        Err(SqlensError::NotSupported(format!(
            "batch execution is not supported by the {} driver",
            self.driver_name()
        )))
    }

    /// Execute a query that returns rows
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Retrieve the execution plan for a query without running it
    async fn explain(&self, sql: &str) -> Result<PlanTree> {
        let _ = sql;
        Err(SqlensError::NotSupported(format!(
            "plan retrieval is not supported by the {} driver",
            self.driver_name()
        )))
    }

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;

    /// Returns a handle that can interrupt the running query, if the driver supports it
    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        None
    }

    /// Get schema introspection capabilities if supported
    fn as_schema_introspection(&self) -> Option<&dyn SchemaIntrospection> {
        None
    }
}

/// Schema introspection used to fill the analyzer's catalog
#[async_trait]
pub trait SchemaIntrospection: Send + Sync {
    /// Row counts and declared column types of every user table
    async fn table_stats(&self) -> Result<Vec<TableStats>>;
}

/// Hands out disposable snapshots of reference datasets
///
/// Benchmarks apply index DDL to the snapshot they are given, so every call
/// must return a connection whose changes never reach the source data.
#[async_trait]
pub trait DatasetProvider: Send + Sync {
    /// Open a fresh snapshot of `dataset`
    async fn open(&self, dataset: &str) -> Result<Arc<dyn Connection>>;
}
