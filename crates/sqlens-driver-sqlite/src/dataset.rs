//! Reference datasets
//!
//! A dataset string selects where benchmark snapshots come from:
//!
//! - `synthetic[:rows]` - deterministic generated tables (default 10 000 rows)
//! - `sqlite:<path>` - an in-memory copy of an existing database file
//! - `script:<path>` - a SQL script executed against an empty database
//!
//! Every open returns a private in-memory database, so DDL applied during a
//! benchmark never reaches the source file.

use async_trait::async_trait;
use rusqlite::backup::Progress;
use rusqlite::{Connection as RusqliteConnection, DatabaseName};
use sqlens_core::{Connection, DatasetProvider, Result, SqlensError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::SqliteConnection;

pub const DEFAULT_SYNTHETIC_ROWS: u64 = 10_000;

const MAX_SYNTHETIC_ROWS: u64 = 1_000_000;

/// Tables created by the synthetic generator
pub const SYNTHETIC_TABLES: &[&str] = &[
    "users",
    "products",
    "orders",
    "payments",
    "customers_2024",
    "customers_archive",
];

/// A parsed dataset string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSpec {
    Synthetic { rows: u64 },
    SqliteFile(PathBuf),
    Script(PathBuf),
}

impl FromStr for DatasetSpec {
    type Err = SqlensError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "synthetic" {
            return Ok(Self::Synthetic {
                rows: DEFAULT_SYNTHETIC_ROWS,
            });
        }
        if let Some(rows) = s.strip_prefix("synthetic:") {
            let rows: u64 = rows.trim().parse().map_err(|_| {
                SqlensError::Configuration(format!("invalid synthetic row count '{}'", rows))
            })?;
            if rows == 0 || rows > MAX_SYNTHETIC_ROWS {
                return Err(SqlensError::Configuration(format!(
                    "synthetic row count must be between 1 and {}, got {}",
                    MAX_SYNTHETIC_ROWS, rows
                )));
            }
            return Ok(Self::Synthetic { rows });
        }
        if let Some(path) = s.strip_prefix("sqlite:").filter(|p| !p.is_empty()) {
            return Ok(Self::SqliteFile(SqliteConnection::expand_path(path)?));
        }
        if let Some(path) = s.strip_prefix("script:").filter(|p| !p.is_empty()) {
            return Ok(Self::Script(SqliteConnection::expand_path(path)?));
        }
        Err(SqlensError::Configuration(format!(
            "unknown dataset '{}': expected synthetic[:rows], sqlite:<path> or script:<path>",
            s
        )))
    }
}

impl fmt::Display for DatasetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synthetic { rows } => write!(f, "synthetic:{}", rows),
            Self::SqliteFile(path) => write!(f, "sqlite:{}", path.display()),
            Self::Script(path) => write!(f, "script:{}", path.display()),
        }
    }
}

/// Opens SQLite snapshots of reference datasets
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDatasetProvider;

impl SqliteDatasetProvider {
    pub fn new() -> Self {
        Self
    }

    /// Open a snapshot and keep the concrete connection type
    #[tracing::instrument(skip(self), fields(dataset = %spec))]
    pub async fn open_spec(&self, spec: &DatasetSpec) -> Result<SqliteConnection> {
        let connection = match spec {
            DatasetSpec::Synthetic { rows } => {
                let connection = SqliteConnection::open_in_memory()?;
                connection.execute_batch(&synthetic_script(*rows)).await?;
                connection
            }
            DatasetSpec::SqliteFile(path) => snapshot_file(path)?,
            DatasetSpec::Script(path) => {
                let script = tokio::fs::read_to_string(path).await.map_err(|e| {
                    SqlensError::Dataset(format!(
                        "failed to read script '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                let connection = SqliteConnection::open_in_memory()?;
                connection.execute_batch(&script).await.map_err(|e| {
                    SqlensError::Dataset(format!(
                        "script '{}' failed: {}",
                        path.display(),
                        e
                    ))
                })?;
                connection
            }
        };
        tracing::info!("dataset snapshot ready");
        Ok(connection)
    }
}

#[async_trait]
impl DatasetProvider for SqliteDatasetProvider {
    async fn open(&self, dataset: &str) -> Result<Arc<dyn Connection>> {
        let spec: DatasetSpec = dataset.parse()?;
        Ok(Arc::new(self.open_spec(&spec).await?))
    }
}

fn snapshot_file(path: &Path) -> Result<SqliteConnection> {
    if !path.is_file() {
        return Err(SqlensError::Dataset(format!(
            "database file '{}' does not exist",
            path.display()
        )));
    }

    let mut conn = RusqliteConnection::open_in_memory().map_err(|e| {
        SqlensError::Connection(format!("Failed to open in-memory database: {}", e))
    })?;
    conn.restore(DatabaseName::Main, path, None::<fn(Progress)>)
        .map_err(|e| {
            SqlensError::Dataset(format!(
                "failed to copy '{}' into memory: {}",
                path.display(),
                e
            ))
        })?;
    Ok(SqliteConnection::from_rusqlite(conn))
}

/// DDL and inserts for the synthetic dataset
///
/// `customers_archive` ids start at `rows / 2`, so half of each customer table
/// shares ids with the other one. Emails differ per table.
pub(crate) fn synthetic_script(rows: u64) -> String {
    let products = (rows / 10).max(1);
    let payments = (rows / 2).max(1);
    let archive_start = rows / 2;

    format!(
        "BEGIN;
CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    country TEXT NOT NULL,
    active INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE products (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    price REAL NOT NULL
);
CREATE TABLE orders (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    product_id INTEGER NOT NULL,
    status TEXT NOT NULL,
    total REAL NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE payments (
    id INTEGER PRIMARY KEY,
    order_id INTEGER NOT NULL,
    amount REAL NOT NULL,
    method TEXT NOT NULL,
    paid_at TEXT NOT NULL
);
CREATE TABLE customers_2024 (
    id INTEGER NOT NULL,
    email TEXT NOT NULL,
    region TEXT NOT NULL
);
CREATE TABLE customers_archive (
    id INTEGER NOT NULL,
    email TEXT NOT NULL,
    region TEXT NOT NULL
);

WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < {rows})
INSERT INTO users
SELECT n, 'user_' || n, 'user' || n || '@example.com',
       CASE n % 4 WHEN 0 THEN 'NL' WHEN 1 THEN 'US' WHEN 2 THEN 'DE' ELSE 'FR' END,
       n % 3 <> 0,
       date('2023-01-01', '+' || (n % 730) || ' days')
FROM seq;

WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < {products})
INSERT INTO products
SELECT n, 'product_' || n,
       CASE n % 3 WHEN 0 THEN 'books' WHEN 1 THEN 'games' ELSE 'tools' END,
       (n % 90) + 9.99
FROM seq;

WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < {rows})
INSERT INTO orders
SELECT n, (n * 7) % {rows} + 1, n % {products} + 1,
       CASE n % 4 WHEN 0 THEN 'paid' WHEN 1 THEN 'pending' WHEN 2 THEN 'shipped' ELSE 'cancelled' END,
       (n % 500) + 0.5,
       date('2023-01-01', '+' || (n % 730) || ' days')
FROM seq;

WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < {payments})
INSERT INTO payments
SELECT n, n * 2, (n % 250) * 1.5,
       CASE n % 2 WHEN 0 THEN 'card' ELSE 'transfer' END,
       date('2023-01-02', '+' || (n % 730) || ' days')
FROM seq;

WITH RECURSIVE seq(n) AS (SELECT 0 UNION ALL SELECT n + 1 FROM seq WHERE n < {last})
INSERT INTO customers_2024
SELECT n, 'customer' || n || '@2024.com',
       CASE n % 3 WHEN 0 THEN 'EU' WHEN 1 THEN 'US' ELSE 'APAC' END
FROM seq;

WITH RECURSIVE seq(n) AS (SELECT {archive_start} UNION ALL SELECT n + 1 FROM seq WHERE n < {archive_last})
INSERT INTO customers_archive
SELECT n, 'customer' || n || '@archive.com',
       CASE n % 3 WHEN 0 THEN 'EU' WHEN 1 THEN 'US' ELSE 'APAC' END
FROM seq;
COMMIT;",
        rows = rows,
        products = products,
        payments = payments,
        last = rows - 1,
        archive_start = archive_start,
        archive_last = archive_start + rows - 1,
    )
}
