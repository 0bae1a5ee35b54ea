//! SQLite execution collaborator for SQLens
//!
//! Benchmarks and plan retrieval never touch a production database. They run
//! against a disposable SQLite snapshot handed out by [`SqliteDatasetProvider`].

mod connection;
mod dataset;
mod explain;

pub use connection::{SqliteCancelHandle, SqliteConnection};
pub use dataset::{DEFAULT_SYNTHETIC_ROWS, DatasetSpec, SYNTHETIC_TABLES, SqliteDatasetProvider};
pub use explain::{ExplainRow, build_plan_tree, parse_detail};
