//! SQLens Core - Shared abstractions for the query analysis engine
//!
//! This crate provides the types and collaborator traits every other
//! SQLens crate depends on:
//!
//! - `Connection` - execution collaborator used by benchmarks and plan retrieval
//! - `DatasetProvider` - disposable reference-dataset snapshots
//! - `PlanTree` - unified execution plan model returned by `Connection::explain`
//! - Common types like `Value`, `Row`, `QueryResult`
//! - `SqlensError` - error type for I/O-bound operations

mod connection;
mod error;
pub mod plan;
mod types;

pub use connection::*;
pub use error::*;
pub use plan::{NodeCost, NodeType, PlanNode, PlanNodeIterator, PlanTree};
pub use types::*;
