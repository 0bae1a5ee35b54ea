use sqlens_analyzer::ParseError;
use sqlens_core::SqlensError;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level errors with user-friendly messages
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Query could not be parsed: {0}")]
    Parse(#[from] ParseError),

    #[error("Schema introspection not supported for this dataset")]
    SchemaNotSupported,

    #[error("Plan retrieval failed: {0}")]
    ExplainFailed(#[source] SqlensError),

    #[error("Dataset unavailable: {0}")]
    Dataset(#[from] SqlensError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}
