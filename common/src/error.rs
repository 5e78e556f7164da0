use thiserror::Error;

/// Errors confined to process startup. Everything past startup is recoverable
/// and isolated to the offending task/result rather than fatal to the process.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("failed to connect to durable store: {0}")]
    StoreConnect(String),

    #[error("failed to connect to relational database: {0}")]
    DbConnect(String),

    #[error("database migration failed: {0}")]
    Migration(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
