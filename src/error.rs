use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
    #[error("Failed to load private key: {0}")]
    KeyLoadError(String),
    #[error("Failed to sign data: {0}")]
    SigningError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error(
        "Duplicate transaction: order reference {order_reference:?}, transaction reference {transaction_reference:?}"
    )]
    DuplicateTransaction {
        order_reference: String,
        transaction_reference: String,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
