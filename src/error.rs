// Custom error types for the application
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("invalid data: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("date/time parsing error: {0}")]
    DateTimeParse(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("watermark error: {0}")]
    Watermark(String),

    #[error("unknown logical table: {0}")]
    UnknownTable(String),

    #[error("transient warehouse error: {0}")]
    TransientWarehouse(String),

    #[error("permanent warehouse error: {0}")]
    PermanentWarehouse(String),

    #[error("warehouse authentication error: {0}")]
    WarehouseAuth(String),

    #[error("warehouse query timed out after {0:?}")]
    WarehouseTimeout(std::time::Duration),

    #[error("mart build error: {0}")]
    MartBuild(String),
}

pub type Result<T> = std::result::Result<T, EtlError>;
