use racun_core::BillId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },
    #[error("A visible bill with payment identity {0} already exists")]
    DuplicateIdentity(String),
    #[error("Bill {0} not found")]
    NotFound(BillId),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
