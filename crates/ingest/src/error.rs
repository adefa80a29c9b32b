use racun_core::BillId;
use racun_ocr::OcrError;
use racun_storage::StorageError;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// A candidate refused by reconciliation. Counted, never fatal to a batch.
#[derive(Debug, Clone, Serialize, Error)]
#[error("Document {document} not recorded: {verdict}")]
pub struct DuplicateBlocked {
    pub document: String,
    /// The stored bill the candidate collided with.
    pub existing: BillId,
    pub verdict: String,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    DuplicateBlocked(#[from] DuplicateBlocked),
    #[error("OCR failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("No usable data directory on this platform")]
    NoDataDir,
}
