pub mod config;
pub mod detector;
pub mod document;
pub mod error;
pub mod pipeline;
pub mod watcher;

pub use config::IngestConfig;
pub use detector::{BankStatementFilter, PaidReceiptDetector, ReceiptUrlDetector};
pub use document::Document;
pub use error::{ConfigError, DuplicateBlocked, IngestError};
pub use pipeline::{merge_candidates, BatchReport, DocumentOutcome, IngestPipeline};
pub use watcher::{pending_files, spawn_intake_watcher};
