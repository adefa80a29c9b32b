use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use racun_ingest::{pending_files, spawn_intake_watcher, Document, IngestConfig, IngestPipeline};
use racun_ocr::OcrEngine;
use racun_scan::{BarcodeReader, DecodeCascade, QrReader};
use racun_storage::{create_db, SqliteBillStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let watch = args.iter().any(|a| a == "--watch");
    let cleanup = args.iter().any(|a| a == "--cleanup");

    let config = IngestConfig::load()?;
    std::fs::create_dir_all(&config.intake_dir)
        .with_context(|| format!("Failed to create intake folder {}", config.intake_dir.display()))?;
    if let Some(parent) = config.database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data folder {}", parent.display()))?;
    }

    let db = create_db(&config.database_path).await?;
    let store = Arc::new(SqliteBillStore::new(db));
    let reader: Arc<dyn BarcodeReader> = Arc::new(QrReader);
    let cascade = DecodeCascade::new(reader.clone(), reader);
    let pipeline = IngestPipeline::new(cascade, ocr_engine(&config), store, &config);

    let documents = read_documents(&pending_files(&config.intake_dir)?).await;
    let report = pipeline.ingest_batch(documents).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if cleanup {
        let plan = pipeline.cleanup_duplicates().await?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
    }

    if watch {
        // The channel bridges the notify watcher thread and the sequential pipeline.
        let (tx, mut rx) = mpsc::channel::<PathBuf>(64);
        let _watcher = spawn_intake_watcher(&config.intake_dir, tx)
            .with_context(|| format!("Failed to watch {}", config.intake_dir.display()))?;
        tracing::info!("Watching intake folder: {}", config.intake_dir.display());

        while let Some(path) = rx.recv().await {
            let documents = read_documents(&[path]).await;
            pipeline.ingest_batch(documents).await;
        }
    }

    Ok(())
}

async fn read_documents(paths: &[PathBuf]) -> Vec<Document> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        match Document::from_file(path).await {
            Ok(doc) => documents.push(doc),
            Err(e) => tracing::warn!("Cannot read {}: {e}", path.display()),
        }
    }
    documents
}

#[cfg(feature = "tesseract")]
fn ocr_engine(config: &IngestConfig) -> Arc<dyn OcrEngine> {
    use racun_ocr::recognizer::tesseract_backend::TesseractRecognizer;

    let data_path = config.tessdata_path.as_ref().map(|p| p.display().to_string());
    Arc::new(TesseractRecognizer::new(data_path, &config.ocr_language))
}

#[cfg(not(feature = "tesseract"))]
fn ocr_engine(_config: &IngestConfig) -> Arc<dyn OcrEngine> {
    tracing::warn!("Built without the `tesseract` feature, every document will fail OCR");
    Arc::new(racun_ocr::UnavailableRecognizer)
}
