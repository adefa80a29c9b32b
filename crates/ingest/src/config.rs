use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const CONFIG_ENV: &str = "RACUN_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "racun.toml";

/// Runtime settings for the ingestion binary. Every field has a default, so a
/// config file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub database_path: PathBuf,
    pub intake_dir: PathBuf,
    /// Days either side of a candidate's record date searched for duplicates.
    pub duplicate_window_days: u64,
    /// Case-insensitive phrases marking bank statements, which carry payment
    /// QR codes but are not bills.
    pub bank_statement_markers: Vec<String>,
    /// Barcode payloads starting with one of these are fiscal receipts of
    /// purchases that were already paid.
    pub paid_receipt_url_prefixes: Vec<String>,
    /// Tesseract language list.
    pub ocr_language: String,
    pub tessdata_path: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("racun.db"),
            intake_dir: PathBuf::from("intake"),
            duplicate_window_days: 45,
            bank_statement_markers: [
                "izvod broj",
                "извод број",
                "izvod računa",
                "извод рачуна",
                "promet po računu",
                "промет по рачуну",
                "prethodno stanje",
                "претходно стање",
            ]
            .map(String::from)
            .to_vec(),
            paid_receipt_url_prefixes: vec!["https://suf.purs.gov.rs/v/".to_string()],
            ocr_language: "srp+srp_latn".to_string(),
            tessdata_path: None,
        }
    }
}

impl IngestConfig {
    /// Defaults with the database and intake folder placed under `data_dir`.
    pub fn rooted_at(data_dir: &Path) -> Self {
        Self {
            database_path: data_dir.join("racun.db"),
            intake_dir: data_dir.join("intake"),
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// `$RACUN_CONFIG`, else `./racun.toml`; without either file the
    /// platform data directory is used.
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Self::load_from(local);
        }
        let dirs = directories::ProjectDirs::from("rs", "racun", "Racun").ok_or(ConfigError::NoDataDir)?;
        Ok(Self::rooted_at(dirs.data_dir()))
    }
}
