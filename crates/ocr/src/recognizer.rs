use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available, build with the `tesseract` feature")]
    NotAvailable,
}

/// Text recognition over raw image bytes (PNG/JPEG).
///
/// Best effort: an engine may return an empty string for an unreadable page.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError>;
}

impl<E: OcrEngine + ?Sized> OcrEngine for Arc<E> {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        (**self).recognize(image_bytes)
    }
}

// ── Mock engine (always available, used for tests) ────────────────────────────

/// Returns a preset transcript regardless of the image.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrEngine for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

/// Stand-in used when the binary is built without an OCR backend.
pub struct UnavailableRecognizer;

impl OcrEngine for UnavailableRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Err(OcrError::NotAvailable)
    }
}

// ── Tesseract engine (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrEngine, OcrError};
    use leptess::LepTess;

    /// Serbian needs both traineddata sets: `srp` (Cyrillic) and `srp_latn`.
    pub const SERBIAN_BOTH_SCRIPTS: &str = "srp+srp_latn";

    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }

        pub fn serbian(data_path: Option<String>) -> Self {
            Self::new(data_path, SERBIAN_BOTH_SCRIPTS)
        }
    }

    impl OcrEngine for TesseractRecognizer {
        fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_preset_text() {
        let r = MockRecognizer::new("EPS SNABDEVANJE\nVT: 150 kWh");
        assert_eq!(r.recognize(b"fake image data").unwrap(), "EPS SNABDEVANJE\nVT: 150 kWh");
    }

    #[test]
    fn shared_engine_delegates() {
        let r: Arc<dyn OcrEngine> = Arc::new(MockRecognizer::new("рачун"));
        assert_eq!(r.recognize(b"").unwrap(), "рачун");
    }

    #[test]
    fn unavailable_engine_reports_it() {
        assert!(matches!(UnavailableRecognizer.recognize(b"x"), Err(OcrError::NotAvailable)));
    }
}
