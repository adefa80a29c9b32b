use image::GrayImage;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarcodeFormat {
    QrCode,
    Pdf417,
    DataMatrix,
    Aztec,
    Code128,
    Code39,
    Ean13,
    Ean8,
    UpcA,
    Itf,
}

/// Which symbologies a reader is asked to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSet {
    /// 2D symbologies that carry payment payloads.
    PaymentCodes,
    Any,
}

impl FormatSet {
    pub fn formats(self) -> &'static [BarcodeFormat] {
        use BarcodeFormat::*;
        match self {
            FormatSet::PaymentCodes => &[QrCode, Pdf417, DataMatrix, Aztec],
            FormatSet::Any => &[
                QrCode, Pdf417, DataMatrix, Aztec, Code128, Code39, Ean13, Ean8, UpcA, Itf,
            ],
        }
    }

    pub fn contains(self, format: BarcodeFormat) -> bool {
        self.formats().contains(&format)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binarizer {
    /// Local-contrast thresholding; copes with uneven lighting.
    ContrastAdaptive,
    /// One threshold for the whole image, from its luminance histogram.
    GlobalHistogram,
}

/// A barcode decoder collaborator. Implementations return the raw payload of
/// the first symbol they find, or `None`.
pub trait BarcodeReader: Send + Sync {
    fn read(&self, image: &GrayImage, formats: FormatSet, binarizer: Binarizer) -> Option<String>;
}

impl<R: BarcodeReader + ?Sized> BarcodeReader for Arc<R> {
    fn read(&self, image: &GrayImage, formats: FormatSet, binarizer: Binarizer) -> Option<String> {
        (**self).read(image, formats, binarizer)
    }
}

// ── rqrr backend (optional, gated behind `rqrr` feature) ──────────────────────

#[cfg(feature = "rqrr")]
pub use qr_backend::QrReader;

#[cfg(feature = "rqrr")]
mod qr_backend {
    use super::{BarcodeFormat, BarcodeReader, Binarizer, FormatSet};
    use image::GrayImage;

    /// QR-only reader. rqrr thresholds adaptively on its own, so the global
    /// strategy pre-binarizes at the mean luminance before handing over.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct QrReader;

    impl BarcodeReader for QrReader {
        fn read(&self, image: &GrayImage, formats: FormatSet, binarizer: Binarizer) -> Option<String> {
            if !formats.contains(BarcodeFormat::QrCode) || image.width() == 0 || image.height() == 0 {
                return None;
            }
            let cutoff = match binarizer {
                Binarizer::ContrastAdaptive => None,
                Binarizer::GlobalHistogram => Some(mean_luminance(image)),
            };
            let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
                image.width() as usize,
                image.height() as usize,
                |x, y| {
                    let p = image.get_pixel(x as u32, y as u32)[0];
                    match cutoff {
                        Some(t) if p < t => 0,
                        Some(_) => 255,
                        None => p,
                    }
                },
            );
            prepared
                .detect_grids()
                .into_iter()
                .find_map(|grid| grid.decode().ok().map(|(_, content)| content))
        }
    }

    fn mean_luminance(image: &GrayImage) -> u8 {
        let (sum, count) = image
            .pixels()
            .fold((0u64, 0u64), |(s, n), p| (s + p[0] as u64, n + 1));
        (sum / count.max(1)) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_codes_are_two_dimensional_subset() {
        let payment = FormatSet::PaymentCodes.formats();
        assert_eq!(payment.len(), 4);
        assert!(payment.iter().all(|f| FormatSet::Any.contains(*f)));
        assert!(!FormatSet::PaymentCodes.contains(BarcodeFormat::Ean13));
    }

    #[cfg(feature = "rqrr")]
    #[test]
    fn qr_reader_finds_nothing_in_blank_image() {
        let blank = GrayImage::from_pixel(64, 64, image::Luma([255u8]));
        assert_eq!(
            QrReader.read(&blank, FormatSet::PaymentCodes, Binarizer::GlobalHistogram),
            None
        );
    }
}
