pub mod cascade;
pub mod live;
pub mod payment_qr;
pub mod reader;
pub mod transform;

pub use cascade::{DecodeCascade, ImageOrigin};
pub use live::{DetectionCallback, LiveScanner, LiveScannerConfig};
pub use reader::{BarcodeFormat, BarcodeReader, Binarizer, FormatSet};
#[cfg(feature = "rqrr")]
pub use reader::QrReader;
