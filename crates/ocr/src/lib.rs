pub mod extract;
pub mod normalize;
pub mod numbers;
pub mod recognizer;
pub mod utility;

pub use extract::BillExtractor;
pub use normalize::normalize;
pub use recognizer::{MockRecognizer, OcrEngine, OcrError, UnavailableRecognizer};
pub use utility::UtilityExtractor;
