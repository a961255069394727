pub mod extract;
pub mod preprocess;
pub mod recognizer;

pub use extract::TextExtractor;
pub use preprocess::{binarize, DebugArtifacts, ImageNormalizer, NormalizedImage, PreprocessError};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError, TesseractCli};
