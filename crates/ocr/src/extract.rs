use tracing::{info, warn};

use crate::preprocess::NormalizedImage;
use crate::recognizer::{OcrBackend, OcrError};

/// Runs an OCR backend over a normalized image and hands back the text as-is.
pub struct TextExtractor<R: OcrBackend> {
    recognizer: R,
}

impl<R: OcrBackend> TextExtractor<R> {
    pub fn new(recognizer: R) -> Self {
        Self { recognizer }
    }

    /// Empty or whitespace-only output is logged as a warning and still
    /// returned; deciding what to do with it is left to the caller.
    pub fn extract(&self, image: &NormalizedImage) -> Result<String, OcrError> {
        let png = image
            .to_png()
            .map_err(|e| OcrError::Encode(e.to_string()))?;
        let text = self.recognizer.recognize(&png)?;

        if text.trim().is_empty() {
            warn!("No text extracted from image");
        } else {
            info!(chars = text.chars().count(), lines = text.lines().count(), "Text extracted");
        }
        Ok(text)
    }
}
