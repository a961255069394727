use std::io::Write;
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("Failed to encode image for OCR: {0}")]
    Encode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    /// The engine itself is missing; a setup problem, not an image problem.
    #[error("OCR engine not available: {0}")]
    NotAvailable(String),
}

/// Abstraction over an OCR backend.
/// Implementations accept PNG image bytes and return the recognized text.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError>;
}

impl<T: OcrBackend + ?Sized> OcrBackend for Box<T> {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        (**self).recognize(image_bytes)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string — useful for unit testing the pipeline
/// without requiring Tesseract to be installed.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

// ── Tesseract executable ──────────────────────────────────────────────────────

/// Runs the `tesseract` command line tool, streaming the image over stdin and
/// reading the text from stdout.
pub struct TesseractCli {
    command: String,
    lang: String,
}

impl TesseractCli {
    pub fn new(command: impl Into<String>, lang: impl Into<String>) -> Self {
        Self { command: command.into(), lang: lang.into() }
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl OcrBackend for TesseractCli {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        let mut child = Command::new(&self.command)
            .args(["stdin", "stdout", "-l", &self.lang])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => OcrError::NotAvailable(format!(
                    "`{}` is not installed or not in PATH",
                    self.command
                )),
                _ => OcrError::Engine(e.to_string()),
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::Engine("tesseract stdin was not captured".into()))?;

        // Feed stdin from a separate thread so a chatty stderr can't block us.
        let output = std::thread::scope(|s| {
            let writer = s.spawn(move || stdin.write_all(image_bytes));
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
            output.and_then(|o| written.map(|_| o))
        })
        .map_err(|e| OcrError::Engine(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ── Tesseract library backend (optional, gated behind `tesseract` feature) ────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError};
    use leptess::LepTess;

    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::NotAvailable(e.to_string()))?;
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}
