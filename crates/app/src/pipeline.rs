use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

use tillslip_core::ReceiptJson;
use tillslip_extract::{ExtractError, LanguageModel, StructuredExtractor};
use tillslip_ocr::{ImageNormalizer, OcrBackend, OcrError, PreprocessError, TextExtractor};

/// The pipeline stage a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalize,
    ExtractText,
    ExtractStructured,
    WriteOutput,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Normalize => write!(f, "normalize"),
            Stage::ExtractText => write!(f, "extract_text"),
            Stage::ExtractStructured => write!(f, "extract_structured"),
            Stage::WriteOutput => write!(f, "write_output"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input image not found or undecodable: {0}")]
    NotFound(String),
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("No response text received from the language model")]
    EmptyResponse,
    #[error("No JSON object found in the model response")]
    NoJsonFound,
    #[error("{stage} failed: {message}")]
    Stage { stage: Stage, message: String },
}

impl PipelineError {
    fn stage(stage: Stage, err: impl fmt::Display) -> Self {
        PipelineError::Stage { stage, message: err.to_string() }
    }
}

impl From<PreprocessError> for PipelineError {
    fn from(e: PreprocessError) -> Self {
        match e {
            PreprocessError::NotFound { .. } => PipelineError::NotFound(e.to_string()),
            other => PipelineError::stage(Stage::Normalize, other),
        }
    }
}

impl From<OcrError> for PipelineError {
    fn from(e: OcrError) -> Self {
        match e {
            OcrError::NotAvailable(msg) => PipelineError::EngineUnavailable(msg),
            other => PipelineError::stage(Stage::ExtractText, other),
        }
    }
}

impl From<ExtractError> for PipelineError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::EmptyResponse => PipelineError::EmptyResponse,
            ExtractError::NoJsonFound => PipelineError::NoJsonFound,
            other => PipelineError::stage(Stage::ExtractStructured, other),
        }
    }
}

/// Where a run currently is. Every run starts at `Start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    Normalized,
    TextExtracted,
    StructuredExtracted,
    Written,
    Failed(Stage),
}

/// The result of a successful run.
#[derive(Debug)]
pub struct RunOutcome {
    pub output_path: PathBuf,
    pub ocr_text: String,
    pub receipt: ReceiptJson,
}

/// Orchestrates: normalize → OCR → structured extraction → write.
pub struct ReceiptPipeline<R: OcrBackend, M: LanguageModel> {
    normalizer: ImageNormalizer,
    text: TextExtractor<R>,
    structured: StructuredExtractor<M>,
    output_path: PathBuf,
}

impl<R: OcrBackend, M: LanguageModel> ReceiptPipeline<R, M> {
    pub fn new(
        normalizer: ImageNormalizer,
        recognizer: R,
        structured: StructuredExtractor<M>,
        output_path: PathBuf,
    ) -> Self {
        Self {
            normalizer,
            text: TextExtractor::new(recognizer),
            structured,
            output_path,
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Process one receipt image. On failure nothing is written and any
    /// previous output file is left as it was.
    pub async fn run(&self, source: &Path) -> Result<RunOutcome, PipelineError> {
        let mut state = RunState::Start;
        info!(source = %source.display(), "Starting receipt run");

        let image = self
            .normalizer
            .normalize(source)
            .map_err(|e| fail(&mut state, Stage::Normalize, e.into()))?;
        advance(&mut state, RunState::Normalized);

        let ocr_text = self
            .text
            .extract(&image)
            .map_err(|e| fail(&mut state, Stage::ExtractText, e.into()))?;
        drop(image);
        advance(&mut state, RunState::TextExtracted);
        info!(text = %ocr_text, "Extracted text content");

        let receipt = self
            .structured
            .extract(&ocr_text)
            .await
            .map_err(|e| fail(&mut state, Stage::ExtractStructured, e.into()))?;
        advance(&mut state, RunState::StructuredExtracted);

        write_output(&self.output_path, receipt.as_str())
            .await
            .map_err(|e| {
                fail(&mut state, Stage::WriteOutput, PipelineError::stage(Stage::WriteOutput, e))
            })?;
        advance(&mut state, RunState::Written);
        info!(path = %self.output_path.display(), "JSON data written");

        Ok(RunOutcome { output_path: self.output_path.clone(), ocr_text, receipt })
    }
}

fn advance(state: &mut RunState, next: RunState) {
    tracing::debug!(from = ?*state, to = ?next, "Run state changed");
    *state = next;
}

fn fail(state: &mut RunState, stage: Stage, err: PipelineError) -> PipelineError {
    error!(%stage, "Error in {stage}: {err}");
    advance(state, RunState::Failed(stage));
    err
}

/// Write through a sibling temp file and rename so the destination is either
/// the old content or the complete new content.
async fn write_output(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let result = match tokio::fs::write(&tmp, content).await {
        Ok(()) => tokio::fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

// ── Tests ─────────────────────────────────────────────────────────────────────
