pub mod pipeline;

pub use pipeline::{PipelineError, ReceiptPipeline, RunOutcome, RunState, Stage};

use tillslip_core::{ConfigError, OcrConfig, PipelineConfig};
use tillslip_extract::{GeminiModel, PayloadCheck, StructuredExtractor};
use tillslip_ocr::{DebugArtifacts, ImageNormalizer, OcrBackend};

/// Wire the production backends from config. Fails before any stage runs if
/// the model API key is missing.
pub fn build_pipeline(
    config: &PipelineConfig,
    check: PayloadCheck,
) -> Result<ReceiptPipeline<Box<dyn OcrBackend>, GeminiModel>, ConfigError> {
    let normalizer = ImageNormalizer::new(DebugArtifacts {
        gray: config.paths.gray_artifact.clone(),
        binary: config.paths.binary_artifact.clone(),
    });
    let structured = StructuredExtractor::new(GeminiModel::from_config(&config.model)?)
        .with_timeout(config.model.timeout())
        .with_check(check);

    Ok(ReceiptPipeline::new(
        normalizer,
        ocr_backend(&config.ocr),
        structured,
        config.paths.output.clone(),
    ))
}

#[cfg(not(feature = "tesseract"))]
fn ocr_backend(ocr: &OcrConfig) -> Box<dyn OcrBackend> {
    Box::new(tillslip_ocr::TesseractCli::new(&ocr.command, &ocr.lang))
}

#[cfg(feature = "tesseract")]
fn ocr_backend(ocr: &OcrConfig) -> Box<dyn OcrBackend> {
    tracing::info!(
        command = %ocr.command,
        "Using linked Tesseract library; ocr.command is ignored"
    );
    Box::new(tillslip_ocr::recognizer::tesseract_backend::TesseractRecognizer::new(
        None, &ocr.lang,
    ))
}
