pub mod config;
pub mod receipt;

pub use config::{
    ConfigError, LogLevel, ModelConfig, OcrConfig, PathsConfig, PipelineConfig,
    DEFAULT_CONFIG_FILE,
};
pub use receipt::{Receipt, ReceiptItem, ReceiptJson, AGENT_NAME, EXTRACTION_INSTRUCTION};
