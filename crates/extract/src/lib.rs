pub mod boundary;
pub mod gemini;
pub mod model;
pub mod structured;

pub use boundary::{check_payload, recover_json_span, PayloadIssue};
pub use gemini::GeminiModel;
pub use model::{CompletionRequest, LanguageModel, MockModel, ModelError};
pub use structured::{ExtractError, PayloadCheck, StructuredExtractor};
