use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Model backend returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// One prompt for a language model: who is asking, the standing instruction,
/// and the user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub agent: String,
    pub instruction: String,
    pub input: String,
}

/// A hosted or local language model. No guarantee is made about the shape of
/// the returned text; `None` means the backend produced no output at all.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Backend name for logs (e.g. "gemini").
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, ModelError>;
}

/// Canned responses for tests; records every request it sees.
#[derive(Debug, Default)]
pub struct MockModel {
    response: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockModel {
    pub fn new(response: impl Into<String>) -> Self {
        Self { response: Some(response.into()), requests: Mutex::default() }
    }

    /// A model that answers with nothing.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, ModelError> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        Ok(self.response.clone())
    }
}

#[async_trait]
impl<M: LanguageModel + ?Sized> LanguageModel for Box<M> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, ModelError> {
        (**self).complete(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            agent: "receipt_parser".into(),
            instruction: "Return JSON".into(),
            input: "STORE A".into(),
        }
    }

    #[tokio::test]
    async fn mock_returns_canned_response_and_records() {
        let m = MockModel::new("{}");
        assert_eq!(m.complete(&request()).await.unwrap().as_deref(), Some("{}"));
        assert_eq!(m.requests(), vec![request()]);
    }

    #[tokio::test]
    async fn silent_mock_returns_none() {
        assert!(MockModel::silent().complete(&request()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn boxed_model_delegates() {
        let m: Box<dyn LanguageModel> = Box::new(MockModel::new("ok"));
        assert_eq!(m.name(), "mock");
        assert_eq!(m.complete(&request()).await.unwrap().as_deref(), Some("ok"));
    }
}
