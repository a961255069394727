use std::time::Duration;
use thiserror::Error;
use tillslip_core::{ReceiptJson, AGENT_NAME, EXTRACTION_INSTRUCTION};
use tracing::{info, warn};

use crate::boundary::{check_payload, recover_json_span, PayloadIssue};
use crate::model::{CompletionRequest, LanguageModel, ModelError};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("No response text received from the language model")]
    EmptyResponse,
    #[error("No JSON object found in the response")]
    NoJsonFound,
    #[error("Language model request failed: {0}")]
    Model(#[from] ModelError),
    #[error("Language model did not respond within {0:?}")]
    Timeout(Duration),
    #[error("Recovered payload rejected: {0}")]
    InvalidJson(#[from] PayloadIssue),
}

/// What to do when the recovered span fails [`check_payload`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PayloadCheck {
    /// Log a warning and return the span anyway.
    #[default]
    Lenient,
    /// Fail with [`ExtractError::InvalidJson`].
    Strict,
}

/// A single-purpose extraction agent: fixed instruction, one request per call.
pub struct StructuredExtractor<M: LanguageModel> {
    model: M,
    agent: String,
    instruction: String,
    timeout: Option<Duration>,
    check: PayloadCheck,
}

impl<M: LanguageModel> StructuredExtractor<M> {
    /// An agent bound to the receipt instruction.
    pub fn new(model: M) -> Self {
        Self::with_instruction(model, AGENT_NAME, EXTRACTION_INSTRUCTION)
    }

    pub fn with_instruction(
        model: M,
        agent: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            model,
            agent: agent.into(),
            instruction: instruction.into(),
            timeout: None,
            check: PayloadCheck::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_check(mut self, check: PayloadCheck) -> Self {
        self.check = check;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Send the OCR text to the model once and cut the JSON object out of
    /// whatever comes back. No retry.
    pub async fn extract(&self, raw_text: &str) -> Result<ReceiptJson, ExtractError> {
        let request = CompletionRequest {
            agent: self.agent.clone(),
            instruction: self.instruction.clone(),
            input: raw_text.to_string(),
        };

        info!(agent = %self.agent, backend = self.model.name(), "Requesting structured extraction");
        let call = self.model.complete(&request);
        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ExtractError::Timeout(limit))??,
            None => call.await?,
        };

        let response = response
            .filter(|r| !r.is_empty())
            .ok_or(ExtractError::EmptyResponse)?;
        let span = recover_json_span(&response).ok_or(ExtractError::NoJsonFound)?;

        if let Err(issue) = check_payload(span) {
            match self.check {
                PayloadCheck::Lenient => warn!(%issue, "Recovered payload may not be a single receipt object"),
                PayloadCheck::Strict => return Err(issue.into()),
            }
        }

        Ok(ReceiptJson::new(span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MockModel;
    use async_trait::async_trait;

    struct Slow;

    #[async_trait]
    impl LanguageModel for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<Option<String>, ModelError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Some("{}".into()))
        }
    }

    #[tokio::test]
    async fn returns_span_between_outer_braces() {
        let x = StructuredExtractor::new(MockModel::new("Sure! Here you go: {\"total\": 4.99} Thanks."));
        let json = x.extract("STORE A\nTOTAL $4.99").await.unwrap();
        assert_eq!(json.as_str(), "{\"total\": 4.99}");
    }

    #[tokio::test]
    async fn sends_fixed_instruction_and_raw_text() {
        let x = StructuredExtractor::new(MockModel::new("{}"));
        x.extract("  raw\ttext ").await.unwrap();

        let seen = x.model().requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].agent, AGENT_NAME);
        assert_eq!(seen[0].instruction, EXTRACTION_INSTRUCTION);
        assert_eq!(seen[0].input, "  raw\ttext ");
    }

    #[tokio::test]
    async fn absent_response_is_empty_response() {
        let err = StructuredExtractor::new(MockModel::silent()).extract("x").await.unwrap_err();
        assert!(matches!(err, ExtractError::EmptyResponse));
    }

    #[tokio::test]
    async fn empty_string_response_is_empty_response() {
        let err = StructuredExtractor::new(MockModel::new("")).extract("x").await.unwrap_err();
        assert!(matches!(err, ExtractError::EmptyResponse));
    }

    #[tokio::test]
    async fn whitespace_response_is_no_json() {
        let err = StructuredExtractor::new(MockModel::new("  \n\t")).extract("x").await.unwrap_err();
        assert!(matches!(err, ExtractError::NoJsonFound), "got {err:?}");
    }

    #[tokio::test]
    async fn response_without_braces_is_no_json() {
        let x = StructuredExtractor::new(MockModel::new("I can't read that receipt."));
        assert!(matches!(x.extract("").await.unwrap_err(), ExtractError::NoJsonFound));
    }

    #[tokio::test]
    async fn response_missing_close_brace_is_no_json() {
        let x = StructuredExtractor::new(MockModel::new("{\"total\": 4.99"));
        assert!(matches!(x.extract("").await.unwrap_err(), ExtractError::NoJsonFound));
    }

    #[tokio::test]
    async fn lenient_check_keeps_suspicious_span() {
        let x = StructuredExtractor::new(MockModel::new("{\"a\": 1} or {\"b\": 2}"));
        let json = x.extract("").await.unwrap();
        assert_eq!(json.as_str(), "{\"a\": 1} or {\"b\": 2}");
    }

    #[tokio::test]
    async fn strict_check_rejects_suspicious_span() {
        let x = StructuredExtractor::new(MockModel::new("{\"a\": 1} or {\"b\": 2}"))
            .with_check(PayloadCheck::Strict);
        let err = x.extract("").await.unwrap_err();
        assert!(matches!(err, ExtractError::InvalidJson(PayloadIssue::TrailingContent(_))));
    }

    #[tokio::test]
    async fn strict_check_accepts_receipt() {
        let body = r#"{"total": 4.99, "business": "STORE A", "items": [{"title": "Tea", "quantity": 1, "price": 4.99}], "transaction_timestamp": "2024-01-15T10:30:00"}"#;
        let x = StructuredExtractor::new(MockModel::new(format!("```json\n{body}\n```")))
            .with_check(PayloadCheck::Strict);
        assert_eq!(x.extract("").await.unwrap().as_str(), body);
    }

    #[tokio::test]
    async fn slow_model_times_out() {
        let x = StructuredExtractor::new(Slow).with_timeout(Duration::from_millis(20));
        let err = x.extract("").await.unwrap_err();
        assert!(matches!(err, ExtractError::Timeout(d) if d == Duration::from_millis(20)));
    }
}
