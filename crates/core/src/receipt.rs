use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name the extraction agent identifies itself with to the model backend.
pub const AGENT_NAME: &str = "receipt_parser";

/// Fixed instruction sent with every extraction request. Not configurable.
pub const EXTRACTION_INSTRUCTION: &str = r#"You are a receipt parser AI. I will provide you with text extracted from an image of a store receipt.

Return a JSON object with the following structure:
{
"total": <float>,
"business": "<string>",
"items": [{"title": "<string>", "quantity": <int>, "price": <float>}],
"transaction_timestamp": "<ISO8601 timestamp>"
}

Prices are in USD and should be returned as floating point numbers in dollar format (e.g., 4.99).
Do not return any text or explanation, only the JSON object."#;

/// Candidate JSON payload cut out of a model response.
///
/// Holds the text exactly as it appeared between the outermost braces. It is
/// written to disk verbatim; [`ReceiptJson::parse`] is only used for checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptJson(String);

impl ReceiptJson {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Attempt to read the payload as the schema the instruction asks for.
    pub fn parse(&self) -> Result<Receipt, serde_json::Error> {
        serde_json::from_str(&self.0)
    }
}

impl fmt::Display for ReceiptJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The transaction shape requested from the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    /// Grand total in dollars.
    pub total: Decimal,
    pub business: String,
    #[serde(default)]
    pub items: Vec<ReceiptItem>,
    /// Kept as text; the model is asked for ISO-8601 but nothing enforces it.
    #[serde(default)]
    pub transaction_timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiptItem {
    pub title: String,
    #[serde(default)]
    pub quantity: Option<u32>,
    pub price: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_names_every_field() {
        for field in ["\"total\"", "\"business\"", "\"items\"", "\"transaction_timestamp\""] {
            assert!(EXTRACTION_INSTRUCTION.contains(field), "missing {field}");
        }
    }

    #[test]
    fn parse_full_receipt() {
        let json = ReceiptJson::new(
            r#"{"total": 4.99, "business": "STORE A",
                "items": [{"title": "Milk", "quantity": 1, "price": 4.99}],
                "transaction_timestamp": "2024-01-15T10:30:00"}"#,
        );
        let r = json.parse().unwrap();
        assert_eq!(r.total, Decimal::new(499, 2));
        assert_eq!(r.business, "STORE A");
        assert_eq!(r.items.len(), 1);
        assert_eq!(r.items[0].quantity, Some(1));
        assert_eq!(r.transaction_timestamp.as_deref(), Some("2024-01-15T10:30:00"));
    }

    #[test]
    fn parse_tolerates_missing_optional_fields() {
        let r = ReceiptJson::new(r#"{"total": 10, "business": "X"}"#).parse().unwrap();
        assert!(r.items.is_empty());
        assert!(r.transaction_timestamp.is_none());
    }

    #[test]
    fn parse_rejects_missing_total() {
        assert!(ReceiptJson::new(r#"{"business": "X"}"#).parse().is_err());
    }

    #[test]
    fn display_is_verbatim() {
        let raw = "{ \"total\" :4.99 }";
        assert_eq!(ReceiptJson::new(raw).to_string(), raw);
    }
}
