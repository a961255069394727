use thiserror::Error;
use tillslip_core::ReceiptJson;

/// Why a recovered span does not look like a single receipt object.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadIssue {
    #[error("closing brace at byte {0} has no matching opening brace")]
    UnmatchedClose(usize),
    #[error("{0} brace(s) left open at end of payload")]
    Unclosed(usize),
    #[error("first object ends at byte {0}, text follows it")]
    TrailingContent(usize),
    #[error("payload is not a receipt object: {0}")]
    Schema(String),
}

/// Cut out everything from the first `{` to the last `}`, inclusive.
///
/// Returns `None` if either brace is missing or the last `}` comes before the
/// first `{`. The span is not parsed; surrounding commentary is dropped and
/// anything between the outermost braces is kept byte-for-byte.
pub fn recover_json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Inspect a recovered span without changing it.
///
/// Braces are counted outside of string literals. A span that balances but
/// closes its first object early (e.g. two objects back to back) is reported as
/// [`PayloadIssue::TrailingContent`]. A balanced span is then read against the
/// receipt schema.
pub fn check_payload(span: &str) -> Result<(), PayloadIssue> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in span.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1).ok_or(PayloadIssue::UnmatchedClose(i))?;
                if depth == 0 && i + 1 < span.len() {
                    return Err(PayloadIssue::TrailingContent(i));
                }
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(PayloadIssue::Unclosed(depth));
    }

    ReceiptJson::new(span)
        .parse()
        .map(|_| ())
        .map_err(|e| PayloadIssue::Schema(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECEIPT: &str = r#"{"total": 4.99, "business": "STORE A", "items": [], "transaction_timestamp": "2024-01-15T10:30:00"}"#;

    #[test]
    fn strips_leading_and_trailing_commentary() {
        let text = "Sure! Here you go: {\"total\": 4.99} Thanks.";
        assert_eq!(recover_json_span(text), Some("{\"total\": 4.99}"));
    }

    #[test]
    fn bare_object_is_returned_whole() {
        assert_eq!(recover_json_span(RECEIPT), Some(RECEIPT));
    }

    #[test]
    fn markdown_fence_is_dropped() {
        let text = format!("```json\n{RECEIPT}\n```");
        assert_eq!(recover_json_span(&text), Some(RECEIPT));
    }

    #[test]
    fn nested_objects_keep_outermost_braces() {
        let text = r#"ok {"a": {"b": 1}} done"#;
        assert_eq!(recover_json_span(text), Some(r#"{"a": {"b": 1}}"#));
    }

    #[test]
    fn multibyte_commentary_is_sliced_safely() {
        let text = "Voilà — {\"total\": 1} ✓";
        assert_eq!(recover_json_span(text), Some("{\"total\": 1}"));
    }

    #[test]
    fn missing_open_brace_is_none() {
        assert_eq!(recover_json_span("total: 4.99 }"), None);
    }

    #[test]
    fn missing_close_brace_is_none() {
        assert_eq!(recover_json_span("{ \"total\": 4.99"), None);
    }

    #[test]
    fn no_braces_is_none() {
        assert_eq!(recover_json_span("I could not read this receipt."), None);
        assert_eq!(recover_json_span(""), None);
    }

    #[test]
    fn close_before_open_is_none() {
        assert_eq!(recover_json_span("} then {"), None);
    }

    #[test]
    fn two_objects_span_both() {
        // The heuristic keeps the whole region; check_payload flags it.
        let text = r#"{"total": 1} and {"total": 2}"#;
        let span = recover_json_span(text).unwrap();
        assert_eq!(span, text);
        assert_eq!(check_payload(span), Err(PayloadIssue::TrailingContent(11)));
    }

    #[test]
    fn check_accepts_receipt() {
        assert_eq!(check_payload(RECEIPT), Ok(()));
    }

    #[test]
    fn check_ignores_braces_inside_strings() {
        let span = r#"{"total": 2.5, "business": "Curly {Braces} \"Cafe\""}"#;
        assert_eq!(check_payload(span), Ok(()));
    }

    #[test]
    fn check_reports_unclosed() {
        assert_eq!(check_payload(r#"{"total": {"x": 1}"#), Err(PayloadIssue::Unclosed(1)));
    }

    #[test]
    fn check_reports_unmatched_close() {
        assert_eq!(check_payload("{}}"), Err(PayloadIssue::TrailingContent(1)));
        assert_eq!(check_payload("}"), Err(PayloadIssue::UnmatchedClose(0)));
    }

    #[test]
    fn check_reports_schema_mismatch() {
        let err = check_payload(r#"{"store": "A"}"#).unwrap_err();
        assert!(matches!(err, PayloadIssue::Schema(_)));
    }
}
