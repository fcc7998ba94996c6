use serde::Serialize;
use crate::fetch::annotations::AnnotatorBlock;
use crate::fetch::encode::SignalBlock;
/// Replaces control characters with spaces.
///
/// Quotes and backslashes are left alone here; serde escapes them when the
/// document is written.
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}
/// Body of a fetch reply. A section is omitted when nothing was asked of it.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FetchResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<Vec<SignalBlock>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotator: Option<Vec<AnnotatorBlock>>,
}
impl FetchResponse {
    pub fn assemble(signals: Vec<SignalBlock>, annotators: Option<Vec<AnnotatorBlock>>) -> Self {
        Self {
            signal: (!signals.is_empty()).then_some(signals),
            annotator: annotators,
        }
    }
    pub fn into_envelope(self) -> FetchEnvelope {
        FetchEnvelope { fetch: self }
    }
}
/// Top-level `{"fetch": {...}}` document.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FetchEnvelope {
    pub fetch: FetchResponse,
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn control_characters_become_spaces() {
        assert_eq!(sanitize_text("a\tb\nc\u{7f}"), "a b c ");
        assert_eq!(sanitize_text("say \"hi\" \\o/"), "say \"hi\" \\o/");
    }
    #[test]
    fn empty_request_gives_empty_fetch_object() {
        let json = serde_json::to_string(&FetchResponse::default().into_envelope()).unwrap();
        assert_eq!(json, r#"{"fetch":{}}"#);
    }
    #[test]
    fn requested_annotators_appear_even_when_empty() {
        let response = FetchResponse::assemble(Vec::new(), Some(Vec::new()));
        let json = serde_json::to_value(response.into_envelope()).unwrap();
        assert_eq!(json, serde_json::json!({"fetch": {"annotator": []}}));
    }
    #[test]
    fn quotes_and_backslashes_are_escaped_on_output() {
        let block = AnnotatorBlock {
            name: sanitize_text("a\"b\\c\u{1}"),
            annotation: Vec::new(),
        };
        let json = serde_json::to_string(&block).unwrap();
        assert_eq!(json, r#"{"name":"a\"b\\c ","annotation":[]}"#);
    }
}
