use crate::domain::RecommendationResponse;
use crate::llm::{validate, AdapterError, ErrorKind, Provider};
use serde_json::Value;

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

/// Parses model output as JSON: the text as-is first (bare arrays included),
/// then whatever `extract_json` can salvage from fenced or chatty output.
pub fn parse_json_text(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }
    let candidate = extract_json(trimmed)?;
    serde_json::from_str::<Value>(&candidate).ok()
}

pub fn parse_recommendations(
    provider: Provider,
    text: &str,
) -> Result<RecommendationResponse, AdapterError> {
    let value = parse_json_text(text).ok_or_else(|| {
        let preview: String = text.trim().chars().take(120).collect();
        AdapterError::new(
            provider,
            ErrorKind::ResponseFormat,
            format!("model output is not valid JSON: {preview:?}"),
        )
    })?;
    validate::validate_response(provider, &value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "prefix {\"a\":1} suffix";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn parse_json_text_keeps_bare_arrays_intact() {
        let v = parse_json_text(r#"[{"name":"A","reason":"ok"}]"#).unwrap();
        assert!(v.is_array());
    }

    #[test]
    fn parse_recommendations_accepts_chatty_output() {
        let text = "Sure! Here you go:\n{\"recommendations\":[{\"name\":\" Magic Mouse \",\"reason\":\"pairs well\"}]}\nEnjoy.";
        let res = parse_recommendations(Provider::OpenAI, text).unwrap();
        assert_eq!(res.recommendations.len(), 1);
        assert_eq!(res.recommendations[0].name, "Magic Mouse");
    }

    #[test]
    fn parse_recommendations_rejects_non_json_as_retryable() {
        let err = parse_recommendations(Provider::Claude, "not json").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ResponseFormat);
        assert!(err.retryable());
        assert_eq!(err.provider, Some(Provider::Claude));
    }
}
