use crate::domain::{Recommendation, RecommendationResponse};
use crate::llm::{json, AdapterError, ErrorKind, Provider};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `{"recommendations": [...]}`
    Canonical,
    /// `[...]`
    BareArray,
    /// `choices[0].message.content`
    ChatCompletion,
    /// `content[].text`
    Messages,
    /// `candidates[0].content.parts[].text`
    Candidates,
}

pub fn detect_shape(raw: &Value) -> Option<ResponseShape> {
    match raw {
        Value::Array(_) => Some(ResponseShape::BareArray),
        Value::Object(map) if map.get("recommendations").is_some_and(Value::is_array) => {
            Some(ResponseShape::Canonical)
        }
        Value::Object(_) if raw.pointer("/choices/0/message/content").is_some() => {
            Some(ResponseShape::ChatCompletion)
        }
        Value::Object(map) if map.get("content").is_some_and(Value::is_array) => {
            Some(ResponseShape::Messages)
        }
        Value::Object(_) if raw.pointer("/candidates/0/content/parts").is_some() => {
            Some(ResponseShape::Candidates)
        }
        _ => None,
    }
}

pub fn envelope_text(raw: &Value) -> Option<String> {
    match detect_shape(raw)? {
        ResponseShape::ChatCompletion => raw
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string),
        ResponseShape::Messages => joined_text(raw.get("content")?.as_array()?),
        ResponseShape::Candidates => {
            joined_text(raw.pointer("/candidates/0/content/parts")?.as_array()?)
        }
        ResponseShape::Canonical | ResponseShape::BareArray => None,
    }
}

fn joined_text(blocks: &[Value]) -> Option<String> {
    let parts: Vec<&str> = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str).map_or(true, |t| t == "text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n"))
}

pub fn validate_response(
    provider: Provider,
    raw: &Value,
) -> Result<RecommendationResponse, AdapterError> {
    let entries = extract_entries(raw).ok_or_else(|| {
        AdapterError::new(
            provider,
            ErrorKind::ResponseFormat,
            "response does not contain a recommendations array",
        )
    })?;

    let recommendations: Vec<Recommendation> = entries.iter().filter_map(sanitize_entry).collect();
    if recommendations.is_empty() {
        return Err(AdapterError::new(
            provider,
            ErrorKind::ResponseFormat,
            "no valid recommendations in response",
        ));
    }

    Ok(RecommendationResponse { recommendations })
}

fn extract_entries(raw: &Value) -> Option<Vec<Value>> {
    match detect_shape(raw)? {
        ResponseShape::BareArray => raw.as_array().cloned(),
        ResponseShape::Canonical => raw.get("recommendations")?.as_array().cloned(),
        ResponseShape::ChatCompletion | ResponseShape::Messages | ResponseShape::Candidates => {
            let inner = json::parse_json_text(&envelope_text(raw)?)?;
            // Model text must itself be canonical; envelopes do not nest.
            match detect_shape(&inner)? {
                ResponseShape::BareArray => inner.as_array().cloned(),
                ResponseShape::Canonical => inner.get("recommendations")?.as_array().cloned(),
                _ => None,
            }
        }
    }
}

fn sanitize_entry(entry: &Value) -> Option<Recommendation> {
    let obj: &Map<String, Value> = entry.as_object()?;
    let name = non_empty_str(obj.get("name"))?;
    let reason = non_empty_str(obj.get("reason"))?;
    let price = obj
        .get("price")
        .and_then(Value::as_f64)
        .filter(|p| p.is_finite());
    let image = non_empty_str(obj.get("image"));

    Some(Recommendation {
        name,
        reason,
        price,
        image,
    })
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    let s = v?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}
