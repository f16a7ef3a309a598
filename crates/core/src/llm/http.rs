use crate::llm::error::{classify_status, classify_transport};
use crate::llm::{AdapterError, ErrorKind, Provider};
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::time::Duration;

pub(crate) const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Clone, Copy)]
pub(crate) struct ProviderDefaults {
    pub base_url: &'static str,
    pub model: &'static str,
    pub timeout: Duration,
    pub known_models: &'static [&'static str],
}

impl ProviderDefaults {
    pub fn base_url(&self, configured: Option<&str>) -> String {
        configured
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(self.base_url)
            .trim_end_matches('/')
            .to_string()
    }

    /// Resolves the model name. Unknown names are allowed but logged.
    pub fn model(&self, provider: Provider, configured: Option<&str>) -> String {
        let model = configured
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.model);
        if !self.known_models.contains(&model) {
            tracing::warn!(%provider, model, "unknown model name; proceeding anyway");
        }
        model.to_string()
    }
}

pub(crate) fn connectivity_failed(err: AdapterError) -> AdapterError {
    AdapterError {
        kind: ErrorKind::Initialization,
        message: format!("connectivity check failed: {}", err.message),
        ..err
    }
}

pub(crate) fn not_available(provider: Provider) -> AdapterError {
    AdapterError::new(
        provider,
        ErrorKind::NotAvailable,
        format!("{provider} adapter is not initialized or unavailable"),
    )
}

pub(crate) fn build_client(
    provider: Provider,
    timeout: Duration,
    headers: HeaderMap,
) -> Result<reqwest::Client, AdapterError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| {
            AdapterError::new(
                provider,
                ErrorKind::Initialization,
                format!("failed to build http client: {e}"),
            )
        })
}

/// Sends `request` raced against `timeout` and decodes a JSON body.
pub(crate) async fn send_json(
    provider: Provider,
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<Value, AdapterError> {
    let call = async {
        let res = request
            .send()
            .await
            .map_err(|e| transport_error(provider, &e))?;

        let status = res.status();
        let text = res.text().await.map_err(|e| transport_error(provider, &e))?;
        if !status.is_success() {
            return Err(status_error(provider, status.as_u16(), &text));
        }

        serde_json::from_str::<Value>(&text).map_err(|e| {
            AdapterError::new(
                provider,
                ErrorKind::ResponseFormat,
                format!("response body is not valid JSON: {e}"),
            )
        })
    };

    match tokio::time::timeout(timeout, call).await {
        Ok(res) => res,
        Err(_) => Err(AdapterError::new(
            provider,
            ErrorKind::Timeout,
            format!("request timed out after {}ms", timeout.as_millis()),
        )),
    }
}

pub(crate) fn transport_error(provider: Provider, err: &reqwest::Error) -> AdapterError {
    let kind = classify_transport(err);
    let mut out = AdapterError::new(provider, kind, format!("{provider} request failed: {err}"));
    if let Some(status) = err.status() {
        out = out.with_code(status.as_u16());
    }
    out
}

pub(crate) fn status_error(provider: Provider, status: u16, body: &str) -> AdapterError {
    let kind = classify_status(status, body);
    AdapterError::new(
        provider,
        kind,
        format!("HTTP {status}: {}", error_message(body)),
    )
    .with_code(status)
}

/// Pulls the human message out of the usual `{"error": {"message": ..}}`
/// bodies, falling back to a truncated raw body.
fn error_message(body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        let msg = v
            .pointer("/error/message")
            .or_else(|| v.get("message"))
            .or_else(|| v.get("error"))
            .and_then(Value::as_str);
        if let Some(msg) = msg {
            return msg.to_string();
        }
    }
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
