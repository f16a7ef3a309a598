use crate::llm::Provider;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotAvailable,
    Initialization,
    Auth,
    BadRequest,
    ModelNotFound,
    RateLimit,
    Network,
    Timeout,
    Server,
    ResponseFormat,
    AllProvidersExhausted,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimit
                | ErrorKind::Network
                | ErrorKind::Timeout
                | ErrorKind::Server
                | ErrorKind::ResponseFormat
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotAvailable => "not_available",
            ErrorKind::Initialization => "initialization",
            ErrorKind::Auth => "auth",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::ModelNotFound => "model_not_found",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Server => "server",
            ErrorKind::ResponseFormat => "response_format",
            ErrorKind::AllProvidersExhausted => "all_providers_exhausted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error(
    "AI adapter error (provider={}, kind={}): {message}",
    .provider.map_or("none", Provider::as_str),
    .kind.as_str()
)]
pub struct AdapterError {
    pub provider: Option<Provider>,
    pub kind: ErrorKind,
    pub message: String,
    pub code: Option<u16>,
}

impl AdapterError {
    pub fn new(provider: Provider, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            provider: Some(provider),
            kind,
            message: message.into(),
            code: None,
        }
    }

    pub fn invalid_input(provider: Option<Provider>, message: impl Into<String>) -> Self {
        Self {
            provider,
            kind: ErrorKind::InvalidInput,
            message: message.into(),
            code: None,
        }
    }

    pub fn exhausted(message: impl Into<String>) -> Self {
        Self {
            provider: None,
            kind: ErrorKind::AllProvidersExhausted,
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn to_api_error(&self) -> ApiError {
        ApiError {
            error: self.kind.as_str().to_string(),
            message: self.message.clone(),
            provider: self.provider,
            retryable: self.retryable(),
            code: self.code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

pub fn classify_status(status: u16, body: &str) -> ErrorKind {
    match status {
        400 => ErrorKind::BadRequest,
        401 | 403 => ErrorKind::Auth,
        404 => ErrorKind::ModelNotFound,
        408 => ErrorKind::Timeout,
        429 => ErrorKind::RateLimit,
        500..=599 => ErrorKind::Server,
        _ => classify_message(body).unwrap_or(ErrorKind::BadRequest),
    }
}

/// Recognizes the error phrasing providers use when no status code is at hand.
pub fn classify_message(message: &str) -> Option<ErrorKind> {
    let lower = message.to_ascii_lowercase();
    if lower.contains("rate limit") || lower.contains("rate_limit") || lower.contains("quota") {
        return Some(ErrorKind::RateLimit);
    }
    if lower.contains("invalid api key")
        || lower.contains("invalid_api_key")
        || lower.contains("unauthorized")
    {
        return Some(ErrorKind::Auth);
    }
    if lower.contains("timed out") || lower.contains("timeout") {
        return Some(ErrorKind::Timeout);
    }
    if lower.contains("dns") || lower.contains("connection refused") || lower.contains("network")
    {
        return Some(ErrorKind::Network);
    }
    None
}

pub fn classify_transport(err: &reqwest::Error) -> ErrorKind {
    if err.is_timeout() {
        return ErrorKind::Timeout;
    }
    if err.is_connect() {
        return ErrorKind::Network;
    }
    if let Some(status) = err.status() {
        return classify_status(status.as_u16(), &err.to_string());
    }
    if err.is_decode() {
        return ErrorKind::ResponseFormat;
    }
    classify_message(&err.to_string()).unwrap_or(ErrorKind::Network)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_http_statuses() {
        assert_eq!(classify_status(400, ""), ErrorKind::BadRequest);
        assert_eq!(classify_status(401, ""), ErrorKind::Auth);
        assert_eq!(classify_status(403, ""), ErrorKind::Auth);
        assert_eq!(classify_status(404, ""), ErrorKind::ModelNotFound);
        assert_eq!(classify_status(429, ""), ErrorKind::RateLimit);
        for status in [500, 502, 503, 504] {
            assert_eq!(classify_status(status, ""), ErrorKind::Server);
            assert!(classify_status(status, "").is_retryable());
        }
        assert_eq!(
            classify_status(402, "You exceeded your current quota"),
            ErrorKind::RateLimit
        );
        assert_eq!(classify_status(409, "conflict"), ErrorKind::BadRequest);
    }

    #[test]
    fn auth_and_input_errors_are_not_retryable() {
        for kind in [
            ErrorKind::InvalidInput,
            ErrorKind::Auth,
            ErrorKind::BadRequest,
            ErrorKind::ModelNotFound,
            ErrorKind::NotAvailable,
        ] {
            assert!(!kind.is_retryable(), "{kind:?}");
        }
        assert!(ErrorKind::ResponseFormat.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
    }

    #[test]
    fn classifies_provider_messages() {
        assert_eq!(classify_message("Rate limit reached for gpt-4o"), Some(ErrorKind::RateLimit));
        assert_eq!(classify_message("Incorrect API key: invalid_api_key"), Some(ErrorKind::Auth));
        assert_eq!(classify_message("dns error: failed to lookup"), Some(ErrorKind::Network));
        assert_eq!(classify_message("something odd"), None);
    }

    #[test]
    fn api_error_carries_classification() {
        let err =
            AdapterError::new(Provider::Grok, ErrorKind::RateLimit, "slow down").with_code(429);
        let api = err.to_api_error();
        assert_eq!(api.error, "rate_limit");
        assert_eq!(api.provider, Some(Provider::Grok));
        assert!(api.retryable);
        assert_eq!(api.code, Some(429));

        let api = AdapterError::invalid_input(None, "x").to_api_error();
        let json = serde_json::to_value(api).unwrap();
        assert!(json.get("provider").is_none());
        assert_eq!(json["retryable"], false);
    }

    #[test]
    fn display_names_provider_and_kind() {
        let err = AdapterError::new(Provider::Claude, ErrorKind::Auth, "bad key");
        assert_eq!(
            err.to_string(),
            "AI adapter error (provider=claude, kind=auth): bad key"
        );
    }
}
