use crate::domain::{Product, RecommendationResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub mod anthropic;
pub mod chat_completions;
pub mod config;
pub mod error;
pub mod events;
pub mod gemini;
pub mod grok;
pub(crate) mod http;
pub mod json;
pub mod manager;
pub mod mock;
pub mod openai;
pub mod prompt;
pub mod status;
pub mod validate;

pub use config::{AdapterManagerConfig, ProviderConfig};
pub use error::{AdapterError, ApiError, ErrorKind};
pub use events::ManagerEvent;
pub use manager::{AdapterManager, HealthReport};

pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Grok,
    Claude,
    Gemini,
    Mock,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::OpenAI,
        Provider::Grok,
        Provider::Claude,
        Provider::Gemini,
        Provider::Mock,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::Grok => "grok",
            Provider::Claude => "claude",
            Provider::Gemini => "gemini",
            Provider::Mock => "mock",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown AI provider: {0:?}")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "grok" | "xai" => Ok(Provider::Grok),
            "claude" | "anthropic" => Ok(Provider::Claude),
            "gemini" | "google" => Ok(Provider::Gemini),
            "mock" => Ok(Provider::Mock),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdapterInfo {
    pub provider: Provider,
    pub model: String,
    pub is_available: bool,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub supports_json_mode: bool,
    pub supports_streaming: bool,
}

/// Uniform interface over one recommendation backend.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Validates `config`, builds the client and runs a connectivity check.
    /// On failure the adapter stays unavailable and records the error.
    async fn initialize(&mut self, config: ProviderConfig) -> Result<(), AdapterError>;

    async fn generate_recommendations(
        &self,
        product: &Product,
    ) -> Result<RecommendationResponse, AdapterError>;

    fn is_available(&self) -> bool;

    fn mark_unavailable(&self, err: &AdapterError);

    fn info(&self) -> AdapterInfo;

    /// Synthetic request against [`Product::health_probe`]. Never errors.
    async fn health_check(&self) -> bool {
        let probe = Product::health_probe();
        let call = self.generate_recommendations(&probe);
        match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, call).await {
            Ok(Ok(res)) => !res.recommendations.is_empty(),
            Ok(Err(err)) => {
                tracing::debug!(provider = %self.provider(), error = %err, "health check failed");
                false
            }
            Err(_) => {
                tracing::debug!(provider = %self.provider(), "health check timed out");
                false
            }
        }
    }
}

/// Rejects products without a usable name before any provider is called.
pub fn validate_product(provider: Option<Provider>, product: &Product) -> Result<(), AdapterError> {
    if product.trimmed_name().is_none() {
        return Err(AdapterError::invalid_input(provider, "product name must be non-empty"));
    }
    Ok(())
}

pub fn adapter_for(provider: Provider) -> Box<dyn ProviderAdapter> {
    match provider {
        Provider::OpenAI => Box::new(openai::OpenAiAdapter::new()),
        Provider::Grok => Box::new(grok::GrokAdapter::new()),
        Provider::Claude => Box::new(anthropic::ClaudeAdapter::new()),
        Provider::Gemini => Box::new(gemini::GeminiAdapter::new()),
        Provider::Mock => Box::new(mock::MockAdapter::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_names_and_aliases() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAI);
        assert_eq!(" xai ".parse::<Provider>().unwrap(), Provider::Grok);
        assert_eq!("anthropic".parse::<Provider>().unwrap(), Provider::Claude);
        assert_eq!("google".parse::<Provider>().unwrap(), Provider::Gemini);
        assert_eq!("mock".parse::<Provider>().unwrap(), Provider::Mock);
        assert!("llama".parse::<Provider>().is_err());
    }

    #[test]
    fn provider_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Provider::OpenAI).unwrap(), "\"openai\"");
        for provider in Provider::ALL {
            assert_eq!(provider.to_string().parse::<Provider>().unwrap(), provider);
        }
    }

    #[test]
    fn validate_product_rejects_blank_names() {
        let err = validate_product(None, &Product::named("   ")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert!(!err.retryable());
        assert!(validate_product(None, &Product::named("MacBook Air")).is_ok());
    }
}
