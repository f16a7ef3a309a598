use crate::domain::{Product, RecommendationResponse};
use crate::llm::chat_completions::ChatCompletionsClient;
use crate::llm::http::{self, ProviderDefaults};
use crate::llm::status::AdapterStatus;
use crate::llm::{
    validate_product, AdapterError, AdapterInfo, Provider, ProviderAdapter, ProviderConfig,
};
use std::time::Duration;

const DEFAULTS: ProviderDefaults = ProviderDefaults {
    base_url: "https://api.openai.com/v1",
    model: "gpt-4o-mini",
    timeout: Duration::from_secs(10),
    known_models: &[
        "gpt-4o",
        "gpt-4o-mini",
        "gpt-4-turbo",
        "gpt-4",
        "gpt-3.5-turbo",
        "o1-mini",
    ],
};

#[derive(Debug, Default)]
pub struct OpenAiAdapter {
    client: Option<ChatCompletionsClient>,
    model: Option<String>,
    status: AdapterStatus,
}

impl OpenAiAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn ready(&self) -> Result<&ChatCompletionsClient, AdapterError> {
        match &self.client {
            Some(client) if self.status.is_available() => Ok(client),
            _ => Err(http::not_available(Provider::OpenAI)),
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    async fn initialize(&mut self, config: ProviderConfig) -> Result<(), AdapterError> {
        self.model = config.model.clone();
        match ChatCompletionsClient::connect(&config, &DEFAULTS).await {
            Ok(client) => {
                tracing::info!(provider = "openai", model = client.model(), "adapter initialized");
                self.model = Some(client.model().to_string());
                self.client = Some(client);
                self.status.mark_available();
                Ok(())
            }
            Err(err) => {
                tracing::warn!(provider = "openai", error = %err, "adapter unavailable");
                self.client = None;
                self.status.mark_unavailable(&err);
                Err(err)
            }
        }
    }

    async fn generate_recommendations(
        &self,
        product: &Product,
    ) -> Result<RecommendationResponse, AdapterError> {
        let client = self.ready()?;
        validate_product(Some(Provider::OpenAI), product)?;
        client
            .recommend(product)
            .await
            .inspect_err(|err| self.status.record_error(err))
    }

    fn is_available(&self) -> bool {
        self.client.is_some() && self.status.is_available()
    }

    fn mark_unavailable(&self, err: &AdapterError) {
        self.status.mark_unavailable(err);
    }

    fn info(&self) -> AdapterInfo {
        let status = self.status.snapshot();
        AdapterInfo {
            provider: Provider::OpenAI,
            model: self.model.clone().unwrap_or_else(|| DEFAULTS.model.to_string()),
            is_available: self.client.is_some() && status.is_available,
            last_error: status.last_error,
            last_error_at: status.last_error_at,
            supports_json_mode: true,
            supports_streaming: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ErrorKind;

    #[tokio::test]
    async fn uninitialized_adapter_fails_fast_without_retry() {
        let adapter = OpenAiAdapter::new();
        let err = adapter
            .generate_recommendations(&Product::named("MacBook Air"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotAvailable);
        assert!(!err.retryable());
        assert!(!adapter.health_check().await);
    }

    #[tokio::test]
    async fn missing_api_key_leaves_adapter_unavailable() {
        let mut adapter = OpenAiAdapter::new();
        let err = adapter
            .initialize(ProviderConfig::new(Provider::OpenAI))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Initialization);

        let info = adapter.info();
        assert!(!info.is_available);
        assert_eq!(info.model, "gpt-4o-mini");
        assert!(info.last_error.unwrap().contains("API key"));
        assert!(info.supports_json_mode);
    }

    #[tokio::test]
    async fn disabled_provider_is_never_contacted() {
        let mut adapter = OpenAiAdapter::new();
        let config = ProviderConfig::new(Provider::OpenAI)
            .with_api_key("sk-test")
            .with_enabled(false);
        let err = adapter.initialize(config).await.unwrap_err();
        assert!(err.message.contains("disabled"));
        assert!(!adapter.is_available());
    }
}
