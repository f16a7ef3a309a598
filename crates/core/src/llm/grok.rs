use crate::domain::{Product, RecommendationResponse};
use crate::llm::chat_completions::ChatCompletionsClient;
use crate::llm::http::{self, ProviderDefaults};
use crate::llm::status::AdapterStatus;
use crate::llm::{
    validate_product, AdapterError, AdapterInfo, Provider, ProviderAdapter, ProviderConfig,
};
use std::time::Duration;

const DEFAULTS: ProviderDefaults = ProviderDefaults {
    base_url: "https://api.x.ai/v1",
    model: "grok-2-latest",
    timeout: Duration::from_secs(15),
    known_models: &["grok-2-latest", "grok-2", "grok-beta", "grok-3", "grok-3-mini"],
};

#[derive(Debug, Default)]
pub struct GrokAdapter {
    client: Option<ChatCompletionsClient>,
    model: Option<String>,
    status: AdapterStatus,
}

impl GrokAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn ready(&self) -> Result<&ChatCompletionsClient, AdapterError> {
        match &self.client {
            Some(client) if self.status.is_available() => Ok(client),
            _ => Err(http::not_available(Provider::Grok)),
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for GrokAdapter {
    fn provider(&self) -> Provider {
        Provider::Grok
    }

    async fn initialize(&mut self, config: ProviderConfig) -> Result<(), AdapterError> {
        self.model = config.model.clone();
        match ChatCompletionsClient::connect(&config, &DEFAULTS).await {
            Ok(client) => {
                tracing::info!(provider = "grok", model = client.model(), "adapter initialized");
                self.model = Some(client.model().to_string());
                self.client = Some(client);
                self.status.mark_available();
                Ok(())
            }
            Err(err) => {
                tracing::warn!(provider = "grok", error = %err, "adapter unavailable");
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
        validate_product(Some(Provider::Grok), product)?;
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
            provider: Provider::Grok,
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
    async fn uninitialized_adapter_reports_not_available() {
        let adapter = GrokAdapter::new();
        let err = adapter
            .generate_recommendations(&Product::named("iPhone 15"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotAvailable);
        assert_eq!(err.provider, Some(Provider::Grok));
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_initialization() {
        let mut adapter = GrokAdapter::new();
        let config = ProviderConfig::new(Provider::Grok)
            .with_api_key("xai-test")
            .with_model("grok-2")
            .with_base_url("http://127.0.0.1:1/v1");
        let err = adapter.initialize(config).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Initialization);

        let info = adapter.info();
        assert_eq!(info.provider, Provider::Grok);
        assert_eq!(info.model, "grok-2");
        assert!(!info.is_available);
        assert!(info.last_error.is_some());
    }
}
