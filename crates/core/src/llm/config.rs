use crate::llm::{AdapterError, ErrorKind, Provider};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_MAX_TOKENS: u32 = 500;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Per-provider settings. Immutable once handed to an adapter; a new
/// config means re-initializing the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout: Option<Duration>,
    pub base_url: Option<String>,
    pub enabled: Option<bool>,
}

impl ProviderConfig {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            api_key: None,
            model: None,
            max_tokens: None,
            temperature: None,
            timeout: None,
            base_url: None,
            enabled: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn max_tokens_or_default(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn temperature_or_default(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn ensure_enabled(&self) -> Result<(), AdapterError> {
        if self.is_enabled() {
            return Ok(());
        }
        Err(AdapterError::new(
            self.provider,
            ErrorKind::Initialization,
            "provider disabled by configuration",
        ))
    }

    pub fn require_api_key(&self) -> Result<&str, AdapterError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                AdapterError::new(
                    self.provider,
                    ErrorKind::Initialization,
                    format!("API key for {} is not configured", self.provider),
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdapterManagerConfig {
    pub primary_provider: Provider,
    pub fallback_providers: Vec<Provider>,
    pub providers: BTreeMap<Provider, ProviderConfig>,
    pub enable_fallback: bool,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Serve the mock when every configured provider failed.
    pub mock_as_last_resort: bool,
}

impl AdapterManagerConfig {
    pub fn new(primary_provider: Provider) -> Self {
        Self {
            primary_provider,
            fallback_providers: Vec::new(),
            providers: BTreeMap::new(),
            enable_fallback: true,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            mock_as_last_resort: true,
        }
    }

    pub fn with_fallbacks(mut self, fallbacks: impl IntoIterator<Item = Provider>) -> Self {
        self.fallback_providers = fallbacks.into_iter().collect();
        self
    }

    pub fn with_provider(mut self, config: ProviderConfig) -> Self {
        self.providers.insert(config.provider, config);
        self
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_fallback_enabled(mut self, enable_fallback: bool) -> Self {
        self.enable_fallback = enable_fallback;
        self
    }

    pub fn with_mock_as_last_resort(mut self, mock_as_last_resort: bool) -> Self {
        self.mock_as_last_resort = mock_as_last_resort;
        self
    }

    /// `[primary, ...fallbacks]` with duplicates removed, in configured order.
    pub fn cascade(&self) -> Vec<Provider> {
        let mut out = Vec::with_capacity(self.fallback_providers.len() + 1);
        let fallbacks = self.fallback_providers.iter().copied();
        for provider in std::iter::once(self.primary_provider).chain(fallbacks) {
            if !out.contains(&provider) {
                out.push(provider);
            }
        }
        out
    }

    pub fn provider_config(&self, provider: Provider) -> ProviderConfig {
        self.providers
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| ProviderConfig::new(provider))
    }
}

impl Default for AdapterManagerConfig {
    fn default() -> Self {
        Self::new(Provider::OpenAI).with_fallbacks([
            Provider::Grok,
            Provider::Claude,
            Provider::Mock,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_keeps_configured_order_without_duplicates() {
        let config = AdapterManagerConfig::new(Provider::Claude).with_fallbacks([
            Provider::OpenAI,
            Provider::Claude,
            Provider::Mock,
            Provider::OpenAI,
        ]);
        assert_eq!(
            config.cascade(),
            vec![Provider::Claude, Provider::OpenAI, Provider::Mock]
        );
    }

    #[test]
    fn provider_config_defaults_when_missing() {
        let config = AdapterManagerConfig::default()
            .with_provider(ProviderConfig::new(Provider::OpenAI).with_api_key("sk-test"));
        assert_eq!(
            config.provider_config(Provider::OpenAI).api_key.as_deref(),
            Some("sk-test")
        );
        assert_eq!(config.provider_config(Provider::Grok), ProviderConfig::new(Provider::Grok));
    }

    #[test]
    fn require_api_key_rejects_blank_keys() {
        let err = ProviderConfig::new(Provider::OpenAI)
            .with_api_key("  ")
            .require_api_key()
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Initialization);
        assert_eq!(
            ProviderConfig::new(Provider::OpenAI)
                .with_api_key(" sk-1 ")
                .require_api_key()
                .unwrap(),
            "sk-1"
        );
    }

    #[test]
    fn disabled_provider_fails_enable_check() {
        let config = ProviderConfig::new(Provider::Gemini).with_enabled(false);
        assert!(!config.is_enabled());
        assert!(config.ensure_enabled().is_err());
        assert!(ProviderConfig::new(Provider::Gemini).ensure_enabled().is_ok());
    }
}
