use crate::domain::{Product, RecommendationResponse};
use crate::llm::http::{self, ProviderDefaults, CONNECTIVITY_TIMEOUT};
use crate::llm::{json, prompt, AdapterError, ErrorKind, Provider, ProviderConfig};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    provider: Provider,
    http: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl ChatCompletionsClient {
    pub(crate) fn from_config(
        config: &ProviderConfig,
        defaults: &ProviderDefaults,
    ) -> Result<Self, AdapterError> {
        let provider = config.provider;
        let api_key = config.require_api_key()?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
            AdapterError::new(
                provider,
                ErrorKind::Initialization,
                "API key contains characters not allowed in a header",
            )
        })?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let timeout = config.timeout.unwrap_or(defaults.timeout);
        let http = http::build_client(provider, timeout, headers)?;

        Ok(Self {
            provider,
            http,
            base_url: defaults.base_url(config.base_url.as_deref()),
            model: defaults.model(provider, config.model.as_deref()),
            max_tokens: config.max_tokens_or_default(),
            temperature: config.temperature_or_default(),
            timeout,
        })
    }

    pub(crate) async fn connect(
        config: &ProviderConfig,
        defaults: &ProviderDefaults,
    ) -> Result<Self, AdapterError> {
        config.ensure_enabled()?;
        let client = Self::from_config(config, defaults)?;
        client.list_models().await.map_err(http::connectivity_failed)?;
        Ok(client)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn list_models(&self) -> Result<(), AdapterError> {
        let url = format!("{}/models", self.base_url);
        http::send_json(self.provider, self.http.get(url), CONNECTIVITY_TIMEOUT).await?;
        Ok(())
    }

    fn request(&self, product: &Product) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt::system_prompt(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt::user_prompt(product),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            response_format: Some(ResponseFormat::JsonObject),
        }
    }

    pub(crate) async fn recommend(
        &self,
        product: &Product,
    ) -> Result<RecommendationResponse, AdapterError> {
        let url = format!("{}/chat/completions", self.base_url);
        let req = self.http.post(url).json(&self.request(product));
        let raw = http::send_json(self.provider, req, self.timeout).await?;
        recommendations_from_completion(self.provider, raw)
    }
}

pub(crate) fn recommendations_from_completion(
    provider: Provider,
    raw: Value,
) -> Result<RecommendationResponse, AdapterError> {
    let res = serde_json::from_value::<ChatResponse>(raw).map_err(|e| {
        AdapterError::new(
            provider,
            ErrorKind::ResponseFormat,
            format!("failed to decode chat completion: {e}"),
        )
    })?;

    let choice = res.choices.into_iter().next().ok_or_else(|| {
        AdapterError::new(provider, ErrorKind::ResponseFormat, "chat completion has no choices")
    })?;
    if choice.finish_reason.as_deref() == Some("length") {
        tracing::warn!(%provider, "completion stopped at max_tokens; output may be truncated");
    }

    let content = choice.message.content.unwrap_or_default();
    json::parse_recommendations(provider, &content)
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseFormat {
    JsonObject,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DEFAULTS: ProviderDefaults = ProviderDefaults {
        base_url: "https://api.example.com/v1/",
        model: "gpt-4o-mini",
        timeout: Duration::from_secs(10),
        known_models: &["gpt-4o-mini"],
    };

    #[test]
    fn request_enables_json_mode_and_carries_prompts() {
        let config = ProviderConfig::new(Provider::OpenAI).with_api_key("sk-test");
        let client = ChatCompletionsClient::from_config(&config, &DEFAULTS).unwrap();
        assert_eq!(client.base_url, "https://api.example.com/v1");

        let body = serde_json::to_value(client.request(&Product::named("MacBook Air"))).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["response_format"], json!({"type": "json_object"}));
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("Product name: MacBook Air"));
        assert_eq!(body["max_tokens"], 500);
    }

    #[test]
    fn from_config_requires_an_api_key() {
        let config = ProviderConfig::new(Provider::Grok);
        let err = ChatCompletionsClient::from_config(&config, &DEFAULTS).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Initialization);
        assert_eq!(err.provider, Some(Provider::Grok));
    }

    #[test]
    fn extracts_recommendations_from_first_choice() {
        let raw = json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "{\"recommendations\":[{\"name\":\"AppleCare+\",\"reason\":\"extended coverage\"}]}"
                },
                "finish_reason": "stop"
            }]
        });
        let res = recommendations_from_completion(Provider::OpenAI, raw).unwrap();
        assert_eq!(res.recommendations[0].name, "AppleCare+");
    }

    #[test]
    fn empty_choices_is_a_format_error() {
        let err =
            recommendations_from_completion(Provider::Grok, json!({"choices": []})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ResponseFormat);

        let err = recommendations_from_completion(
            Provider::Grok,
            json!({"choices": [{"message": {"content": null}}]}),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ResponseFormat);
    }

    #[tokio::test]
    async fn connect_fails_when_endpoint_is_unreachable() {
        let config = ProviderConfig::new(Provider::OpenAI)
            .with_api_key("sk-test")
            .with_base_url("http://127.0.0.1:1/v1");
        let err = ChatCompletionsClient::connect(&config, &DEFAULTS).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Initialization);
        assert!(err.message.starts_with("connectivity check failed"));
    }
}
