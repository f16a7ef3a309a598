use crate::domain::{Product, RecommendationResponse};
use crate::llm::http::{self, ProviderDefaults, CONNECTIVITY_TIMEOUT};
use crate::llm::status::AdapterStatus;
use crate::llm::{
    json, prompt, validate, validate_product, AdapterError, AdapterInfo, ErrorKind, Provider,
    ProviderAdapter, ProviderConfig,
};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

const DEFAULTS: ProviderDefaults = ProviderDefaults {
    base_url: "https://api.anthropic.com",
    model: "claude-3-5-haiku-latest",
    timeout: Duration::from_secs(15),
    known_models: &[
        "claude-3-5-haiku-latest",
        "claude-3-5-sonnet-latest",
        "claude-3-7-sonnet-latest",
        "claude-3-opus-latest",
        "claude-3-haiku-20240307",
    ],
};

const TOOL_NAME_EMIT_RECOMMENDATIONS: &str = "emit_recommendations";

#[derive(Debug, Clone)]
struct ClaudeClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl ClaudeClient {
    fn from_config(config: &ProviderConfig) -> Result<Self, AdapterError> {
        let api_key = config.require_api_key()?;

        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key).map_err(|_| {
            AdapterError::new(
                Provider::Claude,
                ErrorKind::Initialization,
                "API key contains characters not allowed in a header",
            )
        })?;
        key.set_sensitive(true);
        headers.insert("x-api-key", key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let timeout = config.timeout.unwrap_or(DEFAULTS.timeout);
        let http = http::build_client(Provider::Claude, timeout, headers)?;

        Ok(Self {
            http,
            base_url: DEFAULTS.base_url(config.base_url.as_deref()),
            model: DEFAULTS.model(Provider::Claude, config.model.as_deref()),
            max_tokens: config.max_tokens_or_default(),
            temperature: config.temperature_or_default(),
            timeout,
        })
    }

    async fn connect(config: &ProviderConfig) -> Result<Self, AdapterError> {
        config.ensure_enabled()?;
        let client = Self::from_config(config)?;
        let url = format!("{}/v1/models", client.base_url);
        http::send_json(Provider::Claude, client.http.get(url), CONNECTIVITY_TIMEOUT)
            .await
            .map_err(http::connectivity_failed)?;
        Ok(client)
    }

    fn request(&self, product: &Product) -> CreateMessageRequest {
        CreateMessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: Some(prompt::system_prompt()),
            messages: vec![Message {
                role: "user",
                content: prompt::user_prompt(product),
            }],
            tools: Some(tools()),
            tool_choice: Some(ToolChoice::Tool {
                name: TOOL_NAME_EMIT_RECOMMENDATIONS,
            }),
        }
    }

    async fn create_message(
        &self,
        req: &CreateMessageRequest,
    ) -> Result<CreateMessageResponse, AdapterError> {
        let url = format!("{}/v1/messages", self.base_url);
        let request = self.http.post(url).json(req);
        let raw = http::send_json(Provider::Claude, request, self.timeout).await?;
        serde_json::from_value::<CreateMessageResponse>(raw).map_err(|e| {
            AdapterError::new(
                Provider::Claude,
                ErrorKind::ResponseFormat,
                format!("failed to decode Claude response: {e}"),
            )
        })
    }

    async fn recommend(&self, product: &Product) -> Result<RecommendationResponse, AdapterError> {
        let res = self.create_message(&self.request(product)).await?;
        if matches!(res.stop_reason.as_deref(), Some("max_tokens")) {
            tracing::warn!(
                provider = "claude",
                max_tokens = self.max_tokens,
                "Claude stop_reason=max_tokens; output may be truncated"
            );
        }
        recommendations_from_message(&res)
    }
}

fn tools() -> Vec<Tool> {
    let schema = serde_json::json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["recommendations"],
        "properties": {
            "recommendations": {
                "type": "array",
                "minItems": 1,
                "maxItems": 4,
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["name", "reason"],
                    "properties": {
                        "name": {"type": "string"},
                        "reason": {"type": "string"}
                    }
                }
            }
        }
    });

    vec![Tool {
        name: TOOL_NAME_EMIT_RECOMMENDATIONS,
        description: "Emit the product recommendations as structured JSON",
        input_schema: schema,
    }]
}

/// Prefers the forced tool call; falls back to text blocks.
fn recommendations_from_message(
    res: &CreateMessageResponse,
) -> Result<RecommendationResponse, AdapterError> {
    if let Some(input) = tool_input(res) {
        return validate::validate_response(Provider::Claude, input);
    }
    json::parse_recommendations(Provider::Claude, &response_text(res))
}

fn tool_input(res: &CreateMessageResponse) -> Option<&serde_json::Value> {
    res.content.iter().find_map(|block| match block {
        ContentBlock::ToolUse { name, input } if name == TOOL_NAME_EMIT_RECOMMENDATIONS => {
            Some(input)
        }
        _ => None,
    })
}

fn response_text(res: &CreateMessageResponse) -> String {
    let mut out = String::new();
    for block in &res.content {
        if let ContentBlock::Text { text } = block {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(text);
        }
    }
    out
}

#[derive(Debug, Default)]
pub struct ClaudeAdapter {
    client: Option<ClaudeClient>,
    model: Option<String>,
    status: AdapterStatus,
}

impl ClaudeAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn ready(&self) -> Result<&ClaudeClient, AdapterError> {
        match &self.client {
            Some(client) if self.status.is_available() => Ok(client),
            _ => Err(http::not_available(Provider::Claude)),
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for ClaudeAdapter {
    fn provider(&self) -> Provider {
        Provider::Claude
    }

    async fn initialize(&mut self, config: ProviderConfig) -> Result<(), AdapterError> {
        self.model = config.model.clone();
        match ClaudeClient::connect(&config).await {
            Ok(client) => {
                tracing::info!(provider = "claude", model = %client.model, "adapter initialized");
                self.model = Some(client.model.clone());
                self.client = Some(client);
                self.status.mark_available();
                Ok(())
            }
            Err(err) => {
                tracing::warn!(provider = "claude", error = %err, "adapter unavailable");
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
        validate_product(Some(Provider::Claude), product)?;
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
            provider: Provider::Claude,
            model: self.model.clone().unwrap_or_else(|| DEFAULTS.model.to_string()),
            is_available: self.client.is_some() && status.is_available,
            last_error: status.last_error,
            last_error_at: status.last_error_at,
            supports_json_mode: false,
            supports_streaming: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Tool {
    name: &'static str,
    description: &'static str,
    input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ToolChoice {
    #[serde(rename = "tool")]
    Tool { name: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    #[serde(other)]
    Unknown,
}
