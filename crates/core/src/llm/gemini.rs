use crate::domain::{Product, RecommendationResponse};
use crate::llm::http::{self, ProviderDefaults, CONNECTIVITY_TIMEOUT};
use crate::llm::status::AdapterStatus;
use crate::llm::{
    json, prompt, validate_product, AdapterError, AdapterInfo, ErrorKind, Provider,
    ProviderAdapter, ProviderConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const DEFAULTS: ProviderDefaults = ProviderDefaults {
    base_url: "https://generativelanguage.googleapis.com",
    model: "gemini-1.5-flash",
    timeout: Duration::from_secs(15),
    known_models: &[
        "gemini-1.5-flash",
        "gemini-1.5-pro",
        "gemini-2.0-flash",
        "gemini-2.5-flash",
    ],
};

#[derive(Debug, Clone)]
struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl GeminiClient {
    fn from_config(config: &ProviderConfig) -> Result<Self, AdapterError> {
        let api_key = config.require_api_key()?.to_string();
        let timeout = config.timeout.unwrap_or(DEFAULTS.timeout);
        let http = http::build_client(Provider::Gemini, timeout, Default::default())?;

        Ok(Self {
            http,
            api_key,
            base_url: DEFAULTS.base_url(config.base_url.as_deref()),
            model: DEFAULTS.model(Provider::Gemini, config.model.as_deref()),
            max_tokens: config.max_tokens_or_default(),
            temperature: config.temperature_or_default(),
            timeout,
        })
    }

    async fn connect(config: &ProviderConfig) -> Result<Self, AdapterError> {
        config.ensure_enabled()?;
        let client = Self::from_config(config)?;
        let url = format!("{}/v1beta/models", client.base_url);
        let req = client.http.get(url).query(&[("key", client.api_key.as_str())]);
        http::send_json(Provider::Gemini, req, CONNECTIVITY_TIMEOUT)
            .await
            .map_err(http::connectivity_failed)?;
        Ok(client)
    }

    fn request(&self, product: &Product) -> GeminiRequest {
        GeminiRequest {
            system_instruction: Content {
                parts: vec![Part {
                    text: prompt::system_prompt(),
                }],
            },
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt::user_prompt(product),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
                response_mime_type: "application/json",
            },
        }
    }

    async fn recommend(&self, product: &Product) -> Result<RecommendationResponse, AdapterError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let req = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&self.request(product));
        let raw = http::send_json(Provider::Gemini, req, self.timeout).await?;
        recommendations_from_candidates(raw)
    }
}

fn recommendations_from_candidates(raw: Value) -> Result<RecommendationResponse, AdapterError> {
    let res = serde_json::from_value::<GeminiResponse>(raw).map_err(|e| {
        AdapterError::new(
            Provider::Gemini,
            ErrorKind::ResponseFormat,
            format!("failed to decode Gemini response: {e}"),
        )
    })?;

    let text = res
        .candidates
        .first()
        .map(|c| {
            c.content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            AdapterError::new(
                Provider::Gemini,
                ErrorKind::ResponseFormat,
                "Gemini response has no candidate text",
            )
        })?;

    json::parse_recommendations(Provider::Gemini, &text)
}

#[derive(Debug, Default)]
pub struct GeminiAdapter {
    client: Option<GeminiClient>,
    model: Option<String>,
    status: AdapterStatus,
}

impl GeminiAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn ready(&self) -> Result<&GeminiClient, AdapterError> {
        match &self.client {
            Some(client) if self.status.is_available() => Ok(client),
            _ => Err(http::not_available(Provider::Gemini)),
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn initialize(&mut self, config: ProviderConfig) -> Result<(), AdapterError> {
        self.model = config.model.clone();
        match GeminiClient::connect(&config).await {
            Ok(client) => {
                tracing::info!(provider = "gemini", model = %client.model, "adapter initialized");
                self.model = Some(client.model.clone());
                self.client = Some(client);
                self.status.mark_available();
                Ok(())
            }
            Err(err) => {
                tracing::warn!(provider = "gemini", error = %err, "adapter unavailable");
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
        validate_product(Some(Provider::Gemini), product)?;
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
            provider: Provider::Gemini,
            model: self.model.clone().unwrap_or_else(|| DEFAULTS.model.to_string()),
            is_available: self.client.is_some() && status.is_available,
            last_error: status.last_error,
            last_error_at: status.last_error_at,
            supports_json_mode: true,
            supports_streaming: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    #[serde(rename = "systemInstruction")]
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}
