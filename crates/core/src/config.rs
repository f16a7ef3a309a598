use crate::llm::config::{DEFAULT_MAX_RETRIES, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::llm::{AdapterManagerConfig, Provider, ProviderConfig};
use anyhow::Context;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_FALLBACKS: &str = "grok,claude,mock";

#[derive(Debug, Clone)]
pub struct Settings {
    pub ai: AdapterManagerConfig,
    pub sentry_dsn: Option<String>,
    pub port: u16,
    pub ignored_fallbacks: Vec<String>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let primary = match get("AI_PRIMARY_PROVIDER") {
            Some(v) => Provider::from_str(&v).context("invalid AI_PRIMARY_PROVIDER")?,
            None => Provider::OpenAI,
        };
        let (fallbacks, ignored_fallbacks) = parse_fallbacks(
            get("AI_FALLBACK_PROVIDERS")
                .as_deref()
                .unwrap_or(DEFAULT_FALLBACKS),
        );

        let max_tokens = parse_or(&get, "AI_MAX_TOKENS", DEFAULT_MAX_TOKENS)?;
        let temperature = parse_or(&get, "AI_TEMPERATURE", DEFAULT_TEMPERATURE)?;
        let max_retries = parse_or(&get, "AI_MAX_RETRIES", DEFAULT_MAX_RETRIES)?;
        let retry_delay_ms = parse_or(&get, "AI_RETRY_DELAY", 1000u64)?;

        let mut ai = AdapterManagerConfig::new(primary)
            .with_fallbacks(fallbacks)
            .with_retries(max_retries, Duration::from_millis(retry_delay_ms))
            .with_fallback_enabled(parse_bool(&get, "AI_ENABLE_FALLBACK", true)?)
            .with_mock_as_last_resort(parse_bool(&get, "AI_MOCK_LAST_RESORT", true)?);

        for provider in [Provider::OpenAI, Provider::Grok, Provider::Claude, Provider::Gemini] {
            let prefix = env_prefix(provider);
            let mut config = ProviderConfig::new(provider);
            config.api_key = api_key_vars(provider).iter().find_map(|key| get(key));
            config.model = get(&format!("{prefix}_MODEL"));
            config.base_url = get(&format!("{prefix}_BASE_URL"));
            config.max_tokens = Some(max_tokens);
            config.temperature = Some(temperature);
            let timeout_var = format!("{prefix}_TIMEOUT_MS");
            if let Some(v) = get(&timeout_var) {
                let ms: u64 = v.parse().with_context(|| format!("invalid {timeout_var}"))?;
                config.timeout = Some(Duration::from_millis(ms));
            }
            ai = ai.with_provider(config);
        }

        Ok(Self {
            ai,
            sentry_dsn: get("SENTRY_DSN"),
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
            ignored_fallbacks,
        })
    }

    /// Logs the ignored fallback entries. Call once tracing is installed.
    pub fn warn_ignored(&self) {
        for name in &self.ignored_fallbacks {
            tracing::warn!(name, "ignoring unknown entry in AI_FALLBACK_PROVIDERS");
        }
    }
}

fn env_prefix(provider: Provider) -> &'static str {
    match provider {
        Provider::OpenAI => "OPENAI",
        Provider::Grok => "GROK",
        Provider::Claude => "CLAUDE",
        Provider::Gemini => "GEMINI",
        Provider::Mock => "MOCK",
    }
}

fn api_key_vars(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::OpenAI => &["OPENAI_API_KEY"],
        Provider::Grok => &["GROK_API_KEY", "XAI_API_KEY"],
        Provider::Claude => &["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"],
        Provider::Gemini => &["GEMINI_API_KEY"],
        Provider::Mock => &[],
    }
}

fn parse_fallbacks(raw: &str) -> (Vec<Provider>, Vec<String>) {
    let mut known = Vec::new();
    let mut ignored = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match Provider::from_str(name) {
            Ok(provider) => known.push(provider),
            Err(_) => ignored.push(name.to_string()),
        }
    }
    (known, ignored)
}

fn parse_or<T>(get: impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(v) => v.parse().with_context(|| format!("invalid {key}: {v:?}")),
        None => Ok(default),
    }
}

fn parse_bool(
    get: impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> anyhow::Result<bool> {
    let Some(v) = get(key) else {
        return Ok(default);
    };
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("invalid {key}: {v:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_any_variables() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.ai.primary_provider, Provider::OpenAI);
        assert_eq!(
            s.ai.fallback_providers,
            vec![Provider::Grok, Provider::Claude, Provider::Mock]
        );
        assert!(s.ai.enable_fallback);
        assert!(s.ai.mock_as_last_resort);
        assert_eq!(s.ai.max_retries, 2);
        assert_eq!(s.ai.retry_delay, Duration::from_millis(1000));
        assert_eq!(s.port, 3000);
        assert!(s.sentry_dsn.is_none());
        assert!(s.ai.provider_config(Provider::OpenAI).api_key.is_none());
        assert!(s.ignored_fallbacks.is_empty());
    }

    #[test]
    fn reads_provider_keys_and_overrides() {
        let s = settings(&[
            ("AI_PRIMARY_PROVIDER", "anthropic"),
            ("AI_FALLBACK_PROVIDERS", "gemini, llama ,mock"),
            ("AI_ENABLE_FALLBACK", "false"),
            ("AI_RETRY_DELAY", "250"),
            ("CLAUDE_API_KEY", "sk-ant-test"),
            ("CLAUDE_MODEL", "claude-3-5-sonnet-latest"),
            ("XAI_API_KEY", "xai-test"),
            ("GEMINI_TIMEOUT_MS", "4000"),
            ("PORT", "8080"),
        ])
        .unwrap();

        assert_eq!(s.ai.primary_provider, Provider::Claude);
        assert_eq!(s.ai.fallback_providers, vec![Provider::Gemini, Provider::Mock]);
        assert_eq!(s.ignored_fallbacks, vec!["llama".to_string()]);
        assert!(!s.ai.enable_fallback);
        assert_eq!(s.ai.retry_delay, Duration::from_millis(250));
        assert_eq!(s.port, 8080);

        let claude = s.ai.provider_config(Provider::Claude);
        assert_eq!(claude.api_key.as_deref(), Some("sk-ant-test"));
        assert_eq!(claude.model.as_deref(), Some("claude-3-5-sonnet-latest"));
        assert_eq!(
            s.ai.provider_config(Provider::Grok).api_key.as_deref(),
            Some("xai-test")
        );
        assert_eq!(
            s.ai.provider_config(Provider::Gemini).timeout,
            Some(Duration::from_millis(4000))
        );
    }

    #[test]
    fn primary_key_wins_over_alias() {
        let s = settings(&[
            ("ANTHROPIC_API_KEY", "primary"),
            ("CLAUDE_API_KEY", "alias"),
        ])
        .unwrap();
        assert_eq!(
            s.ai.provider_config(Provider::Claude).api_key.as_deref(),
            Some("primary")
        );
    }

    #[test]
    fn invalid_values_are_startup_errors() {
        assert!(settings(&[("AI_PRIMARY_PROVIDER", "llama")]).is_err());
        assert!(settings(&[("AI_MAX_RETRIES", "many")]).is_err());
        assert!(settings(&[("AI_ENABLE_FALLBACK", "maybe")]).is_err());
        assert!(settings(&[("OPENAI_TIMEOUT_MS", "-1")]).is_err());
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let s = settings(&[("AI_PRIMARY_PROVIDER", "  "), ("OPENAI_API_KEY", "")]).unwrap();
        assert_eq!(s.ai.primary_provider, Provider::OpenAI);
        assert!(s.ai.provider_config(Provider::OpenAI).api_key.is_none());
    }
}
