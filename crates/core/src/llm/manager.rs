use crate::domain::{Product, RecommendationResponse};
use crate::llm::events::EventBus;
use crate::llm::mock::MockAdapter;
use crate::llm::{
    adapter_for, validate_product, AdapterError, AdapterInfo, AdapterManagerConfig, ErrorKind,
    ManagerEvent, Provider, ProviderAdapter, HEALTH_CHECK_TIMEOUT,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub checked_at: DateTime<Utc>,
    pub providers: BTreeMap<Provider, bool>,
}

impl HealthReport {
    pub fn is_healthy(&self, provider: Provider) -> bool {
        self.providers.get(&provider).copied().unwrap_or(false)
    }

    pub fn any_healthy(&self) -> bool {
        self.providers.values().any(|healthy| *healthy)
    }
}

pub struct AdapterManager {
    config: AdapterManagerConfig,
    adapters: BTreeMap<Provider, Box<dyn ProviderAdapter>>,
    backstop: MockAdapter,
    active: RwLock<Option<Provider>>,
    last_success: RwLock<Option<Provider>>,
    failing: RwLock<BTreeSet<Provider>>,
    events: EventBus,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl AdapterManager {
    /// Builds and initializes an adapter for every provider in the cascade.
    /// Providers that fail to initialize stay unavailable; this never fails.
    pub async fn initialize(config: AdapterManagerConfig) -> Self {
        let adapters = config.cascade().into_iter().map(adapter_for).collect();
        Self::with_adapters(config, adapters).await
    }

    pub async fn with_adapters(
        config: AdapterManagerConfig,
        mut adapters: Vec<Box<dyn ProviderAdapter>>,
    ) -> Self {
        join_all(adapters.iter_mut().map(|adapter| {
            let provider_config = config.provider_config(adapter.provider());
            async move {
                let provider = adapter.provider();
                if let Err(err) = adapter.initialize(provider_config).await {
                    tracing::debug!(
                        %provider,
                        kind = err.kind.as_str(),
                        "provider left out of rotation"
                    );
                }
            }
        }))
        .await;

        let adapters: BTreeMap<_, _> = adapters
            .into_iter()
            .map(|adapter| (adapter.provider(), adapter))
            .collect();

        let active = config
            .cascade()
            .into_iter()
            .find(|p| adapters.get(p).is_some_and(|a| a.is_available()));

        let available: Vec<_> = adapters
            .values()
            .filter(|a| a.is_available())
            .map(|a| a.provider())
            .collect();
        match active {
            Some(provider) => {
                tracing::info!(active = %provider, ?available, "adapter manager initialized");
            }
            None => {
                tracing::warn!(
                    primary = %config.primary_provider,
                    "no provider available; requests will be served by the mock backstop"
                );
            }
        }

        Self {
            config,
            adapters,
            backstop: MockAdapter::new(),
            active: RwLock::new(active),
            last_success: RwLock::new(None),
            failing: RwLock::new(BTreeSet::new()),
            events: EventBus::new(),
        }
    }

    pub fn config(&self) -> &AdapterManagerConfig {
        &self.config
    }

    pub fn active_provider(&self) -> Option<Provider> {
        *read(&self.active)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.events.subscribe()
    }

    pub fn info(&self) -> Vec<AdapterInfo> {
        let cascade = self.config.cascade();
        let extras: Vec<_> = self
            .adapters
            .keys()
            .copied()
            .filter(|p| !cascade.contains(p))
            .collect();
        cascade
            .into_iter()
            .chain(extras)
            .filter_map(|p| self.adapters.get(&p))
            .map(|a| a.info())
            .collect()
    }

    pub fn backstop(&self, product: &Product) -> RecommendationResponse {
        self.backstop.recommend(product)
    }

    pub async fn generate_recommendations(
        &self,
        product: &Product,
    ) -> Result<RecommendationResponse, AdapterError> {
        self.generate_with_provider(product)
            .await
            .map(|(_, res)| res)
    }

    /// Runs the fallback cascade and reports which provider answered.
    pub async fn generate_with_provider(
        &self,
        product: &Product,
    ) -> Result<(Provider, RecommendationResponse), AdapterError> {
        validate_product(None, product)?;

        let order = self.attempt_order();
        let first = order.first().copied();
        let max_attempts = if self.config.enable_fallback {
            self.config.max_retries.saturating_add(1)
        } else {
            1
        };

        let mut attempted = Vec::new();
        let mut last_error = None;
        for provider in order {
            let Some(adapter) = self.adapters.get(&provider) else {
                continue;
            };
            if !adapter.is_available() {
                tracing::debug!(%provider, "skipping unavailable provider");
                continue;
            }
            attempted.push(provider);

            match self.attempt(adapter.as_ref(), product, max_attempts).await {
                Ok(res) => {
                    self.record_success(provider, first);
                    return Ok((provider, res));
                }
                Err(err) if err.kind == ErrorKind::InvalidInput => return Err(err),
                Err(err) => {
                    write(&self.failing).insert(provider);
                    last_error = Some(err);
                    if !self.config.enable_fallback {
                        break;
                    }
                }
            }
        }

        self.events.emit(ManagerEvent::AllProvidersFailed {
            attempted: attempted.clone(),
        });

        if !self.config.enable_fallback {
            return Err(last_error.unwrap_or_else(|| AdapterError {
                provider: None,
                kind: ErrorKind::NotAvailable,
                message: "no active provider and fallback is disabled".to_string(),
                code: None,
            }));
        }

        if self.config.mock_as_last_resort && !attempted.contains(&Provider::Mock) {
            self.events.emit(ManagerEvent::FallbackActivated {
                from: attempted.last().copied(),
                to: Provider::Mock,
            });
            return Ok((Provider::Mock, self.backstop.recommend(product)));
        }

        let message = match &last_error {
            Some(err) => format!(
                "all providers failed ({}); last error: {}",
                join_names(&attempted),
                err.message
            ),
            None => "no provider available".to_string(),
        };
        Err(AdapterError::exhausted(message))
    }

    /// Makes `provider` the first one tried. Fails when it is not configured
    /// or currently unavailable.
    pub fn switch_provider(&self, provider: Provider) -> bool {
        let Some(adapter) = self.adapters.get(&provider) else {
            tracing::warn!(%provider, "cannot switch to unconfigured provider");
            return false;
        };
        if !adapter.is_available() {
            tracing::warn!(%provider, "cannot switch to unavailable provider");
            return false;
        }

        let previous = write(&self.active).replace(provider);
        self.events.emit(ManagerEvent::ProviderSwitched {
            from: previous,
            to: provider,
        });
        true
    }

    pub async fn health_status(&self) -> HealthReport {
        let checks = self.adapters.iter().map(|(provider, adapter)| async move {
            let healthy = tokio::time::timeout(HEALTH_CHECK_TIMEOUT, adapter.health_check())
                .await
                .unwrap_or(false);
            (*provider, healthy)
        });
        let providers = join_all(checks).await.into_iter().collect();

        HealthReport {
            checked_at: Utc::now(),
            providers,
        }
    }

    fn attempt_order(&self) -> Vec<Provider> {
        let active = self.active_provider();
        let mut order: Vec<Provider> = active.into_iter().collect();
        if self.config.enable_fallback {
            order.extend(
                self.config
                    .cascade()
                    .into_iter()
                    .filter(|p| Some(*p) != active),
            );
        }
        order
    }

    async fn attempt(
        &self,
        adapter: &dyn ProviderAdapter,
        product: &Product,
        max_attempts: u32,
    ) -> Result<RecommendationResponse, AdapterError> {
        let provider = adapter.provider();
        let mut attempt = 1;
        loop {
            let err = match adapter.generate_recommendations(product).await {
                Ok(res) if !res.recommendations.is_empty() => return Ok(res),
                Ok(_) => AdapterError::new(
                    provider,
                    ErrorKind::ResponseFormat,
                    "provider returned no recommendations",
                ),
                Err(err) => err,
            };

            self.events.emit(ManagerEvent::ProviderFailed {
                provider,
                kind: err.kind,
                retryable: err.retryable(),
                attempt,
                message: err.message.clone(),
            });
            if matches!(err.kind, ErrorKind::Auth | ErrorKind::ModelNotFound) {
                adapter.mark_unavailable(&err);
            }
            if !err.retryable() || attempt >= max_attempts {
                return Err(err);
            }

            tokio::time::sleep(self.config.retry_delay).await;
            attempt += 1;
        }
    }

    // Fallback and switch events fire on transitions only.
    fn record_success(&self, provider: Provider, first: Option<Provider>) {
        if write(&self.failing).remove(&provider) {
            self.events.emit(ManagerEvent::ProviderRecovered { provider });
        }

        let previous = write(&self.last_success).replace(provider);
        if previous == Some(provider) {
            return;
        }
        if first != Some(provider) {
            self.events.emit(ManagerEvent::FallbackActivated {
                from: first,
                to: provider,
            });
        }
        if previous.is_some() {
            self.events.emit(ManagerEvent::ProviderSwitched {
                from: previous,
                to: provider,
            });
        }
    }
}

fn join_names(providers: &[Provider]) -> String {
    providers
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
