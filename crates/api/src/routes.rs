use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use storefront_ai_core::domain::{Product, Recommendation};
use storefront_ai_core::llm::{
    AdapterError, AdapterInfo, AdapterManager, ApiError, ErrorKind, HealthReport, Provider,
};

const RECOMMEND_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_PRODUCT_NAME_CHARS: usize = 200;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<AdapterManager>,
}

#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/recommendations", post(recommend))
        .route("/api/providers", get(providers))
        .route("/api/providers/health", get(providers_health))
        .route("/api/providers/active", post(switch_provider))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
            let request_id = req
                .extensions()
                .get::<RequestId>()
                .map(|id| id.0.to_string())
                .unwrap_or_default();
            tracing::info_span!("http", method = %req.method(), uri = %req.uri(), %request_id)
        }))
        .layer(middleware::from_fn(assign_request_id))
}

async fn assign_request_id(mut req: Request, next: Next) -> Response {
    let id = Uuid::new_v4();
    req.extensions_mut().insert(RequestId(id));
    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        res.headers_mut().insert("x-request-id", value);
    }
    res
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendRequest {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
}

impl RecommendRequest {
    fn into_product(self) -> Result<Product, AdapterError> {
        let name = self.product_name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(AdapterError::invalid_input(None, "productName is required"));
        }
        if name.chars().count() > MAX_PRODUCT_NAME_CHARS {
            return Err(AdapterError::invalid_input(
                None,
                format!("productName must be at most {MAX_PRODUCT_NAME_CHARS} characters"),
            ));
        }

        Ok(Product {
            id: None,
            name: name.to_string(),
            description: self.description,
            price: self.price,
            category: self.category,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendResponse {
    pub recommendations: Vec<Recommendation>,
    pub provider: Provider,
    pub request_id: Uuid,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

pub async fn recommend(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    body: Result<Json<RecommendRequest>, JsonRejection>,
) -> ApiResult<RecommendResponse> {
    let Json(req) =
        body.map_err(|e| error_response(&AdapterError::invalid_input(None, e.body_text())))?;
    let product = req.into_product().map_err(|e| error_response(&e))?;

    let span = tracing::info_span!("recommend", %request_id, product = %product.name);
    async move {
        let outcome = tokio::time::timeout(
            RECOMMEND_TIMEOUT,
            state.manager.generate_with_provider(&product),
        )
        .await
        .unwrap_or_else(|_| {
            Err(AdapterError {
                provider: None,
                kind: ErrorKind::Timeout,
                message: format!("no answer within {}s", RECOMMEND_TIMEOUT.as_secs()),
                code: None,
            })
        });

        match outcome {
            Ok((provider, res)) => {
                tracing::info!(
                    %provider,
                    count = res.recommendations.len(),
                    "recommendations served"
                );
                Ok(Json(RecommendResponse {
                    recommendations: res.recommendations,
                    provider,
                    request_id,
                    degraded: false,
                }))
            }
            Err(err) if err.kind == ErrorKind::InvalidInput => Err(error_response(&err)),
            Err(err) if state.manager.config().mock_as_last_resort => {
                tracing::warn!(error = %err, "degrading to mock recommendations");
                let res = state.manager.backstop(&product);
                Ok(Json(RecommendResponse {
                    recommendations: res.recommendations,
                    provider: Provider::Mock,
                    request_id,
                    degraded: true,
                }))
            }
            Err(err) => {
                sentry_anyhow::capture_anyhow(&anyhow::Error::new(err.clone()));
                tracing::error!(error = %err, "recommendation request failed");
                Err(error_response(&err))
            }
        }
    }
    .instrument(span)
    .await
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersResponse {
    pub active_provider: Option<Provider>,
    pub primary_provider: Provider,
    pub fallback_providers: Vec<Provider>,
    pub enable_fallback: bool,
    pub providers: Vec<AdapterInfo>,
}

pub async fn providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let config = state.manager.config();
    Json(ProvidersResponse {
        active_provider: state.manager.active_provider(),
        primary_provider: config.primary_provider,
        fallback_providers: config.fallback_providers.clone(),
        enable_fallback: config.enable_fallback,
        providers: state.manager.info(),
    })
}

pub async fn providers_health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.manager.health_status().await)
}

#[derive(Debug, Deserialize)]
pub struct SwitchRequest {
    pub provider: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchResponse {
    pub active_provider: Provider,
}

pub async fn switch_provider(
    State(state): State<AppState>,
    body: Result<Json<SwitchRequest>, JsonRejection>,
) -> ApiResult<SwitchResponse> {
    let Json(req) =
        body.map_err(|e| error_response(&AdapterError::invalid_input(None, e.body_text())))?;
    let provider = Provider::from_str(&req.provider)
        .map_err(|e| error_response(&AdapterError::invalid_input(None, e.to_string())))?;

    if !state.manager.switch_provider(provider) {
        let err = AdapterError::new(
            provider,
            ErrorKind::NotAvailable,
            format!("provider {provider} is not available"),
        );
        return Err((StatusCode::CONFLICT, Json(err.to_api_error())));
    }
    Ok(Json(SwitchResponse {
        active_provider: provider,
    }))
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::AllProvidersExhausted | ErrorKind::NotAvailable => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &AdapterError) -> (StatusCode, Json<ApiError>) {
    (status_for(err.kind), Json(err.to_api_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_ai_core::llm::AdapterManagerConfig;

    async fn state(config: AdapterManagerConfig) -> AppState {
        let config = config.with_retries(0, Duration::ZERO);
        AppState {
            manager: Arc::new(AdapterManager::initialize(config).await),
        }
    }

    fn request(name: &str) -> Result<Json<RecommendRequest>, JsonRejection> {
        Ok(Json(RecommendRequest {
            product_name: Some(name.to_string()),
            description: None,
            price: Some(999.0),
            category: None,
        }))
    }

    fn request_id() -> Extension<RequestId> {
        Extension(RequestId(Uuid::new_v4()))
    }

    #[tokio::test]
    async fn serves_mock_recommendations_without_keys() {
        let state = state(AdapterManagerConfig::default()).await;
        let Json(res) = recommend(State(state), request_id(), request("  MacBook Air  "))
            .await
            .unwrap();
        assert_eq!(res.provider, Provider::Mock);
        assert_eq!(res.recommendations[0].name, "MacBook Pro");
        assert!(!res.degraded);

        let json = serde_json::to_value(&res).unwrap();
        assert!(json.get("requestId").is_some());
        assert!(json.get("degraded").is_none());
    }

    #[tokio::test]
    async fn rejects_blank_and_oversized_names() {
        let state = state(AdapterManagerConfig::default()).await;

        let (status, Json(body)) = recommend(State(state.clone()), request_id(), request("   "))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "invalid_input");
        assert!(!body.retryable);

        let long = "x".repeat(201);
        let (status, _) = recommend(State(state.clone()), request_id(), request(&long))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let exact = "x".repeat(200);
        assert!(recommend(State(state), request_id(), request(&exact)).await.is_ok());
    }

    #[tokio::test]
    async fn degrades_to_mock_when_the_core_fails() {
        let config = AdapterManagerConfig::new(Provider::OpenAI).with_fallback_enabled(false);
        let Json(res) = recommend(State(state(config).await), request_id(), request("iPhone 15"))
            .await
            .unwrap();
        assert_eq!(res.provider, Provider::Mock);
        assert!(res.degraded);
        assert_eq!(res.recommendations[0].name, "AirPods Pro");
    }

    #[tokio::test]
    async fn surfaces_503_when_degrading_is_disabled() {
        let config = AdapterManagerConfig::new(Provider::OpenAI)
            .with_fallback_enabled(false)
            .with_mock_as_last_resort(false);
        let state = state(config).await;
        let (status, Json(body)) = recommend(State(state), request_id(), request("iPhone 15"))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.error, "not_available");
    }

    #[tokio::test]
    async fn switching_validates_the_target() {
        let state = state(AdapterManagerConfig::default()).await;
        let switch = |name: &str| -> Result<Json<SwitchRequest>, JsonRejection> {
            Ok(Json(SwitchRequest {
                provider: name.to_string(),
            }))
        };

        let (status, _) = switch_provider(State(state.clone()), switch("llama"))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, Json(body)) = switch_provider(State(state.clone()), switch("openai"))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.provider, Some(Provider::OpenAI));

        let Json(res) = switch_provider(State(state), switch("mock")).await.unwrap();
        assert_eq!(res.active_provider, Provider::Mock);
    }

    #[tokio::test]
    async fn lists_providers_and_health() {
        let state = state(AdapterManagerConfig::default()).await;

        let Json(res) = providers(State(state.clone())).await;
        assert_eq!(res.active_provider, Some(Provider::Mock));
        assert_eq!(res.primary_provider, Provider::OpenAI);
        assert_eq!(res.providers.len(), 4);

        let Json(report) = providers_health(State(state)).await;
        assert!(report.is_healthy(Provider::Mock));
        assert!(!report.is_healthy(Provider::OpenAI));
    }

    #[test]
    fn maps_error_kinds_to_statuses() {
        assert_eq!(status_for(ErrorKind::AllProvidersExhausted), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(ErrorKind::Timeout), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_for(ErrorKind::InvalidInput), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Server), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
