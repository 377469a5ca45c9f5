use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    routing::post,
    Json, Router,
};
use joblab_agent::{AgentRuntime, CvMatcher};
use joblab_core::errors::{ApplicationError, InterfaceError};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, warn};

use crate::health::{self, HealthState};
use crate::{ask, cv_match};

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<AgentRuntime>,
    /// Absent when no embedding service is configured.
    pub matcher: Option<Arc<CvMatcher>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub error: String,
    pub detail: String,
    pub correlation_id: String,
}

pub type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Maps an application failure onto the HTTP boundary: validation problems
/// are 400s, upstream outages 503s, everything else 500.
pub fn reject(error: ApplicationError, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    let interface = error.into_interface(correlation_id);
    let status = StatusCode::from_u16(interface.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let detail = match &interface {
        InterfaceError::BadRequest { message, .. }
        | InterfaceError::ServiceUnavailable { message, .. }
        | InterfaceError::Internal { message, .. } => message.clone(),
    };

    if status.is_server_error() {
        error!(
            event_name = "api.request.failed",
            correlation_id,
            status = status.as_u16(),
            detail = %detail,
            "request failed"
        );
    } else {
        warn!(
            event_name = "api.request.rejected",
            correlation_id,
            detail = %detail,
            "request rejected"
        );
    }

    (
        status,
        Json(ApiError {
            error: interface.user_message().to_owned(),
            detail,
            correlation_id: interface.correlation_id().to_owned(),
        }),
    )
}

pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> =
        origins.iter().filter_map(|origin| HeaderValue::from_str(origin.trim()).ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

pub fn router(state: AppState, health: HealthState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/ai/ask", post(ask::ask))
        .route("/ai/match-cv", post(cv_match::match_cv))
        .with_state(state)
        .merge(health::router(health))
        .layer(cors_layer(cors_origins))
}
