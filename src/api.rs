//! HTTP surface for the registry.
//!
//! Every response uses the `{ success, value | error }` envelope existing
//! callers expect. Error codes are the registry's own (`err-not-found`,
//! `err-unauthorized`), plus `err-invalid-body` for payloads that do not
//! parse.

use crate::equipment::{Equipment, NewEquipment};
use crate::error::RegistryError;
use crate::registry::EquipmentRegistry;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(value: T) -> Self {
        Self {
            success: true,
            value: Some(value),
            error: None,
            message: None,
        }
    }

    fn err(code: &str, message: String) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(code.to_string()),
            message: Some(message),
        }
    }
}

pub const INVALID_BODY_CODE: &str = "err-invalid-body";

/// Error carried out of a handler
#[derive(Debug)]
pub enum ApiError {
    Registry(RegistryError),
    /// JSON body missing, malformed, or of the wrong shape
    InvalidBody { status: StatusCode, detail: String },
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        ApiError::Registry(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Registry(RegistryError::NotFound { .. }) => StatusCode::NOT_FOUND,
            // Out-of-range value, whatever the code string says
            ApiError::Registry(RegistryError::Unauthorized { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::InvalidBody { status, .. } => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ApiError::Registry(err) => {
                tracing::debug!(error = %err, "request rejected");
                ApiResponse::<()>::err(err.code(), err.to_string())
            }
            ApiError::InvalidBody { detail, .. } => {
                tracing::debug!(%detail, "request body rejected");
                ApiResponse::<()>::err(INVALID_BODY_CODE, detail)
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Unwrap a JSON body for a call on `id`.
///
/// An unknown id reports `NotFound` even when the body is also bad.
fn body_for<T>(
    registry: &EquipmentRegistry,
    id: u64,
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, ApiError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            registry.get_equipment(id)?;
            Err(rejection.into())
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthScoreUpdate {
    // Wider than the stored score so oversized values reach the range check
    #[serde(rename = "health-score", alias = "healthScore")]
    pub health_score: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/equipment - add-equipment
async fn add_equipment(
    State(registry): State<EquipmentRegistry>,
    payload: Result<Json<NewEquipment>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(new) = payload?;
    let id = registry.add_equipment(new);
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(id))))
}

/// GET /api/equipment - all records
async fn list_equipment(State(registry): State<EquipmentRegistry>) -> Json<ApiResponse<Vec<Equipment>>> {
    Json(ApiResponse::ok(registry.all_equipment()))
}

/// GET /api/equipment/count - get-equipment-count
async fn equipment_count(State(registry): State<EquipmentRegistry>) -> Json<ApiResponse<u64>> {
    Json(ApiResponse::ok(registry.get_equipment_count()))
}

/// GET /api/equipment/:id - get-equipment
async fn get_equipment(
    State(registry): State<EquipmentRegistry>,
    Path(id): Path<u64>,
) -> ApiResult<Equipment> {
    let equipment = registry.get_equipment(id)?;
    Ok(Json(ApiResponse::ok(equipment)))
}

/// PUT /api/equipment/:id/health-score - update-health-score
async fn update_health_score(
    State(registry): State<EquipmentRegistry>,
    Path(id): Path<u64>,
    payload: Result<Json<HealthScoreUpdate>, JsonRejection>,
) -> ApiResult<bool> {
    let update = body_for(&registry, id, payload)?;
    let updated = registry.update_health_score(id, update.health_score)?;
    Ok(Json(ApiResponse::ok(updated)))
}

/// PUT /api/equipment/:id/status - update-status
async fn update_status(
    State(registry): State<EquipmentRegistry>,
    Path(id): Path<u64>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> ApiResult<bool> {
    let update = body_for(&registry, id, payload)?;
    let updated = registry.update_status(id, update.status)?;
    Ok(Json(ApiResponse::ok(updated)))
}

// ============================================================================
// Router
// ============================================================================

/// Build the full application router around a registry handle
pub fn router(registry: EquipmentRegistry) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/equipment", get(list_equipment).post(add_equipment))
        .route("/equipment/count", get(equipment_count))
        .route("/equipment/:id", get(get_equipment))
        .route("/equipment/:id/health-score", put(update_health_score))
        .route("/equipment/:id/status", put(update_status))
        .with_state(registry);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
