use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use conduct_core::error::ApiError;
use conduct_core::methodology::{Methodology, MethodologyConfig};

use crate::error::AppError;
use crate::state::AppState;
use crate::store::Store;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/config", get(show_config).put(apply_config))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigResponse {
    /// The methodology currently driving the engine
    pub methodology: Methodology,
    /// True when a custom config has been applied this process
    pub custom: bool,
}

/// Show the effective methodology
#[utoipa::path(
    get,
    path = "/v1/config",
    responses(
        (status = 200, description = "Effective methodology", body = ConfigResponse)
    ),
    tag = "config"
)]
pub async fn show_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let methodology = state.methodology().await;
    let custom = state.store.config().await.is_some();
    Json(ConfigResponse {
        methodology: (*methodology).clone(),
        custom,
    })
}

/// Apply a custom methodology config
///
/// All-or-nothing: the config is validated as a whole and the previous
/// methodology stays in force if any part is rejected. Severity levels in
/// the payload are accepted but never applied.
#[utoipa::path(
    put,
    path = "/v1/config",
    request_body = MethodologyConfig,
    responses(
        (status = 200, description = "Config applied", body = ConfigResponse),
        (status = 400, description = "Config rejected", body = ApiError)
    ),
    tag = "config"
)]
pub async fn apply_config(
    State(state): State<AppState>,
    Json(config): Json<MethodologyConfig>,
) -> Result<Json<ConfigResponse>, AppError> {
    let methodology = Methodology::from_config(&config).map_err(|errors| AppError::Validation {
        message: errors.join("; "),
        field: None,
        received: None,
        docs_hint: Some("GET /v1/config shows the shape of a valid methodology".to_string()),
    })?;

    state.store.put_config(config).await;
    let handle = Arc::new(methodology);
    *state.methodology.write().await = Arc::clone(&handle);
    tracing::info!("custom methodology config applied");

    Ok(Json(ConfigResponse {
        methodology: (*handle).clone(),
        custom: true,
    }))
}
