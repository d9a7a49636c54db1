use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use conduct_core::advisory::build_advisory_request;
use conduct_core::error::ApiError;
use conduct_core::events::EngineEvent;
use conduct_core::incident::{self, CreateIncidentRequest, Incident, Resolution};
use conduct_core::methodology::CategoryId;
use conduct_core::recommender;
use conduct_core::resolver::{self, EscalationContext, DENSITY_WINDOW_SECONDS};

use crate::error::AppError;
use crate::routes::sessions::snapshot_for;
use crate::state::AppState;
use crate::store::{IncidentFilter, Store};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/incidents", post(log_incident).get(list_incidents))
        .route("/v1/incidents/{id}/resolve", post(resolve_incident))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListIncidentsQuery {
    /// Restrict to one session
    pub session_id: Option<Uuid>,
    /// Category id, e.g. "DISRUPTION"
    pub category: Option<String>,
    /// Only incidents logged at or after this instant
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IncidentListResponse {
    pub data: Vec<Incident>,
    pub count: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveIncidentRequest {
    /// How the incident was closed, e.g. "apologized", "moved_seat"
    pub outcome: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Log an incident
///
/// Resolves severity from the grade-aware base table plus session escalation
/// factors, advances the per-category discipline counter, and attaches a
/// deterministic recommendation immediately. When the advisory collaborator
/// is configured, a background task may later replace that packet with a
/// validated advisory one; the response never waits for it.
#[utoipa::path(
    post,
    path = "/v1/incidents",
    request_body = CreateIncidentRequest,
    responses(
        (status = 201, description = "Incident logged", body = EngineEvent),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 409, description = "No active session", body = ApiError)
    ),
    tag = "incidents"
)]
pub async fn log_incident(
    State(state): State<AppState>,
    Json(req): Json<CreateIncidentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let category = incident::validate_create(&req)?;

    let mut session = state
        .store
        .active_session()
        .await
        .ok_or(AppError::NoActiveSession)?;

    let now = Utc::now();
    let elapsed = session.elapsed(now.timestamp_millis());

    let prior = state
        .store
        .list_incidents(&IncidentFilter {
            session_id: Some(session.id),
            ..Default::default()
        })
        .await;
    let window_start = elapsed.saturating_sub(DENSITY_WINDOW_SECONDS);
    let recent_prior = prior
        .iter()
        .filter(|i| i.offset_seconds >= window_start)
        .count() as u32;

    let ctx = EscalationContext {
        same_category_prior: session.category_count(category),
        // the incident being logged counts toward density
        recent_incidents: recent_prior + 1,
        elapsed_seconds: elapsed,
        max_prior_severity: prior.iter().map(|i| i.severity).max().unwrap_or(0),
    };
    let severity = resolver::resolve_severity(category, session.student_grade, &ctx);

    let same_category_prior = session.record_incident(category);

    let methodology = state.methodology().await;
    let fallback = recommender::recommend(
        &methodology,
        category,
        session.student_grade,
        severity,
        same_category_prior,
    );

    let record = Incident {
        id: Uuid::now_v7(),
        session_id: session.id,
        category,
        severity,
        description: req.description.trim().to_string(),
        context: req.context.as_deref().map(|c| c.trim().to_string()),
        offset_seconds: elapsed,
        logged_at: now,
        advisory: Some(fallback),
        resolution: None,
    };
    let incident_id = record.id;

    state.store.put_incident(record.clone()).await;
    state.store.put_session(session.clone()).await;

    let snapshot = snapshot_for(&state, &session, elapsed).await;
    let status = recommender::session_status(&methodology, session.student_grade, &snapshot);

    if state.advisory.enabled() {
        let severity_guess = req.severity.unwrap_or(severity);
        let request = build_advisory_request(
            &methodology,
            &session,
            category,
            severity_guess,
            record.description.as_str(),
            record.context.as_deref(),
            elapsed,
        );
        let store = Arc::clone(&state.store);
        let settings = state.advisory.clone();
        tokio::spawn(crate::advisory::attach_advisory(
            store,
            settings,
            incident_id,
            request,
        ));
    }

    tracing::info!(
        incident = %incident_id,
        category = %category.as_str(),
        severity,
        "incident logged"
    );

    Ok((
        StatusCode::CREATED,
        Json(EngineEvent::IncidentLogged {
            incident: record,
            status,
        }),
    ))
}

/// List incidents, newest first
#[utoipa::path(
    get,
    path = "/v1/incidents",
    params(ListIncidentsQuery),
    responses(
        (status = 200, description = "Matching incidents", body = IncidentListResponse),
        (status = 400, description = "Unknown category filter", body = ApiError)
    ),
    tag = "incidents"
)]
pub async fn list_incidents(
    State(state): State<AppState>,
    Query(query): Query<ListIncidentsQuery>,
) -> Result<Json<IncidentListResponse>, AppError> {
    let category = match &query.category {
        Some(raw) => Some(CategoryId::parse(raw).ok_or_else(|| AppError::Validation {
            message: format!("unknown category '{}'", raw),
            field: Some("category".to_string()),
            received: Some(serde_json::Value::String(raw.clone())),
            docs_hint: Some("GET /v1/config lists the valid category ids".to_string()),
        })?),
        None => None,
    };

    let data = state
        .store
        .list_incidents(&IncidentFilter {
            session_id: query.session_id,
            category,
            since: query.since,
        })
        .await;
    let count = data.len();
    Ok(Json(IncidentListResponse { data, count }))
}

/// Resolve an incident
///
/// Records the outcome on the incident. Resolution is once-only and never
/// rewinds the session's discipline counters.
#[utoipa::path(
    post,
    path = "/v1/incidents/{id}/resolve",
    params(("id" = Uuid, Path, description = "Incident id")),
    request_body = ResolveIncidentRequest,
    responses(
        (status = 200, description = "Incident resolved", body = Incident),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Incident not found", body = ApiError),
        (status = 409, description = "Already resolved", body = ApiError)
    ),
    tag = "incidents"
)]
pub async fn resolve_incident(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResolveIncidentRequest>,
) -> Result<Json<Incident>, AppError> {
    if req.outcome.trim().is_empty() {
        return Err(AppError::Validation {
            message: "outcome must not be empty".to_string(),
            field: Some("outcome".to_string()),
            received: None,
            docs_hint: None,
        });
    }

    let existing = state
        .store
        .incident(id)
        .await
        .ok_or_else(|| AppError::NotFound {
            message: format!("incident {} not found", id),
        })?;
    if existing.resolution.is_some() {
        return Err(AppError::SessionConflict {
            message: format!("incident {} is already resolved", id),
        });
    }

    let resolution = Resolution {
        outcome: req.outcome.trim().to_string(),
        resolved_at: Utc::now(),
        notes: req.notes.as_deref().map(|n| n.trim().to_string()),
    };
    let updated = state
        .store
        .update_incident(id, |incident| incident.resolution = Some(resolution))
        .await
        .ok_or_else(|| AppError::NotFound {
            message: format!("incident {} not found", id),
        })?;

    Ok(Json(updated))
}
