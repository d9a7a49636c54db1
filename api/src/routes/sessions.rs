use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use conduct_core::error::{ApiError, InputError};
use conduct_core::events::EngineEvent;
use conduct_core::methodology::{CategoryId, MAX_GRADE, MIN_GRADE};
use conduct_core::recommender::{self, SessionSnapshot, SessionStatus};
use conduct_core::resolver::DENSITY_WINDOW_SECONDS;
use conduct_core::session::{Session, Student};

use crate::error::AppError;
use crate::state::AppState;
use crate::store::{IncidentFilter, Store};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/sessions", post(start_session))
        .route("/v1/sessions/current", get(current_session))
        .route("/v1/sessions/current/pause", post(pause_session))
        .route("/v1/sessions/current/resume", post(resume_session))
        .route("/v1/sessions/current/tick", post(tick_session))
        .route("/v1/sessions/current/end", post(end_session))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartSessionRequest {
    pub student_name: String,
    /// Grade 1..=13
    pub grade: u8,
    /// Session mode (e.g. "one_on_one", "small_group")
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub goals: Vec<String>,
}

fn default_mode() -> String {
    "one_on_one".to_string()
}

/// Timer reconciliation request. Clients that were backgrounded send their
/// own clock so elapsed time is recomputed from timestamps, not ticks.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TickRequest {
    #[serde(default)]
    pub now_ms: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub session: Session,
    pub elapsed_seconds: u64,
    pub status: SessionStatus,
}

/// Session-level aggregates including everything logged so far.
pub(crate) async fn snapshot_for(state: &AppState, session: &Session, elapsed: u64) -> SessionSnapshot {
    let incidents = state
        .store
        .list_incidents(&IncidentFilter {
            session_id: Some(session.id),
            ..Default::default()
        })
        .await;
    let window_start = elapsed.saturating_sub(DENSITY_WINDOW_SECONDS);
    SessionSnapshot {
        total_incidents: session.total_incidents(),
        recent_incidents: incidents
            .iter()
            .filter(|i| i.offset_seconds >= window_start)
            .count() as u32,
        max_severity: incidents.iter().map(|i| i.severity).max().unwrap_or(0),
        severity4_count: incidents.iter().filter(|i| i.severity >= 4).count() as u32,
        safety_incidents: session.category_count(CategoryId::SafetyBoundary),
    }
}

async fn session_view(state: &AppState, session: Session, now_ms: i64) -> SessionView {
    let elapsed = session.elapsed(now_ms);
    let snapshot = snapshot_for(state, &session, elapsed).await;
    let methodology = state.methodology().await;
    let status = recommender::session_status(&methodology, session.student_grade, &snapshot);
    SessionView {
        session,
        elapsed_seconds: elapsed,
        status,
    }
}

/// Start a session
///
/// Exactly one session may be live at a time; starting a new one forces the
/// prior one through its end transition first.
#[utoipa::path(
    post,
    path = "/v1/sessions",
    request_body = StartSessionRequest,
    responses(
        (status = 201, description = "Session started", body = EngineEvent),
        (status = 400, description = "Validation error", body = ApiError)
    ),
    tag = "sessions"
)]
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.grade < MIN_GRADE || req.grade > MAX_GRADE {
        return Err(InputError::GradeOutOfRange(req.grade).into());
    }
    if req.student_name.trim().is_empty() {
        return Err(AppError::Validation {
            message: "student_name must not be empty".to_string(),
            field: Some("student_name".to_string()),
            received: None,
            docs_hint: None,
        });
    }

    let now = Utc::now();
    let now_ms = now.timestamp_millis();

    // Implicit end of the prior live session, never an error.
    if let Some(mut live) = state.store.active_session().await {
        if live.end(now, now_ms).is_ok() {
            tracing::info!(session = %live.id, "prior session force-ended by new start");
            state.store.put_session(live).await;
        }
    }

    let student = Student {
        id: Uuid::now_v7(),
        name: req.student_name.trim().to_string(),
        grade: req.grade,
    };
    let session = Session::start(
        student.id,
        student.grade,
        req.mode,
        req.goals,
        now,
        now_ms,
    );
    state.store.put_student(student).await;
    state.store.put_session(session.clone()).await;

    Ok((
        StatusCode::CREATED,
        Json(EngineEvent::SessionStarted { session }),
    ))
}

/// Get the live session with derived elapsed time and status
#[utoipa::path(
    get,
    path = "/v1/sessions/current",
    responses(
        (status = 200, description = "Live session", body = SessionView),
        (status = 409, description = "No active session", body = ApiError)
    ),
    tag = "sessions"
)]
pub async fn current_session(
    State(state): State<AppState>,
) -> Result<Json<SessionView>, AppError> {
    let session = state
        .store
        .active_session()
        .await
        .ok_or(AppError::NoActiveSession)?;
    let now_ms = Utc::now().timestamp_millis();
    Ok(Json(session_view(&state, session, now_ms).await))
}

/// Pause the live session (e.g. during a reset break)
#[utoipa::path(
    post,
    path = "/v1/sessions/current/pause",
    responses(
        (status = 200, description = "Session paused", body = SessionView),
        (status = 409, description = "No active session or invalid transition", body = ApiError)
    ),
    tag = "sessions"
)]
pub async fn pause_session(State(state): State<AppState>) -> Result<Json<SessionView>, AppError> {
    let mut session = state
        .store
        .active_session()
        .await
        .ok_or(AppError::NoActiveSession)?;
    let now_ms = Utc::now().timestamp_millis();
    session.pause(now_ms)?;
    state.store.put_session(session.clone()).await;
    Ok(Json(session_view(&state, session, now_ms).await))
}

/// Resume a paused session
#[utoipa::path(
    post,
    path = "/v1/sessions/current/resume",
    responses(
        (status = 200, description = "Session resumed", body = SessionView),
        (status = 409, description = "No active session or invalid transition", body = ApiError)
    ),
    tag = "sessions"
)]
pub async fn resume_session(State(state): State<AppState>) -> Result<Json<SessionView>, AppError> {
    let mut session = state
        .store
        .active_session()
        .await
        .ok_or(AppError::NoActiveSession)?;
    let now_ms = Utc::now().timestamp_millis();
    session.resume(now_ms)?;
    state.store.put_session(session.clone()).await;
    Ok(Json(session_view(&state, session, now_ms).await))
}

/// Reconcile the session timer
///
/// Elapsed time is always recomputed from `accumulated_seconds` and the
/// running segment's wall-clock anchor, so missed ticks while backgrounded
/// never lose or double-count time.
#[utoipa::path(
    post,
    path = "/v1/sessions/current/tick",
    request_body = TickRequest,
    responses(
        (status = 200, description = "Derived timer state", body = EngineEvent),
        (status = 409, description = "No active session", body = ApiError)
    ),
    tag = "sessions"
)]
pub async fn tick_session(
    State(state): State<AppState>,
    Json(req): Json<TickRequest>,
) -> Result<Json<EngineEvent>, AppError> {
    let session = state
        .store
        .active_session()
        .await
        .ok_or(AppError::NoActiveSession)?;
    let now_ms = req.now_ms.unwrap_or_else(|| Utc::now().timestamp_millis());
    let elapsed = session.elapsed(now_ms);
    let running = session.is_running();
    Ok(Json(EngineEvent::TimerTick {
        session_id: session.id,
        elapsed_seconds: elapsed,
        running,
    }))
}

/// End the live session (terminal)
#[utoipa::path(
    post,
    path = "/v1/sessions/current/end",
    responses(
        (status = 200, description = "Session ended", body = EngineEvent),
        (status = 409, description = "No active session", body = ApiError)
    ),
    tag = "sessions"
)]
pub async fn end_session(State(state): State<AppState>) -> Result<Json<EngineEvent>, AppError> {
    let mut session = state
        .store
        .active_session()
        .await
        .ok_or(AppError::NoActiveSession)?;
    let now = Utc::now();
    session.end(now, now.timestamp_millis())?;
    state.store.put_session(session.clone()).await;
    Ok(Json(EngineEvent::SessionEnded { session }))
}
