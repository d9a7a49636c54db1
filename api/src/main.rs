use std::net::SocketAddr;

use axum::Router;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod advisory;
mod error;
mod routes;
mod state;
mod store;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Conduct API",
        version = "0.1.0",
        description = "Behavior-tracking engine for one-on-one tutoring: incident logging with grade-aware severity, graduated response ladders, and drift-free session timing."
    ),
    paths(
        routes::health::health_check,
        routes::sessions::start_session,
        routes::sessions::current_session,
        routes::sessions::pause_session,
        routes::sessions::resume_session,
        routes::sessions::tick_session,
        routes::sessions::end_session,
        routes::incidents::log_incident,
        routes::incidents::list_incidents,
        routes::incidents::resolve_incident,
        routes::config::show_config,
        routes::config::apply_config,
    ),
    components(schemas(
        HealthResponse,
        routes::sessions::StartSessionRequest,
        routes::sessions::TickRequest,
        routes::sessions::SessionView,
        routes::incidents::IncidentListResponse,
        routes::incidents::ResolveIncidentRequest,
        routes::config::ConfigResponse,
        conduct_core::error::ApiError,
        conduct_core::events::EngineEvent,
        conduct_core::incident::Incident,
        conduct_core::incident::Resolution,
        conduct_core::incident::CreateIncidentRequest,
        conduct_core::session::Session,
        conduct_core::session::SessionPhase,
        conduct_core::session::Student,
        conduct_core::recommender::SessionStatus,
        conduct_core::recommender::WarningLevel,
        conduct_core::advisory::AdvisoryPacket,
        conduct_core::advisory::RecommendedResponse,
        conduct_core::advisory::IntentHypothesis,
        conduct_core::advisory::Provenance,
        conduct_core::methodology::Methodology,
        conduct_core::methodology::MethodologyConfig,
        conduct_core::methodology::GradeBand,
        conduct_core::methodology::GradeBandId,
        conduct_core::methodology::Category,
        conduct_core::methodology::CategoryId,
        conduct_core::methodology::LadderStep,
        conduct_core::methodology::SeverityLevel,
        conduct_core::methodology::Tone,
        conduct_core::methodology::ToneScripts,
    ))
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub advisory_enabled: bool,
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conduct_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let app_state = state::AppState::new(state::AdvisorySettings::from_env());
    if app_state.advisory.enabled() {
        tracing::info!(
            timeout_secs = app_state.advisory.timeout.as_secs(),
            "advisory collaborator configured"
        );
    } else {
        tracing::info!("advisory collaborator disabled, deterministic recommendations only");
    }

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::sessions::router())
        .merge(routes::incidents::router())
        .merge(routes::config::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(4000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Conduct API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}
