use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::incident::Incident;
use crate::recommender::SessionStatus;
use crate::session::Session;

/// Plain-data events handed to the rendering boundary. The engine never
/// touches presentation; these carry everything a renderer needs.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "event")]
pub enum EngineEvent {
    #[serde(rename = "session.started")]
    SessionStarted { session: Session },
    #[serde(rename = "session.ended")]
    SessionEnded { session: Session },
    #[serde(rename = "session.timer_tick")]
    TimerTick {
        session_id: Uuid,
        elapsed_seconds: u64,
        running: bool,
    },
    #[serde(rename = "incident.logged")]
    IncidentLogged {
        incident: Incident,
        status: SessionStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_tag_with_dotted_names() {
        let event = EngineEvent::TimerTick {
            session_id: Uuid::now_v7(),
            elapsed_seconds: 150,
            running: true,
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["event"], "session.timer_tick");
        assert_eq!(json["elapsed_seconds"], 150);
    }
}
