use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::advisory::AdvisoryPacket;
use crate::error::InputError;
use crate::methodology::CategoryId;

pub const MAX_DESCRIPTION_CHARS: usize = 500;
pub const MAX_CONTEXT_CHARS: usize = 500;

/// One logged behavior event. Identity is immutable once created; the
/// record is mutated exactly twice at most — once when a recommendation
/// packet attaches, once when the incident is resolved.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Incident {
    pub id: Uuid,
    pub session_id: Uuid,
    pub category: CategoryId,
    /// Engine-resolved severity 1..=4
    pub severity: u8,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Seconds into the session when the incident was logged
    pub offset_seconds: u64,
    pub logged_at: DateTime<Utc>,
    /// Attached recommendation: the sanitized advisory packet, or the
    /// deterministic fallback when the advisory path failed or is disabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<AdvisoryPacket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

/// Outcome recorded when the tutor closes an incident. Resolution never
/// touches the discipline counters.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Resolution {
    pub outcome: String,
    pub resolved_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Operator input for logging an incident. Category arrives as its wire id
/// so an unknown value is an enumerable input error, not a deserialization
/// failure.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateIncidentRequest {
    /// Category id, e.g. "DISRUPTION" or "SAFETY_BOUNDARY"
    pub category: String,
    /// Optional operator severity estimate 1..=4; the engine may escalate it
    #[serde(default)]
    pub severity: Option<u8>,
    pub description: String,
    #[serde(default)]
    pub context: Option<String>,
}

/// Synchronous validation at the creation boundary. Everything here is
/// rejected before anything persists.
pub fn validate_create(req: &CreateIncidentRequest) -> Result<CategoryId, InputError> {
    let category = CategoryId::parse(&req.category)
        .ok_or_else(|| InputError::UnknownCategory(req.category.clone()))?;

    if let Some(severity) = req.severity {
        if !(1..=4).contains(&severity) {
            return Err(InputError::SeverityOutOfRange(severity));
        }
    }

    if req.description.trim().is_empty() {
        return Err(InputError::EmptyDescription);
    }
    let len = req.description.chars().count();
    if len > MAX_DESCRIPTION_CHARS {
        return Err(InputError::DescriptionTooLong {
            len,
            max: MAX_DESCRIPTION_CHARS,
        });
    }
    if let Some(context) = &req.context {
        let len = context.chars().count();
        if len > MAX_CONTEXT_CHARS {
            return Err(InputError::ContextTooLong {
                len,
                max: MAX_CONTEXT_CHARS,
            });
        }
    }

    Ok(category)
}
