use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::methodology::{CategoryId, GradeBandId, Methodology, ToneScripts};
use crate::session::Session;

/// Character budget for each tone line in an advisory script.
pub const MAX_SCRIPT_CHARS: usize = 300;
/// At most this many alternative intent labels are accepted.
pub const MAX_INTENT_ALTERNATIVES: usize = 3;
/// At most this many fairness notes are accepted.
pub const MAX_FAIRNESS_NOTES: usize = 5;

/// Where a recommendation came from. Anything that did not pass validation
/// is replaced wholesale by a `deterministic` packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Externally supplied, schema-validated and sanitized
    #[default]
    Ai,
    /// Locally computed by the deterministic recommender
    Deterministic,
}

/// Hypothesis about what the student was trying to get from the behavior.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntentHypothesis {
    pub label: String,
    /// 0..=1
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
}

/// The concrete response the tutor is advised to take right now.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedResponse {
    pub immediate_step: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ladder_action: Option<String>,
    /// 1..=5; the band's ladder cap is re-applied when this is rendered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_ladder_step: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restorative_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consequence: Option<String>,
}

/// A complete recommendation, either from the advisory collaborator (after
/// validation and sanitization) or from the deterministic recommender.
/// This is the only externally-originated structure in the system; raw
/// advisory JSON never deserializes into it directly — it goes through
/// `schema::validate_advisory` first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryPacket {
    pub category: CategoryId,
    /// 1..=4; the schema rejects anything above the stop floor
    pub severity: u8,
    /// 0..=1
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_hypothesis: Option<IntentHypothesis>,
    pub recommended_response: RecommendedResponse,
    /// All three tones are required so the operator can shift register
    /// without a round trip.
    pub script: ToneScripts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevention_tip: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fairness_notes: Vec<String>,
    #[serde(default)]
    pub source: Provenance,
    /// Audit trail: why an advisory response was discarded, recorded on the
    /// deterministic packet that replaced it. Never blocks the operator.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ai_errors: Vec<String>,
}

impl AdvisoryPacket {
    /// Clamp the suggested ladder step to the band's ceiling. The schema
    /// bounds the step to 1..=5 without band context; the per-band cap is
    /// applied here when a packet is accepted, so a stored packet never
    /// carries a step the student's band cannot reach.
    pub fn clamp_ladder_step(&mut self, max_step: u8) {
        if let Some(step) = self.recommended_response.suggested_ladder_step.as_mut() {
            if *step > max_step {
                *step = max_step;
            }
        }
    }
}

/// Request payload sent to the advisory collaborator. The shape is part of
/// the external contract; field names are fixed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryRequest {
    pub student: StudentBlock,
    pub session: SessionBlock,
    pub incident: IncidentBlock,
    pub methodology: MethodologyBlock,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentBlock {
    pub grade: u8,
    pub band: GradeBandId,
    pub band_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionBlock {
    pub mode: String,
    /// Seconds into the session at the time of the incident
    pub time_into_session: u64,
    pub discipline_state: BTreeMap<CategoryId, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IncidentBlock {
    pub category: CategoryId,
    pub category_label: String,
    pub severity_guess: u8,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MethodologyBlock {
    pub max_ladder_step: u8,
    pub parent_contact_threshold: u32,
    pub allowed_consequences: Vec<String>,
    pub not_allowed_consequences: Vec<String>,
    pub ladder_summary: Vec<LadderSummaryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LadderSummaryEntry {
    pub step: u8,
    pub action: String,
}

/// Assemble the advisory request for one incident against the live session.
pub fn build_advisory_request(
    methodology: &Methodology,
    session: &Session,
    category: CategoryId,
    severity_guess: u8,
    description: &str,
    context: Option<&str>,
    elapsed_seconds: u64,
) -> AdvisoryRequest {
    let band = methodology.band_for_grade(session.student_grade);
    let cat = methodology.category(category);
    AdvisoryRequest {
        student: StudentBlock {
            grade: session.student_grade,
            band: band.id,
            band_name: band.name.clone(),
        },
        session: SessionBlock {
            mode: session.mode.clone(),
            time_into_session: elapsed_seconds,
            discipline_state: session.discipline_state.clone(),
        },
        incident: IncidentBlock {
            category,
            category_label: cat.label.clone(),
            severity_guess,
            description: description.to_string(),
            context: context.map(|s| s.to_string()),
        },
        methodology: MethodologyBlock {
            max_ladder_step: band.max_ladder_step,
            parent_contact_threshold: band.parent_contact_threshold,
            allowed_consequences: cat.allowed_consequences.clone(),
            not_allowed_consequences: cat.blocked_consequences.clone(),
            ladder_summary: cat
                .ladder
                .iter()
                .filter(|s| s.valid_bands.contains(&band.id))
                .map(|s| LadderSummaryEntry {
                    step: s.step,
                    action: s.action.clone(),
                })
                .collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn request_only_lists_ladder_steps_valid_for_the_band() {
        let m = Methodology::built_in();
        let session = Session::start(
            Uuid::now_v7(),
            2,
            "one_on_one".to_string(),
            vec![],
            Utc::now(),
            0,
        );
        let req = build_advisory_request(
            &m,
            &session,
            CategoryId::Disruption,
            2,
            "calls out repeatedly",
            None,
            120,
        );
        assert_eq!(req.student.band, GradeBandId::EarlyPrimary);
        assert!(req
            .methodology
            .ladder_summary
            .iter()
            .all(|e| e.step <= req.methodology.max_ladder_step + 2));
        // Step 4 and 5 entries exclude early primary in the built-in ladder.
        assert!(req.methodology.ladder_summary.iter().all(|e| e.step <= 3));
    }

    fn packet_with_step(step: Option<u8>) -> AdvisoryPacket {
        AdvisoryPacket {
            category: CategoryId::Disruption,
            severity: 2,
            confidence: 0.9,
            intent_hypothesis: None,
            recommended_response: RecommendedResponse {
                immediate_step: "Quiet named reminder".to_string(),
                ladder_action: None,
                suggested_ladder_step: step,
                restorative_action: None,
                consequence: None,
            },
            script: ToneScripts {
                gentle: "g".to_string(),
                neutral: "n".to_string(),
                firm: "f".to_string(),
            },
            prevention_tip: None,
            fairness_notes: vec![],
            source: Provenance::Ai,
            ai_errors: vec![],
        }
    }

    #[test]
    fn accepted_packet_step_clamps_to_band_cap() {
        let mut over = packet_with_step(Some(5));
        over.clamp_ladder_step(3);
        assert_eq!(over.recommended_response.suggested_ladder_step, Some(3));

        let mut within = packet_with_step(Some(2));
        within.clamp_ladder_step(3);
        assert_eq!(within.recommended_response.suggested_ladder_step, Some(2));

        let mut absent = packet_with_step(None);
        absent.clamp_ladder_step(3);
        assert_eq!(absent.recommended_response.suggested_ladder_step, None);
    }

    #[test]
    fn request_serializes_with_contract_field_names() {
        let m = Methodology::built_in();
        let session = Session::start(
            Uuid::now_v7(),
            7,
            "small_group".to_string(),
            vec![],
            Utc::now(),
            0,
        );
        let req = build_advisory_request(
            &m,
            &session,
            CategoryId::SafetyBoundary,
            3,
            "left the room",
            Some("second time today"),
            600,
        );
        let json = serde_json::to_value(&req).expect("serialize");
        assert_eq!(json["incident"]["category"], "SAFETY_BOUNDARY");
        assert!(json["session"]["disciplineState"].is_object());
        assert!(json["methodology"]["notAllowedConsequences"].is_array());
        assert_eq!(json["session"]["timeIntoSession"], 600);
    }
}
