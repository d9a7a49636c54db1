use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::advisory::{AdvisoryPacket, IntentHypothesis, Provenance, RecommendedResponse};
use crate::methodology::{CategoryId, Methodology, Tone, ToneScripts};

/// Tone selection is rule-driven. `same_category_count` includes the
/// incident being responded to.
pub fn select_tone(severity: u8, same_category_count: u32) -> Tone {
    if severity >= 3 || same_category_count >= 3 {
        Tone::Firm
    } else if severity >= 2 || same_category_count >= 2 {
        Tone::Neutral
    } else {
        Tone::Gentle
    }
}

fn intent_hypothesis(category: CategoryId) -> IntentHypothesis {
    let (label, alternatives): (&str, &[&str]) = match category {
        CategoryId::Disruption => ("attention_seeking", &["energy_overflow", "peer_audience"]),
        CategoryId::Defiance => ("autonomy_bid", &["task_avoidance", "overwhelm"]),
        CategoryId::OffTask => ("task_avoidance", &["distraction", "fatigue"]),
        CategoryId::Disrespect => ("status_protection", &["frustration", "testing_limits"]),
        CategoryId::PeerConflict => ("status_conflict", &["retaliation", "misread_signal"]),
        CategoryId::PropertyMisuse => ("sensation_seeking", &["boredom", "carelessness"]),
        CategoryId::SafetyBoundary => ("dysregulation", &["flight_response", "testing_limits"]),
        CategoryId::Other => ("unclear", &[]),
    };
    IntentHypothesis {
        label: label.to_string(),
        // Rule-derived guess, deliberately modest.
        confidence: 0.4,
        alternatives: alternatives.iter().map(|s| s.to_string()).collect(),
    }
}

fn fallback_scripts() -> ToneScripts {
    ToneScripts {
        gentle: "Let's pause for a second and reset together.".to_string(),
        neutral: "You know the expectation here. Reset and continue.".to_string(),
        firm: "This stops now. We continue when it is settled.".to_string(),
    }
}

/// Produce a complete, policy-compliant recommendation with no external
/// dependency. Used as the default when the advisory collaborator is
/// disabled or offline, and as the substitute when validation rejects an
/// advisory response. `same_category_prior` is the discipline-state count
/// before this incident; the ladder rule consumes it directly.
pub fn recommend(
    methodology: &Methodology,
    category: CategoryId,
    grade: u8,
    severity: u8,
    same_category_prior: u32,
) -> AdvisoryPacket {
    let band = methodology.band_for_grade(grade);
    let cat = methodology.category(category);
    let step = methodology.ladder_step(category, same_category_prior, band.id);
    let tone = select_tone(severity, same_category_prior + 1);

    let script = cat
        .scripts
        .get(&band.id)
        .cloned()
        .unwrap_or_else(fallback_scripts);

    let consequence = if severity >= 3 {
        cat.allowed_consequences.first().cloned()
    } else {
        None
    };

    debug_assert!((1..=4).contains(&severity));

    AdvisoryPacket {
        category,
        severity,
        confidence: 1.0,
        intent_hypothesis: Some(intent_hypothesis(category)),
        recommended_response: RecommendedResponse {
            immediate_step: step.action.clone(),
            ladder_action: Some(format!(
                "{} — step {} of {}",
                cat.label, step.step, band.max_ladder_step
            )),
            suggested_ladder_step: Some(step.step),
            restorative_action: Some(cat.restorative_prompt.clone()),
            consequence,
        },
        script: ToneScripts {
            // The selected tone leads; all three stay available.
            gentle: script.gentle.clone(),
            neutral: script.neutral.clone(),
            firm: script.firm.clone(),
        },
        prevention_tip: Some(cat.prevention_tip.clone()),
        fairness_notes: vec![
            "Same behavior, same response: apply the ladder, not the mood.".to_string(),
            format!("Lead with the {} line; consistency beats volume.", tone_name(tone)),
        ],
        source: Provenance::Deterministic,
        ai_errors: Vec::new(),
    }
}

fn tone_name(tone: Tone) -> &'static str {
    match tone {
        Tone::Gentle => "gentle",
        Tone::Neutral => "neutral",
        Tone::Firm => "firm",
    }
}

/// Graduated warning ladder shown between green and a session stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    Green,
    Yellow,
    Orange,
    Red,
}

/// Aggregates over all incidents logged so far in the session, including
/// the one just logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SessionSnapshot {
    pub total_incidents: u32,
    /// Incidents within the trailing density window
    pub recent_incidents: u32,
    /// Highest severity logged this session
    pub max_severity: u8,
    /// Incidents at the stop floor (severity 4)
    pub severity4_count: u32,
    /// Safety-boundary incidents this session
    pub safety_incidents: u32,
}

/// The session-level decision surface, derived independently of any single
/// recommendation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionStatus {
    pub should_stop: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    pub warning_level: WarningLevel,
    /// Human-readable countdown. Younger bands get explicit counts, older
    /// bands get qualitative accountability language — policy intent, the
    /// two paths are deliberately not unified.
    pub countdown: String,
    pub parent_contact_due: bool,
}

pub fn session_status(
    methodology: &Methodology,
    grade: u8,
    snapshot: &SessionSnapshot,
) -> SessionStatus {
    let band = methodology.band_for_grade(grade);
    let total = snapshot.total_incidents;
    let stop_threshold = band.session_stop_threshold;

    let stop_reason = if snapshot.severity4_count >= 1 {
        Some("A severity-4 incident requires stopping the session".to_string())
    } else if total >= 5 && snapshot.max_severity >= 3 {
        Some(format!(
            "{} incidents with severity {} reached the stop rule",
            total, snapshot.max_severity
        ))
    } else {
        None
    };
    let should_stop = stop_reason.is_some();

    let mut warning_level = WarningLevel::Green;
    if snapshot.recent_incidents >= 2 || total >= 2 {
        warning_level = WarningLevel::Yellow;
    }
    if snapshot.recent_incidents >= 3
        || snapshot.safety_incidents >= 1
        || total + 2 >= stop_threshold
    {
        warning_level = WarningLevel::Orange;
    }
    if should_stop || snapshot.safety_incidents >= 2 || total + 1 >= stop_threshold {
        warning_level = WarningLevel::Red;
    }

    let remaining = stop_threshold.saturating_sub(total);
    let countdown = if should_stop {
        "Stop the session now".to_string()
    } else if band.id.uses_numeric_countdown() {
        // Younger students need concrete external structure.
        match remaining {
            0 => "No chances left — the next incident ends the session".to_string(),
            1 => "1 more before consequence".to_string(),
            n => format!("{} more before consequence", n),
        }
    } else {
        // Older students are steered toward internal accountability.
        match warning_level {
            WarningLevel::Green => "On track — keep the flow".to_string(),
            WarningLevel::Yellow => {
                "A pattern is forming; a reset now keeps this minor".to_string()
            }
            WarningLevel::Orange => {
                "This is close to the line; the next choice decides".to_string()
            }
            WarningLevel::Red => "At the line — the next incident is a consequence".to_string(),
        }
    };

    SessionStatus {
        should_stop,
        stop_reason,
        warning_level,
        countdown,
        parent_contact_due: total >= band.parent_contact_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{self, EscalationContext};

    #[test]
    fn tone_rule_matches_policy() {
        assert_eq!(select_tone(1, 1), Tone::Gentle);
        assert_eq!(select_tone(2, 1), Tone::Neutral);
        assert_eq!(select_tone(1, 2), Tone::Neutral);
        assert_eq!(select_tone(3, 1), Tone::Firm);
        assert_eq!(select_tone(1, 3), Tone::Firm);
    }

    #[test]
    fn deterministic_packet_is_complete_and_tagged() {
        let m = Methodology::built_in();
        let packet = recommend(&m, CategoryId::Disruption, 4, 2, 1);
        assert_eq!(packet.source, Provenance::Deterministic);
        assert_eq!(packet.category, CategoryId::Disruption);
        assert!(!packet.recommended_response.immediate_step.is_empty());
        assert!(!packet.script.gentle.is_empty());
        assert!(!packet.script.neutral.is_empty());
        assert!(!packet.script.firm.is_empty());
        assert!(packet.fairness_notes.len() <= 5);
        assert!(packet.ai_errors.is_empty());
    }

    #[test]
    fn suggested_step_respects_band_cap() {
        let m = Methodology::built_in();
        for prior in 0..8u32 {
            let packet = recommend(&m, CategoryId::Defiance, 1, 2, prior);
            let step = packet.recommended_response.suggested_ladder_step.unwrap();
            assert!(step <= m.band_for_grade(1).max_ladder_step);
        }
    }

    #[test]
    fn consequence_only_attaches_from_serious_severity() {
        let m = Methodology::built_in();
        assert!(recommend(&m, CategoryId::Disrespect, 9, 3, 0)
            .recommended_response
            .consequence
            .is_some());
        assert!(recommend(&m, CategoryId::Disrespect, 9, 2, 0)
            .recommended_response
            .consequence
            .is_none());
    }

    #[test]
    fn second_safety_incident_forces_stop() {
        let m = Methodology::built_in();
        let grade = 4;
        // First safety incident: base severity 3, no escalation triggers.
        let first = resolver::resolve_severity(
            CategoryId::SafetyBoundary,
            grade,
            &EscalationContext::default(),
        );
        assert_eq!(first, 3);
        // Second one escalates on the prior severity-3 incident.
        let second = resolver::resolve_severity(
            CategoryId::SafetyBoundary,
            grade,
            &EscalationContext {
                same_category_prior: 1,
                max_prior_severity: first,
                ..Default::default()
            },
        );
        assert_eq!(second, 4);

        let status = session_status(
            &m,
            grade,
            &SessionSnapshot {
                total_incidents: 2,
                recent_incidents: 2,
                max_severity: second,
                severity4_count: 1,
                safety_incidents: 2,
            },
        );
        assert!(status.should_stop);
        assert_eq!(status.warning_level, WarningLevel::Red);
    }

    #[test]
    fn stop_rule_also_fires_on_accumulation() {
        let m = Methodology::built_in();
        let status = session_status(
            &m,
            7,
            &SessionSnapshot {
                total_incidents: 5,
                recent_incidents: 1,
                max_severity: 3,
                severity4_count: 0,
                safety_incidents: 0,
            },
        );
        assert!(status.should_stop);

        let below = session_status(
            &m,
            7,
            &SessionSnapshot {
                total_incidents: 4,
                recent_incidents: 1,
                max_severity: 3,
                severity4_count: 0,
                safety_incidents: 0,
            },
        );
        assert!(!below.should_stop);
    }

    #[test]
    fn countdown_is_numeric_for_young_and_qualitative_for_old() {
        let m = Methodology::built_in();
        let snapshot = SessionSnapshot {
            total_incidents: 2,
            recent_incidents: 1,
            max_severity: 2,
            severity4_count: 0,
            safety_incidents: 0,
        };
        let young = session_status(&m, 2, &snapshot);
        assert!(young.countdown.contains("more before consequence"));
        assert!(young.countdown.starts_with('3'));

        let old = session_status(&m, 12, &snapshot);
        assert!(!old.countdown.contains("more before consequence"));
    }

    #[test]
    fn numeric_countdown_distinguishes_exhausted_allowance() {
        let m = Methodology::built_in();
        // At the stop threshold but max severity below 3: the session keeps
        // going, yet "1 more" would understate where the student stands.
        let snapshot = SessionSnapshot {
            total_incidents: 5,
            recent_incidents: 1,
            max_severity: 2,
            severity4_count: 0,
            safety_incidents: 0,
        };
        let status = session_status(&m, 2, &snapshot);
        assert!(!status.should_stop);
        assert_eq!(status.warning_level, WarningLevel::Red);
        assert!(!status.countdown.contains("more before consequence"));
        assert!(status.countdown.contains("No chances left"));
    }

    #[test]
    fn warning_ladder_escalates_with_density() {
        let m = Methodology::built_in();
        let quiet = SessionSnapshot::default();
        assert_eq!(session_status(&m, 8, &quiet).warning_level, WarningLevel::Green);

        let busy = SessionSnapshot {
            total_incidents: 2,
            recent_incidents: 2,
            max_severity: 2,
            ..Default::default()
        };
        assert_eq!(session_status(&m, 8, &busy).warning_level, WarningLevel::Yellow);

        let dense = SessionSnapshot {
            total_incidents: 3,
            recent_incidents: 3,
            max_severity: 2,
            ..Default::default()
        };
        assert_eq!(session_status(&m, 8, &dense).warning_level, WarningLevel::Orange);
    }

    #[test]
    fn parent_contact_uses_band_threshold() {
        let m = Methodology::built_in();
        let snapshot = SessionSnapshot {
            total_incidents: 3,
            ..Default::default()
        };
        assert!(session_status(&m, 1, &snapshot).parent_contact_due);
        assert!(!session_status(&m, 12, &snapshot).parent_contact_due);
    }
}
