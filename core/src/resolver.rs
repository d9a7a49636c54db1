use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::methodology::CategoryId;

/// Engine-computed severity is capped at 4; level 5 is administrative and
/// never produced here.
pub const MAX_COMPUTED_SEVERITY: u8 = 4;

/// Session time after which identical behavior weighs heavier (fatigue).
pub const LATE_SESSION_SECONDS: u64 = 45 * 60;

/// Window for the incident-density escalation check.
pub const DENSITY_WINDOW_SECONDS: u64 = 10 * 60;

/// Grade-aware base severity, rows by category, columns by the five band
/// indices (grade <=2, <=5, <=8, <=10, >10). Identical behavior carries
/// higher severity as accountability increases, so every row is
/// non-decreasing left to right.
const BASE_SEVERITY: [[u8; 5]; 8] = [
    // DISRUPTION
    [1, 1, 1, 2, 2],
    // DEFIANCE
    [1, 2, 2, 2, 3],
    // OFF_TASK
    [1, 1, 1, 1, 2],
    // DISRESPECT
    [1, 2, 2, 3, 3],
    // PEER_CONFLICT
    [2, 2, 2, 3, 3],
    // PROPERTY_MISUSE
    [2, 2, 3, 3, 3],
    // SAFETY_BOUNDARY
    [3, 3, 3, 4, 4],
    // OTHER
    [1, 1, 1, 2, 2],
];

/// Band index for the base-severity table.
pub fn band_index(grade: u8) -> usize {
    if grade <= 2 {
        0
    } else if grade <= 5 {
        1
    } else if grade <= 8 {
        2
    } else if grade <= 10 {
        3
    } else {
        4
    }
}

/// Base severity for a category at a given grade, before escalation factors.
pub fn base_severity(category: CategoryId, grade: u8) -> u8 {
    BASE_SEVERITY[category.index()][band_index(grade)]
}

/// Session context consumed by the escalation step. Built from the live
/// session's discipline state and incident history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EscalationContext {
    /// Prior incidents of the same category this session
    pub same_category_prior: u32,
    /// Incidents within the trailing density window of session time
    pub recent_incidents: u32,
    /// Elapsed session seconds at the time of the incident
    pub elapsed_seconds: u64,
    /// Highest severity among prior incidents this session (0 if none)
    pub max_prior_severity: u8,
}

/// Apply the four escalation checks. Each is an independent +1, order-free,
/// and the result is clamped to 4. They are checks, not multipliers: a
/// condition that holds "twice over" still contributes exactly one step.
pub fn escalate(base: u8, ctx: &EscalationContext) -> u8 {
    let mut severity = base;
    if ctx.same_category_prior >= 2 {
        severity += 1;
    }
    if ctx.recent_incidents >= 3 {
        severity += 1;
    }
    if ctx.elapsed_seconds > LATE_SESSION_SECONDS {
        severity += 1;
    }
    if ctx.max_prior_severity >= 3 {
        severity += 1;
    }
    severity.min(MAX_COMPUTED_SEVERITY)
}

/// Base + escalation in one call.
pub fn resolve_severity(category: CategoryId, grade: u8, ctx: &EscalationContext) -> u8 {
    escalate(base_severity(category, grade), ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_severity_rows_are_monotonic_across_bands() {
        for category in CategoryId::ALL {
            let row = BASE_SEVERITY[category.index()];
            for pair in row.windows(2) {
                assert!(
                    pair[0] <= pair[1],
                    "{:?} row decreases: {:?}",
                    category,
                    row
                );
            }
        }
    }

    #[test]
    fn base_severity_stays_in_engine_range() {
        for category in CategoryId::ALL {
            for grade in 1..=13u8 {
                let s = base_severity(category, grade);
                assert!((1..=MAX_COMPUTED_SEVERITY).contains(&s));
            }
        }
    }

    #[test]
    fn band_index_matches_band_boundaries() {
        assert_eq!(band_index(1), 0);
        assert_eq!(band_index(2), 0);
        assert_eq!(band_index(3), 1);
        assert_eq!(band_index(5), 1);
        assert_eq!(band_index(6), 2);
        assert_eq!(band_index(8), 2);
        assert_eq!(band_index(9), 3);
        assert_eq!(band_index(10), 3);
        assert_eq!(band_index(11), 4);
        assert_eq!(band_index(13), 4);
    }

    #[test]
    fn escalation_increments_are_independent() {
        let base = 1;
        let full = EscalationContext {
            same_category_prior: 2,
            recent_incidents: 3,
            elapsed_seconds: LATE_SESSION_SECONDS + 1,
            max_prior_severity: 3,
        };
        assert_eq!(escalate(base, &full), 4); // 1 + 4 increments, clamped

        let one = EscalationContext {
            same_category_prior: 5,
            ..Default::default()
        };
        // A condition holding many times over still contributes one step.
        assert_eq!(escalate(base, &one), 2);
    }

    #[test]
    fn escalation_is_clamped_to_four() {
        let ctx = EscalationContext {
            same_category_prior: 2,
            recent_incidents: 3,
            elapsed_seconds: LATE_SESSION_SECONDS + 1,
            max_prior_severity: 4,
        };
        assert_eq!(escalate(4, &ctx), 4);
        assert_eq!(escalate(3, &ctx), 4);
    }

    #[test]
    fn escalation_without_triggers_keeps_base() {
        let ctx = EscalationContext {
            same_category_prior: 1,
            recent_incidents: 2,
            elapsed_seconds: LATE_SESSION_SECONDS,
            max_prior_severity: 2,
        };
        assert_eq!(escalate(2, &ctx), 2);
    }

    #[test]
    fn safety_boundary_floors_at_serious() {
        for grade in 1..=13u8 {
            assert!(base_severity(CategoryId::SafetyBoundary, grade) >= 3);
        }
    }
}
