use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MIN_GRADE: u8 = 1;
pub const MAX_GRADE: u8 = 13;

/// The five ordered age groupings. Bands drive tone selection and cap how
/// far the intervention ladder may escalate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum GradeBandId {
    EarlyPrimary,
    Primary,
    Middle,
    High,
    SeniorHigh,
}

impl GradeBandId {
    pub const ALL: [GradeBandId; 5] = [
        GradeBandId::EarlyPrimary,
        GradeBandId::Primary,
        GradeBandId::Middle,
        GradeBandId::High,
        GradeBandId::SeniorHigh,
    ];

    /// Position in band order, 0 = youngest.
    pub fn index(self) -> usize {
        match self {
            GradeBandId::EarlyPrimary => 0,
            GradeBandId::Primary => 1,
            GradeBandId::Middle => 2,
            GradeBandId::High => 3,
            GradeBandId::SeniorHigh => 4,
        }
    }

    /// Younger bands get explicit counts in warnings; older bands get
    /// qualitative accountability language. Policy intent, not a style choice.
    pub fn uses_numeric_countdown(self) -> bool {
        matches!(self, GradeBandId::EarlyPrimary | GradeBandId::Primary)
    }
}

/// One age grouping with its escalation ceilings and contact thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GradeBand {
    pub id: GradeBandId,
    pub name: String,
    /// Inclusive grade range. The five bands partition 1..=13.
    pub min_grade: u8,
    pub max_grade: u8,
    /// Cap on ladder escalation within this band (1..=5)
    pub max_ladder_step: u8,
    /// Incident count that triggers a parent notice
    pub parent_contact_threshold: u32,
    /// Incident count at which stopping the session is considered
    pub session_stop_threshold: u32,
}

/// Severity is a closed, ordered 1..=5 scale. Level 4 is the policy-mandated
/// session-stop floor; level 5 is administrative termination and is never
/// computed by the engine. The table is never user-customizable.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SeverityLevel {
    pub level: u8,
    pub name: String,
    pub description: String,
    /// Display color token for the rendering layer
    pub color: String,
    pub immediate_action: String,
}

/// Script tone. Selection is rule-driven, never free-form.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Gentle,
    Neutral,
    Firm,
}

/// One short spoken line per tone. All three are always present so the
/// operator can shift tone without consulting another screen.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToneScripts {
    pub gentle: String,
    pub neutral: String,
    pub firm: String,
}

impl ToneScripts {
    pub fn line(&self, tone: Tone) -> &str {
        match tone {
            Tone::Gentle => &self.gentle,
            Tone::Neutral => &self.neutral,
            Tone::Firm => &self.firm,
        }
    }
}

/// The eight fixed behavior categories. `Other` is the catch-all and also
/// the fallback row for any lookup that misses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryId {
    Disruption,
    Defiance,
    OffTask,
    Disrespect,
    PeerConflict,
    PropertyMisuse,
    SafetyBoundary,
    Other,
}

impl CategoryId {
    pub const ALL: [CategoryId; 8] = [
        CategoryId::Disruption,
        CategoryId::Defiance,
        CategoryId::OffTask,
        CategoryId::Disrespect,
        CategoryId::PeerConflict,
        CategoryId::PropertyMisuse,
        CategoryId::SafetyBoundary,
        CategoryId::Other,
    ];

    pub fn index(self) -> usize {
        match self {
            CategoryId::Disruption => 0,
            CategoryId::Defiance => 1,
            CategoryId::OffTask => 2,
            CategoryId::Disrespect => 3,
            CategoryId::PeerConflict => 4,
            CategoryId::PropertyMisuse => 5,
            CategoryId::SafetyBoundary => 6,
            CategoryId::Other => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CategoryId::Disruption => "DISRUPTION",
            CategoryId::Defiance => "DEFIANCE",
            CategoryId::OffTask => "OFF_TASK",
            CategoryId::Disrespect => "DISRESPECT",
            CategoryId::PeerConflict => "PEER_CONFLICT",
            CategoryId::PropertyMisuse => "PROPERTY_MISUSE",
            CategoryId::SafetyBoundary => "SAFETY_BOUNDARY",
            CategoryId::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> Option<CategoryId> {
        CategoryId::ALL.iter().copied().find(|c| c.as_str() == s)
    }
}

/// An ordered intervention within a category, valid only for a subset of
/// grade bands.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LadderStep {
    /// Step number 1..=5
    pub step: u8,
    pub action: String,
    pub valid_bands: Vec<GradeBandId>,
}

impl LadderStep {
    fn new(step: u8, action: &str, valid_bands: &[GradeBandId]) -> Self {
        LadderStep {
            step,
            action: action.to_string(),
            valid_bands: valid_bands.to_vec(),
        }
    }
}

/// One behavior category with its escalation ladder, tone scripts, and
/// consequence policy.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: CategoryId,
    pub label: String,
    /// Keyboard shortcut for one-hand logging mid-lesson
    pub shortcut: char,
    /// Steps 1..=5, each valid for a subset of bands
    pub ladder: Vec<LadderStep>,
    /// Spoken lines keyed by grade band; each entry carries all three tones
    pub scripts: BTreeMap<GradeBandId, ToneScripts>,
    pub restorative_prompt: String,
    pub allowed_consequences: Vec<String>,
    pub blocked_consequences: Vec<String>,
    pub prevention_tip: String,
}

/// Persisted custom methodology configuration. Bands and categories may be
/// overridden; the severity table may be present in an import but is always
/// discarded in favor of the built-in one, so the stop/escalate contract
/// cannot be weakened by a bad import.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MethodologyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bands: Option<Vec<GradeBand>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Category>>,
    /// Accepted on import for round-trip compatibility, never applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_levels: Option<Vec<SeverityLevel>>,
}

/// Immutably-loaded methodology. Constructed once (built-in or from a
/// validated custom config) and passed by reference — no ambient globals.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Methodology {
    bands: Vec<GradeBand>,
    severity_levels: Vec<SeverityLevel>,
    categories: Vec<Category>,
}

impl Methodology {
    /// The band covering `grade`. Grades are validated to 1..=13 at input;
    /// anything past the last band's range maps to the last band.
    pub fn band_for_grade(&self, grade: u8) -> &GradeBand {
        self.bands
            .iter()
            .find(|b| grade >= b.min_grade && grade <= b.max_grade)
            .unwrap_or(&self.bands[self.bands.len() - 1])
    }

    pub fn band(&self, id: GradeBandId) -> &GradeBand {
        self.bands
            .iter()
            .find(|b| b.id == id)
            .unwrap_or(&self.bands[self.bands.len() - 1])
    }

    pub fn category(&self, id: CategoryId) -> &Category {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .unwrap_or(&self.categories[self.categories.len() - 1])
    }

    /// Severity level metadata. Out-of-range input clamps into 1..=5.
    pub fn severity(&self, level: u8) -> &SeverityLevel {
        let idx = (level.clamp(1, 5) - 1) as usize;
        &self.severity_levels[idx]
    }

    pub fn severity_levels(&self) -> &[SeverityLevel] {
        &self.severity_levels
    }

    pub fn bands(&self) -> &[GradeBand] {
        &self.bands
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Ladder-step selection: target = min(count + 1, band cap); return the
    /// entry with that step number that is valid for the band. A miss falls
    /// back to the category's first entry — policy default, not an error.
    pub fn ladder_step(
        &self,
        category: CategoryId,
        incident_count: u32,
        band: GradeBandId,
    ) -> &LadderStep {
        let cat = self.category(category);
        let cap = self.band(band).max_ladder_step;
        let target = (incident_count.saturating_add(1)).min(cap as u32) as u8;
        cat.ladder
            .iter()
            .find(|s| s.step == target && s.valid_bands.contains(&band))
            .unwrap_or(&cat.ladder[0])
    }

    /// Apply a persisted custom config on top of the built-in methodology.
    /// Severity levels always come from the built-in table. Returns the
    /// accumulated problems if the config is incompatible; the caller keeps
    /// the previous methodology in that case.
    pub fn from_config(config: &MethodologyConfig) -> Result<Methodology, Vec<String>> {
        let mut errors = Vec::new();
        let built_in = Methodology::built_in();

        let bands = match &config.bands {
            Some(bands) => {
                validate_bands(bands, &mut errors);
                bands.clone()
            }
            None => built_in.bands.clone(),
        };
        let categories = match &config.categories {
            Some(categories) => {
                validate_categories(categories, &mut errors);
                categories.clone()
            }
            None => built_in.categories.clone(),
        };

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Methodology {
            bands,
            severity_levels: built_in.severity_levels,
            categories,
        })
    }

    pub fn built_in() -> Methodology {
        Methodology {
            bands: built_in_bands(),
            severity_levels: built_in_severity_levels(),
            categories: built_in_categories(),
        }
    }
}

fn validate_bands(bands: &[GradeBand], errors: &mut Vec<String>) {
    if bands.len() != 5 {
        errors.push(format!("bands: expected 5 bands, got {}", bands.len()));
        return;
    }
    // Ranges must partition 1..=13 in band order with no gaps or overlaps.
    let mut next = MIN_GRADE;
    for band in bands {
        if band.min_grade != next {
            errors.push(format!(
                "bands.{:?}: range starts at {}, expected {}",
                band.id, band.min_grade, next
            ));
        }
        if band.max_grade < band.min_grade {
            errors.push(format!("bands.{:?}: empty grade range", band.id));
        }
        if band.max_ladder_step < 1 || band.max_ladder_step > 5 {
            errors.push(format!(
                "bands.{:?}: max_ladder_step must be 1..=5, got {}",
                band.id, band.max_ladder_step
            ));
        }
        next = band.max_grade.saturating_add(1);
    }
    if next != MAX_GRADE + 1 {
        errors.push(format!(
            "bands: ranges cover 1..={}, expected 1..={}",
            next - 1,
            MAX_GRADE
        ));
    }
}

fn validate_categories(categories: &[Category], errors: &mut Vec<String>) {
    for expected in CategoryId::ALL {
        if !categories.iter().any(|c| c.id == expected) {
            errors.push(format!("categories: missing {}", expected.as_str()));
        }
    }
    for cat in categories {
        if cat.ladder.is_empty() {
            errors.push(format!("categories.{}: ladder is empty", cat.id.as_str()));
            continue;
        }
        let mut prev = 0u8;
        for step in &cat.ladder {
            if step.step < 1 || step.step > 5 {
                errors.push(format!(
                    "categories.{}: ladder step {} out of 1..=5",
                    cat.id.as_str(),
                    step.step
                ));
            }
            if step.step < prev {
                errors.push(format!(
                    "categories.{}: ladder steps out of order",
                    cat.id.as_str()
                ));
            }
            prev = step.step;
        }
        // Every step must be reachable by at least one band; the per-band
        // cap is enforced at selection time, not here, since steps above a
        // band's cap are legitimately listed for older bands.
        if cat.ladder.iter().any(|s| s.valid_bands.is_empty()) {
            errors.push(format!(
                "categories.{}: ladder step with no valid bands",
                cat.id.as_str()
            ));
        }
    }
}

fn built_in_bands() -> Vec<GradeBand> {
    vec![
        GradeBand {
            id: GradeBandId::EarlyPrimary,
            name: "Early primary".to_string(),
            min_grade: 1,
            max_grade: 2,
            max_ladder_step: 3,
            parent_contact_threshold: 3,
            session_stop_threshold: 5,
        },
        GradeBand {
            id: GradeBandId::Primary,
            name: "Primary".to_string(),
            min_grade: 3,
            max_grade: 5,
            max_ladder_step: 3,
            parent_contact_threshold: 3,
            session_stop_threshold: 5,
        },
        GradeBand {
            id: GradeBandId::Middle,
            name: "Middle".to_string(),
            min_grade: 6,
            max_grade: 8,
            max_ladder_step: 4,
            parent_contact_threshold: 4,
            session_stop_threshold: 5,
        },
        GradeBand {
            id: GradeBandId::High,
            name: "High".to_string(),
            min_grade: 9,
            max_grade: 10,
            max_ladder_step: 5,
            parent_contact_threshold: 4,
            session_stop_threshold: 6,
        },
        GradeBand {
            id: GradeBandId::SeniorHigh,
            name: "Senior high".to_string(),
            min_grade: 11,
            max_grade: 13,
            max_ladder_step: 5,
            parent_contact_threshold: 5,
            session_stop_threshold: 6,
        },
    ]
}

fn built_in_severity_levels() -> Vec<SeverityLevel> {
    let level = |level: u8, name: &str, description: &str, color: &str, action: &str| {
        SeverityLevel {
            level,
            name: name.to_string(),
            description: description.to_string(),
            color: color.to_string(),
            immediate_action: action.to_string(),
        }
    };
    vec![
        level(
            1,
            "Minor",
            "Low-level interruption that resolves with a cue",
            "severity-green",
            "Nonverbal cue, keep the lesson moving",
        ),
        level(
            2,
            "Moderate",
            "Repeated or deliberate disruption of the working climate",
            "severity-yellow",
            "Named verbal redirect with an expectation reminder",
        ),
        level(
            3,
            "Serious",
            "Open defiance or behavior affecting other students",
            "severity-orange",
            "Pause the lesson, deliver a firm boundary and a choice",
        ),
        level(
            4,
            "Critical",
            "Unsafe or sustained behavior; the session cannot continue as-is",
            "severity-red",
            "Stop the session and follow the safety protocol",
        ),
        level(
            5,
            "Administrative",
            "Termination handled outside the in-session engine",
            "severity-black",
            "Hand over to the responsible administrator",
        ),
    ]
}

/// Build the per-band script map from one line set for the two youngest
/// bands and one for the three oldest. The split mirrors the countdown
/// asymmetry: concrete external structure for younger students, internal
/// accountability language for older ones.
fn script_set(young: [&str; 3], old: [&str; 3]) -> BTreeMap<GradeBandId, ToneScripts> {
    let mut map = BTreeMap::new();
    for band in GradeBandId::ALL {
        let [gentle, neutral, firm] = if band.uses_numeric_countdown() {
            young
        } else {
            old
        };
        map.insert(
            band,
            ToneScripts {
                gentle: gentle.to_string(),
                neutral: neutral.to_string(),
                firm: firm.to_string(),
            },
        );
    }
    map
}

fn built_in_categories() -> Vec<Category> {
    use GradeBandId::*;
    let all = &[EarlyPrimary, Primary, Middle, High, SeniorHigh];
    let older = &[Middle, High, SeniorHigh];
    let high_only = &[High, SeniorHigh];

    let category = |id: CategoryId,
                    label: &str,
                    shortcut: char,
                    ladder: Vec<LadderStep>,
                    scripts: BTreeMap<GradeBandId, ToneScripts>,
                    restorative: &str,
                    allowed: &[&str],
                    blocked: &[&str],
                    tip: &str| Category {
        id,
        label: label.to_string(),
        shortcut,
        ladder,
        scripts,
        restorative_prompt: restorative.to_string(),
        allowed_consequences: allowed.iter().map(|s| s.to_string()).collect(),
        blocked_consequences: blocked.iter().map(|s| s.to_string()).collect(),
        prevention_tip: tip.to_string(),
    };

    vec![
        category(
            CategoryId::Disruption,
            "Disruption",
            'd',
            vec![
                LadderStep::new(1, "Nonverbal cue and proximity", all),
                LadderStep::new(2, "Quiet named reminder of the working rule", all),
                LadderStep::new(3, "Short private conversation at the desk", all),
                LadderStep::new(4, "Seat change or materials change", older),
                LadderStep::new(5, "Structured break outside the room", high_only),
            ],
            script_set(
                [
                    "I can see you have lots of energy. Show me quiet hands first.",
                    "We raise a hand before talking. Try that now.",
                    "Stop. Voices off. We continue when it is quiet.",
                ],
                [
                    "Let's keep the thread — hold that thought for two minutes.",
                    "You're pulling the group off track. Bring it back.",
                    "This stops now. You and I talk after this block.",
                ],
            ),
            "What did you need in that moment, and how can you get it without stopping the group?",
            &["Loss of free-choice minutes", "Written reflection", "Seat change"],
            &["Public shaming", "Extra academic work as punishment"],
            "Channel energy early: give a movement task before the long block starts.",
        ),
        category(
            CategoryId::Defiance,
            "Defiance / refusal",
            'f',
            vec![
                LadderStep::new(1, "Restate the instruction once, then give take-up time", all),
                LadderStep::new(2, "Offer a structured two-option choice", all),
                LadderStep::new(3, "State the consequence path and step away", all),
                LadderStep::new(4, "Follow through on the named consequence", older),
                LadderStep::new(5, "Remove the audience: continue one-on-one", high_only),
            ],
            script_set(
                [
                    "I'll ask once more, then I'll help you start.",
                    "You can start with the first line or the picture. Pick one.",
                    "This is not a choice task. Start now.",
                ],
                [
                    "Take a minute, then pick up where we agreed.",
                    "You know the expectation. Choose how you meet it.",
                    "Refusing has a cost you know. Decide in the next minute.",
                ],
            ),
            "What part of the task felt impossible, and what would make it startable?",
            &["Task completed in own time", "Loss of privilege", "Parent notice"],
            &["Physical enforcement", "Grade penalty for behavior"],
            "Pre-empt refusal with a micro-start: agree on the first 30 seconds of the task.",
        ),
        category(
            CategoryId::OffTask,
            "Off task",
            'o',
            vec![
                LadderStep::new(1, "Proximity and a glance at the work", all),
                LadderStep::new(2, "Redirect to the next concrete step", all),
                LadderStep::new(3, "Shrink the task to one visible action", all),
                LadderStep::new(4, "Timed check-in contract for the rest of the block", older),
                LadderStep::new(5, "Move to a distraction-reduced spot", high_only),
            ],
            script_set(
                [
                    "Show me where you are on the page.",
                    "Next step: write the first word.",
                    "Work now, chat at the break. Start.",
                ],
                [
                    "Where are you at with this — walk me through it?",
                    "Two minutes, one result. Show me after.",
                    "You're spending the session's time. Close it out now.",
                ],
            ),
            "What usually pulls you off the task, and what is your own re-entry move?",
            &["Work finished before free time", "Shortened break"],
            &["Confiscating personal items beyond the session", "Detention"],
            "Agree on a visible micro-goal before each block; off-task drops when the next step is obvious.",
        ),
        category(
            CategoryId::Disrespect,
            "Disrespect",
            'r',
            vec![
                LadderStep::new(1, "Flat, private naming of the line crossed", all),
                LadderStep::new(2, "Expectation restated with a repair invitation", all),
                LadderStep::new(3, "Formal warning with the consequence named", all),
                LadderStep::new(4, "Repair conversation and the named consequence", older),
                LadderStep::new(5, "Session continues only after a repair agreement", high_only),
            ],
            script_set(
                [
                    "Those words hurt. We use kind words here.",
                    "That tone doesn't work here. Try it again politely.",
                    "Stop. That language ends now.",
                ],
                [
                    "That came out sharp — want to rephrase it?",
                    "Disagree with the task, fine. Respect stays non-negotiable.",
                    "That crossed a line. We deal with it after this block.",
                ],
            ),
            "Who was affected by what you said, and what would repair look like?",
            &["Verbal or written apology", "Repair conversation", "Parent notice"],
            &["Responding in kind", "Sarcasm toward the student"],
            "Model the register you expect; sharp corrections invite sharp replies.",
        ),
        category(
            CategoryId::PeerConflict,
            "Peer conflict",
            'p',
            vec![
                LadderStep::new(1, "Separate and de-escalate, no blame yet", all),
                LadderStep::new(2, "Hear both sides briefly, set a truce for the session", all),
                LadderStep::new(3, "Reseat and restructure the pairing", all),
                LadderStep::new(4, "Mediated conversation with agreements written down", older),
                LadderStep::new(5, "Formal mediation with follow-up check", high_only),
            ],
            script_set(
                [
                    "Everyone takes a breath. You sit here, you sit there.",
                    "One at a time. What happened from your side?",
                    "Hands and words to yourselves. Now.",
                ],
                [
                    "Park the conflict — we solve it properly after the block.",
                    "You don't have to like each other. You do have to work next to each other.",
                    "This ends here or the session ends. Your call.",
                ],
            ),
            "What does the other person need to hear from you for this to be settled?",
            &["Mediated repair", "Changed seating plan", "Parent notice"],
            &["Forcing a public apology", "Collective punishment"],
            "Watch pairings: most conflicts repeat along the same pair lines.",
        ),
        category(
            CategoryId::PropertyMisuse,
            "Property misuse",
            'm',
            vec![
                LadderStep::new(1, "Name the rule for the material in hand", all),
                LadderStep::new(2, "Remove the item for the rest of the block", all),
                LadderStep::new(3, "Replace the activity with a no-materials variant", all),
                LadderStep::new(4, "Restitution plan for damaged material", older),
                LadderStep::new(5, "Restricted materials list for future sessions", high_only),
            ],
            script_set(
                [
                    "Scissors are for paper. Show me how we hold them.",
                    "That's not what the tablet is for. Back to the app we use.",
                    "Put it down. It stays with me until the break.",
                ],
                [
                    "Equipment survives this session — that's the deal.",
                    "Use it as intended or work without it.",
                    "You broke it, you own the fix. We'll write it down.",
                ],
            ),
            "How do you make good on the damage, and what stops it happening again?",
            &["Restitution or repair", "Loss of material access", "Parent notice"],
            &["Charging beyond actual cost", "Public inventory of the damage"],
            "Issue materials with the rule attached, not after the first misuse.",
        ),
        category(
            CategoryId::SafetyBoundary,
            "Safety boundary",
            's',
            vec![
                LadderStep::new(1, "Immediate stop signal and distance", all),
                LadderStep::new(2, "Supervised reset break", all),
                LadderStep::new(3, "Session paused, safety check", all),
                LadderStep::new(4, "Session stopped, guardian contacted", all),
                LadderStep::new(5, "Administrative handover", high_only),
            ],
            script_set(
                [
                    "Stop. That's not safe. Stand here with me.",
                    "Safety rule: feet on the floor, hands to yourself.",
                    "Stop now. We sit down until everyone is safe.",
                ],
                [
                    "That's a hard line. Step back with me for a second.",
                    "Safety isn't negotiable — we pause until it's settled.",
                    "The session stops here. We call home today.",
                ],
            ),
            "What was happening right before, and what is your plan when that feeling comes back?",
            &["Supervised break", "Session stop", "Guardian contact"],
            &["Physical restraint beyond protective necessity", "Isolation without supervision"],
            "Know each student's early warning signs; safety incidents rarely start at step four.",
        ),
        category(
            CategoryId::Other,
            "Other",
            'x',
            vec![
                LadderStep::new(1, "Observe and name what you see, without judgment", all),
                LadderStep::new(2, "Private check-in on what is going on", all),
                LadderStep::new(3, "Agree one concrete change for the rest of the session", all),
                LadderStep::new(4, "Document and involve the responsible contact", older),
                LadderStep::new(5, "Escalate outside the session", high_only),
            ],
            script_set(
                [
                    "I noticed something changed. Want to tell me?",
                    "Let's check in for a moment — what's up?",
                    "Something has to change right now. Here's what.",
                ],
                [
                    "Something's off today — fair to say?",
                    "Tell me what's going on so we can keep this workable.",
                    "As it stands this doesn't work. What changes, right now?",
                ],
            ),
            "What would you name as the real issue, in your own words?",
            &["Documented agreement", "Follow-up conversation"],
            &["Guessing at motives in front of others"],
            "Uncategorized patterns deserve a note: three 'other' entries usually reveal a category.",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_partition_all_grades() {
        let m = Methodology::built_in();
        for grade in MIN_GRADE..=MAX_GRADE {
            let matches: Vec<_> = m
                .bands()
                .iter()
                .filter(|b| grade >= b.min_grade && grade <= b.max_grade)
                .collect();
            assert_eq!(matches.len(), 1, "grade {} must be in exactly one band", grade);
            assert_eq!(m.band_for_grade(grade).id, matches[0].id);
        }
    }

    #[test]
    fn ladder_step_is_monotonic_and_capped() {
        let m = Methodology::built_in();
        for cat in CategoryId::ALL {
            for band in GradeBandId::ALL {
                let cap = m.band(band).max_ladder_step;
                let mut prev = 0u8;
                for count in 0..10u32 {
                    let step = m.ladder_step(cat, count, band);
                    assert!(
                        step.step <= cap,
                        "{:?}/{:?} count {} returned step {} over cap {}",
                        cat,
                        band,
                        count,
                        step.step,
                        cap
                    );
                    assert!(
                        step.step >= prev,
                        "{:?}/{:?} step sequence decreased at count {}",
                        cat,
                        band,
                        count
                    );
                    prev = step.step;
                }
            }
        }
    }

    #[test]
    fn ladder_step_falls_back_to_first_entry() {
        let built_in = Methodology::built_in();
        let mut categories = built_in.categories().to_vec();
        // Strip the step the rule will target so the lookup misses.
        for cat in &mut categories {
            if cat.id == CategoryId::Other {
                cat.ladder.retain(|s| s.step != 2);
            }
        }
        let config = MethodologyConfig {
            bands: None,
            categories: Some(categories),
            severity_levels: None,
        };
        let m = Methodology::from_config(&config).expect("config should apply");
        let step = m.ladder_step(CategoryId::Other, 1, GradeBandId::Middle);
        assert_eq!(step.step, m.category(CategoryId::Other).ladder[0].step);
    }

    #[test]
    fn every_category_has_scripts_for_every_band() {
        let m = Methodology::built_in();
        for cat in m.categories() {
            for band in GradeBandId::ALL {
                let scripts = cat.scripts.get(&band);
                assert!(scripts.is_some(), "{:?} missing scripts for {:?}", cat.id, band);
            }
        }
    }

    #[test]
    fn custom_config_never_overrides_severity_levels() {
        let config = MethodologyConfig {
            bands: None,
            categories: None,
            severity_levels: Some(vec![SeverityLevel {
                level: 4,
                name: "Defanged".to_string(),
                description: "weakened import".to_string(),
                color: "severity-green".to_string(),
                immediate_action: "carry on".to_string(),
            }]),
        };
        let m = Methodology::from_config(&config).expect("config should apply");
        assert_eq!(m.severity(4).name, "Critical");
        assert_eq!(m.severity_levels().len(), 5);
    }

    #[test]
    fn built_in_data_passes_its_own_validation() {
        let built_in = Methodology::built_in();
        let config = MethodologyConfig {
            bands: Some(built_in.bands().to_vec()),
            categories: Some(built_in.categories().to_vec()),
            severity_levels: None,
        };
        assert!(Methodology::from_config(&config).is_ok());
    }

    #[test]
    fn config_with_gapped_bands_is_rejected() {
        let mut bands = built_in_bands();
        bands[1].min_grade = 4; // leaves grade 3 uncovered
        let config = MethodologyConfig {
            bands: Some(bands),
            categories: None,
            severity_levels: None,
        };
        let errors = Methodology::from_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("Primary")));
    }

    #[test]
    fn severity_lookup_clamps() {
        let m = Methodology::built_in();
        assert_eq!(m.severity(0).level, 1);
        assert_eq!(m.severity(9).level, 5);
    }
}
