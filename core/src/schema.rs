//! Schema-driven validation and sanitization for advisory responses.
//!
//! Every advisory packet is wire data from an external collaborator and is
//! treated as hostile until it has passed through `validate_advisory`. The
//! validator is a generic recursive walker over a schema-as-data structure
//! rather than a hand-written validator per shape, since the shape evolves.
//! It never panics and accumulates every violation in one pass so a rejected
//! packet is fully diagnosable from its error list.

use serde_json::Value;

use crate::advisory::{
    AdvisoryPacket, MAX_FAIRNESS_NOTES, MAX_INTENT_ALTERNATIVES, MAX_SCRIPT_CHARS,
};
use crate::methodology::CategoryId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl FieldKind {
    fn name(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Object => "object",
            FieldKind::Array => "array",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
        }
    }
}

/// One node of the schema tree. Constraints that don't apply to the kind
/// are simply unused.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub kind: FieldKind,
    pub enum_values: Option<Vec<&'static str>>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub max_length: Option<usize>,
    pub max_items: Option<usize>,
    /// For objects: known properties and the required subset
    pub properties: Vec<(&'static str, FieldSchema)>,
    pub required: Vec<&'static str>,
    /// For arrays: the item schema
    pub items: Option<Box<FieldSchema>>,
}

impl FieldSchema {
    fn of(kind: FieldKind) -> FieldSchema {
        FieldSchema {
            kind,
            enum_values: None,
            min: None,
            max: None,
            max_length: None,
            max_items: None,
            properties: Vec::new(),
            required: Vec::new(),
            items: None,
        }
    }

    pub fn string() -> FieldSchema {
        FieldSchema::of(FieldKind::String)
    }

    pub fn number() -> FieldSchema {
        FieldSchema::of(FieldKind::Number)
    }

    pub fn integer() -> FieldSchema {
        FieldSchema::of(FieldKind::Integer)
    }

    pub fn boolean() -> FieldSchema {
        FieldSchema::of(FieldKind::Boolean)
    }

    pub fn object(properties: Vec<(&'static str, FieldSchema)>, required: &[&'static str]) -> FieldSchema {
        let mut schema = FieldSchema::of(FieldKind::Object);
        schema.properties = properties;
        schema.required = required.to_vec();
        schema
    }

    pub fn array_of(items: FieldSchema) -> FieldSchema {
        let mut schema = FieldSchema::of(FieldKind::Array);
        schema.items = Some(Box::new(items));
        schema
    }

    pub fn one_of(mut self, values: Vec<&'static str>) -> FieldSchema {
        self.enum_values = Some(values);
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> FieldSchema {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn max_length(mut self, max: usize) -> FieldSchema {
        self.max_length = Some(max);
        self
    }

    pub fn max_items(mut self, max: usize) -> FieldSchema {
        self.max_items = Some(max);
        self
    }
}

fn push_error(errors: &mut Vec<String>, path: &str, message: &str) {
    if path.is_empty() {
        errors.push(message.to_string());
    } else {
        errors.push(format!("{}: {}", path, message));
    }
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

/// Walk `value` against `schema`, accumulating path-qualified errors.
/// A type mismatch stops descent at that node (nested constraints would be
/// meaningless) but never aborts the sibling walk.
pub fn validate_value(value: &Value, schema: &FieldSchema, path: &str, errors: &mut Vec<String>) {
    if !schema.kind.matches(value) {
        push_error(
            errors,
            path,
            &format!("expected {}, got {}", schema.kind.name(), type_name(value)),
        );
        return;
    }

    match schema.kind {
        FieldKind::String => {
            let s = value.as_str().unwrap_or_default();
            if let Some(max) = schema.max_length {
                if s.chars().count() > max {
                    push_error(
                        errors,
                        path,
                        &format!("length {} exceeds maximum of {}", s.chars().count(), max),
                    );
                }
            }
            if let Some(allowed) = &schema.enum_values {
                if !allowed.contains(&s) {
                    push_error(
                        errors,
                        path,
                        &format!("'{}' is not one of the allowed values", s),
                    );
                }
            }
        }
        FieldKind::Number | FieldKind::Integer => {
            let n = value.as_f64().unwrap_or_default();
            if let Some(min) = schema.min {
                if n < min {
                    push_error(errors, path, &format!("value must be >= {}", min));
                }
            }
            if let Some(max) = schema.max {
                if n > max {
                    push_error(errors, path, &format!("value must be <= {}", max));
                }
            }
        }
        FieldKind::Boolean => {}
        FieldKind::Object => {
            let map = match value.as_object() {
                Some(map) => map,
                None => return,
            };
            for key in &schema.required {
                if !map.contains_key(*key) {
                    push_error(errors, path, &format!("missing required field '{}'", key));
                }
            }
            for (key, prop_schema) in &schema.properties {
                if let Some(prop) = map.get(*key) {
                    validate_value(prop, prop_schema, &join_path(path, key), errors);
                }
            }
        }
        FieldKind::Array => {
            let items = match value.as_array() {
                Some(items) => items,
                None => return,
            };
            if let Some(max) = schema.max_items {
                if items.len() > max {
                    push_error(
                        errors,
                        path,
                        &format!("{} items exceeds maximum of {}", items.len(), max),
                    );
                }
            }
            if let Some(item_schema) = &schema.items {
                for (i, item) in items.iter().enumerate() {
                    validate_value(item, item_schema, &format!("{}[{}]", path, i), errors);
                }
            }
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Escape the characters that could smuggle markup into the rendering
/// layer. Ampersand is handled per-character along with the rest, so the
/// output of one pass never contains an unescaped metacharacter.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Neutralize every string in the tree, through arrays and nested objects.
/// Unconditional and total: no string field is skipped, and non-string
/// values are never altered. This is the sole defense between a compromised
/// advisory response and the rendering layer.
pub fn sanitize_value(value: &mut Value) {
    match value {
        Value::String(s) => *s = escape_html(s),
        Value::Array(items) => {
            for item in items {
                sanitize_value(item);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                sanitize_value(v);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// The hard contract an advisory response must meet before it is trusted.
pub fn advisory_schema() -> FieldSchema {
    let category_ids: Vec<&'static str> = CategoryId::ALL.iter().map(|c| c.as_str()).collect();

    let intent = FieldSchema::object(
        vec![
            ("label", FieldSchema::string().max_length(120)),
            ("confidence", FieldSchema::number().range(0.0, 1.0)),
            (
                "alternatives",
                FieldSchema::array_of(FieldSchema::string().max_length(120))
                    .max_items(MAX_INTENT_ALTERNATIVES),
            ),
        ],
        &["label"],
    );

    let response = FieldSchema::object(
        vec![
            ("immediateStep", FieldSchema::string().max_length(500)),
            ("ladderAction", FieldSchema::string().max_length(500)),
            ("suggestedLadderStep", FieldSchema::integer().range(1.0, 5.0)),
            ("restorativeAction", FieldSchema::string().max_length(500)),
            ("consequence", FieldSchema::string().max_length(500)),
        ],
        &["immediateStep"],
    );

    let script = FieldSchema::object(
        vec![
            ("gentle", FieldSchema::string().max_length(MAX_SCRIPT_CHARS)),
            ("neutral", FieldSchema::string().max_length(MAX_SCRIPT_CHARS)),
            ("firm", FieldSchema::string().max_length(MAX_SCRIPT_CHARS)),
        ],
        &["gentle", "neutral", "firm"],
    );

    FieldSchema::object(
        vec![
            ("category", FieldSchema::string().one_of(category_ids)),
            ("severity", FieldSchema::integer().range(1.0, 4.0)),
            ("confidence", FieldSchema::number().range(0.0, 1.0)),
            ("intentHypothesis", intent),
            ("recommendedResponse", response),
            ("script", script),
            ("preventionTip", FieldSchema::string().max_length(500)),
            (
                "fairnessNotes",
                FieldSchema::array_of(FieldSchema::string().max_length(300))
                    .max_items(MAX_FAIRNESS_NOTES),
            ),
            (
                "source",
                FieldSchema::string().one_of(vec!["ai", "deterministic"]),
            ),
        ],
        &[
            "category",
            "severity",
            "confidence",
            "recommendedResponse",
            "script",
        ],
    )
}

/// Reduce a raw advisory response to either a sanitized, typed packet or
/// the full list of violations. Any failure rejects the packet wholesale;
/// there is no partial trust of a malformed response.
pub fn validate_advisory(raw: &Value) -> Result<AdvisoryPacket, Vec<String>> {
    let mut errors = Vec::new();
    validate_value(raw, &advisory_schema(), "", &mut errors);
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut sanitized = raw.clone();
    sanitize_value(&mut sanitized);

    match serde_json::from_value::<AdvisoryPacket>(sanitized) {
        Ok(packet) => Ok(packet),
        // Schema-valid but undeserializable means the schema and the typed
        // shape drifted apart; reject rather than guess.
        Err(e) => Err(vec![format!("packet does not match typed shape: {}", e)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::Provenance;
    use serde_json::json;

    fn valid_packet() -> Value {
        json!({
            "category": "DISRUPTION",
            "severity": 2,
            "confidence": 0.8,
            "intentHypothesis": {
                "label": "attention_seeking",
                "confidence": 0.6,
                "alternatives": ["peer_audience"]
            },
            "recommendedResponse": {
                "immediateStep": "Quiet named reminder of the working rule",
                "suggestedLadderStep": 2,
                "restorativeAction": "Short check-in after the block"
            },
            "script": {
                "gentle": "Let's get back on track together.",
                "neutral": "We raise a hand before talking.",
                "firm": "Stop. Voices off."
            },
            "preventionTip": "Give a movement task before long blocks.",
            "fairnessNotes": ["Same response for every student"],
            "source": "ai"
        })
    }

    #[test]
    fn valid_packet_is_accepted() {
        let packet = validate_advisory(&valid_packet()).expect("packet should validate");
        assert_eq!(packet.category, CategoryId::Disruption);
        assert_eq!(packet.severity, 2);
        assert_eq!(packet.source, Provenance::Ai);
    }

    #[test]
    fn missing_required_fields_are_all_reported() {
        for field in ["category", "severity", "confidence", "recommendedResponse", "script"] {
            let mut raw = valid_packet();
            raw.as_object_mut().unwrap().remove(field);
            let errors = validate_advisory(&raw).unwrap_err();
            assert!(
                errors.iter().any(|e| e.contains(field)),
                "removing {} must produce an error naming it, got {:?}",
                field,
                errors
            );
        }
    }

    #[test]
    fn one_pass_collects_every_violation() {
        let mut raw = valid_packet();
        raw["severity"] = json!(5);
        raw["confidence"] = json!(1.5);
        raw.as_object_mut().unwrap().remove("script");
        let errors = validate_advisory(&raw).unwrap_err();
        assert!(errors.iter().any(|e| e.starts_with("severity:")));
        assert!(errors.iter().any(|e| e.starts_with("confidence:")));
        assert!(errors.iter().any(|e| e.contains("script")));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn severity_above_stop_floor_is_rejected() {
        let mut raw = valid_packet();
        raw["severity"] = json!(5);
        let errors = validate_advisory(&raw).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("value must be <= 4")));
    }

    #[test]
    fn confidence_out_of_unit_interval_is_rejected() {
        let mut raw = valid_packet();
        raw["confidence"] = json!(1.5);
        assert!(validate_advisory(&raw).is_err());
    }

    #[test]
    fn unknown_category_is_rejected() {
        let mut raw = valid_packet();
        raw["category"] = json!("TARDINESS");
        let errors = validate_advisory(&raw).unwrap_err();
        assert!(errors.iter().any(|e| e.starts_with("category:")));
    }

    #[test]
    fn missing_tone_key_is_rejected() {
        let mut raw = valid_packet();
        raw["script"].as_object_mut().unwrap().remove("firm");
        let errors = validate_advisory(&raw).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("script") && e.contains("firm")));
    }

    #[test]
    fn oversize_firm_script_rejects_the_whole_packet() {
        let mut raw = valid_packet();
        raw["script"]["firm"] = json!("x".repeat(MAX_SCRIPT_CHARS + 1));
        let errors = validate_advisory(&raw).unwrap_err();
        assert!(errors.iter().any(|e| e.starts_with("script.firm:")));
    }

    #[test]
    fn top_level_type_mismatch_fails_fast() {
        let errors = validate_advisory(&json!("not an object")).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("expected object"));
    }

    #[test]
    fn nested_errors_carry_full_paths() {
        let mut raw = valid_packet();
        raw["recommendedResponse"]["suggestedLadderStep"] = json!(9);
        raw["fairnessNotes"] = json!(["ok", 42]);
        let errors = validate_advisory(&raw).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.starts_with("recommendedResponse.suggestedLadderStep:")));
        assert!(errors.iter().any(|e| e.starts_with("fairnessNotes[1]:")));
    }

    #[test]
    fn strings_are_markup_neutralized_everywhere() {
        let mut raw = valid_packet();
        raw["script"]["gentle"] = json!("<script>alert('x')</script> take a breath");
        raw["recommendedResponse"]["immediateStep"] = json!("Say \"stop\" & <b>wait</b>");
        raw["fairnessNotes"] = json!(["<img src=x onerror=pwn()>"]);
        let packet = validate_advisory(&raw).expect("still schema-valid");
        assert!(!packet.script.gentle.contains("<script>"));
        assert!(packet.script.gentle.contains("&lt;script&gt;"));
        assert!(!packet.recommended_response.immediate_step.contains('<'));
        assert!(!packet.fairness_notes[0].contains('<'));
        // Non-string values are untouched.
        assert_eq!(packet.severity, 2);
        assert!((packet.confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn sanitize_escapes_ampersand_first() {
        assert_eq!(escape_html("a & <b>"), "a &amp; &lt;b&gt;");
        assert_eq!(escape_html("&lt;"), "&amp;lt;");
    }

    #[test]
    fn too_many_fairness_notes_are_rejected() {
        let mut raw = valid_packet();
        raw["fairnessNotes"] = json!(["1", "2", "3", "4", "5", "6"]);
        let errors = validate_advisory(&raw).unwrap_err();
        assert!(errors.iter().any(|e| e.starts_with("fairnessNotes:")));
    }

    #[test]
    fn extra_unknown_fields_are_tolerated() {
        let mut raw = valid_packet();
        raw["vendorExtension"] = json!({"anything": true});
        assert!(validate_advisory(&raw).is_ok());
    }
}
