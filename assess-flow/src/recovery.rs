//! Best-effort recovery of a typed result from an LLM's free-text reply.
//!
//! Providers are *asked* to answer in JSON but routinely wrap the object in
//! prose or markdown fences. Recovery never fails: when the reply cannot be
//! turned into the target schema, the schema's deterministic fallback record
//! is returned instead, carrying the raw reply as its description.
//!
//! The scan is greedy: the candidate span runs from the first `{` to the last
//! `}` in the reply, so two separate JSON fragments in one reply produce an
//! unparseable span and therefore the fallback.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Primary category written into every fallback record.
pub const FALLBACK_MARKER: &str = "Analysis completed";

/// Confidence (0-1 scale) of every fallback record.
pub const FALLBACK_CONFIDENCE: f64 = 0.8;

/// Severity or urgency of every fallback record.
pub const FALLBACK_SEVERITY: &str = "moderate";

static JSON_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("static JSON span pattern"));

/// A result schema that can be recovered from free text.
pub trait Recoverable: DeserializeOwned {
    /// The record substituted when the reply cannot be parsed.
    fn fallback(raw_reply: &str) -> Self;

    /// Adjust the parsed fields before the schema is constructed.
    fn normalize(_fields: &mut Map<String, Value>) {}
}

/// Where a recovered value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySource {
    Parsed,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Recovered<T> {
    pub value: T,
    pub source: RecoverySource,
}

impl<T> Recovered<T> {
    pub fn is_fallback(&self) -> bool {
        self.source == RecoverySource::Fallback
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Returns the span from the first `{` to the last `}`, if both exist in that order.
pub fn extract_json_span(reply: &str) -> Option<&str> {
    JSON_SPAN.find(reply).map(|m| m.as_str())
}

/// Recover `T` from `reply`, substituting `T::fallback` on any failure.
pub fn recover<T: Recoverable>(reply: &str) -> Recovered<T> {
    match parse_reply::<T>(reply) {
        Ok(value) => {
            debug!(reply_len = reply.len(), "Parsed structured result from reply");
            Recovered {
                value,
                source: RecoverySource::Parsed,
            }
        }
        Err(reason) => {
            warn!(
                reason = %reason,
                preview = %preview(reply),
                "Using fallback result structure"
            );
            Recovered {
                value: T::fallback(reply),
                source: RecoverySource::Fallback,
            }
        }
    }
}

fn parse_reply<T: Recoverable>(reply: &str) -> std::result::Result<T, String> {
    let span = extract_json_span(reply).ok_or_else(|| "no JSON object in reply".to_string())?;

    let mut fields = match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return Err("JSON span is not an object".to_string()),
        Err(e) => return Err(format!("invalid JSON: {}", e)),
    };

    T::normalize(&mut fields);

    serde_json::from_value(Value::Object(fields)).map_err(|e| format!("schema mismatch: {}", e))
}

/// Replace a null or absent string field with `""`.
pub fn blank_if_missing(fields: &mut Map<String, Value>, key: &str) {
    match fields.get(key) {
        None | Some(Value::Null) => {
            fields.insert(key.to_string(), Value::String(String::new()));
        }
        Some(_) => {}
    }
}

fn preview(reply: &str) -> String {
    reply.chars().take(500).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        condition: String,
        confidence: f64,
        description: String,
        recommendations: Vec<String>,
        severity: String,
    }

    impl Recoverable for Verdict {
        fn fallback(raw_reply: &str) -> Self {
            Self {
                condition: FALLBACK_MARKER.to_string(),
                confidence: FALLBACK_CONFIDENCE,
                description: raw_reply.to_string(),
                recommendations: vec!["Please consult a specialist".to_string()],
                severity: FALLBACK_SEVERITY.to_string(),
            }
        }
    }

    #[derive(Debug, Deserialize)]
    struct Stamped {
        timestamp: String,
    }

    impl Recoverable for Stamped {
        fn fallback(_raw_reply: &str) -> Self {
            Self {
                timestamp: "fallback".to_string(),
            }
        }

        fn normalize(fields: &mut Map<String, Value>) {
            blank_if_missing(fields, "timestamp");
        }
    }

    fn assert_fallback(reply: &str) {
        let recovered = recover::<Verdict>(reply);
        assert!(recovered.is_fallback());
        let verdict = recovered.into_inner();
        assert_eq!(verdict.condition, "Analysis completed");
        assert_eq!(verdict.confidence, 0.8);
        assert_eq!(verdict.severity, "moderate");
        assert_eq!(verdict.description, reply);
        assert_eq!(verdict.recommendations.len(), 1);
    }

    #[test]
    fn parses_object_wrapped_in_prose() {
        let reply = r#"Here is my assessment:
```json
{
  "condition": "diaper rash",
  "confidence": 85,
  "description": "Red patches {mild}",
  "recommendations": ["Keep the area dry", "Use barrier cream"],
  "severity": "mild"
}
```
Let me know if you need anything else."#;

        let recovered = recover::<Verdict>(reply);
        assert_eq!(recovered.source, RecoverySource::Parsed);
        assert_eq!(
            recovered.value,
            Verdict {
                condition: "diaper rash".to_string(),
                confidence: 85.0,
                description: "Red patches {mild}".to_string(),
                recommendations: vec![
                    "Keep the area dry".to_string(),
                    "Use barrier cream".to_string()
                ],
                severity: "mild".to_string(),
            }
        );
    }

    #[test]
    fn reply_without_braces_falls_back() {
        assert_fallback("The skin looks healthy. No action needed.");
    }

    #[test]
    fn closing_brace_before_opening_falls_back() {
        assert_fallback("} nothing useful here {");
    }

    #[test]
    fn malformed_json_falls_back() {
        assert_fallback(r#"{"condition": "eczema", "confidence": }"#);
    }

    #[test]
    fn missing_field_falls_back() {
        assert_fallback(
            r#"{"condition": "eczema", "confidence": 0.7, "description": "dry", "recommendations": []}"#,
        );
    }

    #[test]
    fn wrong_field_type_falls_back() {
        assert_fallback(
            r#"{"condition": "eczema", "confidence": "high", "description": "dry", "recommendations": [], "severity": "mild"}"#,
        );
    }

    #[test]
    fn two_fragments_make_one_greedy_span() {
        let reply = r#"{"condition": "a"} and also {"condition": "b"}"#;
        assert_eq!(extract_json_span(reply), Some(reply));
        assert_fallback(reply);
    }

    #[test]
    fn span_runs_from_first_open_to_last_close() {
        assert_eq!(extract_json_span("x {a} y {b} z"), Some("{a} y {b}"));
        assert_eq!(extract_json_span("no braces"), None);
        assert_eq!(extract_json_span("only { open"), None);
    }

    #[test]
    fn normalize_blanks_null_and_absent_fields() {
        let null = recover::<Stamped>(r#"{"timestamp": null}"#);
        assert_eq!(null.source, RecoverySource::Parsed);
        assert_eq!(null.value.timestamp, "");

        let absent = recover::<Stamped>("{}");
        assert_eq!(absent.source, RecoverySource::Parsed);
        assert_eq!(absent.value.timestamp, "");

        let present = recover::<Stamped>(r#"{"timestamp": "08:15"}"#);
        assert_eq!(present.value.timestamp, "08:15");
    }
}
