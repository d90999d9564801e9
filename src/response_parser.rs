use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How much raw model output to keep for diagnosis when parsing fails.
pub const RAW_SNIPPET_CHARS: usize = 500;

/// The model was asked for a bare JSON object but returned something that
/// could not be coaxed into one. Carries a raw-output snippet for debugging.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseFailure {
    pub message: String,
    pub raw_text_snippet: String,
}

impl ParseFailure {
    fn new(message: impl Into<String>, raw: &str) -> Self {
        ParseFailure {
            message: message.into(),
            raw_text_snippet: raw.chars().take(RAW_SNIPPET_CHARS).collect(),
        }
    }
}

fn json_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?si)```(?:json)?\s*(\{.*\})\s*```|^\s*(\{.*\})\s*$")
            .expect("valid regex")
    })
}

/// Extract a single JSON object from model output that may be wrapped in
/// prose or markdown fencing.
///
/// Strategy, in order: a fenced code block or standalone object via regex;
/// the slice between the first `{` and last `}`; the whole response
/// verbatim. The model's adherence to "JSON only" instructions is
/// unreliable, hence the layering.
pub fn parse_model_json(raw: &str, context: &str) -> Result<Value, ParseFailure> {
    debug!("Raw model response for {}:\n---\n{}\n---", context, raw);

    if let Some(caps) = json_block_regex().captures(raw) {
        let json_string = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        return match serde_json::from_str::<Value>(json_string) {
            Ok(value) => {
                info!("Structured AI {} parsed successfully (from regex match)", context);
                Ok(value)
            }
            Err(e) => {
                warn!("AI {} response failed JSON parsing after regex match: {}", context, e);
                Err(ParseFailure::new(
                    format!(
                        "AI {} response could not be parsed as JSON (invalid structure)",
                        context
                    ),
                    raw,
                ))
            }
        };
    }

    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if end > start {
            if let Ok(value) = serde_json::from_str::<Value>(&raw[start..=end]) {
                info!("Structured AI {} parsed successfully (slice parse)", context);
                return Ok(value);
            }
            warn!("Slice parse failed for {}, trying full direct parse", context);
        }
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(value) => {
            info!("Structured AI {} parsed successfully (direct full parse)", context);
            Ok(value)
        }
        Err(e) => {
            warn!("No JSON block found and direct parse failed for {}: {}", context, e);
            Err(ParseFailure::new(
                format!("No valid JSON found in AI {} response", context),
                raw,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json_block() {
        let raw = "```json\n{\"a\":1}\n```";
        let value = parse_model_json(raw, "test").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn parses_fenced_block_without_language_tag() {
        let raw = "```\n{\"summary\": \"ok\"}\n```";
        let value = parse_model_json(raw, "test").unwrap();
        assert_eq!(value["summary"], "ok");
    }

    #[test]
    fn parses_bare_object() {
        let value = parse_model_json("{\"a\": [1, 2]}", "test").unwrap();
        assert_eq!(value["a"][1], 2);
    }

    #[test]
    fn parses_object_embedded_in_prose() {
        let raw = "some text {\"a\":1} trailing";
        let value = parse_model_json(raw, "test").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn garbage_yields_error_with_snippet() {
        let err = parse_model_json("not json at all", "test").unwrap_err();
        assert!(err.message.contains("No valid JSON"));
        assert_eq!(err.raw_text_snippet, "not json at all");
    }

    #[test]
    fn snippet_is_capped_at_500_chars() {
        let raw = "x".repeat(2000);
        let err = parse_model_json(&raw, "test").unwrap_err();
        assert_eq!(err.raw_text_snippet.chars().count(), RAW_SNIPPET_CHARS);
    }

    #[test]
    fn invalid_json_inside_fence_is_an_error() {
        let err = parse_model_json("```json\n{\"a\": }\n```", "test").unwrap_err();
        assert!(err.message.contains("could not be parsed"));
    }

    #[test]
    fn multiline_object_with_nested_braces() {
        let raw = "Here you go:\n{\"outer\": {\"inner\": \"value\"}}\nThanks!";
        let value = parse_model_json(raw, "test").unwrap();
        assert_eq!(value["outer"]["inner"], "value");
    }
}
