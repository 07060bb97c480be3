//! Parsing of completion responses into category field maps

use std::collections::BTreeMap;

use regex::Regex;
use std::sync::OnceLock;

use crate::fields::categories::Category;

/// Re-parse attempts against the same raw response before falling back
pub const PARSE_ATTEMPTS: usize = 5;

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap())
}

/// Strip a markdown code fence if the model wrapped its JSON in one
fn strip_fences(raw: &str) -> &str {
    match fence_regex().captures(raw) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(raw),
        None => raw.trim(),
    }
}

/// Parse a completion response for one category.
///
/// The raw string is parsed up to [`PARSE_ATTEMPTS`] times; persistent
/// failure falls back to the category's all-placeholder object. Parsed
/// values overlay the placeholder map so the key set is always exactly the
/// category's keys, regardless of what the model returned.
pub fn parse_category_response(raw: &str, category: &Category) -> BTreeMap<String, String> {
    let candidate = strip_fences(raw);

    let mut parsed: Option<BTreeMap<String, serde_json::Value>> = None;
    for attempt in 1..=PARSE_ATTEMPTS {
        match serde_json::from_str(candidate) {
            Ok(value) => {
                parsed = Some(value);
                break;
            }
            Err(e) if attempt == PARSE_ATTEMPTS => {
                tracing::warn!(
                    category = category.name,
                    attempts = PARSE_ATTEMPTS,
                    "response never parsed as JSON, using placeholders: {}",
                    e
                );
            }
            Err(_) => {}
        }
    }

    let mut fields = category.placeholder();
    if let Some(object) = parsed {
        for key in category.keys {
            if let Some(value) = object.get(*key) {
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    _ => continue,
                };
                fields.insert(key.to_string(), text);
            }
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::categories::CATEGORIES;
    use crate::types::report::PLACEHOLDER;

    fn scope_1_total() -> &'static Category {
        CATEGORIES
            .iter()
            .find(|c| c.keys == ["scope_1_total"])
            .unwrap()
    }

    #[test]
    fn plain_json_parses() {
        let fields = parse_category_response(r#"{"scope_1_total": "120"}"#, scope_1_total());
        assert_eq!(fields.get("scope_1_total").map(String::as_str), Some("120"));
    }

    #[test]
    fn fenced_json_parses() {
        let raw = "```json\n{\"scope_1_total\": 120.5}\n```";
        let fields = parse_category_response(raw, scope_1_total());
        assert_eq!(
            fields.get("scope_1_total").map(String::as_str),
            Some("120.5")
        );
    }

    #[test]
    fn malformed_response_falls_back_to_placeholders() {
        let fields =
            parse_category_response("Sorry, I could not find that value.", scope_1_total());
        assert_eq!(
            fields.get("scope_1_total").map(String::as_str),
            Some(PLACEHOLDER)
        );
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn extra_keys_from_the_model_are_dropped() {
        let raw = r#"{"scope_1_total": "42", "unrelated": "99"}"#;
        let fields = parse_category_response(raw, scope_1_total());
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("scope_1_total").map(String::as_str), Some("42"));
    }

    #[test]
    fn missing_keys_stay_placeholder() {
        let summary = &CATEGORIES[0];
        let raw = r#"{"scope_1": "10"}"#;
        let fields = parse_category_response(raw, summary);
        assert_eq!(fields.get("scope_1").map(String::as_str), Some("10"));
        assert_eq!(
            fields.get("scope_3").map(String::as_str),
            Some(PLACEHOLDER)
        );
    }
}
