/*!
 * Extraction of the JSON object from a free-form oracle reply.
 *
 * Strict parsing is tried first. The lenient fallback looks for the last
 * balanced `{...}` block in the text, on the assumption that a chatty oracle
 * puts its real answer last. That assumption is not guaranteed; the recovered
 * object still goes through every validation rule.
 */

use log::debug;
use serde_json::{Map, Value};

use crate::errors::ValidationError;

/// Parse an oracle reply into a JSON object
pub fn parse_object(raw: &str, lenient: bool) -> Result<Map<String, Value>, ValidationError> {
    let text = strip_code_fence(raw.trim());

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(ValidationError::NotAnObject),
        Err(strict_error) => {
            if !lenient {
                return Err(ValidationError::NotJson(strict_error.to_string()));
            }

            for candidate in object_spans(text).into_iter().rev() {
                if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(candidate) {
                    debug!("Recovered JSON object from free-form reply ({} chars)", candidate.len());
                    return Ok(object);
                }
            }

            Err(ValidationError::NotJson(strict_error.to_string()))
        }
    }
}

/// Remove a surrounding markdown code fence, if any
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return text;
    };

    // Drop the info string ("json") on the opening line
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}

/// Top-level balanced `{...}` spans of `text`, in order of appearance.
///
/// Braces inside JSON strings are ignored. String state is only tracked inside
/// a span so that stray quotes in surrounding prose do not confuse the scan.
pub fn object_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if depth > 0 && in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    spans
}

/// The last balanced `{...}` block of `text`
pub fn last_json_object(text: &str) -> Option<&str> {
    object_spans(text).pop()
}
