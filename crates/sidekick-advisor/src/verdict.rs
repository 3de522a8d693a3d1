use sidekick_core::Verdict;

use crate::AdviseError;

/// Pull the verdict out of a free-form reply.
///
/// Models wrap the object in prose or code fences, so every outermost
/// balanced `{...}` is a candidate, tried left to right. The first candidate
/// that deserializes decides: it is returned when its score lies in `[0, 1]`
/// and rejected otherwise.
pub fn extract_verdict(reply: &str) -> Result<Verdict, AdviseError> {
    if reply.trim().is_empty() {
        return Err(AdviseError::EmptyReply);
    }
    for candidate in json_objects(reply) {
        let Ok(verdict) = serde_json::from_str::<Verdict>(candidate) else {
            continue;
        };
        if !verdict.is_well_formed() {
            return Err(AdviseError::Malformed(format!("score {} outside [0, 1]", verdict.score)));
        }
        return Ok(verdict);
    }
    Err(AdviseError::Malformed("no verdict object found".into()))
}

/// Outermost balanced `{...}` spans of `text`, left to right.
/// Braces inside JSON strings are ignored.
fn json_objects(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' if depth > 0 => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
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
