//! Compact text digests of an event batch, used for the summary tiers.

use std::collections::BTreeMap;

use sidekick_core::event::FILE_TOOLS;
use sidekick_core::text::{clip, truncate_ellipsis};
use sidekick_core::{Event, Role};

use crate::classify::Classifier;

const INTENT_MAX_LEN: usize = 200;
const INTENT_CHARS: usize = 100;
const ERROR_SNIPPET_CHARS: usize = 150;
const KEY_POINT_CHARS: usize = 150;
const MAX_KEY_POINTS: usize = 5;

/// Summarize a batch: user requests, files written, errors seen, whether tests
/// were touched and a tool-usage histogram. At most `max_chars` bytes.
pub fn summarize(events: &[Event], classifier: &dyn Classifier, max_chars: usize) -> String {
    if events.is_empty() {
        return String::new();
    }

    let mut intents: Vec<&str> = Vec::new();
    let mut files: Vec<&str> = Vec::new();
    let mut errors: Vec<String> = Vec::new();
    let mut tests_touched = false;
    let mut tools: BTreeMap<&str, usize> = BTreeMap::new();

    for ev in events {
        let prose = ev.plain_text();
        if ev.role == Role::User && !prose.is_empty() && prose.len() < INTENT_MAX_LEN {
            intents.push(clip(ev_text(ev), INTENT_CHARS));
        }
        for touch in ev.file_touches() {
            if !files.contains(&touch.path) {
                files.push(touch.path);
            }
            if touch.path.to_lowercase().contains("test") {
                tests_touched = true;
            }
        }
        let observed = ev.observed_text();
        if classifier.mentions_error(&observed) {
            let snippet = clip(&observed, ERROR_SNIPPET_CHARS).to_string();
            if !errors.contains(&snippet) {
                errors.push(snippet);
            }
        }
        for name in ev.tool_names() {
            *tools.entry(name).or_default() += 1;
        }
    }

    let mut parts: Vec<String> = Vec::new();
    if !intents.is_empty() {
        parts.push(format!("User requests: {}", tail(&intents, 5).join("; ")));
    }
    if !files.is_empty() {
        parts.push(format!("Files modified: {}", tail(&files, 10).join(", ")));
    }
    if !errors.is_empty() {
        parts.push(format!("Errors: {}", tail(&errors, 3).join("; ")));
    }
    if tests_touched {
        parts.push("Tests were written/modified".to_string());
    }
    if !tools.is_empty() {
        let mut ranked: Vec<(&str, usize)> = tools.into_iter().collect();
        // BTreeMap order makes ties deterministic.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        let top: Vec<String> = ranked.iter().take(5).map(|(t, c)| format!("{t}({c})")).collect();
        parts.push(format!("Tools used: {}", top.join(", ")));
    }

    truncate_ellipsis(&parts.join("\n"), max_chars)
}

/// The user's own words: first text segment.
fn ev_text(ev: &Event) -> &str {
    ev.segments
        .iter()
        .find_map(|s| match s {
            sidekick_core::Segment::Text { text } => Some(text.trim()),
            _ => None,
        })
        .unwrap_or("")
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

/// Lines of `text` the classifier deems key points, at most five.
pub fn key_points(text: &str, classifier: &dyn Classifier) -> String {
    text.lines()
        .filter(|l| classifier.is_key_point(l))
        .take(MAX_KEY_POINTS)
        .map(|l| clip(l, KEY_POINT_CHARS))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Number of file-writing tools in the batch (used in logs).
pub fn write_count(events: &[Event]) -> usize {
    events
        .iter()
        .flat_map(|e| e.tool_names())
        .filter(|t| FILE_TOOLS.contains(t))
        .count()
}
