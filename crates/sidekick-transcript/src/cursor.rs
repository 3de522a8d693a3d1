//! Watermark-filtered reader over a JSONL session transcript.
//!
//! Each line is one record. Only `user`/`assistant` records carrying a
//! `message` become [`Event`]s; everything else, including lines that fail
//! to parse, is skipped.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use serde_json::Value;
use sidekick_core::{Event, Role, Segment};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Lazy, forward-only iterator over the events of one transcript file that
/// are newer than a watermark.
pub struct TranscriptCursor {
    lines: Option<Lines<BufReader<File>>>,
    watermark: Option<String>,
    skipped: usize,
}

/// Open `path` and yield the events strictly newer than `watermark`.
///
/// An absent or unreadable file yields an empty sequence.
pub fn read(path: &Path, watermark: Option<&str>) -> TranscriptCursor {
    let lines = match File::open(path) {
        Ok(f) => Some(BufReader::new(f).lines()),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "transcript not readable");
            None
        }
    };
    TranscriptCursor {
        lines,
        watermark: watermark.filter(|w| !w.is_empty()).map(str::to_string),
        skipped: 0,
    }
}

impl TranscriptCursor {
    /// Number of malformed or irrelevant lines skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn admits(&self, timestamp: &str) -> bool {
        match &self.watermark {
            None => true,
            Some(_) if timestamp.is_empty() => false,
            Some(wm) => is_after(timestamp, wm),
        }
    }
}

impl Iterator for TranscriptCursor {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            let line = match self.lines.as_mut()?.next()? {
                Ok(l) => l,
                Err(e) => {
                    tracing::debug!(error = %e, "stopping transcript read");
                    self.lines = None;
                    return None;
                }
            };
            match parse_line(&line) {
                Some(ev) if self.admits(&ev.timestamp) => return Some(ev),
                Some(_) => {}
                None => self.skipped += 1,
            }
        }
    }
}

/// True when `ts` is strictly later than `watermark`.
///
/// RFC 3339 values are compared as instants; anything else falls back to
/// plain string ordering.
pub fn is_after(ts: &str, watermark: &str) -> bool {
    match (
        OffsetDateTime::parse(ts, &Rfc3339),
        OffsetDateTime::parse(watermark, &Rfc3339),
    ) {
        (Ok(a), Ok(b)) => a > b,
        _ => ts > watermark,
    }
}

/// Parse one transcript line into an event.
pub fn parse_line(line: &str) -> Option<Event> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let json: Value = serde_json::from_str(line).ok()?;
    let record_type = json.get("type").and_then(|v| v.as_str()).unwrap_or("");
    let message = json.get("message")?;
    let role_str = message
        .get("role")
        .and_then(|v| v.as_str())
        .unwrap_or(record_type);
    let role = match role_str {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        _ => return None,
    };
    let timestamp = json
        .get("timestamp")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let segments = match message.get("content") {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![Segment::Text { text: s.clone() }],
        Some(Value::Array(blocks)) => blocks.iter().filter_map(parse_block).collect(),
        _ => Vec::new(),
    };
    if segments.is_empty() {
        return None;
    }
    Some(Event::new(role, timestamp, segments))
}

fn parse_block(block: &Value) -> Option<Segment> {
    match block.get("type").and_then(|v| v.as_str())? {
        "text" => {
            let text = block.get("text").and_then(|v| v.as_str())?;
            if text.trim().is_empty() {
                return None;
            }
            Some(Segment::Text { text: text.to_string() })
        }
        "tool_use" => Some(Segment::ToolUse {
            name: block.get("name").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            input: block.get("input").cloned().unwrap_or(Value::Null),
        }),
        "tool_result" => Some(Segment::ToolResult {
            output: tool_result_text(block.get("content")),
        }),
        _ => None,
    }
}

/// Tool results carry either a plain string or a list of text blocks.
fn tool_result_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|i| i.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}
