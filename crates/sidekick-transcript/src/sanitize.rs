//! Bounded, scrubbed text rendering of recent session events.
//!
//! The output is a pure function of the events and the limits, so two passes
//! over the same batch produce byte-identical context.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use sidekick_core::{Event, SidekickConfig};

use crate::redact::scrub;

const FENCE: &str = "```";

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```[\s\S]*?```").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanitizeLimits {
    /// Newest events kept verbatim.
    pub max_events: usize,
    /// Hard cap on output lines, marker included.
    pub max_total_lines: usize,
    /// Body lines kept per fenced block.
    pub max_block_lines: usize,
    /// Keep every n-th event older than the recent window (0 disables sampling).
    pub sample_every: usize,
    /// At most this many sampled older events, the newest ones.
    pub sample_max: usize,
}

impl Default for SanitizeLimits {
    fn default() -> Self {
        Self::from(&SidekickConfig::default())
    }
}

impl From<&SidekickConfig> for SanitizeLimits {
    fn from(cfg: &SidekickConfig) -> Self {
        Self {
            max_events: cfg.max_events,
            max_total_lines: cfg.max_total_lines,
            max_block_lines: cfg.max_block_lines,
            sample_every: cfg.sample_every,
            sample_max: cfg.sample_max,
        }
    }
}

/// Render `events` into the context window handed to the reasoning service.
pub fn sanitize(events: &[Event], limits: &SanitizeLimits) -> String {
    let chunks: Vec<String> = select(events, limits)
        .into_iter()
        .filter_map(|ev| {
            let text = ev.render();
            if text.is_empty() {
                return None;
            }
            let text = truncate_blocks(&scrub(&text), limits.max_block_lines);
            Some(format!(
                "{} @ {}\n{}\n",
                ev.role.as_str().to_uppercase(),
                ev.timestamp,
                text
            ))
        })
        .collect();

    let separator = format!("\n{}\n", "-".repeat(60));
    cap_lines(&chunks.join(&separator), limits.max_total_lines)
}

/// The last `max_events` events, preceded by a sparse sample of older ones.
fn select<'a>(events: &'a [Event], limits: &SanitizeLimits) -> Vec<&'a Event> {
    let split = events.len().saturating_sub(limits.max_events);
    let (older, recent) = events.split_at(split);

    let mut picked: Vec<&Event> = Vec::with_capacity(recent.len() + limits.sample_max);
    if limits.sample_every > 0 && limits.sample_max > 0 {
        let sampled: Vec<&Event> = older.iter().step_by(limits.sample_every).collect();
        let skip = sampled.len().saturating_sub(limits.sample_max);
        picked.extend(&sampled[skip..]);
    }
    picked.extend(recent.iter());
    picked
}

/// Cut every fenced block to `max_lines` body lines.
pub fn truncate_blocks(text: &str, max_lines: usize) -> String {
    FENCED_BLOCK
        .replace_all(text, |caps: &Captures| {
            let block = &caps[0];
            if block.len() <= FENCE.len() * 2 {
                return block.to_string();
            }
            let body = &block[FENCE.len()..block.len() - FENCE.len()];
            format!("{FENCE}{}{FENCE}", truncate_lines(body, max_lines))
        })
        .into_owned()
}

fn truncate_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= max_lines {
        return text.to_string();
    }
    format!(
        "{}\n... [truncated {} lines]",
        lines[..max_lines].join("\n"),
        lines.len() - max_lines
    )
}

/// Cap `text` at `max_lines` lines. When cut, the last line is the
/// truncation marker, so the result has exactly `max_lines` lines.
/// A cap of zero is treated as one.
pub fn cap_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let max_lines = max_lines.max(1);
    if lines.len() <= max_lines {
        return text.to_string();
    }
    let keep = max_lines - 1;
    let marker = format!("... [truncated {} lines]", lines.len() - keep);
    if keep == 0 {
        return marker;
    }
    format!("{}\n{marker}", lines[..keep].join("\n"))
}
