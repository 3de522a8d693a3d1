//! Nudge gating (inside a pass) and delivery (on a host callback).

use std::fmt::Write as _;

use sidekick_core::hash::nudge_hash;
use sidekick_core::nudge::rfc3339;
use sidekick_core::{Memory, PendingNudge, SidekickConfig, Verdict};
use sidekick_store::ProjectStore;
use time::OffsetDateTime;

pub const NUDGE_HEADER: &str = "🤖 Sidekick suggestion";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateConfig {
    /// Minimum verdict score; `0.0` lets every non-empty verdict through.
    pub threshold: f64,
    pub ttl_secs: i64,
}

impl From<&SidekickConfig> for GateConfig {
    fn from(cfg: &SidekickConfig) -> Self {
        Self {
            threshold: cfg.threshold,
            ttl_secs: cfg.nudge_ttl_secs,
        }
    }
}

/// Turn a verdict into a pending nudge, or drop it.
///
/// Emits only when the verdict asks to intervene, clears the threshold, has a
/// non-empty body and that body differs from the last one emitted for the
/// project. On emission `memory.last_nudge_hash` is updated; the caller must
/// persist memory before writing the returned record.
pub fn gate(verdict: &Verdict, memory: &mut Memory, cfg: &GateConfig, now: OffsetDateTime) -> Option<PendingNudge> {
    if !verdict.should_intervene || verdict.score < cfg.threshold {
        return None;
    }
    let body = verdict.body();
    if body.is_empty() {
        return None;
    }
    let hash = nudge_hash(body);
    if hash == memory.last_nudge_hash {
        tracing::debug!("duplicate nudge suppressed");
        return None;
    }
    memory.last_nudge_hash = hash;

    Some(PendingNudge {
        created_at: rfc3339(now),
        ttl_seconds: cfg.ttl_secs,
        body: body.to_string(),
        suggested_commands: verdict.commands.clone(),
        score: verdict.score,
        reason: verdict.reason.trim().to_string(),
        context: String::new(),
    })
}

/// Consume the project's pending nudge.
///
/// The record is claimed by renaming it away before reading, so two
/// concurrent callbacks never show the same nudge, and it is deleted whatever
/// its content. Returns the rendered text only for a fresh, well-formed record.
pub fn deliver(store: &ProjectStore, now: OffsetDateTime) -> Option<String> {
    let pending = store.pending_path();
    let claimed = store.dir().join(format!("pending.{}.claim", ulid::Ulid::new()));
    match std::fs::rename(&pending, &claimed) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(project_id = store.project_id(), error = %e, "cannot claim pending nudge");
            // Still honor consume-on-read.
            let _ = store.remove(&pending);
            return None;
        }
    }

    let record = store.read_json::<PendingNudge>(&claimed);
    if let Err(e) = store.remove(&claimed) {
        tracing::warn!(project_id = store.project_id(), error = %e, "cannot remove claimed nudge");
    }

    let nudge = match record {
        Ok(Some(n)) => n,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(project_id = store.project_id(), error = %e, "discarding corrupt pending nudge");
            return None;
        }
    };
    if nudge.is_stale(now) {
        tracing::debug!(project_id = store.project_id(), created_at = %nudge.created_at, "discarding stale nudge");
        return None;
    }
    if nudge.body.trim().is_empty() {
        return None;
    }
    tracing::info!(project_id = store.project_id(), score = nudge.score, "nudge delivered");
    Some(render(&nudge))
}

/// Text shown to the user for a delivered nudge.
pub fn render(nudge: &PendingNudge) -> String {
    let mut out = String::from(NUDGE_HEADER);
    out.push('\n');
    if !nudge.reason.is_empty() {
        let _ = writeln!(out, "_Why_: {}\n", nudge.reason);
    }
    out.push_str(nudge.body.trim());
    out.push('\n');
    let commands: Vec<&str> = nudge
        .suggested_commands
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if !commands.is_empty() && !commands.iter().all(|c| nudge.body.contains(c)) {
        out.push_str("\nSuggested commands:\n```bash\n");
        for c in commands {
            let _ = writeln!(out, "{c}");
        }
        out.push_str("```\n");
    }
    out
}
