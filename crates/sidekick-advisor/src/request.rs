use serde_json::json;
use sidekick_core::memory::{FeatureStatus, Memory};
use sidekick_core::text::truncate_ellipsis;

pub const SYSTEM_PROMPT: &str = "\
You are a senior engineer watching a developer work with an AI coding agent.
You see the project policy, a digest of the project's memory (git state, stack, \
conversation summaries, feature lifecycle, error patterns, past decisions) and the \
latest session activity.
Intervene only with strategic guidance the developer is likely missing: a feature that \
keeps being re-edited and should be rolled back, errors that recur across sessions, \
risky changes without tests, policy violations, or a clearly better approach.
Be specific and give copy-pasteable commands. If there is nothing valuable to add, \
set should_intervene to false and give a low score.
Answer with a single JSON object and nothing else.";

pub const SCHEMA_HINT: &str = r#"{
  "should_intervene": boolean,
  "score": number,              // 0..1, how much the developer would benefit right now
  "reason": string,             // < 120 chars
  "nudge_markdown": string,     // actionable, < 1000 chars, commands in ```bash blocks
  "commands": string[],         // 0..5 raw commands
  "memory_update": string|null  // < 300 chars observation worth keeping across sessions
}"#;

/// Everything sent to the reasoning service for one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AdviceRequest {
    pub system: String,
    pub policy: String,
    pub memory: String,
    pub context: String,
}

impl AdviceRequest {
    pub fn new(policy: String, memory: String, context: String) -> Self {
        Self {
            system: SYSTEM_PROMPT.to_string(),
            policy,
            memory,
            context,
        }
    }

    /// The JSON user message.
    pub fn user_payload(&self) -> String {
        json!({
            "context": {
                "project_policy": self.policy,
                "memory": self.memory,
                "recent_events": self.context,
            },
            "request": {
                "goal": "Decide whether the developer would benefit from a brief, actionable nudge right now.",
                "focus": "Rollbacks, repeated errors, missing tests, architectural drift",
                "output": "JSON only",
            },
            "schema": SCHEMA_HINT,
        })
        .to_string()
    }
}

/// Compact JSON digest of `memory`, at most `max_chars` bytes.
pub fn memory_excerpt(memory: &Memory, max_chars: usize) -> String {
    fn last<T>(items: &[T], n: usize) -> &[T] {
        &items[items.len().saturating_sub(n)..]
    }

    let project = memory.project.clone().unwrap_or_default();
    let struggling: Vec<_> = memory.features_with(FeatureStatus::Struggling).collect();
    let active: Vec<_> = memory
        .features_with(FeatureStatus::Active)
        .map(|f| f.file.as_str())
        .collect();
    let insights: Vec<&str> = last(&memory.insights, 5)
        .iter()
        .map(|i| i.insight.as_str())
        .collect();
    let errors: serde_json::Map<String, serde_json::Value> = memory
        .error_patterns
        .iter()
        .map(|p| (p.category.to_string(), json!(p.count)))
        .collect();

    let digest = json!({
        "sessions": memory.sessions,
        "project_type": project.project_type,
        "languages": project.languages,
        "frameworks": project.frameworks,
        "has_tests": project.has_tests,
        "git_branch": memory.vcs.branch,
        "recent_commits": last(&memory.vcs.recent_commits, 5),
        "uncommitted_changes": memory.vcs.uncommitted_changes,
        "commit_frequency": memory.vcs.commit_frequency,
        "conversation_summary": memory.summary,
        "struggling_features": last(&struggling, 3),
        "active_features": last(&active, 5),
        "recent_decisions": last(&memory.decisions, 5),
        "error_patterns": errors,
        "insights": insights,
        "recommendations": last(&memory.recommendations, 3),
    });
    truncate_ellipsis(&digest.to_string(), max_chars)
}
