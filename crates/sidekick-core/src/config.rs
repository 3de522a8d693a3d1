//! Deployment configuration.
//!
//! Resolution order: built-in defaults, then `<store_root>/config.json`, then
//! `SIDEKICK_*` environment variables. A missing or corrupt file falls back
//! to defaults; configuration never fails the caller.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Name of the config file inside the store root.
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidekickConfig {
    // Trigger gate
    /// Fire every N tool calls (`<= 0` fires on every call).
    pub interval: i64,
    /// Minimum seconds between two passes (`<= 0` disables the cooldown).
    pub cooldown_secs: i64,

    // Nudge gate / delivery
    pub threshold: f64,
    pub nudge_ttl_secs: i64,

    // Sanitizer
    pub max_events: usize,
    pub max_total_lines: usize,
    pub max_block_lines: usize,
    pub sample_every: usize,
    pub sample_max: usize,

    // Memory merge
    pub fingerprint_every: u64,
    pub historical_every: u64,
    pub struggle_edits: u64,
    /// Keep `<cwd>/.claude/memory.json` linked to the memory record.
    pub link_memory: bool,

    // Aggregators
    pub probe_timeout_secs: u64,
    pub recent_commits: usize,

    // Advisory client
    pub model: String,
    pub api_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub request_timeout_secs: u64,
    pub policy_max_chars: usize,
    pub memory_excerpt_chars: usize,
}

impl Default for SidekickConfig {
    fn default() -> Self {
        Self {
            interval: 10,
            cooldown_secs: 120,
            threshold: 0.2,
            nudge_ttl_secs: 900,
            max_events: 100,
            max_total_lines: 2000,
            max_block_lines: 500,
            sample_every: 5,
            sample_max: 20,
            fingerprint_every: 10,
            historical_every: 5,
            struggle_edits: 5,
            link_memory: false,
            probe_timeout_secs: 2,
            recent_commits: 10,
            model: "gpt-5".to_string(),
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_secs: 60,
            policy_max_chars: 1000,
            memory_excerpt_chars: 3500,
        }
    }
}

impl SidekickConfig {
    /// Load from `<store_root>/config.json` and apply environment overrides.
    pub fn load(store_root: &Path) -> Self {
        Self::from_file(&store_root.join(CONFIG_FILE)).with_overrides(|k| std::env::var(k).ok())
    }

    /// Read the config file alone; missing or unparseable ⇒ defaults.
    pub fn from_file(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt config");
                Self::default()
            }
        }
    }

    /// Apply `SIDEKICK_*` overrides obtained through `lookup`.
    /// Values that fail to parse are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn set<T: FromStr>(slot: &mut T, raw: Option<String>) {
            if let Some(v) = raw.and_then(|s| s.trim().parse().ok()) {
                *slot = v;
            }
        }
        set(&mut self.interval, lookup("SIDEKICK_INTERVAL"));
        set(&mut self.cooldown_secs, lookup("SIDEKICK_COOLDOWN_SECONDS"));
        set(&mut self.threshold, lookup("SIDEKICK_THRESHOLD"));
        set(&mut self.nudge_ttl_secs, lookup("SIDEKICK_NUDGE_TTL_SECONDS"));
        set(&mut self.max_events, lookup("SIDEKICK_MAX_EVENTS"));
        set(&mut self.max_total_lines, lookup("SIDEKICK_MAX_LINES_TOTAL"));
        set(&mut self.max_block_lines, lookup("SIDEKICK_MAX_BLOCK_LINES"));
        set(&mut self.probe_timeout_secs, lookup("SIDEKICK_PROBE_TIMEOUT_SECONDS"));
        set(&mut self.request_timeout_secs, lookup("SIDEKICK_REQUEST_TIMEOUT_SECONDS"));
        set(&mut self.model, lookup("SIDEKICK_MODEL"));
        set(&mut self.api_url, lookup("SIDEKICK_API_URL"));
        set(&mut self.api_key_env, lookup("SIDEKICK_API_KEY_ENV"));
        set(&mut self.link_memory, lookup("SIDEKICK_LINK_MEMORY"));
        self
    }

    /// The API key, if the configured variable is set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}
