//! Durable per-project memory record and the aggregator outputs folded into it.
//!
//! Every field is defaulted so that a record written by an older build, or a
//! partially corrupt one, still loads.

use serde::{Deserialize, Serialize};

/// Caps of the bounded memory lists. Eviction is oldest-first.
pub const DECISIONS_CAP: usize = 30;
pub const ERROR_PATTERNS_CAP: usize = 10;
pub const FEATURES_CAP: usize = 40;
pub const INSIGHTS_CAP: usize = 20;

/// Character budgets of the three summary tiers.
pub const RECENT_CHARS: usize = 1500;
pub const ROLLING_CHARS: usize = 3000;
pub const HISTORICAL_CHARS: usize = 2000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Memory {
    /// Timestamp of the last transcript event folded into this record.
    pub watermark: Option<String>,
    pub sessions: u64,
    pub last_updated: Option<String>,
    pub project: Option<ProjectFingerprint>,
    pub vcs: VcsContext,
    pub summary: ConversationSummary,
    pub features: Vec<FeatureEntry>,
    pub decisions: Vec<Decision>,
    pub error_patterns: Vec<ErrorPattern>,
    pub insights: Vec<Insight>,
    pub recommendations: Vec<Recommendation>,
    pub last_nudge_hash: String,
}

impl Memory {
    pub fn features_with(&self, status: FeatureStatus) -> impl Iterator<Item = &FeatureEntry> {
        self.features.iter().filter(move |f| f.status == status)
    }

    pub fn error_count(&self, category: ErrorCategory) -> u64 {
        self.error_patterns
            .iter()
            .find(|p| p.category == category)
            .map(|p| p.count)
            .unwrap_or(0)
    }
}

/// Cascading conversation summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSummary {
    /// Digest of the latest pass.
    pub recent: String,
    /// Session-tagged digests of the last few passes, newest first.
    pub rolling: String,
    /// Key points distilled from `rolling`, newest first.
    pub historical: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    Active,
    Completed,
    Struggling,
    Removed,
}

impl std::fmt::Display for FeatureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FeatureStatus::Active => "active",
            FeatureStatus::Completed => "completed",
            FeatureStatus::Struggling => "struggling",
            FeatureStatus::Removed => "removed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEntry {
    pub file: String,
    pub status: FeatureStatus,
    pub session: u64,
    #[serde(default)]
    pub timestamp: String,
    /// Number of touches (active) or edits in one batch (struggling).
    #[serde(default)]
    pub edit_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision: String,
    #[serde(default)]
    pub timestamp: String,
    pub session: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    TypeError,
    ImportError,
    NullReference,
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCategory::TypeError => "type_error",
            ErrorCategory::ImportError => "import_error",
            ErrorCategory::NullReference => "null_reference",
            ErrorCategory::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub category: ErrorCategory,
    pub count: u64,
    #[serde(default)]
    pub last_session: u64,
}

/// Free-form observation returned by the reasoning service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub insight: String,
    pub session: u64,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Rollback,
    Testing,
    RecurringError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub reason: String,
    pub suggestion: String,
    pub confidence: f64,
}

// ── Aggregator outputs ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitFrequency {
    VeryActive,
    Active,
    Moderate,
    Low,
    #[default]
    Unknown,
}

impl CommitFrequency {
    /// Bucket a count of commits made in the last seven days.
    pub fn from_weekly_count(count: u64) -> Self {
        match count {
            c if c > 20 => CommitFrequency::VeryActive,
            c if c > 10 => CommitFrequency::Active,
            c if c > 3 => CommitFrequency::Moderate,
            _ => CommitFrequency::Low,
        }
    }
}

/// Version-control state of the working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VcsContext {
    pub branch: String,
    pub recent_commits: Vec<String>,
    pub uncommitted_changes: usize,
    pub last_commit_message: String,
    pub commit_frequency: CommitFrequency,
}

impl Default for VcsContext {
    fn default() -> Self {
        Self {
            branch: "unknown".to_string(),
            recent_commits: Vec::new(),
            uncommitted_changes: 0,
            last_commit_message: String::new(),
            commit_frequency: CommitFrequency::Unknown,
        }
    }
}

/// Coarse description of the project's stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectFingerprint {
    pub languages: Vec<String>,
    pub frameworks: Vec<String>,
    pub has_tests: bool,
    pub project_type: String,
}

impl Default for ProjectFingerprint {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            frameworks: Vec::new(),
            has_tests: false,
            project_type: "unknown".to_string(),
        }
    }
}

/// Everything the aggregators produced for one pass.
#[derive(Debug, Clone, Default)]
pub struct AggregatorOutputs {
    pub vcs: VcsContext,
    /// `None` when the fingerprint was not recomputed this pass.
    pub fingerprint: Option<ProjectFingerprint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_frequency_thresholds() {
        assert_eq!(CommitFrequency::from_weekly_count(21), CommitFrequency::VeryActive);
        assert_eq!(CommitFrequency::from_weekly_count(20), CommitFrequency::Active);
        assert_eq!(CommitFrequency::from_weekly_count(11), CommitFrequency::Active);
        assert_eq!(CommitFrequency::from_weekly_count(10), CommitFrequency::Moderate);
        assert_eq!(CommitFrequency::from_weekly_count(4), CommitFrequency::Moderate);
        assert_eq!(CommitFrequency::from_weekly_count(3), CommitFrequency::Low);
        assert_eq!(CommitFrequency::from_weekly_count(0), CommitFrequency::Low);
    }

    #[test]
    fn partial_record_loads_with_defaults() {
        let mem: Memory = serde_json::from_str(r#"{"sessions": 4, "last_nudge_hash": "abc"}"#).unwrap();
        assert_eq!(mem.sessions, 4);
        assert_eq!(mem.last_nudge_hash, "abc");
        assert_eq!(mem.vcs.branch, "unknown");
        assert!(mem.watermark.is_none());
        assert!(mem.features.is_empty());
    }

    #[test]
    fn error_count_lookup() {
        let mem = Memory {
            error_patterns: vec![ErrorPattern {
                category: ErrorCategory::ImportError,
                count: 3,
                last_session: 2,
            }],
            ..Default::default()
        };
        assert_eq!(mem.error_count(ErrorCategory::ImportError), 3);
        assert_eq!(mem.error_count(ErrorCategory::TypeError), 0);
    }
}
