//! Pure fold of a new event batch and fresh aggregator outputs into memory.

use std::collections::{BTreeMap, BTreeSet};

use sidekick_core::event::EDIT_TOOLS;
use sidekick_core::memory::*;
use sidekick_core::text::{clip, evict_oldest, push_bounded};
use sidekick_core::{Event, SidekickConfig};

use crate::classify::{Classifier, FeatureIntent};
use crate::digest::{key_points, summarize};

const DECISION_MAX_LEN: usize = 300;
const DECISION_CHARS: usize = 200;
const RECURRING_ERROR_MIN: u64 = 5;
const TESTING_MIN_SESSIONS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeLimits {
    /// Recompute the fingerprint every K-th session (0: only when none is cached).
    pub fingerprint_every: u64,
    /// Promote key points to the historical tier every M-th session (0: never).
    pub historical_every: u64,
    /// A file edited more than this many times in one batch is struggling.
    pub struggle_edits: u64,
}

impl Default for MergeLimits {
    fn default() -> Self {
        Self::from(&SidekickConfig::default())
    }
}

impl From<&SidekickConfig> for MergeLimits {
    fn from(cfg: &SidekickConfig) -> Self {
        Self {
            fingerprint_every: cfg.fingerprint_every,
            historical_every: cfg.historical_every,
            struggle_edits: cfg.struggle_edits,
        }
    }
}

/// Should the coming pass recompute the project fingerprint?
pub fn needs_fingerprint(memory: &Memory, limits: &MergeLimits) -> bool {
    let next = memory.sessions + 1;
    memory.project.is_none() || (limits.fingerprint_every > 0 && next % limits.fingerprint_every == 0)
}

/// Fold `events` and `outputs` into `memory`.
///
/// Deterministic: the result depends only on the arguments. `last_updated`
/// follows the newest event timestamp of the batch.
pub fn merge(
    mut memory: Memory,
    events: &[Event],
    outputs: &AggregatorOutputs,
    classifier: &dyn Classifier,
    limits: &MergeLimits,
) -> Memory {
    memory.sessions += 1;
    let session = memory.sessions;
    if let Some(ts) = events.iter().rev().map(|e| e.timestamp.as_str()).find(|t| !t.is_empty()) {
        memory.last_updated = Some(ts.to_string());
    }

    if let Some(fp) = &outputs.fingerprint {
        memory.project = Some(fp.clone());
    }
    memory.vcs = outputs.vcs.clone();

    update_summary(&mut memory.summary, events, classifier, session, limits);
    update_features(&mut memory.features, events, classifier, session, limits);
    update_errors(&mut memory.error_patterns, events, classifier, session);
    update_decisions(&mut memory.decisions, events, classifier, session);

    memory.recommendations = recommendations(&memory);

    evict_oldest(&mut memory.features, FEATURES_CAP);
    evict_oldest(&mut memory.decisions, DECISIONS_CAP);
    evict_oldest(&mut memory.error_patterns, ERROR_PATTERNS_CAP);
    evict_oldest(&mut memory.insights, INSIGHTS_CAP);
    memory
}

fn update_summary(
    summary: &mut ConversationSummary,
    events: &[Event],
    classifier: &dyn Classifier,
    session: u64,
    limits: &MergeLimits,
) {
    let digest = summarize(events, classifier, RECENT_CHARS);
    let rolling = format!("Session {session}: {digest}\n{}", summary.rolling);
    summary.rolling = clip(&rolling, ROLLING_CHARS).to_string();
    summary.recent = digest;

    if limits.historical_every > 0 && session % limits.historical_every == 0 {
        let points = key_points(&summary.rolling, classifier);
        if !points.is_empty() {
            let historical = format!("{points}\n{}", summary.historical);
            summary.historical = clip(&historical, HISTORICAL_CHARS).to_string();
        }
    }
}

fn update_features(
    features: &mut Vec<FeatureEntry>,
    events: &[Event],
    classifier: &dyn Classifier,
    session: u64,
    limits: &MergeLimits,
) {
    let mut touched: BTreeSet<String> = BTreeSet::new();
    let mut edits: BTreeMap<&str, (u64, &str)> = BTreeMap::new();
    let mut committed = false;

    for ev in events {
        for touch in ev.file_touches() {
            touched.insert(touch.path.to_string());
            if EDIT_TOOLS.contains(&touch.tool) {
                let slot = edits.entry(touch.path).or_insert((0, ev.timestamp.as_str()));
                slot.0 += 1;
                slot.1 = ev.timestamp.as_str();
            }
            match classifier.feature_intent(&touch.preceding_text) {
                Some(FeatureIntent::Addition) => {
                    if let Some(active) = features
                        .iter_mut()
                        .find(|f| f.status == FeatureStatus::Active && f.file == touch.path)
                    {
                        active.edit_count += 1;
                        active.session = session;
                        active.timestamp = ev.timestamp.clone();
                    } else {
                        features.push(entry(touch.path, FeatureStatus::Active, session, &ev.timestamp, 1));
                    }
                }
                Some(FeatureIntent::Removal) => {
                    features.retain(|f| !(f.status == FeatureStatus::Active && f.file == touch.path));
                    features.push(entry(touch.path, FeatureStatus::Removed, session, &ev.timestamp, 0));
                }
                None => {}
            }
        }
        committed |= ev.commits();
    }

    if committed {
        for f in features.iter_mut() {
            if f.status == FeatureStatus::Active && touched.contains(&f.file) {
                f.status = FeatureStatus::Completed;
                f.session = session;
            }
        }
    }

    for (file, (count, ts)) in edits {
        if count > limits.struggle_edits {
            let mut e = entry(file, FeatureStatus::Struggling, session, ts, count);
            e.suggestion = Some(format!(
                "Consider reverting changes to {file} and trying a different approach"
            ));
            features.push(e);
        }
    }
}

fn entry(file: &str, status: FeatureStatus, session: u64, ts: &str, edit_count: u64) -> FeatureEntry {
    FeatureEntry {
        file: file.to_string(),
        status,
        session,
        timestamp: ts.to_string(),
        edit_count,
        suggestion: None,
    }
}

fn update_errors(
    patterns: &mut Vec<ErrorPattern>,
    events: &[Event],
    classifier: &dyn Classifier,
    session: u64,
) {
    for ev in events {
        let text = ev.observed_text();
        if !classifier.mentions_error(&text) {
            continue;
        }
        let category = classifier.error_category(&text);
        match patterns.iter_mut().find(|p| p.category == category) {
            Some(p) => {
                p.count += 1;
                p.last_session = session;
            }
            None => push_bounded(
                patterns,
                ErrorPattern { category, count: 1, last_session: session },
                ERROR_PATTERNS_CAP,
            ),
        }
    }
}

fn update_decisions(
    decisions: &mut Vec<Decision>,
    events: &[Event],
    classifier: &dyn Classifier,
    session: u64,
) {
    for ev in events {
        let text = ev.plain_text();
        if text.is_empty() || text.len() >= DECISION_MAX_LEN || !classifier.is_decision(&text) {
            continue;
        }
        push_bounded(
            decisions,
            Decision {
                decision: clip(&text, DECISION_CHARS).to_string(),
                timestamp: ev.timestamp.clone(),
                session,
            },
            DECISIONS_CAP,
        );
    }
}

/// Recomputed from scratch on every merge.
fn recommendations(memory: &Memory) -> Vec<Recommendation> {
    let mut recs = Vec::new();

    if let Some(latest) = memory.features_with(FeatureStatus::Struggling).last() {
        if !memory.vcs.recent_commits.is_empty() {
            recs.push(Recommendation {
                kind: RecommendationKind::Rollback,
                reason: format!("File {} edited {} times", latest.file, latest.edit_count),
                suggestion: "git reset --soft HEAD~1 to undo the last commit and try a different approach"
                    .to_string(),
                confidence: 0.7,
            });
        }
    }

    if let Some(project) = &memory.project {
        if !project.has_tests && memory.sessions > TESTING_MIN_SESSIONS {
            recs.push(Recommendation {
                kind: RecommendationKind::Testing,
                reason: "No tests found after multiple sessions".to_string(),
                suggestion: test_setup_hint(project).to_string(),
                confidence: 0.9,
            });
        }
    }

    for p in &memory.error_patterns {
        if p.count >= RECURRING_ERROR_MIN {
            recs.push(Recommendation {
                kind: RecommendationKind::RecurringError,
                reason: format!("{} {} errors recorded", p.count, p.category),
                suggestion: format!("Address the root cause of the repeated {} errors", p.category),
                confidence: 0.6,
            });
        }
    }
    recs
}

fn test_setup_hint(project: &ProjectFingerprint) -> &'static str {
    let has = |l: &str| project.languages.iter().any(|x| x == l);
    if has("rust") {
        "Add #[cfg(test)] modules and run cargo test"
    } else if has("python") {
        "Initialize a test suite: pip install pytest && mkdir tests"
    } else if has("js") || has("typescript") {
        "Initialize a test framework: pnpm add -D vitest"
    } else if has("go") {
        "Add *_test.go files and run go test ./..."
    } else {
        "Set up a test framework for this project"
    }
}

/// Record a free-form observation returned with a verdict. Blank text is ignored.
pub fn apply_insight(memory: &mut Memory, insight: &str, timestamp: &str) {
    let insight = insight.trim();
    if insight.is_empty() {
        return;
    }
    push_bounded(
        &mut memory.insights,
        Insight {
            insight: insight.to_string(),
            session: memory.sessions,
            timestamp: timestamp.to_string(),
        },
        INSIGHTS_CAP,
    );
}
