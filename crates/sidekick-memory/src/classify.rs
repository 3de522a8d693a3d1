//! Keyword heuristics used by the memory merge.
//!
//! The merge only talks to [`Classifier`]; [`KeywordClassifier`] is the
//! default, driven by a [`KeywordTable`].

use regex::Regex;
use sidekick_core::memory::ErrorCategory;

/// Intent expressed by the prose leading up to a file write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureIntent {
    Addition,
    Removal,
}

pub trait Classifier: Send + Sync {
    /// Does this text report an error or failure?
    fn mentions_error(&self, text: &str) -> bool;
    /// Category of an error-mentioning text.
    fn error_category(&self, text: &str) -> ErrorCategory;
    /// Does this text record a technical decision?
    fn is_decision(&self, text: &str) -> bool;
    fn feature_intent(&self, text: &str) -> Option<FeatureIntent>;
    /// Is this summary line worth promoting to the historical tier?
    fn is_key_point(&self, line: &str) -> bool;
}

/// Keyword lists behind [`KeywordClassifier`].
///
/// Error lists match as case-insensitive substrings so that compound names
/// such as `TypeError` or `ModuleNotFoundError` are caught. All other lists
/// match whole words only.
#[derive(Debug, Clone)]
pub struct KeywordTable {
    pub error: &'static [&'static str],
    /// Checked in this order; the first list that hits wins.
    pub type_error: &'static [&'static str],
    pub import_error: &'static [&'static str],
    pub null_reference: &'static [&'static str],
    pub decision: &'static [&'static str],
    /// Addition is checked before removal.
    pub addition: &'static [&'static str],
    pub removal: &'static [&'static str],
    pub key_point: &'static [&'static str],
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self {
            error: &["error", "failed", "failure", "exception", "traceback", "panicked"],
            type_error: &["typescript", "type error", "typeerror", "mismatched types", "ts2"],
            import_error: &["import", "cannot find module", "module not found", "modulenotfound", "unresolved"],
            null_reference: &["undefined", "null", "nonetype", "nil pointer"],
            decision: &["decided", "chose", "using", "switched to", "migrated", "went with"],
            addition: &["add", "adding", "implement", "implementing", "create", "creating", "introduce"],
            removal: &["remove", "removing", "delete", "deleting", "drop", "dropping"],
            key_point: &[
                "error", "fixed", "implemented", "added", "removed", "bug", "feature", "refactor",
                "test", "deploy", "security", "performance",
            ],
        }
    }
}

pub struct KeywordClassifier {
    error: Regex,
    type_error: Regex,
    import_error: Regex,
    null_reference: Regex,
    decision: Regex,
    addition: Regex,
    removal: Regex,
    key_point: Regex,
}

impl KeywordClassifier {
    pub fn new(table: &KeywordTable) -> Result<Self, regex::Error> {
        Ok(Self {
            error: any_of(table.error, false)?,
            type_error: any_of(table.type_error, false)?,
            import_error: any_of(table.import_error, false)?,
            null_reference: any_of(table.null_reference, false)?,
            decision: any_of(table.decision, true)?,
            addition: any_of(table.addition, true)?,
            removal: any_of(table.removal, true)?,
            key_point: any_of(table.key_point, false)?,
        })
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        // Built-in table holds only escaped literals.
        Self::new(&KeywordTable::default()).expect("default keyword table compiles")
    }
}

/// Case-insensitive alternation of escaped literals. An empty list never matches.
fn any_of(words: &[&str], whole_word: bool) -> Result<Regex, regex::Error> {
    if words.is_empty() {
        return Regex::new(r"[^\s\S]");
    }
    let alts = words.iter().map(|w| regex::escape(w)).collect::<Vec<_>>().join("|");
    if whole_word {
        Regex::new(&format!(r"(?i)\b(?:{alts})\b"))
    } else {
        Regex::new(&format!(r"(?i)(?:{alts})"))
    }
}

impl Classifier for KeywordClassifier {
    fn mentions_error(&self, text: &str) -> bool {
        self.error.is_match(text)
    }

    fn error_category(&self, text: &str) -> ErrorCategory {
        if self.type_error.is_match(text) {
            ErrorCategory::TypeError
        } else if self.import_error.is_match(text) {
            ErrorCategory::ImportError
        } else if self.null_reference.is_match(text) {
            ErrorCategory::NullReference
        } else {
            ErrorCategory::Unknown
        }
    }

    fn is_decision(&self, text: &str) -> bool {
        self.decision.is_match(text)
    }

    fn feature_intent(&self, text: &str) -> Option<FeatureIntent> {
        if self.addition.is_match(text) {
            Some(FeatureIntent::Addition)
        } else if self.removal.is_match(text) {
            Some(FeatureIntent::Removal)
        } else {
            None
        }
    }

    fn is_key_point(&self, line: &str) -> bool {
        self.key_point.is_match(line)
    }
}
