pub mod classify;
pub mod digest;
pub mod merge;
pub mod store;

pub use classify::{Classifier, FeatureIntent, KeywordClassifier, KeywordTable};
pub use merge::{apply_insight, merge, needs_fingerprint, MergeLimits};
pub use store::{link_visible, load, save};
