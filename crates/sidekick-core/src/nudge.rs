use serde::{Deserialize, Deserializer, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Structured judgment returned by the reasoning service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(alias = "shouldIntervene")]
    pub should_intervene: bool,
    pub score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
    #[serde(
        default,
        alias = "nudgeBody",
        alias = "nudge_body",
        alias = "nudgeMarkdown",
        deserialize_with = "null_as_default"
    )]
    pub nudge_markdown: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub commands: Vec<String>,
    #[serde(default, alias = "memoryUpdate")]
    pub memory_update: Option<String>,
}

impl Verdict {
    /// A verdict is usable only when its score is a number within `[0, 1]`.
    pub fn is_well_formed(&self) -> bool {
        self.score.is_finite() && (0.0..=1.0).contains(&self.score)
    }

    pub fn body(&self) -> &str {
        self.nudge_markdown.trim()
    }
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Nudge waiting in the project mailbox for the next host callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingNudge {
    /// RFC 3339 creation time.
    pub created_at: String,
    pub ttl_seconds: i64,
    #[serde(alias = "nudge_markdown")]
    pub body: String,
    #[serde(default, alias = "commands")]
    pub suggested_commands: Vec<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub context: String,
}

impl PendingNudge {
    /// Seconds elapsed since creation, `None` when `created_at` is unparseable.
    pub fn age_secs(&self, now: OffsetDateTime) -> Option<i64> {
        let created = OffsetDateTime::parse(&self.created_at, &Rfc3339).ok()?;
        Some((now - created).whole_seconds())
    }

    /// Stale once `now - created_at > ttl`. Unparseable timestamps count as stale.
    pub fn is_stale(&self, now: OffsetDateTime) -> bool {
        match self.age_secs(now) {
            Some(age) => age > self.ttl_seconds,
            None => true,
        }
    }
}

/// Format a timestamp as RFC 3339.
pub fn rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn verdict_accepts_snake_and_camel_case() {
        let snake: Verdict = serde_json::from_str(
            r#"{"should_intervene": true, "score": 0.8, "reason": "r", "nudge_markdown": "do x", "commands": ["ls"], "memory_update": null}"#,
        )
        .unwrap();
        let camel: Verdict = serde_json::from_str(
            r#"{"shouldIntervene": true, "score": 0.8, "reason": "r", "nudgeBody": "do x", "commands": ["ls"]}"#,
        )
        .unwrap();
        assert_eq!(snake, camel);
        assert_eq!(snake.body(), "do x");
    }

    #[test]
    fn verdict_requires_core_fields() {
        assert!(serde_json::from_str::<Verdict>(r#"{"score": 0.5}"#).is_err());
        assert!(serde_json::from_str::<Verdict>(r#"{"should_intervene": false}"#).is_err());
    }

    #[test]
    fn verdict_null_lists_default() {
        let v: Verdict = serde_json::from_str(
            r#"{"should_intervene": false, "score": 0.1, "commands": null, "reason": null}"#,
        )
        .unwrap();
        assert!(v.commands.is_empty());
        assert!(v.reason.is_empty());
    }

    #[test]
    fn verdict_score_range() {
        let mut v: Verdict =
            serde_json::from_str(r#"{"should_intervene": true, "score": 1.0}"#).unwrap();
        assert!(v.is_well_formed());
        v.score = 1.5;
        assert!(!v.is_well_formed());
        v.score = f64::NAN;
        assert!(!v.is_well_formed());
    }

    #[test]
    fn pending_staleness() {
        let now = OffsetDateTime::now_utc();
        let mut p = PendingNudge {
            created_at: rfc3339(now - Duration::seconds(100)),
            ttl_seconds: 900,
            body: "b".into(),
            suggested_commands: vec![],
            score: 0.5,
            reason: String::new(),
            context: String::new(),
        };
        assert!(!p.is_stale(now));
        p.ttl_seconds = 60;
        assert!(p.is_stale(now));
        p.created_at = "not a date".into();
        assert!(p.is_stale(now));
    }

    #[test]
    fn pending_reads_legacy_field_names() {
        let p: PendingNudge = serde_json::from_str(
            r#"{"created_at": "2025-01-01T00:00:00Z", "ttl_seconds": 600, "nudge_markdown": "hi", "commands": ["pnpm test"]}"#,
        )
        .unwrap();
        assert_eq!(p.body, "hi");
        assert_eq!(p.suggested_commands, vec!["pnpm test".to_string()]);
    }
}
