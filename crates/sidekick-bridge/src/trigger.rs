//! Debounce + cooldown gate evaluated on every tool-use callback.
//!
//! Inline work is a counter read, update and atomic write. It never waits:
//! a contended lock or any I/O failure means "don't fire".

use serde::{Deserialize, Serialize};
use sidekick_core::nudge::rfc3339;
use sidekick_core::SidekickConfig;
use sidekick_store::ProjectStore;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const TRIGGER_LOCK: &str = "trigger.lock";

/// Persisted in `trigger.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerState {
    pub count: u64,
    /// RFC 3339 time of the last fire.
    pub last_fire: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerGate {
    /// Fire every N events; `<= 0` fires on every event.
    pub interval: i64,
    /// Minimum seconds between fires; `<= 0` disables the cooldown.
    pub cooldown_secs: i64,
}

impl From<&SidekickConfig> for TriggerGate {
    fn from(cfg: &SidekickConfig) -> Self {
        Self {
            interval: cfg.interval,
            cooldown_secs: cfg.cooldown_secs,
        }
    }
}

impl TriggerGate {
    /// Count one event and decide whether a pass should start.
    ///
    /// On fire, `last_fire` is persisted before returning, so a pass that
    /// crashes costs one cycle instead of causing a retry storm.
    pub fn on_event(&self, store: &ProjectStore, now: OffsetDateTime) -> bool {
        match self.try_on_event(store, now) {
            Ok(fired) => fired,
            Err(e) => {
                tracing::warn!(project_id = store.project_id(), error = %e, "trigger gate failed, not firing");
                false
            }
        }
    }

    fn try_on_event(&self, store: &ProjectStore, now: OffsetDateTime) -> anyhow::Result<bool> {
        store.ensure_dir()?;
        let Some(_lock) = sidekick_store::try_lock_file(&store.dir().join(TRIGGER_LOCK))? else {
            tracing::debug!(project_id = store.project_id(), "trigger busy, not firing");
            return Ok(false);
        };

        let path = store.trigger_path();
        let mut state: TriggerState = store.read_json_or_default(&path);
        state.count += 1;
        let fired = self.should_fire(&state, now);
        if fired {
            state.last_fire = Some(rfc3339(now));
        }
        store.write_json(&path, &state)?;

        tracing::debug!(
            project_id = store.project_id(),
            count = state.count,
            fired,
            "trigger evaluated"
        );
        Ok(fired)
    }

    /// Pure decision for an already-incremented state.
    pub fn should_fire(&self, state: &TriggerState, now: OffsetDateTime) -> bool {
        let on_interval = self.interval <= 0 || state.count % self.interval as u64 == 0;
        if !on_interval {
            return false;
        }
        if self.cooldown_secs <= 0 {
            return true;
        }
        let last = state
            .last_fire
            .as_deref()
            .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok());
        match last {
            Some(last) => (now - last).whole_seconds() >= self.cooldown_secs,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn store(tmp: &tempfile::TempDir) -> ProjectStore {
        ProjectStore::with_id(tmp.path(), "proj".into())
    }

    #[test]
    fn fires_on_interval_then_respects_cooldown() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        let gate = TriggerGate { interval: 10, cooldown_secs: 120 };
        let start = OffsetDateTime::now_utc();

        let fires: Vec<u64> = (1..=20u64)
            .filter(|i| gate.on_event(&store, start + Duration::milliseconds(*i as i64 * 50)))
            .collect();
        assert_eq!(fires, vec![10]);

        let state: TriggerState = store.read_json_or_default(&store.trigger_path());
        assert_eq!(state.count, 20);
        assert!(state.last_fire.is_some());
    }

    #[test]
    fn fires_again_after_cooldown() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        let gate = TriggerGate { interval: 2, cooldown_secs: 60 };
        let t0 = OffsetDateTime::now_utc();
        assert!(!gate.on_event(&store, t0));
        assert!(gate.on_event(&store, t0));
        assert!(!gate.on_event(&store, t0 + Duration::seconds(61)));
        assert!(gate.on_event(&store, t0 + Duration::seconds(61)));
    }

    #[test]
    fn zero_interval_and_cooldown_fire_always() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        let gate = TriggerGate { interval: 0, cooldown_secs: 0 };
        let now = OffsetDateTime::now_utc();
        assert!((0..5).all(|_| gate.on_event(&store, now)));
    }

    #[test]
    fn zero_interval_still_honors_cooldown() {
        let gate = TriggerGate { interval: 0, cooldown_secs: 30 };
        let now = OffsetDateTime::now_utc();
        let recent = TriggerState { count: 7, last_fire: Some(rfc3339(now - Duration::seconds(5))) };
        assert!(!gate.should_fire(&recent, now));
        let unparseable = TriggerState { count: 7, last_fire: Some("yesterday".into()) };
        assert!(gate.should_fire(&unparseable, now));
    }

    #[test]
    fn corrupt_state_restarts_count() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        store.ensure_dir().unwrap();
        std::fs::write(store.trigger_path(), "garbage").unwrap();
        let gate = TriggerGate { interval: 1, cooldown_secs: 0 };
        assert!(gate.on_event(&store, OffsetDateTime::now_utc()));
        let state: TriggerState = store.read_json_or_default(&store.trigger_path());
        assert_eq!(state.count, 1);
    }

    #[test]
    fn contended_gate_does_not_wait_or_fire() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(&tmp);
        store.ensure_dir().unwrap();
        let held = sidekick_store::try_lock_file(&store.dir().join(TRIGGER_LOCK)).unwrap();
        assert!(held.is_some());

        let gate = TriggerGate { interval: 0, cooldown_secs: 0 };
        assert!(!gate.on_event(&store, OffsetDateTime::now_utc()));
        assert!(!store.trigger_path().exists());

        drop(held);
        assert!(gate.on_event(&store, OffsetDateTime::now_utc()));
    }

    #[test]
    fn io_failure_does_not_fire() {
        let tmp = tempfile::tempdir().unwrap();
        // A file where the store root directory should be.
        let blocker = tmp.path().join("root");
        std::fs::write(&blocker, "").unwrap();
        let store = ProjectStore::with_id(&blocker, "proj".into());
        let gate = TriggerGate { interval: 0, cooldown_secs: 0 };
        assert!(!gate.on_event(&store, OffsetDateTime::now_utc()));
    }
}
