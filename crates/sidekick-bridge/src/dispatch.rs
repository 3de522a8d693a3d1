use std::path::Path;

use sidekick_core::SidekickConfig;
use sidekick_store::ProjectStore;
use time::OffsetDateTime;

use crate::nudge::deliver;
use crate::parse::HookInput;
use crate::pass::PassRequest;
use crate::spawn::PassSpawner;
use crate::trigger::TriggerGate;

// ── Hook Result ──

/// Result from a hook dispatch: an optional message shown to the user on
/// stderr without blocking the tool (exit 1). Nothing else is ever printed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HookResult {
    pub stderr: Option<String>,
}

impl HookResult {
    pub fn warning(msg: String) -> Self {
        Self { stderr: Some(msg) }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

// ── Entrypoint ──

/// Handle one host callback.
///
/// - `PostToolUse` → count the event; a fired trigger submits a pass
/// - `PreToolUse`  → deliver a fresh pending nudge, if any, on stderr
/// - anything else → no-op
pub fn hook_entrypoint_from_stdin(
    stdin: &str,
    store_root: &Path,
    cfg: &SidekickConfig,
    spawner: &dyn PassSpawner,
) -> anyhow::Result<HookResult> {
    if stdin.trim().is_empty() {
        return Ok(HookResult::empty());
    }
    let input = HookInput::parse(stdin)?;
    let store = ProjectStore::new(store_root, &input.cwd);
    let now = OffsetDateTime::now_utc();

    match input.event.as_str() {
        "PostToolUse" => {
            if TriggerGate::from(cfg).on_event(&store, now) {
                tracing::info!(project_id = store.project_id(), tool = %input.tool_name, "trigger fired");
                spawner.submit(PassRequest {
                    cwd: input.cwd,
                    transcript: input.transcript_path,
                });
            }
            Ok(HookResult::empty())
        }
        "PreToolUse" => Ok(deliver(&store, now).map(HookResult::warning).unwrap_or_default()),
        _ => Ok(HookResult::empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidekick_core::nudge::rfc3339;
    use sidekick_core::PendingNudge;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<PassRequest>>);

    impl PassSpawner for Recorder {
        fn submit(&self, req: PassRequest) {
            self.0.borrow_mut().push(req);
        }
    }

    fn post_tool_use(cwd: &Path) -> String {
        serde_json::json!({
            "hook_event_name": "PostToolUse",
            "cwd": cwd,
            "transcript_path": "/logs/s.jsonl",
            "tool_name": "Edit",
        })
        .to_string()
    }

    #[test]
    fn post_tool_use_submits_on_fire() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = SidekickConfig { interval: 3, cooldown_secs: 0, ..Default::default() };
        let spawner = Recorder::default();
        let stdin = post_tool_use(tmp.path());

        for _ in 0..6 {
            let r = hook_entrypoint_from_stdin(&stdin, tmp.path(), &cfg, &spawner).unwrap();
            assert_eq!(r, HookResult::empty());
        }
        let submitted = spawner.0.borrow();
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[0].cwd, tmp.path());
        assert_eq!(submitted[0].transcript.as_deref(), Some(Path::new("/logs/s.jsonl")));
    }

    #[test]
    fn pre_tool_use_delivers_once() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = SidekickConfig::default();
        let store = ProjectStore::new(tmp.path(), tmp.path());
        store.ensure_dir().unwrap();
        let nudge = PendingNudge {
            created_at: rfc3339(OffsetDateTime::now_utc()),
            ttl_seconds: 600,
            body: "Stop and write a failing test first.".into(),
            suggested_commands: vec![],
            score: 0.8,
            reason: String::new(),
            context: String::new(),
        };
        store.write_json(&store.pending_path(), &nudge).unwrap();

        let stdin = serde_json::json!({"hookEventName": "PreToolUse", "cwd": tmp.path()}).to_string();
        let spawner = Recorder::default();
        let first = hook_entrypoint_from_stdin(&stdin, tmp.path(), &cfg, &spawner).unwrap();
        assert!(first.stderr.unwrap().contains("write a failing test"));

        let second = hook_entrypoint_from_stdin(&stdin, tmp.path(), &cfg, &spawner).unwrap();
        assert_eq!(second, HookResult::empty());
    }

    #[test]
    fn other_events_and_empty_input_are_noops() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = SidekickConfig { interval: 0, cooldown_secs: 0, ..Default::default() };
        let spawner = Recorder::default();
        let stop = serde_json::json!({"hook_event_name": "Stop", "cwd": tmp.path()}).to_string();
        assert_eq!(hook_entrypoint_from_stdin(&stop, tmp.path(), &cfg, &spawner).unwrap(), HookResult::empty());
        assert_eq!(hook_entrypoint_from_stdin("  ", tmp.path(), &cfg, &spawner).unwrap(), HookResult::empty());
        assert!(hook_entrypoint_from_stdin("{oops", tmp.path(), &cfg, &spawner).is_err());
        assert!(spawner.0.borrow().is_empty());
    }
}
