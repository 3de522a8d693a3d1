//! End-to-end passes against a scripted advisor.

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::json;
use sidekick_advisor::{AdviceRequest, AdviseError, Advisor};
use sidekick_bridge::{
    deliver, gate, hook_entrypoint_from_stdin, GateConfig, HookResult, PassOutcome, PassQueue, PassRequest,
    PassRunner, PassSpawner,
};
use sidekick_core::{FeatureStatus, PendingNudge, SidekickConfig, Verdict};
use sidekick_memory::KeywordClassifier;
use time::OffsetDateTime;

#[derive(Default)]
struct Scripted {
    replies: Mutex<VecDeque<Result<Verdict, AdviseError>>>,
    seen: Mutex<Vec<AdviceRequest>>,
}

impl Scripted {
    fn push(&self, reply: Result<Verdict, AdviseError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Advisor for Scripted {
    fn advise(&self, request: &AdviceRequest) -> Result<Verdict, AdviseError> {
        self.seen.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(AdviseError::EmptyReply))
    }
}

struct Unused;

impl PassSpawner for Unused {
    fn submit(&self, _req: PassRequest) {
        panic!("no pass expected");
    }
}

fn nudge(body: &str) -> Verdict {
    Verdict {
        should_intervene: true,
        score: 0.7,
        reason: "same file edited over and over".into(),
        nudge_markdown: body.into(),
        commands: vec!["git diff src/auth.ts".into()],
        memory_update: None,
    }
}

struct Fixture {
    _tmp: tempfile::TempDir,
    work: PathBuf,
    transcript: PathBuf,
    advisor: Arc<Scripted>,
    runner: PassRunner,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path().join("work");
        std::fs::create_dir_all(&work).unwrap();
        let transcript = work.join("session.jsonl");
        std::fs::write(&transcript, "").unwrap();
        let advisor = Arc::new(Scripted::default());
        let cfg = SidekickConfig { threshold: 0.2, ..Default::default() };
        let runner = PassRunner::new(
            tmp.path().join("store"),
            cfg,
            advisor.clone(),
            Arc::new(KeywordClassifier::default()),
        );
        Self { _tmp: tmp, work, transcript, advisor, runner }
    }

    fn request(&self) -> PassRequest {
        PassRequest { cwd: self.work.clone(), transcript: Some(self.transcript.clone()) }
    }

    fn append(&self, records: &[serde_json::Value]) {
        let mut f = std::fs::OpenOptions::new().append(true).open(&self.transcript).unwrap();
        for r in records {
            writeln!(f, "{r}").unwrap();
        }
    }

    fn store(&self) -> sidekick_store::ProjectStore {
        self.runner.store_for(&self.work)
    }
}

fn user(ts: &str, text: &str) -> serde_json::Value {
    json!({"type": "user", "timestamp": ts, "message": {"role": "user", "content": text}})
}

fn edits(ts: &str, path: &str, n: usize) -> serde_json::Value {
    let mut content = vec![json!({"type": "text", "text": "Adjusting the token check."})];
    for i in 0..n {
        content.push(json!({
            "type": "tool_use",
            "name": "Edit",
            "input": {"file_path": path, "old_string": format!("v{i}"), "new_string": format!("v{}", i + 1)}
        }));
    }
    json!({"type": "assistant", "timestamp": ts, "message": {"role": "assistant", "content": content}})
}

fn tool_result(ts: &str, output: &str) -> serde_json::Value {
    json!({
        "type": "user",
        "timestamp": ts,
        "message": {"role": "user", "content": [{"type": "tool_result", "content": output}]}
    })
}

fn struggling_session(f: &Fixture) {
    f.append(&[
        user("2025-03-01T10:00:00Z", "login keeps failing, my key is OPENAI_API_KEY=sk-proj-abcdefghijklmnopqrstuvwx"),
        edits("2025-03-01T10:00:10Z", "src/auth.ts", 3),
        tool_result("2025-03-01T10:00:20Z", "ok"),
        edits("2025-03-01T10:00:30Z", "src/auth.ts", 3),
        user("2025-03-01T10:00:40Z", "still broken"),
    ]);
}

#[tokio::test]
async fn struggling_file_produces_one_nudge() {
    let f = Fixture::new();
    struggling_session(&f);
    f.advisor.push(Ok(nudge("Stop patching src/auth.ts. Revert it and write a failing test.")));

    assert_eq!(f.runner.run(&f.request()).await.unwrap(), PassOutcome::Advised { nudged: true });

    let store = f.store();
    let memory = sidekick_memory::load(&store);
    assert_eq!(memory.sessions, 1);
    assert_eq!(memory.watermark.as_deref(), Some("2025-03-01T10:00:40Z"));
    let struggling: Vec<_> = memory.features_with(FeatureStatus::Struggling).collect();
    assert_eq!(struggling.len(), 1);
    assert_eq!(struggling[0].file, "src/auth.ts");
    assert_eq!(struggling[0].edit_count, 6);

    let pending: PendingNudge = store.read_json(&store.pending_path()).unwrap().unwrap();
    assert!(pending.body.starts_with("Stop patching"));
    assert_eq!(pending.ttl_seconds, 900);
    assert!(pending.context.starts_with("Session 1, branch "));
    assert!(pending.context.ends_with("5 new events"));

    let seen = f.advisor.seen.lock().unwrap();
    assert!(seen[0].context.contains("still broken"));
    assert!(!seen[0].context.contains("sk-proj-abcdefghijklmnopqrstuvwx"));
}

#[tokio::test]
async fn identical_advice_is_not_repeated() {
    let f = Fixture::new();
    struggling_session(&f);
    let body = "Revert src/auth.ts and start from a failing test.";
    f.advisor.push(Ok(nudge(body)));
    f.runner.run(&f.request()).await.unwrap();

    let now = OffsetDateTime::now_utc();
    assert!(deliver(&f.store(), now).unwrap().contains(body));

    f.append(&[user("2025-03-01T10:05:00Z", "try again")]);
    f.advisor.push(Ok(nudge(&format!("{body}\n"))));
    assert_eq!(f.runner.run(&f.request()).await.unwrap(), PassOutcome::Advised { nudged: false });
    assert!(!f.store().pending_path().exists());
    assert!(deliver(&f.store(), now).is_none());
}

#[tokio::test]
async fn watermark_makes_passes_idempotent() {
    let f = Fixture::new();
    struggling_session(&f);
    f.advisor.push(Ok(nudge("first")));
    f.runner.run(&f.request()).await.unwrap();

    assert_eq!(f.runner.run(&f.request()).await.unwrap(), PassOutcome::NoNewEvents);
    assert_eq!(f.advisor.calls(), 1);
    assert_eq!(sidekick_memory::load(&f.store()).sessions, 1);
}

#[tokio::test]
async fn failed_consultation_retries_same_events_later() {
    let f = Fixture::new();
    struggling_session(&f);
    f.advisor.push(Err(AdviseError::Timeout));
    assert!(f.runner.run(&f.request()).await.is_err());
    assert!(!f.store().memory_path().exists());

    f.advisor.push(Ok(nudge("now with advice")));
    assert_eq!(f.runner.run(&f.request()).await.unwrap(), PassOutcome::Advised { nudged: true });
    let seen = f.advisor.seen.lock().unwrap();
    assert_eq!(seen[0].context, seen[1].context);
}

#[tokio::test]
async fn crash_between_memory_and_pending_never_duplicates() {
    let f = Fixture::new();
    struggling_session(&f);
    f.advisor.push(Ok(nudge("Advice A")));
    f.runner.run(&f.request()).await.unwrap();
    let store = f.store();
    let pending_a = std::fs::read_to_string(store.pending_path()).unwrap();

    // A second pass gates advice B and saves memory, then dies before the
    // pending write.
    let mut memory = sidekick_memory::load(&store);
    let gated = gate(
        &nudge("Advice B"),
        &mut memory,
        &GateConfig::from(&f.runner.cfg),
        OffsetDateTime::now_utc(),
    );
    assert!(gated.is_some());
    sidekick_memory::save(&store, &memory).unwrap();
    assert_eq!(std::fs::read_to_string(store.pending_path()).unwrap(), pending_a);

    // The next pass gets B again: lost, but never delivered twice.
    f.append(&[user("2025-03-01T11:00:00Z", "what now?")]);
    f.advisor.push(Ok(nudge("Advice B")));
    assert_eq!(f.runner.run(&f.request()).await.unwrap(), PassOutcome::Advised { nudged: false });
    assert_eq!(std::fs::read_to_string(store.pending_path()).unwrap(), pending_a);

    let text = deliver(&store, OffsetDateTime::now_utc()).unwrap();
    assert!(text.contains("Advice A"));
    assert!(deliver(&store, OffsetDateTime::now_utc()).is_none());
}

#[tokio::test]
async fn hook_trigger_feeds_the_queue() {
    let f = Fixture::new();
    struggling_session(&f);
    f.advisor.push(Ok(nudge("Queued advice")));

    let cfg = SidekickConfig { interval: 2, cooldown_secs: 0, ..Default::default() };
    let queue = PassQueue::start(f.runner.clone(), 4, 2);
    let stdin = json!({
        "hook_event_name": "PostToolUse",
        "cwd": f.work,
        "transcript_path": f.transcript,
        "tool_name": "Edit",
    })
    .to_string();
    let root: &Path = &f.runner.store_root;
    for _ in 0..2 {
        let r = hook_entrypoint_from_stdin(&stdin, root, &cfg, &queue).unwrap();
        assert_eq!(r, HookResult::empty());
    }
    queue.close().await;
    assert_eq!(f.advisor.calls(), 1);

    let pre = json!({"hook_event_name": "PreToolUse", "cwd": f.work}).to_string();
    let shown = hook_entrypoint_from_stdin(&pre, root, &cfg, &Unused).unwrap();
    assert!(shown.stderr.unwrap().contains("Queued advice"));
}
