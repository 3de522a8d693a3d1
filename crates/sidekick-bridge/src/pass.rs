//! One advisory pass: read new events, merge memory, consult the advisor and
//! leave at most one pending nudge behind.
//!
//! Nothing is persisted until the advisor has answered. A failed consultation
//! leaves memory and the watermark untouched so the same events are offered
//! again on the next trigger.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sidekick_advisor::{memory_excerpt, AdviceRequest, AdviseError, Advisor};
use sidekick_core::nudge::rfc3339;
use sidekick_core::{Event, SidekickConfig, Verdict};
use sidekick_memory::{apply_insight, merge, needs_fingerprint, Classifier, MergeLimits};
use sidekick_store::ProjectStore;
use sidekick_transcript::{find_transcript, sanitize, SanitizeLimits};
use time::OffsetDateTime;
use tracing::Instrument;

use crate::nudge::{gate, GateConfig};
use crate::policy::policy_excerpt;

/// Marker left for the operator when the API key is not configured.
pub const API_KEY_MISSING_LOG: &str = "api_key_missing.log";

/// Grace on top of the HTTP client's own timeout before the pass gives up on
/// the blocking advisor call.
const ADVISE_GRACE: Duration = Duration::from_secs(5);

/// What a pass should look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassRequest {
    pub cwd: PathBuf,
    /// Transcript named by the host, if any.
    pub transcript: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Another pass holds the project lock.
    Busy,
    NoTranscript,
    NoNewEvents,
    /// The advisor answered; `nudged` tells whether a pending record was written.
    Advised { nudged: bool },
}

#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("advisor: {0}")]
    Advise(#[from] AdviseError),
    #[error("advisor task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Everything a pass needs besides the request itself.
#[derive(Clone)]
pub struct PassRunner {
    pub store_root: PathBuf,
    pub cfg: SidekickConfig,
    pub advisor: Arc<dyn Advisor>,
    pub classifier: Arc<dyn Classifier>,
}

impl PassRunner {
    pub fn new(store_root: PathBuf, cfg: SidekickConfig, advisor: Arc<dyn Advisor>, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            store_root,
            cfg,
            advisor,
            classifier,
        }
    }

    pub fn store_for(&self, cwd: &Path) -> ProjectStore {
        ProjectStore::new(&self.store_root, cwd)
    }

    /// Run one pass for `req`, logging under a fresh `pass_id` span.
    pub async fn run(&self, req: &PassRequest) -> Result<PassOutcome, PassError> {
        let pass_id = ulid::Ulid::new().to_string();
        let store = self.store_for(&req.cwd);
        let span = tracing::info_span!("pass", %pass_id, project_id = store.project_id());
        let result = run_pass(self, &store, req).instrument(span.clone()).await;
        span.in_scope(|| match &result {
            Ok(outcome) => tracing::info!(?outcome, "pass finished"),
            Err(e) => tracing::warn!(error = %e, "pass aborted"),
        });
        result
    }
}

/// The pass body. Callers normally go through [`PassRunner::run`].
pub async fn run_pass(runner: &PassRunner, store: &ProjectStore, req: &PassRequest) -> Result<PassOutcome, PassError> {
    let cfg = &runner.cfg;
    store.ensure_dir()?;
    let Some(_lock) = store.try_lock_pass()? else {
        return Ok(PassOutcome::Busy);
    };

    let memory = sidekick_memory::load(store);
    let Some(transcript) = find_transcript(req.transcript.as_deref(), &req.cwd) else {
        return Ok(PassOutcome::NoTranscript);
    };

    let mut cursor = sidekick_transcript::read(&transcript, memory.watermark.as_deref());
    let events: Vec<Event> = cursor.by_ref().collect();
    tracing::debug!(
        transcript = %transcript.display(),
        events = events.len(),
        writes = sidekick_memory::digest::write_count(&events),
        skipped = cursor.skipped(),
        "transcript read"
    );
    if events.is_empty() {
        return Ok(PassOutcome::NoNewEvents);
    }

    let limits = MergeLimits::from(cfg);
    let outputs = sidekick_context::gather(&req.cwd, cfg, needs_fingerprint(&memory, &limits)).await;
    let mut memory = merge(memory, &events, &outputs, runner.classifier.as_ref(), &limits);

    let request = AdviceRequest::new(
        policy_excerpt(&req.cwd, cfg.policy_max_chars),
        memory_excerpt(&memory, cfg.memory_excerpt_chars),
        sanitize(&events, &SanitizeLimits::from(cfg)),
    );
    let verdict = match consult(runner.advisor.clone(), request, cfg).await {
        Ok(v) => v,
        Err(PassError::Advise(AdviseError::MissingCredential(var))) => {
            record_missing_key(store, &var);
            return Err(AdviseError::MissingCredential(var).into());
        }
        Err(e) => return Err(e),
    };
    tracing::debug!(
        should_intervene = verdict.should_intervene,
        score = verdict.score,
        "verdict received"
    );

    let now = OffsetDateTime::now_utc();
    if let Some(update) = verdict.memory_update.as_deref() {
        apply_insight(&mut memory, update, &rfc3339(now));
    }
    let nudge = gate(&verdict, &mut memory, &GateConfig::from(cfg), now);
    if let Some(ts) = events.iter().rev().map(|e| e.timestamp.as_str()).find(|t| !t.is_empty()) {
        memory.watermark = Some(ts.to_string());
    }

    // Memory first: a crash before the pending write loses this nudge, but
    // the recorded hash keeps a later pass from emitting it twice.
    sidekick_memory::save(store, &memory)?;
    if cfg.link_memory {
        if let Err(e) = sidekick_memory::link_visible(store, &req.cwd) {
            tracing::debug!(error = %e, "memory link not created");
        }
    }
    let Some(mut nudge) = nudge else {
        return Ok(PassOutcome::Advised { nudged: false });
    };
    nudge.context = format!(
        "Session {}, branch {}, {} new events",
        memory.sessions,
        memory.vcs.branch,
        events.len()
    );
    store.write_json(&store.pending_path(), &nudge)?;
    tracing::info!(score = nudge.score, "nudge queued");
    Ok(PassOutcome::Advised { nudged: true })
}

/// Run the blocking advisor on the blocking pool under a hard deadline.
async fn consult(advisor: Arc<dyn Advisor>, request: AdviceRequest, cfg: &SidekickConfig) -> Result<Verdict, PassError> {
    let deadline = Duration::from_secs(cfg.request_timeout_secs) + ADVISE_GRACE;
    let task = tokio::task::spawn_blocking(move || advisor.advise(&request));
    match tokio::time::timeout(deadline, task).await {
        Ok(joined) => Ok(joined??),
        Err(_) => Err(AdviseError::Timeout.into()),
    }
}

fn record_missing_key(store: &ProjectStore, var: &str) {
    let dir = store.diagnostics_dir();
    let write = || -> std::io::Result<()> {
        std::fs::create_dir_all(&dir)?;
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(API_KEY_MISSING_LOG))?;
        writeln!(
            f,
            "{} ${var} is not set; sidekick cannot consult the advisor",
            rfc3339(OffsetDateTime::now_utc())
        )
    };
    if let Err(e) = write() {
        tracing::warn!(error = %e, "cannot write diagnostic marker");
    }
}
