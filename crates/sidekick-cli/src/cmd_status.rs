use std::fmt::Write as _;
use std::path::Path;

use sidekick_bridge::TriggerState;
use sidekick_core::{FeatureStatus, Memory, PendingNudge};
use sidekick_store::ProjectStore;
use time::OffsetDateTime;

/// `sidekick status`
pub fn status(store_root: &Path, cwd: &Path) -> anyhow::Result<()> {
    let store = ProjectStore::new(store_root, cwd);
    print!("{}", render_status(&store, OffsetDateTime::now_utc()));
    Ok(())
}

/// `sidekick memory [--json]`
pub fn memory(store_root: &Path, cwd: &Path, json: bool) -> anyhow::Result<()> {
    let store = ProjectStore::new(store_root, cwd);
    let memory = sidekick_memory::load(&store);
    if json {
        println!("{}", serde_json::to_string_pretty(&memory)?);
    } else {
        print!("{}", render_memory(&memory));
    }
    Ok(())
}

/// `sidekick deliver`: consume the pending nudge and print it.
pub fn deliver(store_root: &Path, cwd: &Path) -> anyhow::Result<()> {
    let store = ProjectStore::new(store_root, cwd);
    match sidekick_bridge::deliver(&store, OffsetDateTime::now_utc()) {
        Some(text) => print!("{text}"),
        None => println!("(no pending nudge)"),
    }
    Ok(())
}

fn render_status(store: &ProjectStore, now: OffsetDateTime) -> String {
    let trigger: TriggerState = store.read_json_or_default(&store.trigger_path());
    let memory = sidekick_memory::load(store);

    let mut out = String::new();
    let _ = writeln!(out, "Project:    {}", store.project_id());
    let _ = writeln!(out, "State dir:  {}", store.dir().display());
    let _ = writeln!(out, "Events:     {}", trigger.count);
    let _ = writeln!(out, "Last fire:  {}", trigger.last_fire.as_deref().unwrap_or("(never)"));
    let _ = writeln!(out, "Sessions:   {}", memory.sessions);
    let _ = writeln!(out, "Watermark:  {}", memory.watermark.as_deref().unwrap_or("(none)"));

    let pending = match store.read_json::<PendingNudge>(&store.pending_path()) {
        Ok(None) => "(none)".to_string(),
        Ok(Some(p)) if p.is_stale(now) => format!("stale, created {}", p.created_at),
        Ok(Some(p)) => format!("fresh, created {} (score {:.2})", p.created_at, p.score),
        Err(_) => "corrupt".to_string(),
    };
    let _ = writeln!(out, "Pending:    {pending}");
    out
}

fn render_memory(memory: &Memory) -> String {
    let mut out = String::new();
    let project = memory.project.clone().unwrap_or_default();
    let _ = writeln!(out, "Sessions: {}", memory.sessions);
    let _ = writeln!(
        out,
        "Project:  {} [{}] tests: {}",
        project.project_type,
        project.languages.join(", "),
        if project.has_tests { "yes" } else { "no" }
    );
    let _ = writeln!(
        out,
        "Git:      {} ({} uncommitted)",
        memory.vcs.branch, memory.vcs.uncommitted_changes
    );

    if !memory.summary.recent.is_empty() {
        let _ = writeln!(out, "\nRecent:\n{}", memory.summary.recent);
    }

    let struggling: Vec<_> = memory.features_with(FeatureStatus::Struggling).collect();
    if !struggling.is_empty() {
        out.push_str("\nStruggling:\n");
        for f in struggling {
            let _ = writeln!(out, "  {} ({} edits, session {})", f.file, f.edit_count, f.session);
        }
    }
    if !memory.error_patterns.is_empty() {
        out.push_str("\nErrors:\n");
        for p in &memory.error_patterns {
            let _ = writeln!(out, "  {} x{}", p.category, p.count);
        }
    }
    if !memory.recommendations.is_empty() {
        out.push_str("\nRecommendations:\n");
        for r in &memory.recommendations {
            let _ = writeln!(out, "  [{:.1}] {}", r.confidence, r.suggestion);
        }
    }
    if !memory.insights.is_empty() {
        out.push_str("\nInsights:\n");
        for i in &memory.insights {
            let _ = writeln!(out, "  s{}: {}", i.session, i.insight);
        }
    }
    out
}
