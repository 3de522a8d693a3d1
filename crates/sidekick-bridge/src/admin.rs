use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use sidekick_core::nudge::rfc3339;
use sidekick_core::SidekickConfig;
use time::OffsetDateTime;

// ── Install / Uninstall ──

const HOOK_COMMAND: &str = "sidekick hook";

/// Host events sidekick listens to.
const HOOK_EVENTS: &[&str] = &["PreToolUse", "PostToolUse"];

/// Check if a matcher group (host hook format) runs sidekick.
fn matcher_group_contains_sidekick(group: &Value) -> bool {
    // { "matcher": "", "hooks": [{ "type": "command", "command": "sidekick hook" }] }
    if let Some(hooks) = group.get("hooks").and_then(Value::as_array) {
        return hooks
            .iter()
            .filter_map(|h| h.get("command").and_then(Value::as_str))
            .any(|cmd| cmd.contains(HOOK_COMMAND));
    }
    group.as_str().is_some_and(|s| s.contains(HOOK_COMMAND))
}

pub fn settings_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".claude").join("settings.local.json")
}

/// Install sidekick hooks into `.claude/settings.local.json`, keeping every
/// other hook. An existing file is backed up first.
pub fn install(repo_root: &Path) -> anyhow::Result<()> {
    let path = settings_path(repo_root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut settings: Value = if path.exists() {
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).unwrap_or_else(|_| json!({}))
    } else {
        json!({})
    };

    if path.exists() {
        let backup = backup_path(&path, OffsetDateTime::now_utc());
        fs::copy(&path, &backup)?;
        tracing::info!(backup = %backup.display(), "settings backed up");
    }

    let hooks = settings
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("settings is not an object"))?
        .entry("hooks")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("hooks is not an object"))?;

    for event in HOOK_EVENTS {
        let mut groups: Vec<Value> = hooks
            .get(*event)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|g| !matcher_group_contains_sidekick(g))
            .collect();
        groups.push(json!({
            "matcher": "",
            "hooks": [{ "type": "command", "command": HOOK_COMMAND }]
        }));
        hooks.insert(event.to_string(), Value::Array(groups));
    }

    sidekick_store::write_atomic(&path, serde_json::to_string_pretty(&settings)?.as_bytes())?;
    println!("Installed sidekick hooks into {}", path.display());
    Ok(())
}

pub fn uninstall(repo_root: &Path) -> anyhow::Result<()> {
    let path = settings_path(repo_root);
    if !path.exists() {
        println!("No settings file found at {}", path.display());
        return Ok(());
    }

    let content = fs::read_to_string(&path)?;
    let mut settings: Value = serde_json::from_str(&content)?;

    let mut hooks_now_empty = false;
    if let Some(hooks) = settings
        .as_object_mut()
        .and_then(|obj| obj.get_mut("hooks"))
        .and_then(Value::as_object_mut)
    {
        for event in HOOK_EVENTS {
            if let Some(arr) = hooks.get(*event).and_then(Value::as_array).cloned() {
                let kept: Vec<Value> = arr
                    .into_iter()
                    .filter(|g| !matcher_group_contains_sidekick(g))
                    .collect();
                if kept.is_empty() {
                    hooks.remove(*event);
                } else {
                    hooks.insert(event.to_string(), Value::Array(kept));
                }
            }
        }
        hooks_now_empty = hooks.is_empty();
    }
    if hooks_now_empty {
        if let Some(obj) = settings.as_object_mut() {
            obj.remove("hooks");
        }
    }

    sidekick_store::write_atomic(&path, serde_json::to_string_pretty(&settings)?.as_bytes())?;
    println!("Uninstalled sidekick hooks from {}", path.display());
    Ok(())
}

fn backup_path(path: &Path, now: OffsetDateTime) -> PathBuf {
    let ts = rfc3339(now).replace(':', "-");
    path.with_extension(format!("json.sidekick.bak.{ts}"))
}

// ── Doctor ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub ok: bool,
    pub label: String,
}

impl Check {
    fn new(ok: bool, label: String) -> Self {
        Self { ok, label }
    }
}

pub fn doctor_checks(repo_root: &Path, store_root: &Path, cfg: &SidekickConfig) -> Vec<Check> {
    let exe = which_sidekick();
    let settings = settings_path(repo_root);
    let hooked = fs::read_to_string(&settings)
        .map(|c| c.contains(HOOK_COMMAND))
        .unwrap_or(false);
    vec![
        Check::new(
            exe.is_some(),
            format!("sidekick in PATH: {}", exe.unwrap_or_else(|| "not found".into())),
        ),
        Check::new(hooked, format!("hooks in {}", settings.display())),
        Check::new(store_root.exists(), format!("store root: {}", store_root.display())),
        Check::new(
            cfg.api_key().is_some(),
            format!("API key in ${} (model {})", cfg.api_key_env, cfg.model),
        ),
    ]
}

pub fn doctor(repo_root: &Path, store_root: &Path, cfg: &SidekickConfig) -> anyhow::Result<()> {
    for check in doctor_checks(repo_root, store_root, cfg) {
        println!("[{}] {}", if check.ok { "OK" } else { "WARN" }, check.label);
    }
    Ok(())
}

fn which_sidekick() -> Option<String> {
    let path_var = std::env::var_os("PATH")?;
    let exe_name = if cfg!(windows) { "sidekick.exe" } else { "sidekick" };
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(exe_name))
        .find(|candidate| candidate.is_file())
        .map(|p| p.to_string_lossy().into_owned())
}
