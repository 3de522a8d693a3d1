use std::fs;
use std::io;
use std::path::Path;

use sidekick_core::Memory;
use sidekick_store::ProjectStore;

/// Name of the link kept in the project's `.claude/` directory.
pub const VISIBLE_MEMORY_FILE: &str = "memory.json";

/// Load the project's memory. Absent or corrupt records yield a fresh default.
pub fn load(store: &ProjectStore) -> Memory {
    store.read_json_or_default(&store.memory_path())
}

/// Atomically replace the project's memory record.
pub fn save(store: &ProjectStore, memory: &Memory) -> anyhow::Result<()> {
    store.write_json(&store.memory_path(), memory)?;
    tracing::debug!(
        project_id = store.project_id(),
        sessions = memory.sessions,
        "memory saved"
    );
    Ok(())
}

/// Point `<cwd>/.claude/memory.json` at the project's memory record so it can
/// be browsed from the project. Only done when `.claude/` already exists. A
/// stale link is replaced; a regular file at that path is left alone.
/// Returns whether the link is in place.
pub fn link_visible(store: &ProjectStore, cwd: &Path) -> io::Result<bool> {
    let claude_dir = cwd.join(".claude");
    if !claude_dir.is_dir() {
        return Ok(false);
    }
    let link = claude_dir.join(VISIBLE_MEMORY_FILE);
    let target = store.memory_path();
    match fs::symlink_metadata(&link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            if fs::read_link(&link)? == target {
                return Ok(true);
            }
            fs::remove_file(&link)?;
        }
        Ok(_) => return Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    symlink(&target, &link)?;
    tracing::debug!(link = %link.display(), "memory link created");
    Ok(true)
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "symlinks not supported"))
}
