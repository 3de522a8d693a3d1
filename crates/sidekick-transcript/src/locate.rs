use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

/// Encode a working directory the way the host names its per-project log
/// directory under `~/.claude/projects/`.
pub fn encode_project_path(cwd: &Path) -> String {
    cwd.to_string_lossy().replace('/', "-")
}

/// Directories that may hold the session logs of the project at `cwd`.
pub fn log_dirs(cwd: &Path) -> Vec<PathBuf> {
    let mut dirs = vec![cwd.join(".claude")];
    if let Some(home) = dirs::home_dir() {
        dirs.push(
            home.join(".claude")
                .join("projects")
                .join(encode_project_path(cwd)),
        );
    }
    dirs
}

/// Resolve the transcript to read.
///
/// An existing `hint` wins. Otherwise the most recently modified `*.jsonl`
/// under the project's log directories is used. `None` when nothing exists.
pub fn find_transcript(hint: Option<&Path>, cwd: &Path) -> Option<PathBuf> {
    if let Some(p) = hint.filter(|p| p.is_file()) {
        return Some(p.to_path_buf());
    }
    newest_jsonl(&log_dirs(cwd))
}

/// Most recently modified `*.jsonl` below any of `dirs`.
pub fn newest_jsonl(dirs: &[PathBuf]) -> Option<PathBuf> {
    let mut best: Option<(SystemTime, PathBuf)> = None;
    for dir in dirs.iter().filter(|d| d.is_dir()) {
        for entry in WalkDir::new(dir)
            .max_depth(4)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "jsonl") {
                continue;
            }
            let Some(mtime) = entry.metadata().ok().and_then(|m| m.modified().ok()) else {
                continue;
            };
            if best.as_ref().map_or(true, |(t, _)| mtime > *t) {
                best = Some((mtime, path.to_path_buf()));
            }
        }
    }
    best.map(|(_, p)| p)
}
