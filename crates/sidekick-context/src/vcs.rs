use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use sidekick_core::memory::{CommitFrequency, VcsContext};
use tokio::process::Command;

/// Limits applied to every git probe.
#[derive(Debug, Clone, Copy)]
pub struct VcsProbe {
    pub timeout: Duration,
    pub recent_commits: usize,
}

impl Default for VcsProbe {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            recent_commits: 10,
        }
    }
}

/// Snapshot of the repository at `cwd`. The four probes run concurrently,
/// each under its own timeout; a failing probe leaves its field at the default.
pub async fn vcs_context(cwd: &Path, probe: &VcsProbe) -> VcsContext {
    let limit = probe.recent_commits.to_string();
    let log_args = ["log", "--oneline", "--stat", "-n", limit.as_str()];
    let (branch, log, status, weekly) = tokio::join!(
        git(cwd, &["branch", "--show-current"], probe.timeout),
        git(cwd, &log_args, probe.timeout),
        git(cwd, &["status", "--porcelain"], probe.timeout),
        git(cwd, &["rev-list", "--count", "--since=7.days.ago", "HEAD"], probe.timeout),
    );

    let mut ctx = VcsContext::default();
    if let Some(b) = branch.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
        ctx.branch = b;
    }
    if let Some(out) = log {
        ctx.recent_commits = parse_log_stat(&out, probe.recent_commits);
        ctx.last_commit_message = ctx
            .recent_commits
            .first()
            .map(|c| commit_subject(c).to_string())
            .unwrap_or_default();
    }
    if let Some(out) = status {
        ctx.uncommitted_changes = out.lines().filter(|l| !l.trim().is_empty()).count();
    }
    if let Some(count) = weekly.and_then(|s| s.trim().parse::<u64>().ok()) {
        ctx.commit_frequency = CommitFrequency::from_weekly_count(count);
    }
    ctx
}

/// Run `git <args>` in `cwd`; stdout on success, `None` on any failure.
async fn git(cwd: &Path, args: &[&str], timeout: Duration) -> Option<String> {
    let child = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(Ok(output)) => {
            tracing::debug!(?args, code = ?output.status.code(), "git probe failed");
            None
        }
        Ok(Err(e)) => {
            tracing::debug!(?args, error = %e, "git probe could not start");
            None
        }
        Err(_) => {
            tracing::debug!(?args, timeout_ms = timeout.as_millis() as u64, "git probe timed out");
            None
        }
    }
}

/// Fold `git log --oneline --stat` output into one line per commit:
/// `<hash> <subject> (<N files changed, ...>)`.
pub fn parse_log_stat(out: &str, limit: usize) -> Vec<String> {
    let mut commits: Vec<String> = Vec::new();
    for line in out.lines() {
        if is_commit_line(line) {
            commits.push(line.trim_end().to_string());
        } else if let Some(current) = commits.last_mut() {
            let stat = line.trim();
            if stat.contains(" changed") {
                current.push_str(&format!(" ({stat})"));
            }
        }
    }
    commits.truncate(limit);
    commits
}

fn is_commit_line(line: &str) -> bool {
    let hash_len = line.chars().take_while(|c| c.is_ascii_hexdigit()).count();
    hash_len >= 7 && line[hash_len..].starts_with(' ')
}

/// The subject of a folded commit line, without hash and stat suffix.
fn commit_subject(line: &str) -> &str {
    let rest = line.split_once(' ').map(|(_, r)| r).unwrap_or(line);
    match rest.rfind(" (") {
        Some(i) if rest.ends_with(" changed)") || rest.contains("changed, ") => &rest[..i],
        _ => rest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
a1b2c3d feat: add login form
 src/login.tsx | 40 ++++++++
 src/app.tsx   |  2 +-
 2 files changed, 41 insertions(+), 1 deletion(-)
e4f5a6b fix: null check (auth)
 src/auth.ts | 1 +
 1 file changed, 1 insertion(+)
0000000 chore: empty
";

    #[test]
    fn log_stat_is_folded_per_commit() {
        let commits = parse_log_stat(LOG, 10);
        assert_eq!(commits.len(), 3);
        assert_eq!(
            commits[0],
            "a1b2c3d feat: add login form (2 files changed, 41 insertions(+), 1 deletion(-))"
        );
        assert_eq!(commits[1], "e4f5a6b fix: null check (auth) (1 file changed, 1 insertion(+))");
        assert_eq!(commits[2], "0000000 chore: empty");
    }

    #[test]
    fn log_stat_respects_limit() {
        assert_eq!(parse_log_stat(LOG, 1).len(), 1);
    }

    #[test]
    fn subject_strips_hash_and_stat() {
        let commits = parse_log_stat(LOG, 10);
        assert_eq!(commit_subject(&commits[0]), "feat: add login form");
        assert_eq!(commit_subject(&commits[1]), "fix: null check (auth)");
        assert_eq!(commit_subject(&commits[2]), "chore: empty");
    }

    #[test]
    fn stat_lines_without_commit_are_ignored() {
        assert!(parse_log_stat(" 1 file changed\n", 10).is_empty());
    }

    #[tokio::test]
    async fn non_repository_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = vcs_context(tmp.path(), &VcsProbe::default()).await;
        assert_eq!(ctx.branch, "unknown");
        assert!(ctx.recent_commits.is_empty());
        assert_eq!(ctx.uncommitted_changes, 0);
        assert_eq!(ctx.commit_frequency, CommitFrequency::Unknown);
    }
}
