//! Read-only context probes run once per pass.
//!
//! Every probe is best-effort: a missing tool, a non-repository, a timeout or
//! an unreadable tree yields the documented default instead of an error.

pub mod fingerprint;
pub mod vcs;

use std::path::Path;
use std::time::Duration;

use sidekick_core::{AggregatorOutputs, SidekickConfig};

pub use fingerprint::fingerprint;
pub use vcs::{vcs_context, VcsProbe};

/// Collect the aggregator outputs for one pass.
///
/// The fingerprint scan only runs when `want_fingerprint` is set; it walks the
/// tree on a blocking thread.
pub async fn gather(cwd: &Path, cfg: &SidekickConfig, want_fingerprint: bool) -> AggregatorOutputs {
    let probe = VcsProbe {
        timeout: Duration::from_secs(cfg.probe_timeout_secs),
        recent_commits: cfg.recent_commits,
    };
    let vcs = vcs_context(cwd, &probe).await;

    let fingerprint = if want_fingerprint {
        let root = cwd.to_path_buf();
        match tokio::task::spawn_blocking(move || fingerprint(&root)).await {
            Ok(fp) => Some(fp),
            Err(e) => {
                tracing::warn!(error = %e, "fingerprint scan failed");
                None
            }
        }
    } else {
        None
    };

    AggregatorOutputs { vcs, fingerprint }
}
