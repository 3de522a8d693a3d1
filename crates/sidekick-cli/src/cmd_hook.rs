use std::io::Read;
use std::path::Path;

use sidekick_bridge::{hook_entrypoint_from_stdin, DetachedProcess, PassRequest, PassSpawner};
use sidekick_core::SidekickConfig;

/// Used when the running executable cannot be located.
struct NoSpawn;

impl PassSpawner for NoSpawn {
    fn submit(&self, req: PassRequest) {
        tracing::warn!(cwd = %req.cwd.display(), "no executable to run the pass");
    }
}

/// `sidekick hook`: one host callback on stdin.
pub fn execute(store_root: &Path) -> anyhow::Result<()> {
    let mut stdin_buf = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut stdin_buf) {
        tracing::warn!(error = %e, "cannot read hook input");
        return Ok(());
    }

    let cfg = SidekickConfig::load(store_root);
    let detached = DetachedProcess::current_exe();
    let spawner: &dyn PassSpawner = match &detached {
        Ok(d) => d as &dyn PassSpawner,
        Err(_) => &NoSpawn,
    };

    match hook_entrypoint_from_stdin(&stdin_buf, store_root, &cfg, spawner) {
        Ok(result) => {
            if let Some(nudge) = &result.stderr {
                eprintln!("{nudge}");
                // Exit 1 = non-blocking: the host shows stderr to the user
                // without blocking the tool call.
                std::process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            tracing::warn!(error = %e, "hook failed");
            // Never block the host on internal errors.
            Ok(())
        }
    }
}
