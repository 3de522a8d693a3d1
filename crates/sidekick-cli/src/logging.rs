use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Filter variable, e.g. `SIDEKICK_LOG=sidekick_bridge=debug`.
pub const LOG_ENV: &str = "SIDEKICK_LOG";

/// Route `tracing` output to `<store_root>/logs/sidekick.log`.
///
/// stdout and stderr belong to the host's hook protocol, so nothing is ever
/// logged there. The appender writes synchronously: hook processes may leave
/// through `process::exit`, which would strand a background writer's buffer.
pub fn init(store_root: &Path) {
    let dir = store_root.join("logs");
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(tracing_appender::rolling::never(dir, "sidekick.log"))
        .with_ansi(false)
        .with_target(true)
        .try_init();
}
