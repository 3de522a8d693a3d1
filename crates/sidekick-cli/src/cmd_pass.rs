use std::path::{Path, PathBuf};
use std::sync::Arc;

use sidekick_advisor::OpenAiAdvisor;
use sidekick_bridge::{PassRequest, PassRunner};
use sidekick_core::SidekickConfig;
use sidekick_memory::KeywordClassifier;

/// `sidekick pass`: run one advisory pass in the foreground.
pub fn execute(store_root: &Path, cwd: PathBuf, transcript: Option<PathBuf>) -> anyhow::Result<()> {
    let cfg = SidekickConfig::load(store_root);
    let runner = PassRunner::new(
        store_root.to_path_buf(),
        cfg.clone(),
        Arc::new(OpenAiAdvisor::from_config(&cfg)),
        Arc::new(KeywordClassifier::default()),
    );
    let req = PassRequest { cwd, transcript };

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(runner.run(&req))?;
    println!("{outcome:?}");
    Ok(())
}
