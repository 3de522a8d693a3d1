mod cmd_config;
mod cmd_hook;
mod cmd_pass;
mod cmd_status;
mod logging;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use cmd_config::ConfigCmd;

#[derive(Parser)]
#[command(name = "sidekick", version, about = "Advisory sidekick for coding-agent sessions")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Handle one host hook callback (JSON on stdin)
    Hook,
    /// Run one advisory pass in the foreground
    Pass {
        /// Project directory (default: current directory)
        #[arg(long)]
        cwd: Option<PathBuf>,
        /// Transcript to read (default: newest session log of the project)
        #[arg(long)]
        transcript: Option<PathBuf>,
    },
    /// Consume and print the pending nudge, if fresh
    Deliver,
    /// Show trigger, memory and mailbox state of this project
    Status,
    /// Show the project memory
    Memory {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Install sidekick hooks into .claude/settings.local.json
    Install,
    /// Remove sidekick hooks from .claude/settings.local.json
    Uninstall,
    /// Check PATH, hooks, store and API key
    Doctor,
    /// Read or edit <store_root>/config.json
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let store_root = sidekick_store::store_root();
    logging::init(&store_root);
    run(cli.cmd, &store_root, std::env::current_dir)
}

/// Only commands that act on the working directory resolve it; `hook` never does.
fn run(
    cmd: Command,
    store_root: &Path,
    repo_root: impl FnOnce() -> std::io::Result<PathBuf>,
) -> anyhow::Result<()> {
    match cmd {
        Command::Hook => cmd_hook::execute(store_root),
        Command::Pass { cwd, transcript } => {
            let cwd = match cwd {
                Some(cwd) => cwd,
                None => repo_root()?,
            };
            cmd_pass::execute(store_root, cwd, transcript)
        }
        Command::Deliver => cmd_status::deliver(store_root, &repo_root()?),
        Command::Status => cmd_status::status(store_root, &repo_root()?),
        Command::Memory { json } => cmd_status::memory(store_root, &repo_root()?, json),
        Command::Install => sidekick_bridge::admin::install(&repo_root()?),
        Command::Uninstall => sidekick_bridge::admin::uninstall(&repo_root()?),
        Command::Doctor => {
            let cfg = sidekick_core::SidekickConfig::load(store_root);
            sidekick_bridge::admin::doctor(&repo_root()?, store_root, &cfg)
        }
        Command::Config { cmd } => cmd_config::run(cmd, store_root),
    }
}
