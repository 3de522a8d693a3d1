//! Glue between the host's hook protocol and the advisory pipeline.
//!
//! Hook callbacks only touch local files: `PostToolUse` runs the trigger gate
//! and hands a fired pass to a [`PassSpawner`]; `PreToolUse` consumes a
//! pending nudge. The pass itself lives in [`pass`].

pub mod admin;
pub mod dispatch;
pub mod nudge;
pub mod parse;
pub mod pass;
pub mod policy;
pub mod spawn;
pub mod trigger;

pub use dispatch::{hook_entrypoint_from_stdin, HookResult};
pub use nudge::{deliver, gate, render, GateConfig};
pub use pass::{run_pass, PassError, PassOutcome, PassRequest, PassRunner};
pub use spawn::{DetachedProcess, PassQueue, PassSpawner};
pub use trigger::{TriggerGate, TriggerState};
