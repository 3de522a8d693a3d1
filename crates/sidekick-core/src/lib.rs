pub mod config;
pub mod event;
pub mod hash;
pub mod memory;
pub mod nudge;
pub mod text;

pub use config::SidekickConfig;
pub use event::{Event, Role, Segment};
pub use memory::*;
pub use nudge::{PendingNudge, Verdict};
