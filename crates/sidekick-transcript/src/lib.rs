pub mod cursor;
pub mod locate;
pub mod redact;
pub mod sanitize;

pub use cursor::{read, TranscriptCursor};
pub use locate::{find_transcript, log_dirs};
pub use redact::redact_secrets;
pub use sanitize::{sanitize, SanitizeLimits};
