pub mod client;
pub mod request;
pub mod verdict;

pub use client::{Advisor, OpenAiAdvisor};
pub use request::{memory_excerpt, AdviceRequest, SCHEMA_HINT, SYSTEM_PROMPT};
pub use verdict::extract_verdict;

/// Why a consultation produced no verdict. None of these reach the user.
#[derive(Debug, thiserror::Error)]
pub enum AdviseError {
    #[error("API key missing: ${0} is not set")]
    MissingCredential(String),
    #[error("request timed out")]
    Timeout,
    #[error("service returned HTTP {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("empty reply")]
    EmptyReply,
    #[error("no usable verdict in reply: {0}")]
    Malformed(String),
}
