use serde::{Deserialize, Serialize};

pub mod grounding;
pub mod record;

pub use record::{Attributes, Record};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("progress delivery failed: {0}")]
    Progress(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One piece of quoted evidence and the page it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePair {
    pub quote: String,
    pub source: String,
}

/// Maps a possibly-redirecting URI to its final destination.
///
/// Implementations never fail: when the destination cannot be determined they
/// return the input URI unchanged.
#[async_trait::async_trait]
pub trait RedirectResolver: Send + Sync {
    async fn resolve(&self, uri: &str) -> String;
}
