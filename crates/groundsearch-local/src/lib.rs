use groundsearch_core::{Error, Result};
use std::time::Duration;

pub mod chat;
pub mod config;
pub mod grounding;
pub mod redirect;
pub mod search;

pub use config::SearchConfig;
pub use grounding::GroundingExtractor;
pub use redirect::HttpRedirectResolver;
pub use search::{WebSearchAnswer, WebSearcher};

pub const USER_AGENT: &str = concat!("groundsearch/", env!("CARGO_PKG_VERSION"));

/// Shared client settings: bounded redirects and no "hang forever" on DNS/TLS stalls.
/// Callers may still set a tighter per-request timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Fetch(e.to_string()))
}
