use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_REDIRECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RESOLVE_PARALLELISM: usize = 4;

pub(crate) fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env(key).and_then(|s| s.parse::<u64>().ok())
}

pub fn api_key_from_env() -> Option<String> {
    env("GROUNDSEARCH_API_KEY").or_else(|| env("WEB_SEARCH_API_KEY"))
}

fn base_url_from_env() -> Option<String> {
    env("GROUNDSEARCH_BASE_URL").or_else(|| env("OPENAI_BASE_URL"))
}

/// Runtime knobs for a search. Secrets live only in `api_key`.
#[derive(Clone)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Timeout for the model call.
    pub timeout: Duration,
    /// Per-request timeout for each redirect probe (HEAD, then GET).
    pub redirect_timeout: Duration,
    /// How many distinct citation URIs to resolve concurrently (1 = sequential).
    pub resolve_parallelism: usize,
    /// Value sent as `web_search_options.search_context_size`.
    pub search_context_size: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            redirect_timeout: Duration::from_millis(DEFAULT_REDIRECT_TIMEOUT_MS),
            resolve_parallelism: DEFAULT_RESOLVE_PARALLELISM,
            search_context_size: "low".to_string(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("redirect_timeout", &self.redirect_timeout)
            .field("resolve_parallelism", &self.resolve_parallelism)
            .field("search_context_size", &self.search_context_size)
            .finish()
    }
}

impl SearchConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            api_key: api_key_from_env(),
            base_url: base_url_from_env().unwrap_or(d.base_url),
            model: env("GROUNDSEARCH_MODEL").unwrap_or(d.model),
            timeout: env_u64("GROUNDSEARCH_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.timeout),
            redirect_timeout: env_u64("GROUNDSEARCH_REDIRECT_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.redirect_timeout),
            resolve_parallelism: env_u64("GROUNDSEARCH_RESOLVE_PARALLELISM")
                .map(|n| (n as usize).clamp(1, 32))
                .unwrap_or(d.resolve_parallelism),
            search_context_size: d.search_context_size,
        }
    }

    pub fn chat_endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}
