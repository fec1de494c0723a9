use groundsearch_core::Error as GroundsearchError;
use serde::Serialize;

pub(crate) fn warning_hint(code: &'static str) -> Option<&'static str> {
    match code {
        "no_grounding_sources" => Some(
            "The model answered without usable grounding metadata, so no quote/source pairs were extracted. Rephrase the request to ask for specific facts, or check that the configured model supports web search.",
        ),
        "empty_answer" => Some(
            "The model returned no plain-text answer. Sources (if any) are still listed.",
        ),
        "unresolved_sources" => Some(
            "Some citation links could not be resolved (timeout or network error) and are reported as the original redirect URI. Raise GROUNDSEARCH_REDIRECT_TIMEOUT_MS if this happens often.",
        ),
        _ => None,
    }
}

pub(crate) fn warning_hints_from(codes: &[&'static str]) -> serde_json::Value {
    let mut m = serde_json::Map::new();
    for c in codes {
        if let Some(h) = warning_hint(c) {
            m.insert((*c).to_string(), serde_json::json!(h));
        }
    }
    serde_json::Value::Object(m)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    InvalidParams,
    NotConfigured,
    UpstreamFailed,
    FetchFailed,
    UnexpectedError,
}

impl ErrorCode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParams => "invalid_params",
            Self::NotConfigured => "not_configured",
            Self::UpstreamFailed => "upstream_failed",
            Self::FetchFailed => "fetch_failed",
            Self::UnexpectedError => "unexpected_error",
        }
    }

    pub(crate) fn retryable(self) -> bool {
        match self {
            Self::UpstreamFailed | Self::FetchFailed => true,
            // Configuration + invalid input are not retryable without changing something.
            Self::NotConfigured | Self::InvalidParams | Self::UnexpectedError => false,
        }
    }

    pub(crate) fn for_error(e: &GroundsearchError) -> Self {
        match e {
            GroundsearchError::InvalidArgument(_) => Self::InvalidParams,
            GroundsearchError::NotConfigured(_) => Self::NotConfigured,
            GroundsearchError::Llm(_) => Self::UpstreamFailed,
            GroundsearchError::Fetch(_) => Self::FetchFailed,
            GroundsearchError::Progress(_) => Self::UnexpectedError,
        }
    }

    pub(crate) fn default_hint(self) -> &'static str {
        match self {
            Self::InvalidParams => "Check the tool arguments: `request` must be non-empty and `entrypoint` must be \"web_search\".",
            Self::NotConfigured => "Set GROUNDSEARCH_API_KEY (or WEB_SEARCH_API_KEY) in the server environment, then restart.",
            Self::UpstreamFailed => "The model API call failed. Check GROUNDSEARCH_BASE_URL / GROUNDSEARCH_MODEL and retry later.",
            Self::FetchFailed => "An HTTP client could not be built or a request failed. Retry later.",
            Self::UnexpectedError => "Unexpected failure; see server logs (RUST_LOG=debug).",
        }
    }
}

pub(crate) fn add_envelope_fields(payload: &mut serde_json::Value, kind: &str, elapsed_ms: u128) {
    payload["schema_version"] = serde_json::json!(super::SCHEMA_VERSION);
    payload["kind"] = serde_json::json!(kind);
    payload["elapsed_ms"] = serde_json::json!(elapsed_ms);
    if payload.get("request").is_none() {
        payload["request"] = serde_json::Value::Null;
    }
}

pub(crate) fn error_obj(
    code: ErrorCode,
    message: impl ToString,
    hint: impl ToString,
) -> serde_json::Value {
    #[derive(Serialize)]
    struct ErrorObject {
        code: &'static str,
        message: String,
        hint: String,
        retryable: bool,
    }

    let e = ErrorObject {
        code: code.as_str(),
        message: message.to_string(),
        hint: hint.to_string(),
        retryable: code.retryable(),
    };
    match serde_json::to_value(e) {
        Ok(v) => v,
        Err(_) => serde_json::json!({
            "code": code.as_str(),
            "message": message.to_string(),
            "hint": hint.to_string(),
            "retryable": code.retryable()
        }),
    }
}
