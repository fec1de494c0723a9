use crate::config::SearchConfig;
use groundsearch_core::{Attributes, Error, Record, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// OpenAI-compatible chat completions client (Gemini via an OpenAI-style gateway).
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    pub fn new(client: reqwest::Client, config: &SearchConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            Error::NotConfigured("missing GROUNDSEARCH_API_KEY (or WEB_SEARCH_API_KEY)".to_string())
        })?;
        Ok(Self {
            client,
            endpoint: config.chat_endpoint(),
            api_key,
            timeout: config.timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn chat_completions(
        &self,
        req: &ChatCompletionsRequest,
    ) -> Result<ChatCompletionsResponse> {
        let t0 = Instant::now();
        let resp = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(req)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!("chat.completions HTTP {status}")));
        }

        let mut parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        parsed.timings_ms = Some(serde_json::json!({ "request": t0.elapsed().as_millis() }));
        Ok(parsed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionsRequest {
    pub model: String,
    pub messages: Vec<Message>,

    /// Provider-side web search. `search_context_size` trades recall for cost.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search_options: Option<WebSearchOptions>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebSearchOptions {
    pub search_context_size: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionsResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<serde_json::Value>,
    /// Provider extensions (e.g. `vertex_ai_grounding_metadata`), kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
    /// Best-effort timing info we attach after parsing.
    #[serde(skip)]
    pub timings_ms: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: Option<u64>,
    pub message: ChoiceMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub role: Option<String>,
    /// Usually a string; may be null or structured parts.
    #[serde(default)]
    pub content: Option<serde_json::Value>,
}

impl ChatCompletionsResponse {
    /// First choice's text, or empty when it is missing or not a plain string.
    pub fn answer_text(&self) -> String {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }
}

impl Attributes for ChatCompletionsResponse {
    fn attribute(&self, name: &str) -> Record<'_> {
        match name {
            "id" => Record::text(self.id.as_deref()),
            "model" => Record::text(self.model.as_deref()),
            "usage" => self.usage.as_ref().map(Record::Json).unwrap_or(Record::Absent),
            _ => self.extra.get(name).map(Record::Json).unwrap_or(Record::Absent),
        }
    }
}
