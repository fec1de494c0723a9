//! Agent surface: card, entrypoint dispatch, and progress messages.
//!
//! A run reports progress through a [`ResponseContext`]. The `web_search`
//! entrypoint sends exactly two messages: a status line, then the answer text
//! with `{"sources": [...]}` attached.

use groundsearch_core::{Error, Result};
use groundsearch_local::WebSearcher;
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;

pub const WEB_SEARCH_ENTRYPOINT: &str = "web_search";
pub const SEARCHING_MESSAGE: &str = "Searching the Internet";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entrypoint {
    pub id: String,
    pub description: String,
    /// JSON schema of entrypoint parameters; `web_search` takes none.
    pub parameters: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
    pub entrypoints: Vec<Entrypoint>,
}

pub fn web_search_entrypoint() -> Entrypoint {
    Entrypoint {
        id: WEB_SEARCH_ENTRYPOINT.to_string(),
        description: "Searches the internet using Google's Vertex AI.".to_string(),
        parameters: None,
    }
}

pub fn agent_card() -> AgentCard {
    AgentCard {
        name: "Web Search".to_string(),
        description: "Searches the internet.".to_string(),
        icon: None,
        entrypoints: vec![web_search_entrypoint()],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrypointId {
    WebSearch,
}

impl EntrypointId {
    /// Unknown ids are an integration error, not a runtime condition.
    pub fn parse(id: &str) -> Result<Self> {
        match id {
            WEB_SEARCH_ENTRYPOINT => Ok(Self::WebSearch),
            other => Err(Error::InvalidArgument(format!(
                "unknown entrypoint {other:?} (expected {WEB_SEARCH_ENTRYPOINT:?})"
            ))),
        }
    }
}

/// One progress message sent back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessLog {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[async_trait::async_trait]
pub trait ResponseContext: Send + Sync {
    async fn log(&self, text: &str, data: Option<serde_json::Value>) -> Result<()>;
}

/// Keeps messages in memory, in send order.
#[derive(Debug, Default)]
pub struct CollectingContext {
    logs: Mutex<Vec<ProcessLog>>,
}

impl CollectingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logs(&self) -> Vec<ProcessLog> {
        self.logs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn into_logs(self) -> Vec<ProcessLog> {
        self.logs.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl ResponseContext for CollectingContext {
    async fn log(&self, text: &str, data: Option<serde_json::Value>) -> Result<()> {
        self.logs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ProcessLog {
                text: text.to_string(),
                data,
            });
        Ok(())
    }
}

/// Writes each message as one JSON line as soon as it is sent.
pub struct JsonLinesContext<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesContext<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl<W: Write + Send> ResponseContext for JsonLinesContext<W> {
    async fn log(&self, text: &str, data: Option<serde_json::Value>) -> Result<()> {
        let line = serde_json::to_string(&ProcessLog {
            text: text.to_string(),
            data,
        })
        .map_err(|e| Error::Progress(e.to_string()))?;
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "{line}").map_err(|e| Error::Progress(e.to_string()))?;
        out.flush().map_err(|e| Error::Progress(e.to_string()))
    }
}

pub struct WebSearchAgent {
    searcher: WebSearcher,
}

impl WebSearchAgent {
    pub fn new(searcher: WebSearcher) -> Self {
        Self { searcher }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(WebSearcher::from_env()?))
    }

    pub fn card(&self) -> AgentCard {
        agent_card()
    }

    pub async fn run(
        &self,
        ctx: &dyn ResponseContext,
        request: &str,
        entrypoint: &str,
    ) -> Result<()> {
        match EntrypointId::parse(entrypoint)? {
            EntrypointId::WebSearch => self.run_web_search(ctx, request).await,
        }
    }

    async fn run_web_search(&self, ctx: &dyn ResponseContext, request: &str) -> Result<()> {
        ctx.log(SEARCHING_MESSAGE, None).await?;
        let answer = self.searcher.search(request).await?;
        ctx.log(
            &answer.text,
            Some(serde_json::json!({ "sources": answer.sources })),
        )
        .await
    }
}
