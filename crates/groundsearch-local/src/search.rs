use crate::chat::{ChatClient, ChatCompletionsRequest, Message, WebSearchOptions};
use crate::config::SearchConfig;
use crate::grounding::GroundingExtractor;
use crate::redirect::HttpRedirectResolver;
use groundsearch_core::{Record, RedirectResolver, Result, SourcePair};
use serde::Serialize;
use std::sync::Arc;

pub const WEB_SEARCH_PROMPT: &str = "\
You find information on the internet and extract quotes that are relevant to the user's request. You do not add or
change any information. Quote information exactly as it appears on the web, without correcting typos.
";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WebSearchAnswer {
    /// The model's answer, quoting the web.
    pub text: String,
    pub sources: Vec<SourcePair>,
}

/// One model call with provider-side web search, then grounding extraction.
#[derive(Clone)]
pub struct WebSearcher {
    chat: ChatClient,
    resolver: Arc<dyn RedirectResolver>,
    config: SearchConfig,
}

impl WebSearcher {
    pub fn new(chat: ChatClient, resolver: Arc<dyn RedirectResolver>, config: SearchConfig) -> Self {
        Self {
            chat,
            resolver,
            config,
        }
    }

    /// Model client + HTTP redirect resolver, both built from `config`.
    pub fn from_config(config: SearchConfig) -> Result<Self> {
        let chat = ChatClient::new(crate::http_client(config.timeout)?, &config)?;
        let resolver = HttpRedirectResolver::new(config.redirect_timeout)?;
        Ok(Self::new(chat, Arc::new(resolver), config))
    }

    pub fn from_env() -> Result<Self> {
        Self::from_config(SearchConfig::from_env())
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn build_request(&self, request: &str) -> ChatCompletionsRequest {
        ChatCompletionsRequest {
            model: self.config.model.clone(),
            messages: vec![Message::system(WEB_SEARCH_PROMPT), Message::user(request)],
            web_search_options: Some(WebSearchOptions {
                search_context_size: self.config.search_context_size.clone(),
            }),
            max_tokens: None,
            temperature: None,
        }
    }

    pub async fn search(&self, request: &str) -> Result<WebSearchAnswer> {
        let t0 = std::time::Instant::now();
        tracing::info!(model = %self.config.model, "web search started");

        let completion = self.chat.chat_completions(&self.build_request(request)).await?;
        let text = completion.answer_text();
        let sources = GroundingExtractor::new(self.resolver.as_ref())
            .with_parallelism(self.config.resolve_parallelism)
            .extract(&Record::Object(&completion))
            .await;

        tracing::info!(
            sources = sources.len(),
            answer_chars = text.chars().count(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "web search finished"
        );
        Ok(WebSearchAnswer { text, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{response::Redirect, routing::get, routing::post, Json, Router};
    use std::net::SocketAddr;
    use std::time::Duration;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn config_for(addr: SocketAddr) -> SearchConfig {
        SearchConfig {
            api_key: Some("test-key".to_string()),
            base_url: format!("http://{addr}/v1"),
            redirect_timeout: Duration::from_secs(5),
            ..SearchConfig::default()
        }
    }

    #[test]
    fn request_carries_prompt_user_text_and_low_context_size() {
        let cfg = SearchConfig {
            api_key: Some("k".to_string()),
            ..SearchConfig::default()
        };
        let s = WebSearcher::from_config(cfg).unwrap();
        let req = s.build_request("What's iChatbio?");
        assert_eq!(req.model, "gemini-2.5-flash");
        assert_eq!(req.messages[0], Message::system(WEB_SEARCH_PROMPT));
        assert_eq!(req.messages[1], Message::user("What's iChatbio?"));
        assert_eq!(
            req.web_search_options.as_ref().map(|o| o.search_context_size.as_str()),
            Some("low")
        );
        assert!(WEB_SEARCH_PROMPT.contains("without correcting typos"));
    }

    #[tokio::test]
    async fn search_returns_answer_and_resolved_sources() {
        let app = Router::new()
            .route(
                "/v1/chat/completions",
                post(|axum::extract::Host(host): axum::extract::Host| async move {
                    Json(serde_json::json!({
                        "choices": [{"message": {"role": "assistant", "content": "\"iChatBio is a chatbot.\""}}],
                        "vertex_ai_grounding_metadata": [{
                            "groundingChunks": [
                                {"web": {"uri": format!("http://{host}/redirect/1"), "domain": "ichatbio.org"}},
                                {"web": {"title": "no uri"}}
                            ],
                            "groundingSupports": [
                                {"segment": {"text": "iChatBio is a chatbot."}, "groundingChunkIndices": [0, 1]},
                                {"segment": {"text": "iChatBio is a chatbot."}, "groundingChunkIndices": [0]}
                            ]
                        }]
                    }))
                }),
            )
            .route("/redirect/1", get(|| async { Redirect::temporary("/page") }))
            .route("/page", get(|| async { "page" }));
        let addr = serve(app).await;

        let s = WebSearcher::from_config(config_for(addr)).unwrap();
        let answer = s.search("What's iChatbio?").await.unwrap();
        assert_eq!(answer.text, "\"iChatBio is a chatbot.\"");
        assert_eq!(
            answer.sources,
            vec![SourcePair {
                quote: "iChatBio is a chatbot.".to_string(),
                source: format!("http://{addr}/page"),
            }]
        );
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn search_future_is_send_with_parallel_resolution() {
        let cfg = SearchConfig {
            api_key: Some("k".to_string()),
            resolve_parallelism: 4,
            ..SearchConfig::default()
        };
        let s = WebSearcher::from_config(cfg).unwrap();
        assert_send(s.search("x"));
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (axum::http::StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let addr = serve(app).await;
        let s = WebSearcher::from_config(config_for(addr)).unwrap();
        assert!(matches!(
            s.search("x").await,
            Err(groundsearch_core::Error::Llm(_))
        ));
    }
}
