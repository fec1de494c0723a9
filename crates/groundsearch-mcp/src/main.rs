use anyhow::Result;
use clap::{Parser, Subcommand};
use groundsearch_mcp::agent::{self, EntrypointId, JsonLinesContext, WebSearchAgent};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "groundsearch")]
#[command(about = "Web search agent with grounded quotes (CLI + MCP stdio server)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as an MCP stdio server.
    #[cfg(feature = "stdio")]
    McpStdio,
    /// Run one request through an agent entrypoint; prints progress messages as JSON lines.
    Search(SearchCmd),
    /// Print the agent card.
    Card(OutputCmd),
    /// Diagnose configuration/launch issues (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(OutputCmd),
}

#[derive(clap::Args, Debug)]
struct SearchCmd {
    /// Free-text request.
    #[arg(long)]
    request: String,
    /// Entrypoint id.
    #[arg(long, default_value = agent::WEB_SEARCH_ENTRYPOINT)]
    entrypoint: String,
}

#[derive(clap::Args, Debug)]
struct OutputCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
    /// Attempt a local stdio MCP handshake (list_tools) to prove an MCP client can start the server.
    ///
    /// This spawns a child `groundsearch mcp-stdio` process and calls `list_tools`.
    /// It does not call the model API, and it does not print any secret values.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    check_stdio: bool,
    /// Timeout for the stdio handshake (ms).
    #[arg(long, default_value_t = 3000)]
    timeout_ms: u64,
}

#[cfg(feature = "stdio")]
mod mcp {
    use groundsearch_core::Error as GroundsearchError;
    use groundsearch_mcp::agent::{self, CollectingContext, ProcessLog, WebSearchAgent};
    use rmcp::{
        handler::server::router::tool::ToolRouter as RmcpToolRouter,
        handler::server::wrapper::Parameters,
        model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
        tool, tool_handler, tool_router,
        transport::stdio,
        ErrorData as McpError, ServiceExt,
    };
    use schemars::JsonSchema;
    use serde::Deserialize;
    use std::sync::Arc;

    const SCHEMA_VERSION: u64 = 1;

    #[path = "envelope.rs"]
    mod envelope;
    use envelope::*;

    /// Grounding chunk links that still point at the provider's redirector.
    const REDIRECT_HOST: &str = "vertexaisearch.cloud.google.com";

    fn tool_result(payload: serde_json::Value) -> CallToolResult {
        // Always attach structured content for machine consumers, and include a text fallback
        // for older clients that only read `content[0].text`.
        let mut r = CallToolResult::structured(payload.clone());
        r.content = vec![Content::text(payload.to_string())];
        r
    }

    #[derive(Debug, Deserialize, JsonSchema, Default)]
    struct WebSearchArgs {
        /// Free-text request (required).
        #[serde(default)]
        request: Option<String>,
        /// Entrypoint id (default: web_search).
        #[serde(default)]
        entrypoint: Option<String>,
    }

    #[derive(Clone)]
    pub(crate) struct GroundsearchMcp {
        tool_router: RmcpToolRouter<Self>,
        // None when the server starts without an API key; tools report not_configured.
        agent: Option<Arc<WebSearchAgent>>,
    }

    #[tool_router]
    impl GroundsearchMcp {
        pub(crate) fn new() -> Result<Self, McpError> {
            let agent = match WebSearchAgent::from_env() {
                Ok(a) => Some(Arc::new(a)),
                Err(GroundsearchError::NotConfigured(msg)) => {
                    tracing::warn!(reason = %msg, "starting without a model API key");
                    None
                }
                Err(e) => return Err(McpError::internal_error(e.to_string(), None)),
            };
            Ok(Self {
                tool_router: Self::tool_router(),
                agent,
            })
        }

        fn error_payload(
            kind: &str,
            request: serde_json::Value,
            code: ErrorCode,
            message: impl ToString,
            messages: &[ProcessLog],
            elapsed_ms: u128,
        ) -> serde_json::Value {
            let mut payload = serde_json::json!({
                "ok": false,
                "request": request,
                "messages": messages,
                "error": error_obj(code, message, code.default_hint()),
            });
            add_envelope_fields(&mut payload, kind, elapsed_ms);
            payload
        }

        #[tool(description = "Return the agent card (name, description, entrypoints)")]
        async fn agent_card(&self) -> Result<CallToolResult, McpError> {
            let t0 = std::time::Instant::now();
            let mut payload = serde_json::json!({
                "ok": true,
                "card": agent::agent_card(),
            });
            add_envelope_fields(&mut payload, "agent_card", t0.elapsed().as_millis());
            Ok(tool_result(payload))
        }

        #[tool(
            description = "Search the web via the model's grounded search; returns the quoted answer plus deduplicated {quote, source} pairs with resolved source URLs"
        )]
        async fn web_search(
            &self,
            params: Parameters<Option<WebSearchArgs>>,
        ) -> Result<CallToolResult, McpError> {
            let t0 = std::time::Instant::now();
            let kind = "web_search";
            let args = params.0.unwrap_or_default();
            let entrypoint = args
                .entrypoint
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(agent::WEB_SEARCH_ENTRYPOINT)
                .to_string();
            let request_text = args.request.unwrap_or_default();
            let request = serde_json::json!({
                "request": request_text,
                "entrypoint": entrypoint,
            });

            if request_text.trim().is_empty() {
                return Ok(tool_result(Self::error_payload(
                    kind,
                    request,
                    ErrorCode::InvalidParams,
                    "request must be non-empty",
                    &[],
                    t0.elapsed().as_millis(),
                )));
            }
            // Entrypoint errors win over configuration errors: they are the caller's to fix.
            if let Err(e) = agent::EntrypointId::parse(&entrypoint) {
                return Ok(tool_result(Self::error_payload(
                    kind,
                    request,
                    ErrorCode::for_error(&e),
                    e,
                    &[],
                    t0.elapsed().as_millis(),
                )));
            }
            let Some(agent) = self.agent.clone() else {
                return Ok(tool_result(Self::error_payload(
                    kind,
                    request,
                    ErrorCode::NotConfigured,
                    "missing GROUNDSEARCH_API_KEY (or WEB_SEARCH_API_KEY)",
                    &[],
                    t0.elapsed().as_millis(),
                )));
            };

            let ctx = CollectingContext::new();
            let run = agent.run(&ctx, &request_text, &entrypoint).await;
            let messages = ctx.into_logs();
            if let Err(e) = run {
                tracing::warn!(error = %e, "web_search failed");
                return Ok(tool_result(Self::error_payload(
                    kind,
                    request,
                    ErrorCode::for_error(&e),
                    e,
                    &messages,
                    t0.elapsed().as_millis(),
                )));
            }

            let answer_text = messages.last().map(|m| m.text.clone()).unwrap_or_default();
            let sources = messages
                .last()
                .and_then(|m| m.data.as_ref())
                .and_then(|d| d.get("sources"))
                .cloned()
                .unwrap_or_else(|| serde_json::json!([]));

            let mut warnings: Vec<&'static str> = Vec::new();
            let source_list = sources.as_array().map(Vec::as_slice).unwrap_or(&[]);
            if source_list.is_empty() {
                warnings.push("no_grounding_sources");
            }
            if answer_text.trim().is_empty() {
                warnings.push("empty_answer");
            }
            if source_list.iter().any(|s| {
                s["source"]
                    .as_str()
                    .and_then(|u| url::Url::parse(u).ok())
                    .is_some_and(|u| u.host_str() == Some(REDIRECT_HOST))
            }) {
                warnings.push("unresolved_sources");
            }

            let mut payload = serde_json::json!({
                "ok": true,
                "request": request,
                "answer": { "text": answer_text },
                "sources": sources,
                "messages": messages,
                "warnings": warnings,
                "warning_hints": warning_hints_from(&warnings),
            });
            add_envelope_fields(&mut payload, kind, t0.elapsed().as_millis());
            Ok(tool_result(payload))
        }
    }

    #[tool_handler]
    impl rmcp::ServerHandler for GroundsearchMcp {
        fn get_info(&self) -> ServerInfo {
            ServerInfo {
                instructions: Some(
                    "Web search with grounded quotes. Call web_search with a free-text request; outputs are JSON and schema-versioned."
                        .to_string(),
                ),
                capabilities: ServerCapabilities::builder().enable_tools().build(),
                ..Default::default()
            }
        }
    }

    pub(crate) async fn serve_stdio() -> Result<(), McpError> {
        let svc = GroundsearchMcp::new()?;
        let running = svc
            .serve(stdio())
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        // Keep the stdio server alive until the client closes.
        running
            .waiting()
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(())
    }

}

/// Load `KEY=VALUE` lines into the process env without overriding anything already set.
///
/// Source: `GROUNDSEARCH_ENV_FILE` if set, else `./.env` if present.
/// `GROUNDSEARCH_DOTENV=0` disables loading. Values are never logged.
fn load_env_file() {
    if matches!(
        std::env::var("GROUNDSEARCH_DOTENV")
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str(),
        "0" | "false" | "no" | "off"
    ) {
        return;
    }
    let path = std::env::var("GROUNDSEARCH_ENV_FILE")
        .ok()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| ".env".to_string());
    let Ok(txt) = std::fs::read_to_string(&path) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let s = s.strip_prefix("export ").unwrap_or(s);
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = unquote(v.trim());
        if k.is_empty() {
            continue;
        }
        // Don't override explicit process env.
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
        }
    }
}

/// Strip one matching pair of surrounding quotes (`"..."` or `'...'`).
fn unquote(v: &str) -> &str {
    for q in ['"', '\''] {
        if let Some(inner) = v.strip_prefix(q).and_then(|r| r.strip_suffix(q)) {
            return inner;
        }
    }
    v
}

fn init_tracing() {
    // stderr only: stdout carries MCP frames / JSON lines.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn has_env(k: &str) -> bool {
    std::env::var(k).ok().is_some_and(|v| !v.trim().is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        #[cfg(feature = "stdio")]
        Commands::McpStdio => {
            mcp::serve_stdio()
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        }
        Commands::Search(args) => {
            // Fail on a bad entrypoint before touching configuration.
            EntrypointId::parse(&args.entrypoint)?;
            let agent = WebSearchAgent::from_env()?;
            let ctx = JsonLinesContext::new(std::io::stdout());
            agent.run(&ctx, &args.request, &args.entrypoint).await?;
        }
        Commands::Card(args) => {
            let card = agent::agent_card();
            match args.output.to_ascii_lowercase().as_str() {
                "text" => {
                    println!("{}: {}", card.name, card.description);
                    for e in &card.entrypoints {
                        println!("  {}: {}", e.id, e.description);
                    }
                }
                _ => println!("{}", serde_json::to_string(&card)?),
            }
        }
        Commands::Doctor(args) => {
            let t0 = std::time::Instant::now();
            let config = groundsearch_local::SearchConfig::from_env();
            let api_key_configured = config.api_key.is_some();

            let mut checks: Vec<serde_json::Value> = Vec::new();
            checks.push(serde_json::json!({
                "name": "api_key_present",
                "ok": api_key_configured,
                "message": if api_key_configured { "model API key is set" } else { "model API key is missing" },
                "hint": if api_key_configured { "" } else { "Set GROUNDSEARCH_API_KEY (or WEB_SEARCH_API_KEY)." },
            }));
            let base_url_ok = url::Url::parse(&config.base_url).is_ok();
            checks.push(serde_json::json!({
                "name": "base_url_valid",
                "ok": base_url_ok,
                "message": if base_url_ok { "base url parses" } else { "base url does not parse" },
                "hint": if base_url_ok { "" } else { "Set GROUNDSEARCH_BASE_URL to an absolute URL, e.g. https://host/v1." },
            }));

            // Check: stdio MCP handshake (optional).
            let mut stdio_ok: Option<bool> = None;
            let mut stdio_tool_count: Option<usize> = None;
            let mut stdio_error: Option<serde_json::Value> = None;

            #[cfg(feature = "stdio")]
            if args.check_stdio {
                use rmcp::service::ServiceExt;
                use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
                use tokio::process::Command;

                let exe = std::env::current_exe()
                    .unwrap_or_else(|_| std::path::PathBuf::from("groundsearch"));
                let child = TokioChildProcess::new(Command::new(exe).configure(|cmd| {
                    cmd.args(["mcp-stdio"]);
                    // Avoid accidentally inheriting the key for this probe.
                    cmd.env_remove("GROUNDSEARCH_API_KEY");
                    cmd.env_remove("WEB_SEARCH_API_KEY");
                    cmd.env("GROUNDSEARCH_DOTENV", "0");
                    cmd.env("RUST_LOG", "error");
                }))?;

                let service = ().serve(child).await?;
                let res = tokio::time::timeout(
                    std::time::Duration::from_millis(args.timeout_ms),
                    service.list_tools(Default::default()),
                )
                .await;
                match res {
                    Ok(Ok(tools)) => {
                        stdio_ok = Some(true);
                        stdio_tool_count = Some(tools.tools.len());
                    }
                    Ok(Err(e)) => {
                        stdio_ok = Some(false);
                        stdio_error = Some(serde_json::json!({
                            "code": "handshake_failed",
                            "message": e.to_string(),
                            "hint": "The child closed the stdio transport early. Common causes: stdout contamination (printing logs to stdout), wrong args (not running mcp-stdio), or a crash on startup."
                        }));
                    }
                    Err(_elapsed) => {
                        stdio_ok = Some(false);
                        stdio_error = Some(serde_json::json!({
                            "code": "timeout",
                            "message": format!("stdio handshake timed out after {}ms", args.timeout_ms),
                            "hint": "The child did not respond to list_tools in time."
                        }));
                    }
                }
                let _ = service.cancel().await;
            }

            #[cfg(not(feature = "stdio"))]
            if args.check_stdio {
                stdio_ok = Some(false);
            }

            checks.push(serde_json::json!({
                "name": "mcp_stdio_handshake",
                "ok": if args.check_stdio { stdio_ok.unwrap_or(false) } else { true },
                "skipped": !args.check_stdio,
                "tool_count": stdio_tool_count,
                "error": stdio_error,
            }));

            let ok = checks.iter().all(|c| c["ok"].as_bool().unwrap_or(false));
            let payload = serde_json::json!({
                "schema_version": 1,
                "kind": "doctor",
                "ok": ok,
                "name": "groundsearch",
                "version": env!("CARGO_PKG_VERSION"),
                "platform": {
                    "os": std::env::consts::OS,
                    "arch": std::env::consts::ARCH,
                },
                "features": {
                    "stdio": cfg!(feature = "stdio"),
                },
                "elapsed_ms": t0.elapsed().as_millis(),
                "configured": {
                    "api_key": api_key_configured,
                    "api_key_legacy_name": has_env("WEB_SEARCH_API_KEY"),
                    "base_url": config.base_url,
                    "model": config.model,
                    "redirect_timeout_ms": config.redirect_timeout.as_millis(),
                    "resolve_parallelism": config.resolve_parallelism,
                },
                "checks": checks,
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => {
                    println!("groundsearch {} (ok={})", env!("CARGO_PKG_VERSION"), ok);
                    println!("api_key: {}", api_key_configured);
                    println!("base_url: {}", config.base_url);
                    println!("model: {}", config.model);
                    for c in &checks {
                        println!(
                            "check {}: {}",
                            c["name"].as_str().unwrap_or(""),
                            if c["ok"].as_bool().unwrap_or(false) { "ok" } else { "FAIL" }
                        );
                    }
                }
                _ => println!("{}", payload),
            }
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "groundsearch",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("groundsearch {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{}", v),
            }
        }
    }

    Ok(())
}
