use groundsearch_core::{Error, RedirectResolver, Result};
use std::time::Duration;

/// Follows redirects over HTTP to find where a citation link lands.
///
/// Grounding chunks carry short-lived `vertexaisearch.cloud.google.com` redirect
/// links; callers want the stable destination.
#[derive(Debug, Clone)]
pub struct HttpRedirectResolver {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpRedirectResolver {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: crate::http_client(timeout)?,
            timeout,
        })
    }

    /// Use a caller-provided client. It should follow redirects.
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// HEAD first; GET when the HEAD probe errors or is not 2xx.
    pub async fn try_resolve(&self, uri: &str) -> Result<String> {
        let url = url::Url::parse(uri).map_err(|e| Error::Fetch(format!("invalid url: {e}")))?;

        match self
            .client
            .head(url.clone())
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => return Ok(resp.url().to_string()),
            Ok(resp) => {
                tracing::debug!(status = %resp.status(), "HEAD probe not successful; retrying with GET");
            }
            Err(e) => {
                tracing::debug!(error = %e, "HEAD probe failed; retrying with GET");
            }
        }

        // Headers are enough: the final URL is known before the body is read.
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(resp.url().to_string())
    }
}

#[async_trait::async_trait]
impl RedirectResolver for HttpRedirectResolver {
    async fn resolve(&self, uri: &str) -> String {
        match self.try_resolve(uri).await {
            Ok(final_url) => {
                tracing::debug!(uri, final_url = %final_url, "resolved redirect");
                final_url
            }
            Err(e) => {
                tracing::warn!(uri, error = %e, "redirect resolution failed; keeping original uri");
                uri.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{Method, StatusCode},
        response::{IntoResponse, Redirect},
        routing::{any, get},
        Router,
    };
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn resolver(timeout_ms: u64) -> HttpRedirectResolver {
        HttpRedirectResolver::new(Duration::from_millis(timeout_ms)).unwrap()
    }

    #[tokio::test]
    async fn follows_redirect_chain_to_final_url() {
        let app = Router::new()
            .route("/r1", get(|| async { Redirect::temporary("/r2") }))
            .route("/r2", get(|| async { Redirect::permanent("/final") }))
            .route("/final", get(|| async { "landed" }));
        let addr = serve(app).await;

        let got = resolver(5_000).resolve(&format!("http://{addr}/r1")).await;
        assert_eq!(got, format!("http://{addr}/final"));
    }

    #[tokio::test]
    async fn falls_back_to_get_when_head_is_rejected() {
        let gets = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/r",
                any({
                    let gets = gets.clone();
                    move |method: Method| {
                        let gets = gets.clone();
                        async move {
                            if method == Method::HEAD {
                                StatusCode::METHOD_NOT_ALLOWED.into_response()
                            } else {
                                gets.fetch_add(1, Ordering::SeqCst);
                                Redirect::temporary("/final").into_response()
                            }
                        }
                    }
                }),
            )
            .route("/final", get(|| async { "landed" }));
        let addr = serve(app).await;

        let got = resolver(5_000).resolve(&format!("http://{addr}/r")).await;
        assert_eq!(got, format!("http://{addr}/final"));
        assert_eq!(gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn falls_back_to_get_when_head_connection_drops() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Raw server: HEAD gets its connection closed with no response;
        // GET /r redirects to /final.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let mut n = 0;
                    while !buf[..n].windows(4).any(|w| w == b"\r\n\r\n") {
                        match sock.read(&mut buf[n..]).await {
                            Ok(0) | Err(_) => return,
                            Ok(m) => n += m,
                        }
                        if n == buf.len() {
                            return;
                        }
                    }
                    let head = String::from_utf8_lossy(&buf[..n]).to_string();
                    if head.starts_with("HEAD ") {
                        return;
                    }
                    let resp = if head.starts_with("GET /r ") {
                        "HTTP/1.1 302 Found\r\nLocation: /final\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    } else {
                        "HTTP/1.1 200 OK\r\nContent-Length: 6\r\nConnection: close\r\n\r\nlanded"
                    };
                    let _ = sock.write_all(resp.as_bytes()).await;
                    let _ = sock.shutdown().await;
                });
            }
        });

        let r = resolver(5_000);
        let got = r.try_resolve(&format!("http://{addr}/r")).await.unwrap();
        assert_eq!(got, format!("http://{addr}/final"));
    }

    #[tokio::test]
    async fn get_fallback_reports_final_url_even_on_error_status() {
        let app = Router::new()
            .route(
                "/r",
                any(|method: Method| async move {
                    if method == Method::HEAD {
                        StatusCode::FORBIDDEN.into_response()
                    } else {
                        Redirect::temporary("/gone").into_response()
                    }
                }),
            )
            .route("/gone", get(|| async { StatusCode::NOT_FOUND }));
        let addr = serve(app).await;

        let got = resolver(5_000).resolve(&format!("http://{addr}/r")).await;
        assert_eq!(got, format!("http://{addr}/gone"));
    }

    #[tokio::test]
    async fn unreachable_host_returns_original_uri() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let uri = format!("http://{addr}/nowhere");
        assert_eq!(resolver(2_000).resolve(&uri).await, uri);
    }

    #[tokio::test]
    async fn timeout_returns_original_uri() {
        let app = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "late"
            }),
        );
        let addr = serve(app).await;

        let uri = format!("http://{addr}/slow");
        assert_eq!(resolver(150).resolve(&uri).await, uri);
    }

    #[tokio::test]
    async fn invalid_uri_is_returned_unchanged() {
        assert_eq!(resolver(1_000).resolve("not a url").await, "not a url");
        assert!(resolver(1_000).try_resolve("not a url").await.is_err());
    }
}
