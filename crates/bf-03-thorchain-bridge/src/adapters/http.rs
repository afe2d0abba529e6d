//! JSON-over-HTTP client with bounded exponential back-off.
//!
//! Shared by the consensus client and the chain adapters. A request is
//! retried while the failure is transient (connect error, timeout, 5xx) and
//! the attempt budget lasts; 4xx answers are returned at once.

use backoff::future::retry;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::{BackOffConfig, HttpError};

/// reqwest client bound to one base URL.
#[derive(Clone)]
pub struct RetryingHttpClient {
    client: reqwest::Client,
    base_url: String,
    back_off: BackOffConfig,
    max_attempts: u32,
    basic_auth: Option<(String, String)>,
    retry_server_errors: bool,
}

impl RetryingHttpClient {
    /// Client for `base_url` (scheme included, no trailing slash needed).
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        back_off: BackOffConfig,
        max_attempts: u32,
    ) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::Config(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            back_off,
            max_attempts: max_attempts.max(1),
            basic_auth: None,
            retry_server_errors: true,
        })
    }

    /// Send HTTP basic auth with every request when `username` is set.
    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        if !username.is_empty() {
            self.basic_auth = Some((username.to_string(), password.to_string()));
        }
        self
    }

    /// Treat 5xx answers as terminal. JSON-RPC servers report call errors
    /// with status 500 and a JSON body the caller must see at once.
    pub fn without_server_error_retry(mut self) -> Self {
        self.retry_server_errors = false;
        self
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET base_url + path`, returning the body.
    pub async fn get(&self, path: &str) -> Result<String, HttpError> {
        let url = self.url(path);
        self.with_retry(&url, || self.client.get(&url)).await
    }

    /// `POST base_url + path` with a JSON body, returning the response body.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<String, HttpError> {
        let url = self.url(path);
        let payload = serde_json::to_vec(body).map_err(|e| HttpError::Config(e.to_string()))?;
        self.with_retry(&url, || {
            self.client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(payload.clone())
        })
        .await
    }

    /// `POST base_url + path` with a raw body of `content_type`.
    pub async fn post_body(
        &self,
        path: &str,
        content_type: &'static str,
        body: Vec<u8>,
    ) -> Result<String, HttpError> {
        let url = self.url(path);
        self.with_retry(&url, || {
            self.client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body.clone())
        })
        .await
    }

    fn url(&self, path: &str) -> String {
        if path.is_empty() {
            return self.base_url.clone();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn with_retry<F>(&self, url: &str, build: F) -> Result<String, HttpError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let attempts = AtomicU32::new(0);
        retry(self.back_off.to_backoff(), || async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let mut request = build();
            if let Some((user, pass)) = &self.basic_auth {
                request = request.basic_auth(user, Some(pass));
            }
            match self.send_once(url, request).await {
                Ok(body) => Ok(body),
                Err(err) if self.should_retry(&err) && attempt < self.max_attempts => {
                    debug!(url, attempt, error = %err, "Retrying HTTP request");
                    Err(backoff::Error::transient(err))
                }
                Err(err) => Err(backoff::Error::permanent(err)),
            }
        })
        .await
    }

    fn should_retry(&self, err: &HttpError) -> bool {
        match err {
            HttpError::Status { .. } if !self.retry_server_errors => false,
            other => other.is_transient(),
        }
    }

    async fn send_once(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<String, HttpError> {
        let response = request.send().await.map_err(|e| HttpError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| HttpError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base: &str, attempts: u32) -> RetryingHttpClient {
        RetryingHttpClient::new(
            base,
            Duration::from_secs(2),
            BackOffConfig::for_testing(),
            attempts,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/flaky",
            get(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        (StatusCode::SERVICE_UNAVAILABLE, "busy".to_string())
                    } else {
                        (StatusCode::OK, "ok".to_string())
                    }
                }
            }),
        );
        let base = serve(router).await;

        let body = client(&base, 5).get("/flaky").await.unwrap();
        assert_eq!(body, "ok");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_terminal() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/missing",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::NOT_FOUND, "nope")
                }
            }),
        );
        let base = serve(router).await;

        let err = client(&base, 5).get("missing").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/down",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }),
        );
        let base = serve(router).await;

        let err = client(&base, 3).get("/down").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_server_errors_terminal_when_disabled() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/rpc",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":{"code":-8}}"#)
                }
            }),
        );
        let base = serve(router).await;

        let err = client(&base, 5)
            .without_server_error_retry()
            .post_body("/rpc", "text/plain", b"{}".to_vec())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_post_json() {
        let router = Router::new().route(
            "/echo",
            post(|Json(body): Json<serde_json::Value>| async move { Json(body) }),
        );
        let base = serve(router).await;

        let body = client(&base, 1)
            .post_json("/echo", &serde_json::json!({"a": 1}))
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{addr}"), 2).get("/").await.unwrap_err();
        assert!(matches!(err, HttpError::Transport { .. }));
    }
}
