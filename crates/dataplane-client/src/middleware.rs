//! C9 — HTTP middleware: a logging round-tripper over [`reqwest::Client`].
//!
//! Buffers the response body only long enough to log it, so 2xx responses
//! carry no added logging overhead beyond the buffering every call site
//! needs anyway to parse a body.

use reqwest::{Method, RequestBuilder};

use crate::error::Error;

/// Thin wrapper owning a [`reqwest::Client`] plus the endpoint's base URL
/// and basic-auth credentials. Every binding shares one of these; the base
/// URL is identical across all six bindings since they address the same
/// physical server.
#[derive(Clone)]
pub struct LoggingClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

/// Status code, headers, and fully-buffered body of a response. Every call
/// site in this client (transactions, config ops, storage) needs the body
/// regardless of status, so [`LoggingClient::send`] always returns this
/// rather than a raw [`reqwest::Response`].
pub struct ResponseParts {
    pub status: reqwest::StatusCode,
    pub headers: reqwest::header::HeaderMap,
    pub body: bytes::Bytes,
}

impl LoggingClient {
    pub fn new(base_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request against `path` (joined to the base URL) with basic
    /// auth installed, exactly as §4.2's request decorator requires.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.http.request(method, url).basic_auth(&self.username, Some(&self.password))
    }

    /// Send `request`. If a request body is present it is read into a
    /// buffer for the log record; the outgoing request is unaffected since
    /// `reqwest::Body` is consumed exactly once when the request executes.
    /// If the response status is outside 2xx, emits a single structured log
    /// record with method, URL, status, request body, and response body.
    /// Transport-level errors (no response received) propagate unchanged
    /// with no log entry.
    pub async fn send(&self, request: reqwest::Request) -> Result<ResponseParts, Error> {
        let method = request.method().clone();
        let url = request.url().clone();
        let request_body = request
            .body()
            .and_then(|b| b.as_bytes())
            .map(|b| String::from_utf8_lossy(b).into_owned());

        let response = self.http.execute(request).await.map_err(Error::from_reqwest_transport)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(Error::from_reqwest_transport)?;

        if !status.is_success() {
            tracing::warn!(
                method = %method,
                url = %url,
                status = status.as_u16(),
                request_body = request_body.as_deref().unwrap_or(""),
                response_body = %String::from_utf8_lossy(&body),
                "non-2xx response from dataplane API"
            );
        }

        Ok(ResponseParts { status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn non_2xx_returns_buffered_body_and_status() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_string();
        let handle = std::thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let response = tiny_http::Response::from_string("not found body")
                    .with_status_code(tiny_http::StatusCode(404));
                let _ = request.respond(response);
            }
        });

        let client = LoggingClient::new(format!("http://{addr}"), "user", "pass");
        let request = client
            .request(Method::GET, "/v3/services/haproxy/configuration/version")
            .build()
            .unwrap();
        let parts = client.send(request).await.unwrap();

        assert_eq!(parts.status.as_u16(), 404);
        assert_eq!(String::from_utf8_lossy(&parts.body), "not found body");
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn success_passes_through_body() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_string();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let handle = std::thread::spawn(move || {
            if let Ok(request) = server.recv() {
                calls2.fetch_add(1, Ordering::SeqCst);
                let response = tiny_http::Response::from_string("42");
                let _ = request.respond(response);
            }
        });

        let client = LoggingClient::new(format!("http://{addr}"), "user", "pass");
        let request = client
            .request(Method::GET, "/v3/services/haproxy/configuration/version")
            .build()
            .unwrap();
        let parts = client.send(request).await.unwrap();

        assert!(parts.status.is_success());
        assert_eq!(String::from_utf8_lossy(&parts.body), "42");
        handle.join().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
