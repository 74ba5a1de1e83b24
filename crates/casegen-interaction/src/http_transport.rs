//! HttpStreamTransport - streaming requests over HTTP.
//!
//! Posts generation and conversation requests to the service and exposes the
//! response body as raw fragments for the frame decoder.

use async_trait::async_trait;
use casegen_core::config::ClientConfig;
use casegen_core::error::{CasegenError, Result};
use casegen_core::generation::{FragmentStream, OutboundRequest, StreamTransport};
use futures::StreamExt;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use std::time::Duration;

/// Transport implementation that talks to the generation service over HTTP.
#[derive(Clone)]
pub struct HttpStreamTransport {
    client: Client,
    base_url: String,
    session_cookie: Option<String>,
}

impl HttpStreamTransport {
    /// Creates a transport from the client configuration.
    ///
    /// Connect and request timeouts are applied to every request; a timeout
    /// while streaming surfaces as a transport failure of the stream.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| CasegenError::config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session_cookie: config.session_cookie.clone(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }
}

#[async_trait]
impl StreamTransport for HttpStreamTransport {
    async fn open(&self, request: &OutboundRequest) -> Result<FragmentStream> {
        let url = self.url(request.endpoint());
        let body = request.to_json()?;

        let mut builder = self
            .client
            .post(&url)
            .header(header::ACCEPT, "text/event-stream")
            .json(&body);
        if let Some(cookie) = &self.session_cookie {
            builder = builder.header(header::COOKIE, cookie);
        }

        tracing::debug!("[HttpStreamTransport] POST {}", url);
        let response = builder.send().await.map_err(map_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(map_http_error(status, body_text));
        }

        let stream = response
            .bytes_stream()
            .map(|item| item.map(|bytes| bytes.to_vec()).map_err(map_request_error));
        Ok(stream.boxed())
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Maps a failed request (connect, timeout, body read) to a transport error.
pub(crate) fn map_request_error(err: reqwest::Error) -> CasegenError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "failed"
    };
    CasegenError::transport(format!("request {kind}: {err}"))
}

/// Maps a non-success status.
///
/// The service answers rejected requests with `{"error": "..."}`; that
/// message is the producer's verdict and is passed through. Anything else is
/// a transport failure.
pub(crate) fn map_http_error(status: StatusCode, body: String) -> CasegenError {
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(wrapper) if status.is_client_error() => CasegenError::producer(wrapper.error),
        Ok(wrapper) => CasegenError::transport(format!("{}: {}", status, wrapper.error)),
        Err(_) => CasegenError::transport(format!("{}: {}", status, body)),
    }
}
