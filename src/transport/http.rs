//! HTTP executor for a node's command API
//!
//! Commands are `POST {api}/api/v1/{path}?arg=..&arg=..&opt=..`, the layout
//! the node's API server expects. Arguments are percent-encoded byte strings.

use super::{Request, RequestExecutor, TransportError, TransportResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::{form_urlencoded, Url};

/// API version prefix of the node's command endpoints
pub const API_PREFIX: &str = "api/v1/";

/// Error body returned by the node
#[derive(Debug, Deserialize)]
struct RemoteError {
    #[serde(rename = "Message")]
    message: String,
}

/// Executor backed by `reqwest`
#[derive(Clone, Debug)]
pub struct HttpExecutor {
    client: Client,
    base: Url,
    timeout: Duration,
}

impl HttpExecutor {
    /// Connect to the API at `api_url` (e.g. `http://127.0.0.1:5001`)
    pub fn new(api_url: &str, timeout: Duration) -> TransportResult<Self> {
        let mut api_url = api_url.trim().to_string();
        if !api_url.ends_with('/') {
            api_url.push('/');
        }
        let base = Url::parse(&api_url)
            .map_err(|e| TransportError::ConnectionFailed(format!("invalid API url: {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        Ok(HttpExecutor {
            client,
            base,
            timeout,
        })
    }

    /// Full URL of a request, arguments included
    pub fn endpoint(&self, request: &Request) -> TransportResult<Url> {
        let mut url = self
            .base
            .join(&format!("{API_PREFIX}{}", request.path()))
            .map_err(|e| TransportError::InvalidData(e.to_string()))?;

        let mut query = String::new();
        for arg in request.args() {
            push_pair(&mut query, b"arg", arg);
        }
        for (name, value) in request.options() {
            push_pair(&mut query, name.as_bytes(), value.as_bytes());
        }
        push_pair(&mut query, b"encoding", b"json");
        push_pair(&mut query, b"stream-channels", b"true");
        url.set_query(Some(&query));

        Ok(url)
    }
}

fn push_pair(query: &mut String, name: &[u8], value: &[u8]) {
    if !query.is_empty() {
        query.push('&');
    }
    query.extend(form_urlencoded::byte_serialize(name));
    query.push('=');
    query.extend(form_urlencoded::byte_serialize(value));
}

fn remote_message(body: &[u8]) -> String {
    serde_json::from_slice::<RemoteError>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string())
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(&self, request: &Request) -> TransportResult<Vec<u8>> {
        let url = self.endpoint(request)?;
        debug!(path = request.path(), args = request.args().len(), "calling node API");

        let response = self.client.post(url).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(TransportError::Remote {
                status: status.as_u16(),
                message: remote_message(&body),
            });
        }
        Ok(body.to_vec())
    }
}
