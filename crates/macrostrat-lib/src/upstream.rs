//! HTTP access to the Macrostrat API and tile server.
//!
//! The translator talks to the network only through the [`Upstream`] trait so
//! tests can substitute a recording fake. [`HttpUpstream`] is the production
//! implementation on top of `reqwest`.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::config::GatewayConfig;
use crate::error::{Error, Result, UpstreamError};

/// Network seam used by the translator and shaper.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Issue a GET and parse the body as JSON.
    async fn get_json(&self, url: &Url) -> std::result::Result<Value, UpstreamError>;

    /// Issue a GET and return the raw body bytes.
    async fn get_bytes(&self, url: &Url) -> std::result::Result<Vec<u8>, UpstreamError>;
}

/// `reqwest`-backed upstream client.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
}

impl HttpUpstream {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn send(&self, url: &Url, accept: &str) -> std::result::Result<Response, UpstreamError> {
        debug!(url = %url, "upstream GET");
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::http(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status"),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn get_json(&self, url: &Url) -> std::result::Result<Value, UpstreamError> {
        let response = self.send(url, "application/json").await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| UpstreamError::transport(format!("invalid JSON body: {e}")))
    }

    async fn get_bytes(&self, url: &Url) -> std::result::Result<Vec<u8>, UpstreamError> {
        let response = self.send(url, "*/*").await?;
        let body = response.bytes().await.map_err(transport_error)?;
        Ok(body.to_vec())
    }
}

fn transport_error(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::transport("request timed out")
    } else {
        UpstreamError::transport(err.to_string())
    }
}

/// The Macrostrat response wrapper `{success: {v, license, data, refs?}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamEnvelope {
    pub success: EnvelopeBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeBody {
    #[serde(default)]
    pub v: Option<Value>,
    #[serde(default)]
    pub license: Option<String>,
    pub data: Vec<Value>,
    #[serde(default)]
    pub refs: Option<Map<String, Value>>,
}

impl UpstreamEnvelope {
    /// Interpret a parsed body as an envelope.
    ///
    /// Macrostrat reports request problems as `{"error": {"message": ...}}`
    /// with a 200 status; that message is carried into the error text.
    pub fn from_body(body: Value) -> std::result::Result<Self, UpstreamError> {
        let upstream_message = body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map(str::to_string);

        serde_json::from_value(body).map_err(|e| match upstream_message {
            Some(message) => {
                UpstreamError::http(200, format!("upstream reported an error: {message}"))
            }
            None => UpstreamError::http(200, format!("malformed response envelope: {e}")),
        })
    }
}
