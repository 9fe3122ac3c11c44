//! Downstream SPARQL endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("downstream timed out after {0:?}")]
    Timeout(Duration),
    #[error("downstream unreachable: {0}")]
    Transport(String),
    #[error("downstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("downstream returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// A successful downstream response, kept byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointResponse {
    pub content_type: Option<String>,
    pub body: String,
}

#[async_trait]
pub trait QueryEndpoint: Send + Sync {
    /// Run `query` and return the raw response body.
    async fn execute(&self, query: &str) -> Result<EndpointResponse, EndpointError>;
}

/// SPARQL 1.1 protocol client: form-encoded POST with `query=...`.
pub struct HttpSparqlEndpoint {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpSparqlEndpoint {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, EndpointError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EndpointError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl QueryEndpoint for HttpSparqlEndpoint {
    async fn execute(&self, query: &str) -> Result<EndpointResponse, EndpointError> {
        let map_send = |e: reqwest::Error| {
            if e.is_timeout() {
                EndpointError::Timeout(self.timeout)
            } else {
                EndpointError::Transport(e.to_string())
            }
        };

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::ACCEPT, SPARQL_RESULTS_JSON)
            .form(&[("query", query)])
            .send()
            .await
            .map_err(map_send)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(map_send)?;

        if !status.is_success() {
            return Err(EndpointError::Status {
                status: status.as_u16(),
                body,
            });
        }
        // Relayed verbatim, but it has to be JSON.
        serde_json::from_str::<serde_json::Value>(&body)
            .map_err(|e| EndpointError::InvalidResponse(e.to_string()))?;

        tracing::debug!(url = %self.url, bytes = body.len(), "downstream answered");
        Ok(EndpointResponse { content_type, body })
    }
}

/// `application/sparql-results+json` body.
#[derive(Debug, Clone, Deserialize)]
pub struct SparqlResults {
    pub head: SparqlHead,
    #[serde(default)]
    pub results: Option<SparqlBindings>,
    #[serde(default)]
    pub boolean: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SparqlHead {
    #[serde(default)]
    pub vars: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SparqlBindings {
    #[serde(default)]
    pub bindings: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl SparqlResults {
    pub fn parse(body: &str) -> Result<Self, EndpointError> {
        serde_json::from_str(body).map_err(|e| EndpointError::InvalidResponse(e.to_string()))
    }

    /// One row per binding, one cell per head variable; unbound cells are empty.
    pub fn rows(&self) -> Vec<Vec<String>> {
        let Some(results) = &self.results else {
            return vec![];
        };
        results
            .bindings
            .iter()
            .map(|binding| {
                self.head
                    .vars
                    .iter()
                    .map(|var| {
                        binding
                            .get(var)
                            .and_then(|cell| cell.get("value"))
                            .and_then(|v| v.as_str())
                            .unwrap_or("")
                            .to_string()
                    })
                    .collect()
            })
            .collect()
    }
}
