//! The authorization gate.
//!
//! Per request:
//!
//! ```text
//! RECEIVED ─► HASHED ─┬─► UNKNOWN_TEMPLATE ──► empty result
//!                     ├─► TEMPLATE_MISMATCH ─► client error
//!                     ├─► LEVEL_DENIED ──────► empty result
//!                     └─► ADMITTED ──────────► forwarded, response relayed
//! ```
//!
//! Callers cannot tell an unknown template from a denied one; the audit log
//! (target `obdagate::audit`) can.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::allow_list::{AllowList, AllowListError};
use crate::config::GateConfig;
use crate::endpoint::{EndpointError, HttpSparqlEndpoint, QueryEndpoint};
use crate::level::{AccessLevel, LevelPolicy, LevelStore};
use crate::template::{digest_prefix, same_template, template_digest};

pub const AUDIT_TARGET: &str = "obdagate::audit";

/// Body returned for unknown templates and denied requests.
pub const EMPTY_RESULTS: &str = r#"{"results":[]}"#;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateRequest {
    /// The approved template the query was filled from.
    pub template: String,
    /// The filled query to run.
    pub query: String,
    pub identity: Option<String>,
}

impl GateRequest {
    pub fn new(template: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            query: query.into(),
            identity: None,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    UnknownTemplate,
    LevelDenied,
    Admitted,
}

/// A successful (HTTP 200) gate response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResponse {
    pub decision: Decision,
    pub digest: String,
    pub required: Option<AccessLevel>,
    pub granted: Option<AccessLevel>,
    pub content_type: String,
    pub body: String,
}

impl GateResponse {
    fn empty(decision: Decision, digest: String) -> Self {
        Self {
            decision,
            digest,
            required: None,
            granted: None,
            content_type: "application/json".to_string(),
            body: EMPTY_RESULTS.to_string(),
        }
    }

    pub fn status_code(&self) -> u16 {
        200
    }
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("must supply both template and query (missing {0})")]
    MissingInput(&'static str),
    #[error("template mismatch")]
    TemplateMismatch { digest: String },
    #[error(transparent)]
    AllowList(#[from] AllowListError),
    #[error(transparent)]
    Gateway(#[from] EndpointError),
}

impl GateError {
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::MissingInput(_) | GateError::TemplateMismatch { .. } => 400,
            GateError::AllowList(_) => 500,
            GateError::Gateway(EndpointError::Timeout(_)) => 504,
            GateError::Gateway(_) => 502,
        }
    }

    /// JSON error body, `{"error": "..."}`.
    pub fn body(&self) -> String {
        serde_json::json!({ "error": self.to_string() }).to_string()
    }
}

pub struct Gate {
    allow_list: Arc<AllowList>,
    levels: Arc<LevelStore>,
    policy: LevelPolicy,
    endpoint: Arc<dyn QueryEndpoint>,
}

impl Gate {
    pub fn new(
        allow_list: Arc<AllowList>,
        levels: Arc<LevelStore>,
        policy: LevelPolicy,
        endpoint: Arc<dyn QueryEndpoint>,
    ) -> Self {
        Self {
            allow_list,
            levels,
            policy,
            endpoint,
        }
    }

    /// Load the allow-list and build the HTTP endpoint client from `config`.
    pub fn from_config(config: &GateConfig) -> Result<Self, GateError> {
        let allow_list = AllowList::load(&config.allowlist_path)?;
        tracing::info!(
            entries = allow_list.len(),
            endpoint = %config.endpoint,
            policy = ?config.level_policy,
            "gate ready"
        );
        let endpoint = HttpSparqlEndpoint::new(config.endpoint.clone(), config.timeout())?;
        Ok(Self::new(
            Arc::new(allow_list),
            Arc::new(LevelStore::new(config.levels_path.clone())),
            config.level_policy,
            Arc::new(endpoint),
        ))
    }

    pub fn policy(&self) -> LevelPolicy {
        self.policy
    }

    /// The level `identity` holds right now. One read of the level store; an
    /// unreadable store grants `L0`.
    fn granted_level(&self, identity: Option<&str>) -> AccessLevel {
        match self.levels.load() {
            Ok(state) => state.granted(self.policy, identity),
            Err(err) => {
                tracing::warn!(error = %err, "level store unreadable; granting L0");
                AccessLevel::L0
            }
        }
    }

    pub async fn handle(&self, request: &GateRequest) -> Result<GateResponse, GateError> {
        let template = request.template.trim();
        let query = request.query.trim();
        if template.is_empty() {
            return Err(GateError::MissingInput("template"));
        }
        if query.is_empty() {
            return Err(GateError::MissingInput("query"));
        }
        let identity = request.identity.as_deref();

        let digest = template_digest(template);
        let Some(entry) = self.allow_list.get(&digest) else {
            tracing::info!(
                target: AUDIT_TARGET,
                digest = digest_prefix(&digest),
                identity = ?identity,
                decision = "unknown_template",
                "query rejected"
            );
            return Ok(GateResponse::empty(Decision::UnknownTemplate, digest));
        };

        if !same_template(template, &entry.template) {
            tracing::info!(
                target: AUDIT_TARGET,
                digest = digest_prefix(&digest),
                identity = ?identity,
                decision = "template_mismatch",
                "query rejected"
            );
            return Err(GateError::TemplateMismatch { digest });
        }

        let granted = self.granted_level(identity);
        if entry.level > granted {
            tracing::info!(
                target: AUDIT_TARGET,
                digest = digest_prefix(&digest),
                identity = ?identity,
                required = %entry.level,
                granted = %granted,
                decision = "level_denied",
                "query rejected"
            );
            let mut response = GateResponse::empty(Decision::LevelDenied, digest);
            response.required = Some(entry.level);
            response.granted = Some(granted);
            return Ok(response);
        }

        tracing::info!(
            target: AUDIT_TARGET,
            digest = digest_prefix(&digest),
            identity = ?identity,
            required = %entry.level,
            granted = %granted,
            decision = "admitted",
            "query forwarded"
        );
        let downstream = self.endpoint.execute(query).await.map_err(|err| {
            tracing::warn!(digest = digest_prefix(&digest), error = %err, "downstream failed");
            GateError::Gateway(err)
        })?;

        Ok(GateResponse {
            decision: Decision::Admitted,
            digest,
            required: Some(entry.level),
            granted: Some(granted),
            content_type: downstream
                .content_type
                .unwrap_or_else(|| crate::endpoint::SPARQL_RESULTS_JSON.to_string()),
            body: downstream.body,
        })
    }
}
