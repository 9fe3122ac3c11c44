//! obdagate query authorization gate
//!
//! Queries reach the downstream SPARQL engine only through a pre-approved
//! template. A request carries the template and the query filled from it:
//!
//! 1. the template's SHA-512 digest is looked up in the `AllowList`;
//! 2. the submitted template must match the stored one up to whitespace;
//! 3. the caller's `AccessLevel` (from the `LevelStore`, per `LevelPolicy`)
//!    must reach the entry's required level;
//! 4. the filled query is forwarded through a `QueryEndpoint` and the answer
//!    relayed unchanged.
//!
//! Unknown templates and insufficient levels both answer with an empty result.

pub mod allow_list;
pub mod config;
pub mod endpoint;
pub mod gate;
pub mod level;
pub mod template;

pub use allow_list::{AllowList, AllowListError, AllowedQueryEntry};
pub use config::{ConfigError, GateConfig};
pub use endpoint::{
    EndpointError, EndpointResponse, HttpSparqlEndpoint, QueryEndpoint, SparqlResults,
};
pub use gate::{Decision, Gate, GateError, GateRequest, GateResponse, AUDIT_TARGET, EMPTY_RESULTS};
pub use level::{AccessLevel, LevelPolicy, LevelState, LevelStore, LevelStoreError};
pub use template::{normalize_ws, same_template, template_digest};
