//! obdagate mapping engine
//!
//! ```text
//!  template doc ──parse──► blocks ─┐
//!                                  ├─► reconcile ──► Reconciliation ──► (operator edits)
//!  stored doc ──parse──► prior ────┘                                          │
//!                                                                             ▼
//!  SchemaCatalog ──snapshot──► SchemaSnapshot ─────────────────────► instantiate ──► MappingStore
//! ```
//!
//! - `matching`: ranked name matching (exact, case-insensitive, normalized)
//! - `reconcile`: prior document -> per-block `ConnectionsMap`
//! - `rewrite`: selection -> instantiated document text
//! - `session`: the above wired to a catalog and a store
//! - `graph`: column -> property edges for display

pub mod connections;
pub mod error;
pub mod graph;
pub mod matching;
pub mod reconcile;
pub mod rewrite;
pub mod session;

pub use connections::ConnectionsMap;
pub use error::{ReconcileError, RewriteError};
pub use graph::{mapping_edges, to_mermaid, MappingEdge};
pub use matching::{normalize_name, resolve_column, resolve_table, MatchTier};
pub use reconcile::{
    build_association, project_association, reconcile, Association, BlockReconciliation,
    ColumnMatch, PriorState, Reconciliation,
};
pub use rewrite::{instantiate, BlockSelection, Selection};
pub use session::MappingSession;
