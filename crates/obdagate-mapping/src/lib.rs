//! OBDA mapping documents
//!
//! This crate defines the mapping document model used by obdagate and provides
//! a parser + renderer for the Ontop-style `.obda` surface syntax:
//!
//! ```text
//! [PrefixDeclaration]
//! :       http://example.org/onto#
//!
//! [MappingDeclaration] @collection [[
//! mappingId   patient-age
//! target      :patient/{id} :age {age} .
//! source      SELECT id, age FROM "patients" WHERE alive = 1
//! ]]
//! ```
//!
//! The same parser reads both the operator-authored *template* document and the
//! *instantiated* document emitted by the rewrite engine.

pub mod document;
pub mod placeholders;
pub mod render;
pub mod sql_lexer;

pub use document::{
    parse_mapping_document, BlockParseFailure, MappingBlock, MappingDocument, MappingParseError,
    MAPPING_SECTION_MARKER,
};
pub use placeholders::{filter_placeholders, source_table, target_placeholders};
pub use render::{render_mapping_document, RenderedBlock};
