//! Mapping document renderer.
//!
//! Emits the fixed layout consumed by the downstream engine: the header, the
//! section marker opening the collection, one three-line block per mapping
//! followed by a blank separator, and the closing `]]`.

use crate::document::{MappingBlock, MAPPING_SECTION_MARKER};

/// One block as it will be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBlock {
    pub id: String,
    pub target: String,
    pub source: String,
}

impl From<&MappingBlock> for RenderedBlock {
    fn from(block: &MappingBlock) -> Self {
        Self {
            id: block.id.clone(),
            target: block.target.clone(),
            source: block.source.clone(),
        }
    }
}

pub fn render_mapping_document(header: &str, blocks: &[RenderedBlock]) -> String {
    let mut out: Vec<String> = Vec::with_capacity(blocks.len() * 4 + 3);
    let header = header.trim();
    if !header.is_empty() {
        out.push(header.to_string());
        out.push(String::new());
    }
    out.push(format!("{MAPPING_SECTION_MARKER} @collection [["));
    for block in blocks {
        out.push(format!("mappingId\t{}", block.id));
        out.push(format!("target\t\t{}", block.target));
        out.push(format!("source\t\t{}", block.source));
        out.push(String::new());
    }
    out.push("]]".to_string());

    let mut text = out.join("\n");
    text.push('\n');
    text
}
