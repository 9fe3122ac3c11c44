//! Column -> ontology property edges of a mapping, for display.

use serde::{Deserialize, Serialize};

use obdagate_catalog::SchemaSnapshot;
use obdagate_mapping::MappingBlock;

use crate::rewrite::Selection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEdge {
    pub block_id: String,
    pub placeholder: String,
    /// Chosen table, else the template's default table.
    pub table: Option<String>,
    /// Bound column, else the placeholder name.
    pub column: String,
    pub property: String,
    pub bound: bool,
}

pub fn mapping_edges(
    blocks: &[MappingBlock],
    selection: &Selection,
    schema: &SchemaSnapshot,
) -> Vec<MappingEdge> {
    let mut edges = Vec::new();
    for block in blocks {
        let choice = selection.get(&block.id);
        let table = choice
            .and_then(|c| c.table.clone())
            .or_else(|| block.default_table.clone());
        let columns = table.as_deref().and_then(|t| schema.columns(t));

        for (idx, placeholder) in block.placeholders.iter().enumerate() {
            let bound_column = choice
                .and_then(|c| c.connections.get(idx))
                .and_then(|col| columns.and_then(|cols| cols.get(col)));
            edges.push(MappingEdge {
                block_id: block.id.clone(),
                placeholder: placeholder.clone(),
                table: table.clone(),
                column: bound_column.unwrap_or(placeholder).clone(),
                property: property_for(&block.target, placeholder)
                    .unwrap_or(placeholder.as_str())
                    .to_string(),
                bound: bound_column.is_some(),
            });
        }
    }
    edges
}

/// The `prefix:local` term written right before `{placeholder}` in a target.
///
/// `:p/{id}` has none (the placeholder is part of an IRI template); in
/// `:p/{id} bto:age {age}^^xsd:integer` the property of `age` is `bto:age`.
pub fn property_for<'a>(target: &'a str, placeholder: &str) -> Option<&'a str> {
    let needle = format!("{{{placeholder}}}");
    target.match_indices(&needle).find_map(|(at, _)| {
        let before = &target[..at];
        if !before.ends_with(char::is_whitespace) {
            return None;
        }
        let term = before.split_whitespace().next_back()?;
        (term.contains(':') && !term.starts_with('<') && !term.ends_with(';')).then_some(term)
    })
}

fn slug(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Mermaid `graph LR` with one edge per mapping edge.
pub fn to_mermaid(edges: &[MappingEdge]) -> String {
    let mut out = String::from("graph LR\n");
    for e in edges {
        let column_label = match &e.table {
            Some(t) => format!("{t}.{}", e.column),
            None => e.column.clone(),
        };
        let arrow = if e.bound { "-->" } else { "-.->" };
        out.push_str(&format!(
            "  c_{}[\"{}\"] {arrow} p_{}[\"{}\"]\n",
            slug(&column_label),
            column_label.replace('"', "#quot;"),
            slug(&e.property),
            e.property.replace('"', "#quot;"),
        ));
    }
    out
}
