//! Rewrite / instantiation.
//!
//! Turns the template blocks plus an operator's selection (table and
//! placeholder->column connections per block) into the instantiated document
//! text. Validation happens up front: any bad selection entry fails the whole
//! rewrite, so nothing partial is ever produced.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use obdagate_catalog::SchemaSnapshot;
use obdagate_mapping::sql_lexer::{
    is_ident_continue, is_ident_start, placeholder_at, placeholder_text,
};
use obdagate_mapping::{render_mapping_document, MappingBlock, RenderedBlock};

use crate::connections::ConnectionsMap;
use crate::error::RewriteError;

/// What the operator chose for one block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSelection {
    /// `None` leaves the block unconfigured; it is omitted from the output.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub connections: ConnectionsMap,
}

/// Per-block selections keyed by mapping id.
pub type Selection = BTreeMap<String, BlockSelection>;

pub fn instantiate(
    header: &str,
    blocks: &[MappingBlock],
    selection: &Selection,
    schema: &SchemaSnapshot,
) -> Result<String, RewriteError> {
    if let Some(unknown) = selection
        .keys()
        .find(|id| !blocks.iter().any(|b| &b.id == *id))
    {
        return Err(RewriteError::UnknownBlock(unknown.clone()));
    }

    let mut rendered = Vec::with_capacity(blocks.len());
    for block in blocks {
        let Some(choice) = selection.get(&block.id) else {
            tracing::debug!(block = %block.id, "no selection; block omitted");
            continue;
        };
        let Some(table) = choice.table.as_deref() else {
            tracing::debug!(block = %block.id, "no table chosen; block omitted");
            continue;
        };
        rendered.push(instantiate_block(block, table, &choice.connections, schema)?);
    }

    tracing::info!(
        blocks = rendered.len(),
        omitted = blocks.len() - rendered.len(),
        "mapping document instantiated"
    );
    Ok(render_mapping_document(header, &rendered))
}

fn instantiate_block(
    block: &MappingBlock,
    table: &str,
    connections: &ConnectionsMap,
    schema: &SchemaSnapshot,
) -> Result<RenderedBlock, RewriteError> {
    let columns = schema
        .columns(table)
        .ok_or_else(|| RewriteError::UnknownTable {
            block: block.id.clone(),
            table: table.to_string(),
        })?;

    let mut bindings: HashMap<&str, &str> = HashMap::new();
    for (p, c) in connections.iter() {
        let placeholder = block.placeholders.get(p).ok_or_else(|| {
            RewriteError::PlaceholderOutOfRange {
                block: block.id.clone(),
                index: p,
                len: block.placeholders.len(),
            }
        })?;
        let column = columns.get(c).ok_or_else(|| RewriteError::ColumnOutOfRange {
            block: block.id.clone(),
            table: table.to_string(),
            index: c,
            len: columns.len(),
        })?;
        bindings.insert(placeholder.as_str(), column.as_str());
    }

    let unbound: Vec<&str> = block
        .placeholders
        .iter()
        .map(String::as_str)
        .filter(|p| !bindings.contains_key(p))
        .collect();
    if !unbound.is_empty() {
        tracing::warn!(block = %block.id, ?unbound, "placeholders left unbound");
    }

    Ok(RenderedBlock {
        id: block.id.clone(),
        target: substitute_target(&block.target, &bindings),
        source: substitute_source(&block.source, table, &bindings),
    })
}

/// Replace `{placeholder}` with `{column}` (`{"column name"}` when the column
/// is not a plain identifier). One pass, so replacements are never
/// substituted again.
pub fn substitute_target(target: &str, bindings: &HashMap<&str, &str>) -> String {
    let mut out = String::with_capacity(target.len());
    let mut rest = target;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let at = &rest[open..];
        let bound = placeholder_at(at)
            .and_then(|(name, after)| bindings.get(name).map(|column| (*column, after)));
        match bound {
            Some((column, after)) => {
                out.push_str(&placeholder_text(column));
                rest = after;
            }
            None => {
                out.push('{');
                rest = &at[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_delimiter(c: Option<char>) -> bool {
    match c {
        None => true,
        Some(c) => c == ',' || c == '(' || c == ')' || c.is_whitespace(),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column reference as it must appear in SQL.
pub fn sql_column(name: &str) -> String {
    let mut chars = name.chars();
    let plain = chars.next().is_some_and(is_ident_start) && chars.all(is_ident_continue);
    if plain {
        name.to_string()
    } else {
        quote_ident(name)
    }
}

/// Rewrite a source fragment in one pass:
/// - the first `FROM "<table>"` gets `table`;
/// - each maximal identifier run equal to a bound placeholder, with a comma,
///   whitespace, parenthesis or the fragment boundary on at least one side,
///   becomes the column name.
///
/// String literals and quoted identifiers are copied untouched.
pub fn substitute_source(source: &str, table: &str, bindings: &HashMap<&str, &str>) -> String {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut out = String::with_capacity(source.len() + table.len());
    let mut last_word: Option<&str> = None;
    let mut table_done = false;
    let mut i = 0;

    while i < chars.len() {
        let (start, c) = chars[i];
        let prev = i.checked_sub(1).map(|j| chars[j].1);

        if c == '\'' || c == '"' {
            let mut j = i + 1;
            while j < chars.len() {
                if chars[j].1 == c {
                    // Doubled quote is an escaped quote.
                    if chars.get(j + 1).map(|x| x.1) == Some(c) {
                        j += 2;
                        continue;
                    }
                    break;
                }
                j += 1;
            }
            let end = chars.get(j + 1).map(|x| x.0).unwrap_or(source.len());
            let from_clause = c == '"'
                && !table_done
                && last_word.is_some_and(|w| w.eq_ignore_ascii_case("FROM"));
            if from_clause {
                out.push_str(&quote_ident(table));
                table_done = true;
            } else {
                out.push_str(&source[start..end]);
            }
            last_word = None;
            i = j + 1;
            continue;
        }

        if is_ident_start(c) && !prev.is_some_and(is_ident_continue) {
            let mut j = i + 1;
            while j < chars.len() && is_ident_continue(chars[j].1) {
                j += 1;
            }
            let end = chars.get(j).map(|x| x.0).unwrap_or(source.len());
            let word = &source[start..end];
            let next = chars.get(j).map(|x| x.1);
            match bindings.get(word) {
                Some(column) if is_delimiter(prev) || is_delimiter(next) => {
                    out.push_str(&sql_column(column));
                }
                _ => out.push_str(word),
            }
            last_word = Some(word);
            i = j;
            continue;
        }

        if !c.is_whitespace() {
            last_word = None;
        }
        out.push(c);
        i += 1;
    }
    out
}
