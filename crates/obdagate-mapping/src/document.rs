//! Mapping document parser.
//!
//! A mapping document is an opaque header (prefix declarations etc.) followed by
//! the `[MappingDeclaration]` section, whose `@collection [[ ... ]]` region
//! holds the mapping blocks:
//!
//! ```text
//! mappingId   <id>
//! target      <triple template, may continue on following lines>
//! source      <SQL, continues to the end of the block>
//! ```
//!
//! Notes:
//! - Document-level problems (missing section marker, unopened or unclosed
//!   collection) fail the whole parse.
//! - Block-level problems are recorded in `MappingDocument::failures` and the
//!   remaining blocks still parse. Callers decide whether a partial document is
//!   acceptable.

use std::collections::BTreeSet;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1},
    character::complete::{multispace0, space0, space1},
    combinator::{eof, rest},
    sequence::{preceded, terminated, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::placeholders::{block_placeholders, source_table};

pub const MAPPING_SECTION_MARKER: &str = "[MappingDeclaration]";
pub const COLLECTION_OPEN: &str = "@collection";
pub const COLLECTION_CLOSE: &str = "]]";

const KW_MAPPING_ID: &str = "mappingId";
const KW_TARGET: &str = "target";
const KW_SOURCE: &str = "source";

// ============================================================================
// Model
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappingBlock {
    pub id: String,
    pub target: String,
    pub source: String,
    /// Table named by the source's `FROM "<table>"` clause.
    pub default_table: Option<String>,
    /// Target-derived names first, then filter-only names. Never duplicated.
    pub placeholders: Vec<String>,
    /// Number of leading `placeholders` that come from the target.
    pub target_arity: usize,
    /// 1-based line of the `mappingId` keyword.
    pub line: usize,
}

impl MappingBlock {
    pub fn new(id: &str, target: &str, source: &str) -> Self {
        let (placeholders, target_arity) = block_placeholders(target, source);
        Self {
            id: id.to_string(),
            target: target.to_string(),
            source: source.to_string(),
            default_table: source_table(source),
            placeholders,
            target_arity,
            line: 0,
        }
    }

    pub fn target_placeholders(&self) -> &[String] {
        &self.placeholders[..self.target_arity]
    }

    pub fn placeholder_index(&self, name: &str) -> Option<usize> {
        self.placeholders.iter().position(|p| p == name)
    }
}

/// A block that could not be parsed. Kept so callers can report it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockParseFailure {
    pub line: usize,
    pub mapping_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappingDocument {
    pub header: String,
    pub blocks: Vec<MappingBlock>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<BlockParseFailure>,
}

impl MappingDocument {
    pub fn block(&self, id: &str) -> Option<&MappingBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether block `id` appeared in the document but failed to parse.
    pub fn failed(&self, id: &str) -> bool {
        self.failures
            .iter()
            .any(|f| f.mapping_id.as_deref() == Some(id))
    }
}

// ============================================================================
// Parser
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingParseError {
    #[error("missing `[MappingDeclaration]` section")]
    MissingSection,
    #[error("line {line}: expected `@collection [[` after `[MappingDeclaration]`")]
    MissingCollection { line: usize },
    #[error("unclosed `@collection [[` (no closing `]]`)")]
    UnclosedCollection,
}

pub fn parse_mapping_document(text: &str) -> Result<MappingDocument, MappingParseError> {
    let (header, section) = text
        .split_once(MAPPING_SECTION_MARKER)
        .ok_or(MappingParseError::MissingSection)?;
    let marker_line = header.matches('\n').count() + 1;

    let region_start = collection_open(section)
        .map(|(remaining, _)| section.len() - remaining.len())
        .map_err(|_| MappingParseError::MissingCollection { line: marker_line })?;
    let region_len = section[region_start..]
        .rfind(COLLECTION_CLOSE)
        .ok_or(MappingParseError::UnclosedCollection)?;
    let region = &section[region_start..region_start + region_len];

    // Line of the first region line: the marker line plus any newlines consumed
    // between the marker and the region.
    let first_line = marker_line + section[..region_start].matches('\n').count();

    let mut document = MappingDocument {
        header: header.to_string(),
        blocks: vec![],
        failures: vec![],
    };
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for raw in split_blocks(region, first_line) {
        match parse_block(&raw) {
            Ok(block) => {
                if !seen.insert(block.id.clone()) {
                    document.failures.push(BlockParseFailure {
                        line: raw.line,
                        mapping_id: Some(block.id),
                        message: "duplicate mapping id".to_string(),
                    });
                    continue;
                }
                document.blocks.push(block);
            }
            Err(message) => document.failures.push(BlockParseFailure {
                line: raw.line,
                mapping_id: raw_mapping_id(&raw),
                message,
            }),
        }
    }

    Ok(document)
}

/// `@collection [[`, with any whitespace around and between the two tokens.
fn collection_open(input: &str) -> IResult<&str, &str> {
    preceded(
        tuple((multispace0, tag(COLLECTION_OPEN), multispace0)),
        tag("[["),
    )(input)
}

/// Raw lines of one block, before keyword parsing.
#[derive(Debug)]
struct RawBlock<'a> {
    line: usize,
    lines: Vec<&'a str>,
}

/// Split the collection region into blocks. A block starts at every line whose
/// first word is `mappingId`; non-blank text before the first such line is
/// kept as its own (failing) block.
fn split_blocks(region: &str, first_line: usize) -> Vec<RawBlock<'_>> {
    let mut blocks: Vec<RawBlock<'_>> = Vec::new();
    for (offset, line) in region.lines().enumerate() {
        let line_no = first_line + offset;
        if keyword_rest(KW_MAPPING_ID, line).is_some() {
            blocks.push(RawBlock {
                line: line_no,
                lines: vec![line],
            });
            continue;
        }
        match blocks.last_mut() {
            Some(block) => block.lines.push(line),
            None if line.trim().is_empty() => {}
            None => blocks.push(RawBlock {
                line: line_no,
                lines: vec![line],
            }),
        }
    }
    blocks
}

/// Text after `keyword` when `line` starts with it (leading blanks allowed).
fn keyword_rest<'a>(keyword: &'static str, line: &'a str) -> Option<&'a str> {
    fn parser<'a>(keyword: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
        preceded(tuple((space0, tag(keyword), alt((space1, eof)))), rest)
    }
    parser(keyword)(line).ok().map(|(_, value)| value.trim())
}

fn mapping_id(input: &str) -> IResult<&str, &str> {
    terminated(take_till1(char::is_whitespace), space0)(input)
}

fn raw_mapping_id(raw: &RawBlock<'_>) -> Option<String> {
    let first = raw.lines.first()?;
    let rest = keyword_rest(KW_MAPPING_ID, first)?;
    mapping_id(rest).ok().map(|(_, id)| id.to_string())
}

fn parse_block(raw: &RawBlock<'_>) -> Result<MappingBlock, String> {
    let Some(id_rest) = raw.lines.first().and_then(|l| keyword_rest(KW_MAPPING_ID, l)) else {
        return Err(format!("block must begin with `{KW_MAPPING_ID}`"));
    };
    let id = mapping_id(id_rest)
        .map(|(_, id)| id.to_string())
        .map_err(|_| "mapping id missing".to_string())?;

    let body = &raw.lines[1..];
    let target_at = body
        .iter()
        .position(|l| keyword_rest(KW_TARGET, l).is_some())
        .ok_or_else(|| format!("missing `{KW_TARGET}` fragment"))?;
    if let Some(stray) = body[..target_at].iter().find(|l| !l.trim().is_empty()) {
        return Err(format!("unexpected line before `{KW_TARGET}`: {}", stray.trim()));
    }
    let source_at = body[target_at + 1..]
        .iter()
        .position(|l| keyword_rest(KW_SOURCE, l).is_some())
        .map(|p| p + target_at + 1)
        .ok_or_else(|| format!("missing `{KW_SOURCE}` fragment"))?;

    let target = fragment(KW_TARGET, &body[target_at..source_at]);
    if target.is_empty() {
        return Err(format!("empty `{KW_TARGET}` fragment"));
    }
    let source = fragment(KW_SOURCE, &body[source_at..]);
    if source.is_empty() {
        return Err(format!("empty `{KW_SOURCE}` fragment"));
    }

    let mut block = MappingBlock::new(&id, &target, &source);
    block.line = raw.line;
    Ok(block)
}

/// Keyword line value plus continuation lines, trimmed, blank lines dropped.
fn fragment(keyword: &'static str, lines: &[&str]) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(lines.len());
    if let Some(first) = lines.first().and_then(|l| keyword_rest(keyword, l)) {
        if !first.is_empty() {
            parts.push(first);
        }
    }
    parts.extend(
        lines
            .iter()
            .skip(1)
            .map(|l| l.trim())
            .filter(|l| !l.is_empty()),
    );
    parts.join("\n")
}
