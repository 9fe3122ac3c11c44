//! Reconciliation of a previously instantiated document.
//!
//! The instantiated document is the only record of what an operator chose
//! last time, and the schema may have drifted since. For each template block
//! we rebuild a placeholder-name -> column-name association from the prior
//! block, then project it onto the current schema as a positional
//! `ConnectionsMap`.
//!
//! Association rules, later rules overriding earlier ones per placeholder:
//! 1. positional fallback over target placeholders (only when the target
//!    placeholder counts agree);
//! 2. `<column> AS v` alias, else bare `v` in the prior source;
//! 3. WHERE-clause `ident =` sequences zipped positionally (only when both
//!    sequences have the same length).
//!
//! A missing or unparseable prior document is never an error: the affected
//! blocks simply come back with nothing bound.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use obdagate_catalog::SchemaSnapshot;
use obdagate_mapping::sql_lexer::{tokenize, SqlToken};
use obdagate_mapping::{parse_mapping_document, MappingBlock, MappingDocument};

use crate::connections::ConnectionsMap;
use crate::matching::{resolve_column, resolve_table, MatchTier};
use crate::rewrite::{BlockSelection, Selection};

/// Placeholder name -> column name as recovered from the prior document.
pub type Association = BTreeMap<String, String>;

/// What the prior document held for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorState {
    /// No prior document, or no block with this id in it.
    Absent,
    /// Prior document (or this block of it) failed to parse.
    Unparseable,
    Found,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMatch {
    pub placeholder: String,
    pub column: String,
    pub tier: MatchTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReconciliation {
    pub block_id: String,
    pub prior: PriorState,
    /// Table named by the prior block, as written there.
    pub prior_table: Option<String>,
    /// That table resolved against the current schema.
    pub table: Option<String>,
    pub table_tier: Option<MatchTier>,
    pub connections: ConnectionsMap,
    pub matches: Vec<ColumnMatch>,
    pub unbound: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub blocks: Vec<BlockReconciliation>,
}

impl Reconciliation {
    pub fn block(&self, id: &str) -> Option<&BlockReconciliation> {
        self.blocks.iter().find(|b| b.block_id == id)
    }

    /// Blocks with a resolved table, as a rewrite selection.
    pub fn into_selection(self) -> Selection {
        self.blocks
            .into_iter()
            .filter_map(|b| {
                let table = b.table?;
                Some((
                    b.block_id,
                    BlockSelection {
                        table: Some(table),
                        connections: b.connections,
                    },
                ))
            })
            .collect()
    }
}

/// Reconcile `template` against the prior instantiated text (if any).
pub fn reconcile(
    template: &[MappingBlock],
    prior_text: Option<&str>,
    schema: &SchemaSnapshot,
) -> Reconciliation {
    let prior: Option<MappingDocument> = match prior_text {
        None => None,
        Some(text) => match parse_mapping_document(text) {
            Ok(doc) => {
                for failure in &doc.failures {
                    tracing::warn!(
                        line = failure.line,
                        block = ?failure.mapping_id,
                        message = %failure.message,
                        "prior mapping block unparseable; treated as unmapped"
                    );
                }
                Some(doc)
            }
            Err(err) => {
                tracing::warn!(error = %err, "prior mapping document unparseable; treated as unmapped");
                return Reconciliation {
                    blocks: template
                        .iter()
                        .map(|b| empty_block(b, PriorState::Unparseable))
                        .collect(),
                };
            }
        },
    };

    let blocks = template
        .iter()
        .map(|block| match &prior {
            None => empty_block(block, PriorState::Absent),
            Some(doc) => match doc.block(&block.id) {
                Some(prior_block) => reconcile_block(block, prior_block, schema),
                None if doc.failed(&block.id) => empty_block(block, PriorState::Unparseable),
                None => empty_block(block, PriorState::Absent),
            },
        })
        .collect::<Vec<_>>();

    tracing::info!(
        blocks = blocks.len(),
        bound = blocks.iter().map(|b| b.connections.len()).sum::<usize>(),
        "reconciliation complete"
    );
    Reconciliation { blocks }
}

fn empty_block(block: &MappingBlock, prior: PriorState) -> BlockReconciliation {
    BlockReconciliation {
        block_id: block.id.clone(),
        prior,
        prior_table: None,
        table: None,
        table_tier: None,
        connections: ConnectionsMap::new(),
        matches: vec![],
        unbound: block.placeholders.clone(),
    }
}

fn reconcile_block(
    template: &MappingBlock,
    prior: &MappingBlock,
    schema: &SchemaSnapshot,
) -> BlockReconciliation {
    let association = build_association(template, prior);
    let mut out = empty_block(template, PriorState::Found);
    out.prior_table = prior.default_table.clone();

    let Some((table, tier)) = prior
        .default_table
        .as_deref()
        .and_then(|t| resolve_table(t, schema))
    else {
        tracing::debug!(block = %template.id, table = ?prior.default_table, "prior table not in schema");
        return out;
    };
    let columns = schema.columns(table).unwrap_or_default();

    let (connections, matches, unbound) =
        project_association(&template.placeholders, &association, columns);
    tracing::debug!(
        block = %template.id,
        table,
        bound = connections.len(),
        unbound = unbound.len(),
        "block reconciled"
    );

    out.table = Some(table.to_string());
    out.table_tier = Some(tier);
    out.connections = connections;
    out.matches = matches;
    out.unbound = unbound;
    out
}

/// Build the name-level association for one block.
pub fn build_association(template: &MappingBlock, prior: &MappingBlock) -> Association {
    let mut association = Association::new();

    if template.target_arity == prior.target_arity {
        for (v, col) in template
            .target_placeholders()
            .iter()
            .zip(prior.target_placeholders())
        {
            association.insert(v.clone(), col.clone());
        }
    }

    let prior_tokens = tokenize(&prior.source);
    for v in &template.placeholders {
        if let Some(column) = alias_source(&prior_tokens, v) {
            association.insert(v.clone(), column.to_string());
        } else if prior_tokens.iter().any(|t| t.name() == Some(v.as_str())) {
            association.insert(v.clone(), v.clone());
        }
    }

    let template_eqs = where_equalities(&tokenize(&template.source));
    let prior_eqs = where_equalities(&prior_tokens);
    if let (Some(from), Some(to)) = (template_eqs, prior_eqs) {
        if from.len() == to.len() {
            for (orig, new) in from.into_iter().zip(to) {
                if template.placeholder_index(orig).is_some() {
                    association.insert(orig.to_string(), new.to_string());
                }
            }
        }
    }

    association
}

/// `<column> AS v`: the token before `AS`, unless it is a string literal.
fn alias_source<'a>(tokens: &[SqlToken<'a>], v: &str) -> Option<&'a str> {
    tokens.windows(3).find_map(|w| match w {
        [col, kw, SqlToken::Ident(alias)] if kw.is_keyword("AS") && *alias == v => col.name(),
        _ => None,
    })
}

/// Bare or quoted identifiers immediately followed by `=` after the first
/// `WHERE`; `None` when there is no `WHERE`.
fn where_equalities<'a>(tokens: &[SqlToken<'a>]) -> Option<Vec<&'a str>> {
    let start = tokens.iter().position(|t| t.is_keyword("WHERE"))?;
    let rest = &tokens[start + 1..];
    Some(
        rest.windows(2)
            .filter_map(|w| match w {
                [name, op] if op.is_op("=") => name.name(),
                _ => None,
            })
            .collect(),
    )
}

/// Resolve each associated column against `columns` and build the positional
/// map. Placeholders without an association, or whose column no tier can
/// match, are returned as unbound.
pub fn project_association(
    placeholders: &[String],
    association: &Association,
    columns: &[String],
) -> (ConnectionsMap, Vec<ColumnMatch>, Vec<String>) {
    let mut connections = ConnectionsMap::new();
    let mut matches = Vec::new();
    let mut unbound = Vec::new();

    for (idx, placeholder) in placeholders.iter().enumerate() {
        let resolved = association
            .get(placeholder)
            .and_then(|saved| resolve_column(saved, columns));
        match resolved {
            Some((col, tier)) => {
                connections.insert(idx, col);
                matches.push(ColumnMatch {
                    placeholder: placeholder.clone(),
                    column: columns[col].clone(),
                    tier,
                });
            }
            None => unbound.push(placeholder.clone()),
        }
    }
    (connections, matches, unbound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn mixed_tiers_project_to_positions() {
        let association: Association = [("age", "age"), ("status", "Status")]
            .into_iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        let (connections, matches, unbound) = project_association(
            &names(&["age", "status"]),
            &association,
            &names(&["Age", "Status", "Notes"]),
        );
        assert_eq!(connections, [(0, 0), (1, 1)].into_iter().collect());
        assert_eq!(matches[0].tier, MatchTier::CaseInsensitive);
        assert_eq!(matches[1].tier, MatchTier::Exact);
        assert!(unbound.is_empty());
    }

    #[test]
    fn alias_overrides_positional_fallback() {
        let template = MappingBlock::new("m", ":p/{id} :age {age} .", "SELECT id, age FROM \"t\"");
        let prior = MappingBlock::new(
            "m",
            ":p/{pid} :age {years} .",
            "SELECT pid, \"Age Years\" AS age FROM \"t\"",
        );
        let assoc = build_association(&template, &prior);
        assert_eq!(assoc["id"], "pid");
        assert_eq!(assoc["age"], "Age Years");
    }

    #[test]
    fn string_literal_aliases_fall_back_to_the_bare_name() {
        let template = MappingBlock::new("m", ":p/{kind} .", "SELECT kind FROM \"t\"");
        let prior = MappingBlock::new("m", ":p/{a} :q {b} .", "SELECT 'x' AS kind FROM \"t\"");
        let assoc = build_association(&template, &prior);
        assert_eq!(assoc["kind"], "kind");
    }

    #[test]
    fn where_realignment_wins_over_everything() {
        let template = MappingBlock::new(
            "m",
            ":p/{id} .",
            "SELECT id FROM \"t\" WHERE alive = 1 AND kind = 'x'",
        );
        let prior = MappingBlock::new(
            "m",
            ":p/{PID} .",
            "SELECT PID FROM \"t\" WHERE Alive = 1 AND alive = 'x'",
        );
        let assoc = build_association(&template, &prior);
        assert_eq!(assoc["id"], "PID");
        assert_eq!(assoc["alive"], "Alive");
        assert_eq!(assoc["kind"], "alive");
    }

    #[test]
    fn unequal_where_sequences_are_not_zipped() {
        let template = MappingBlock::new("m", ":p/{id} .", "SELECT id FROM \"t\" WHERE a = 1");
        let prior = MappingBlock::new("m", ":p/{id} .", "SELECT id FROM \"t\" WHERE x = 1 AND y = 2");
        let assoc = build_association(&template, &prior);
        assert!(!assoc.contains_key("a"));
    }

    #[test]
    fn missing_or_corrupt_prior_degrades_to_empty() {
        let template = vec![MappingBlock::new("m", ":p/{id} .", "SELECT id FROM \"t\"")];
        let schema: SchemaSnapshot = [("t", vec!["id"])].into_iter().collect();

        let none = reconcile(&template, None, &schema);
        assert_eq!(none.blocks[0].prior, PriorState::Absent);
        assert!(none.blocks[0].connections.is_empty());

        let corrupt = reconcile(&template, Some("not a mapping document"), &schema);
        assert_eq!(corrupt.blocks[0].prior, PriorState::Unparseable);
        assert!(corrupt.blocks[0].connections.is_empty());
        assert!(corrupt.into_selection().is_empty());
    }

    #[test]
    fn quoted_columns_written_by_a_save_reconcile_back() {
        let template = vec![MappingBlock::new(
            "m",
            ":p/{id} .",
            "SELECT id FROM \"t\" WHERE alive = 1",
        )];
        let schema: SchemaSnapshot = [("lab results", vec!["Patient ID", "Alive Flag"])]
            .into_iter()
            .collect();
        let mut selection = Selection::new();
        selection.insert(
            "m".into(),
            BlockSelection {
                table: Some("lab results".into()),
                connections: [(0, 0), (1, 1)].into_iter().collect(),
            },
        );

        let saved = crate::rewrite::instantiate("", &template, &selection, &schema).unwrap();
        assert!(saved.contains(":p/{\"Patient ID\"} ."));
        assert!(saved.contains("SELECT \"Patient ID\" FROM \"lab results\" WHERE \"Alive Flag\" = 1"));

        let rec = reconcile(&template, Some(&saved), &schema);
        let block = rec.block("m").unwrap();
        assert!(block.unbound.is_empty(), "unbound: {:?}", block.unbound);
        assert_eq!(rec.into_selection(), selection);
    }

    #[test]
    fn drifted_table_name_is_normalized() {
        let template = vec![MappingBlock::new("m", ":p/{id} .", "SELECT id FROM \"t\"")];
        let prior = "[MappingDeclaration] @collection [[\n\
mappingId\tm\n\
target\t\t:p/{patient_id} .\n\
source\t\tSELECT patient_id FROM \"Lab_Results\"\n\
]]\n";
        let schema: SchemaSnapshot = [("lab results", vec!["Patient ID"])].into_iter().collect();
        let rec = reconcile(&template, Some(prior), &schema);
        let block = rec.block("m").unwrap();
        assert_eq!(block.table.as_deref(), Some("lab results"));
        assert_eq!(block.table_tier, Some(MatchTier::Normalized));
        assert_eq!(block.connections, [(0, 0)].into_iter().collect());
        assert_eq!(block.matches[0].tier, MatchTier::Normalized);
    }
}
