//! Placeholder extraction for mapping blocks.
//!
//! Placeholders come from two places:
//! 1. `{name}` variables in the target (triple/IRI) template, in first-seen order;
//! 2. *filter-only* columns in the source SQL: identifiers compared with `=` or
//!    `<>`, tested with `IS [NOT] NULL`, or passed to `isnan(..)`.
//!
//! Filter-only names are appended after the target names and never duplicate
//! them, so the combined list is stable under re-parsing.

use crate::sql_lexer::{placeholder, tokenize, SqlToken};

/// `{name}` variables of a target fragment, de-duplicated, first-seen order.
pub fn target_placeholders(target: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (idx, ch) in target.char_indices() {
        if ch != '{' {
            continue;
        }
        if let Ok((_, name)) = placeholder(&target[idx..]) {
            if !out.iter().any(|n| n == name) {
                out.push(name.to_string());
            }
        }
    }
    out
}

/// Filter-only identifiers of a source fragment, de-duplicated, first-seen order.
pub fn filter_placeholders(source: &str) -> Vec<String> {
    let tokens = tokenize(source);
    let mut out: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    };

    for (i, tok) in tokens.iter().enumerate() {
        let next = tokens.get(i + 1);

        if let SqlToken::Ident(name) = tok {
            let name = *name;
            if is_reserved(name) {
                continue;
            }
            if next.is_some_and(|t| t.is_op("=") || t.is_op("<>")) {
                push(name);
                continue;
            }
            if next.is_some_and(|t| t.is_keyword("IS")) && is_null_test(&tokens[i + 2..]) {
                push(name);
                continue;
            }
        }

        if tok.is_keyword("isnan") && next == Some(&SqlToken::Punct('(')) {
            if let Some(arg) = nan_test_column(&tokens[i + 2..]) {
                push(arg);
            }
        }
    }
    out
}

/// Column argument of `isnan(..)`: the last part of a `p.col` chain that is
/// immediately closed by `)`.
fn nan_test_column<'a>(args: &[SqlToken<'a>]) -> Option<&'a str> {
    let mut at = 0;
    while args.get(at).is_some_and(|t| t.name().is_some())
        && args.get(at + 1) == Some(&SqlToken::Punct('.'))
    {
        at += 2;
    }
    match (args.get(at), args.get(at + 1)) {
        (Some(SqlToken::Ident(column)), Some(SqlToken::Punct(')'))) => Some(*column),
        _ => None,
    }
}

/// `NULL` or `NOT NULL` at the start of `rest`.
fn is_null_test(rest: &[SqlToken<'_>]) -> bool {
    match rest {
        [first, ..] if first.is_keyword("NULL") => true,
        [first, second, ..] if first.is_keyword("NOT") => second.is_keyword("NULL"),
        _ => false,
    }
}

fn is_reserved(name: &str) -> bool {
    const RESERVED: &[&str] = &["AND", "OR", "NOT", "WHERE", "NULL", "ON", "SELECT", "FROM"];
    RESERVED.iter().any(|kw| name.eq_ignore_ascii_case(kw))
}

/// Table named in the `FROM "<table>"` clause of a source fragment.
pub fn source_table(source: &str) -> Option<String> {
    let tokens = tokenize(source);
    tokens.windows(2).find_map(|pair| match pair {
        [from, SqlToken::Quoted(table)] if from.is_keyword("FROM") => Some((*table).to_string()),
        _ => None,
    })
}

/// Combined placeholder list: target-derived first, then filter-only names.
///
/// Returns the list and the number of target-derived entries.
pub fn block_placeholders(target: &str, source: &str) -> (Vec<String>, usize) {
    let mut names = target_placeholders(target);
    let target_arity = names.len();
    for name in filter_placeholders(source) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    (names, target_arity)
}
