//! Ranked name matching.
//!
//! Saved names drift from the live schema (a re-uploaded spreadsheet with
//! `Age` instead of `age`, `Patient ID` instead of `patient_id`). Resolution
//! runs an ordered chain of match tiers; the first tier with a hit wins, and
//! within a tier the first candidate in store order wins.

use serde::{Deserialize, Serialize};

use obdagate_catalog::SchemaSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    CaseInsensitive,
    Normalized,
}

impl MatchTier {
    pub const COLUMN_CHAIN: &'static [MatchTier] = &[
        MatchTier::Exact,
        MatchTier::CaseInsensitive,
        MatchTier::Normalized,
    ];

    pub const TABLE_CHAIN: &'static [MatchTier] = &[MatchTier::Exact, MatchTier::Normalized];

    pub fn matches(self, wanted: &str, candidate: &str) -> bool {
        match self {
            MatchTier::Exact => wanted == candidate,
            MatchTier::CaseInsensitive => wanted.to_lowercase() == candidate.to_lowercase(),
            MatchTier::Normalized => {
                let w = normalize_name(wanted);
                !w.is_empty() && w == normalize_name(candidate)
            }
        }
    }
}

/// Lowercase, collapse every run of non-alphanumeric characters into `_`,
/// trim `_` at both ends: `" Patient--ID "` -> `patient_id`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Run `chain` over `candidates`; returns the index of the hit and the tier.
pub fn resolve_in<S: AsRef<str>>(
    chain: &[MatchTier],
    wanted: &str,
    candidates: &[S],
) -> Option<(usize, MatchTier)> {
    chain.iter().find_map(|tier| {
        candidates
            .iter()
            .position(|c| tier.matches(wanted, c.as_ref()))
            .map(|idx| (idx, *tier))
    })
}

pub fn resolve_column<S: AsRef<str>>(wanted: &str, columns: &[S]) -> Option<(usize, MatchTier)> {
    resolve_in(MatchTier::COLUMN_CHAIN, wanted, columns)
}

/// Resolve a saved table name against the snapshot's table names.
pub fn resolve_table<'a>(wanted: &str, schema: &'a SchemaSnapshot) -> Option<(&'a str, MatchTier)> {
    let names: Vec<&str> = schema.table_names().collect();
    resolve_in(MatchTier::TABLE_CHAIN, wanted, &names).map(|(idx, tier)| (names[idx], tier))
}
