//! Allow-list of approved query templates, keyed by template digest.
//!
//! Built offline from a Markdown catalog:
//!
//! ````text
//! ## Level 3
//!
//! ```sparql
//! SELECT ?g (COUNT(?p) AS ?n) WHERE { ?p :gender ?g } GROUP BY ?g
//! ```
//! ````
//!
//! and persisted as JSON. The gate only ever reads it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use obdagate_storage::write_atomic;

use crate::level::AccessLevel;
use crate::template::template_digest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedQueryEntry {
    pub level: AccessLevel,
    /// Canonical (trimmed) template text.
    pub template: String,
}

#[derive(Debug, Error)]
pub enum AllowListError {
    #[error("allow-list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("allow-list {path} is not valid JSON: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("catalog line {line}: level {level} is outside L0..L6")]
    LevelOutOfRange { line: usize, level: String },
    #[error("catalog pattern: {0}")]
    Pattern(#[from] regex::Error),
}

const HEADING_PATTERN: &str = r"(?mi)^[ \t]*#+[ \t]*Level[ \t]*(\d+)[ \t]*(?:[-:].*)?$";
const FENCE_PATTERN: &str = r"(?ms)^[ \t]*```[ \t]*([A-Za-z0-9_+-]*)[ \t]*\n(.*?)^[ \t]*```";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowList {
    entries: BTreeMap<String, AllowedQueryEntry>,
}

impl AllowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, digest: &str) -> Option<&AllowedQueryEntry> {
        self.entries.get(digest)
    }

    /// Insert (or replace) `template` at `level`; returns its digest.
    pub fn upsert(&mut self, template: &str, level: AccessLevel) -> String {
        let template = template.trim();
        let digest = template_digest(template);
        self.entries.insert(
            digest.clone(),
            AllowedQueryEntry {
                level,
                template: template.to_string(),
            },
        );
        digest
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AllowedQueryEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn load(path: &Path) -> Result<Self, AllowListError> {
        let text = std::fs::read_to_string(path).map_err(|source| AllowListError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| AllowListError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), AllowListError> {
        let json = serde_json::to_vec_pretty(self).map_err(|source| AllowListError::Format {
            path: path.to_path_buf(),
            source,
        })?;
        write_atomic(path, &json).map_err(|source| AllowListError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Add every fenced query under a `Level N` heading of `markdown`.
    ///
    /// Headings may be at any depth. Fences may be tagged ```` ```sparql ```` or
    /// untagged; fences tagged with another language are skipped. Later
    /// duplicates overwrite earlier ones. Returns the number of queries read.
    pub fn load_catalog_markdown(&mut self, markdown: &str) -> Result<usize, AllowListError> {
        let heading = compile(HEADING_PATTERN)?;
        let fence = compile(FENCE_PATTERN)?;
        let mut count = 0;
        for section in level_sections(&heading, markdown) {
            let level = u32::try_from(section.level)
                .ok()
                .and_then(AccessLevel::from_rank)
                .ok_or_else(|| AllowListError::LevelOutOfRange {
                    line: section.line,
                    level: section.level.to_string(),
                })?;
            for query in fenced_queries(&fence, section.body) {
                let digest = self.upsert(query, level);
                tracing::debug!(digest = %crate::template::digest_prefix(&digest), %level, "allow-list entry");
                count += 1;
            }
        }
        tracing::info!(queries = count, entries = self.len(), "catalog loaded");
        Ok(count)
    }
}

struct LevelSection<'a> {
    level: u64,
    line: usize,
    body: &'a str,
}

fn compile(pattern: &str) -> Result<Regex, AllowListError> {
    Ok(Regex::new(pattern)?)
}

fn level_sections<'a>(re: &Regex, markdown: &'a str) -> Vec<LevelSection<'a>> {
    let headings: Vec<_> = re.captures_iter(markdown).collect();
    headings
        .iter()
        .enumerate()
        .filter_map(|(i, caps)| {
            let whole = caps.get(0)?;
            let end = headings
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(markdown.len());
            Some(LevelSection {
                // Absurdly long digit runs saturate and are rejected as out of range.
                level: caps[1].parse().unwrap_or(u64::MAX),
                line: markdown[..whole.start()].matches('\n').count() + 1,
                body: &markdown[whole.end()..end],
            })
        })
        .collect()
}

fn fenced_queries<'a>(re: &Regex, body: &'a str) -> Vec<&'a str> {
    re.captures_iter(body)
        .filter(|caps| {
            let lang = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            lang.is_empty() || lang.eq_ignore_ascii_case("sparql")
        })
        .filter_map(|caps| caps.get(2).map(|m| m.as_str().trim()))
        .filter(|q| !q.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = "# Query catalog

Intro text with a stray fence that is not under a level:

```sparql
SELECT ?ignored WHERE { }
```

## Level 0

```sparql
ASK { ?p a :Patient }
```

## Level 3 - Grouped Data

Some prose.

```sparql
SELECT ?g (COUNT(?p) AS ?n)
WHERE { ?p :gender ?g }
GROUP BY ?g
```

```
SELECT ?x WHERE { ?x a :Patient }
```

```python
print('not a query')
```

### Level 5

```sparql
ASK { ?p a :Patient }
```
";

    #[test]
    fn loads_levels_and_fences() {
        let mut list = AllowList::new();
        let n = list.load_catalog_markdown(CATALOG).unwrap();
        assert_eq!(n, 4);
        // The Level 5 ASK overwrote the Level 0 one.
        assert_eq!(list.len(), 3);

        let ask = list.get(&template_digest("ASK { ?p a :Patient }")).unwrap();
        assert_eq!(ask.level, AccessLevel::L5);

        let grouped = list
            .get(&template_digest(
                "SELECT ?g (COUNT(?p) AS ?n)\nWHERE { ?p :gender ?g }\nGROUP BY ?g",
            ))
            .unwrap();
        assert_eq!(grouped.level, AccessLevel::L3);
        assert!(list
            .get(&template_digest("SELECT ?x WHERE { ?x a :Patient }"))
            .is_some());
        assert!(list
            .get(&template_digest("SELECT ?ignored WHERE { }"))
            .is_none());
    }

    #[test]
    fn out_of_range_level_is_rejected() {
        let mut list = AllowList::new();
        let err = list
            .load_catalog_markdown("intro\n\n## Level 9\n\n```sparql\nASK {}\n```\n")
            .unwrap_err();
        assert!(matches!(err, AllowListError::LevelOutOfRange { line: 3, .. }));
    }

    #[test]
    fn bad_catalog_pattern_is_an_error_not_an_empty_load() {
        assert!(compile(HEADING_PATTERN).is_ok());
        assert!(compile(FENCE_PATTERN).is_ok());
        assert!(matches!(compile("(?m)^## Level ("), Err(AllowListError::Pattern(_))));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allow.json");
        let mut list = AllowList::new();
        list.upsert("  ASK { ?s ?p ?o }\n", AccessLevel::L1);
        list.save(&path).unwrap();

        let loaded = AllowList::load(&path).unwrap();
        assert_eq!(loaded, list);
        let (_, entry) = loaded.iter().next().unwrap();
        assert_eq!(entry.template, "ASK { ?s ?p ?o }");
    }
}
