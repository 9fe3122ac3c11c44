use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Positional binding for one block: placeholder index -> column index.
///
/// Indices point into the block's `placeholders` and the chosen table's
/// column list. Serialized as a JSON object with stringified keys
/// (`{"0": 2, "1": 0}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionsMap(pub BTreeMap<usize, usize>);

impl ConnectionsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, placeholder: usize, column: usize) -> Option<usize> {
        self.0.insert(placeholder, column)
    }

    pub fn get(&self, placeholder: usize) -> Option<usize> {
        self.0.get(&placeholder).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.0.iter().map(|(p, c)| (*p, *c))
    }

    /// First entry whose placeholder or column index is out of range.
    pub fn first_out_of_range(
        &self,
        placeholders: usize,
        columns: usize,
    ) -> Option<(usize, usize)> {
        self.iter().find(|(p, c)| *p >= placeholders || *c >= columns)
    }
}

impl FromIterator<(usize, usize)> for ConnectionsMap {
    fn from_iter<I: IntoIterator<Item = (usize, usize)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
