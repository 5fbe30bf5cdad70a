use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One row of a `locations.dat` table: where a tree starts in its data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeLocation {
    pub tree_root_id: i64,
    pub file_id: i64,
    pub offset: i64,
    pub filename: String,
}

impl TreeLocation {
    pub fn new(tree_root_id: i64, file_id: i64, offset: i64, filename: String) -> Self {
        TreeLocation { tree_root_id, file_id, offset, filename }
    }
}

/// One row of a `forests.list` table: which forest a tree belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestMembership {
    pub tree_root_id: i64,
    pub forest_id: i64,
}

impl ForestMembership {
    pub fn new(tree_root_id: i64, forest_id: i64) -> Self {
        ForestMembership { tree_root_id, forest_id }
    }
}

/// A tree joined with its forest, together with the exact number of bytes
/// the tree occupies in `filename`, starting at `offset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeLocationRecord {
    pub tree_root_id: i64,
    pub forest_id: i64,
    pub filename: String,
    pub file_id: i64,
    pub offset: i64,
    pub tree_nbytes: i64,
}

impl TreeLocationRecord {
    /// Byte offset one past the last byte of this tree.
    pub fn end_offset(&self) -> i64 {
        self.offset + self.tree_nbytes
    }
}

/// Forest level totals, one per distinct `forest_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestInfoRecord {
    pub forest_id: i64,
    /// Filled in by the halo reader once the forest has been read.
    pub forest_nhalos: i64,
    pub input_forest_nbytes: i64,
    pub ntrees: i64,
}

/// File sizes (in bytes) of every tree data file, keyed by filename.
///
/// Built once per catalogue and only read afterwards, so it can be shared
/// between forest workers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSizeTable {
    sizes: HashMap<String, i64>,
}

impl FileSizeTable {
    pub fn new() -> Self {
        FileSizeTable { sizes: HashMap::new() }
    }

    pub fn insert(&mut self, filename: impl Into<String>, nbytes: i64) {
        self.sizes.insert(filename.into(), nbytes);
    }

    pub fn get(&self, filename: &str) -> Option<i64> {
        self.sizes.get(filename).copied()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, i64)> for FileSizeTable {
    fn from_iter<I: IntoIterator<Item = (S, i64)>>(iter: I) -> Self {
        FileSizeTable {
            sizes: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
