use thiserror::Error;

/// Errors raised while building tree byte ranges, forest tables or
/// tree-walk indices. Every variant is fatal to the forest (or catalogue)
/// being processed; the caller decides whether to skip it or abort.
#[derive(Debug, Error)]
pub enum MergerTreeError {
    #[error("Join of locations and forests lost rows: expected {expected} trees, joined {joined} ({detail})")]
    JoinIntegrity {
        expected: usize,
        joined: usize,
        detail: String,
    },

    #[error("Corrupt catalogue for tree {tree_root_id} in '{filename}': {detail}")]
    CorruptCatalog {
        tree_root_id: i64,
        filename: String,
        detail: String,
    },

    #[error("No file size known for '{filename}'")]
    UnknownFile { filename: String },

    #[error("Forest aggregation mismatch: {ntrees_sum} trees across forests, expected {expected} ({detail})")]
    AggregationIntegrity {
        ntrees_sum: usize,
        expected: usize,
        detail: String,
    },

    #[error("There are no FOF halos among the {nhalos} halos passed")]
    OrphanedHalo { nhalos: usize },

    #[error("Could not assign a FOF group to {unresolved} halos (first unresolved ids: {sample_ids:?})")]
    UnresolvableHierarchy {
        unresolved: usize,
        sample_ids: Vec<i64>,
    },

    #[error("Halo id {id} appears more than once in the forest")]
    DuplicateHaloId { id: i64 },

    #[error("Halo {halo_id} points to descendant {desc_id} at scale {desc_scale}, found scale {found_scale:?}")]
    DanglingDescendant {
        halo_id: i64,
        desc_id: i64,
        desc_scale: f64,
        found_scale: Option<f64>,
    },

    #[error("Inconsistent lineage around halo {halo_id}: {detail}")]
    LineageConsistency { halo_id: i64, detail: String },

    #[error("Forest {forest_id}: {source}")]
    InForest {
        forest_id: i64,
        #[source]
        source: Box<MergerTreeError>,
    },

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, MergerTreeError>;

impl MergerTreeError {
    /// Attach the id of the forest being processed.
    pub fn in_forest(self, forest_id: i64) -> Self {
        match self {
            MergerTreeError::InForest { .. } => self,
            other => MergerTreeError::InForest {
                forest_id,
                source: Box::new(other),
            },
        }
    }

    /// The error with any forest wrapper removed.
    pub fn root(&self) -> &MergerTreeError {
        match self {
            MergerTreeError::InForest { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orphaned_display() {
        let err = MergerTreeError::OrphanedHalo { nhalos: 12 };
        assert_eq!(
            format!("{}", err),
            "There are no FOF halos among the 12 halos passed"
        );
    }

    #[test]
    fn test_in_forest_wraps_once() {
        let err = MergerTreeError::DuplicateHaloId { id: 7 }
            .in_forest(3)
            .in_forest(4);
        match &err {
            MergerTreeError::InForest { forest_id, .. } => assert_eq!(*forest_id, 3),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(err.root(), MergerTreeError::DuplicateHaloId { id: 7 }));
        assert_eq!(format!("{}", err), "Forest 3: Halo id 7 appears more than once in the forest");
    }
}
