use std::collections::HashSet;
use std::ops::Range;

use itertools::Itertools;

use crate::data::tree::{ForestInfoRecord, TreeLocationRecord};
use crate::error::{MergerTreeError, Result};

/// Roll tree level byte counts up to one record per forest.
///
/// The trees must already be grouped by forest (the order produced by
/// `resolve_byte_ranges`). `forest_nhalos` is left at 0 for the halo reader.
///
/// # Arguments
///
/// * `trees` - trees with computed `tree_nbytes`, contiguous per forest
///
/// # Returns
///
/// * `forests` - one record per forest, in the order the forests appear
///
pub fn aggregate_forest_info(trees: &[TreeLocationRecord]) -> Result<Vec<ForestInfoRecord>> {
    if let Some(bad) = trees.iter().find(|t| t.tree_nbytes <= 0) {
        return Err(MergerTreeError::CorruptCatalog {
            tree_root_id: bad.tree_root_id,
            filename: bad.filename.clone(),
            detail: format!(
                "expected every tree to span at least one byte, found {}",
                bad.tree_nbytes
            ),
        });
    }

    let mut forests: Vec<ForestInfoRecord> = Vec::new();
    let mut seen: HashSet<i64> = HashSet::new();

    for (forest_id, run) in &trees.iter().chunk_by(|t| t.forest_id) {
        if !seen.insert(forest_id) {
            let ntrees_sum = forests.iter().map(|f| f.ntrees as usize).sum();
            return Err(MergerTreeError::AggregationIntegrity {
                ntrees_sum,
                expected: trees.len(),
                detail: format!("trees of forest {} are not contiguous", forest_id),
            });
        }

        let (ntrees, nbytes) = run.fold((0i64, 0i64), |(n, b), t| (n + 1, b + t.tree_nbytes));
        forests.push(ForestInfoRecord {
            forest_id,
            forest_nhalos: 0,
            input_forest_nbytes: nbytes,
            ntrees,
        });
    }

    let ntrees_sum: usize = forests.iter().map(|f| f.ntrees as usize).sum();
    if ntrees_sum != trees.len() {
        return Err(MergerTreeError::AggregationIntegrity {
            ntrees_sum,
            expected: trees.len(),
            detail: "check that the TreeRootID and ForestID values are unique".to_string(),
        });
    }

    Ok(forests)
}

/// Index range of every forest's trees within the forest-sorted tree table.
pub fn forest_tree_spans(forests: &[ForestInfoRecord]) -> Vec<Range<usize>> {
    let mut start = 0usize;
    forests
        .iter()
        .map(|f| {
            let end = start + f.ntrees as usize;
            let span = start..end;
            start = end;
            span
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(root: i64, forest: i64, nbytes: i64) -> TreeLocationRecord {
        TreeLocationRecord {
            tree_root_id: root,
            forest_id: forest,
            filename: "tree_0_0_0.dat".to_string(),
            file_id: 0,
            offset: root * 1000,
            tree_nbytes: nbytes,
        }
    }

    #[test]
    fn test_aggregate_conserves_counts() {
        let trees = vec![tree(1, 1, 10), tree(2, 1, 20), tree(3, 3, 5), tree(4, 4, 1), tree(5, 4, 2), tree(6, 4, 3)];
        let forests = aggregate_forest_info(&trees).unwrap();

        assert_eq!(forests.len(), 3);
        assert_eq!(forests[0], ForestInfoRecord { forest_id: 1, forest_nhalos: 0, input_forest_nbytes: 30, ntrees: 2 });
        assert_eq!(forests[1], ForestInfoRecord { forest_id: 3, forest_nhalos: 0, input_forest_nbytes: 5, ntrees: 1 });
        assert_eq!(forests[2], ForestInfoRecord { forest_id: 4, forest_nhalos: 0, input_forest_nbytes: 6, ntrees: 3 });

        let ntrees: i64 = forests.iter().map(|f| f.ntrees).sum();
        let nbytes: i64 = forests.iter().map(|f| f.input_forest_nbytes).sum();
        assert_eq!(ntrees as usize, trees.len());
        assert_eq!(nbytes, trees.iter().map(|t| t.tree_nbytes).sum::<i64>());
    }

    #[test]
    fn test_non_contiguous_forest_fails() {
        let trees = vec![tree(1, 1, 10), tree(2, 2, 20), tree(3, 1, 5)];
        assert!(matches!(
            aggregate_forest_info(&trees),
            Err(MergerTreeError::AggregationIntegrity { expected: 3, .. })
        ));
    }

    #[test]
    fn test_empty_tree_is_corrupt() {
        let trees = vec![tree(1, 1, 10), tree(2, 1, 0)];
        assert!(matches!(
            aggregate_forest_info(&trees),
            Err(MergerTreeError::CorruptCatalog { tree_root_id: 2, .. })
        ));
    }

    #[test]
    fn test_forest_tree_spans() {
        let trees = vec![tree(1, 1, 10), tree(2, 1, 20), tree(3, 3, 5), tree(4, 4, 1), tree(5, 4, 2)];
        let forests = aggregate_forest_info(&trees).unwrap();
        assert_eq!(forest_tree_spans(&forests), vec![0..2, 2..3, 3..5]);
        assert!(aggregate_forest_info(&[]).unwrap().is_empty());
    }
}
