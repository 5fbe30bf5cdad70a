use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::algorithm::fof::assign_fof_ids;
use crate::algorithm::lineage::link_lineage;
use crate::data::halo::{HaloForest, HaloRecord};
use crate::error::{MergerTreeError, Result};

#[derive(Clone, Debug)]
pub struct TreeWalkOpts {
    /// Worker threads for forest level parallelism (0 = all cores)
    pub num_threads: usize,
    /// Keep going when a forest fails; its indices are reset and it is reported
    pub skip_failed_forests: bool,
}

impl Default for TreeWalkOpts {
    fn default() -> Self {
        Self {
            num_threads: 0,
            skip_failed_forests: false,
        }
    }
}

/// Outcome of building the indices of many forests.
#[derive(Debug, Default)]
pub struct TreeWalkSummary {
    pub forests_done: usize,
    pub halos_done: usize,
    /// Forests that failed, with their (forest-tagged) errors. Their
    /// tree-walk indices are all -1 and they should not be written out.
    pub failed: Vec<(i64, MergerTreeError)>,
}

/// Build every tree-walk index of one forest.
///
/// Resets the eight index columns, assigns FOF ids, then links FOF groups,
/// descendants and progenitors. On error the index columns are reset again,
/// so a failed forest never carries half-built links.
///
/// # Arguments
///
/// * `forest` - every halo of the forest; its order must not change afterwards
///
/// # Returns
///
/// * `()` - indices filled in place
///
pub fn build_tree_walk_indices(forest: &mut [HaloRecord]) -> Result<()> {
    forest.iter_mut().for_each(HaloRecord::reset_tree_walk_indices);

    let result = assign_fof_ids(forest).and_then(|_| link_lineage(forest));
    if result.is_err() {
        forest.iter_mut().for_each(HaloRecord::reset_tree_walk_indices);
    }
    result
}

/// Build the tree-walk indices of many forests on a thread pool, one forest
/// per task.
///
/// With `skip_failed_forests` unset the first failing forest (in input
/// order) is returned as the error; otherwise failures are collected in the
/// summary.
pub fn build_tree_walk_indices_par(forests: &mut [HaloForest], opts: &TreeWalkOpts) -> Result<TreeWalkSummary> {
    let pool = ThreadPoolBuilder::new().num_threads(opts.num_threads).build()?;

    let results: Vec<Result<()>> = pool.install(|| {
        forests
            .par_iter_mut()
            .map(|forest| {
                build_tree_walk_indices(&mut forest.halos).map_err(|e| e.in_forest(forest.forest_id))
            })
            .collect()
    });

    let mut summary = TreeWalkSummary::default();
    for (forest, result) in forests.iter().zip(results) {
        match result {
            Ok(()) => {
                summary.forests_done += 1;
                summary.halos_done += forest.halos.len();
            }
            Err(e) if opts.skip_failed_forests => summary.failed.push((forest.forest_id, e)),
            Err(e) => return Err(e),
        }
    }
    Ok(summary)
}
