use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;
use std::time::Instant;

use tracing::info;

use mtcore::algorithm::byte_range::resolve_byte_ranges;
use mtcore::algorithm::forest_info::{aggregate_forest_info, forest_tree_spans};
use mtcore::data::tree::{ForestInfoRecord, TreeLocationRecord};
use mtcore::MergerTreeError;

use crate::data::catalog::{file_size_table, read_locations_and_forests};
use crate::error::{DataError, Result};

/// The raw bytes of one tree, as stored after its `#tree <id>` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeBlock {
    pub tree_root_id: i64,
    pub bytes: Vec<u8>,
}

/// The tree and forest tables of one Consistent-Trees catalogue.
///
/// `trees` is sorted by `(forest_id, filename, offset)`, so the trees of a
/// forest form one contiguous slice.
#[derive(Debug, Clone)]
pub struct ForestCatalog {
    pub trees: Vec<TreeLocationRecord>,
    pub forests: Vec<ForestInfoRecord>,
    spans: Vec<Range<usize>>,
    forest_index: HashMap<i64, usize>,
}

fn table_mismatch(forests: &[ForestInfoRecord], ntrees: usize, detail: &str) -> DataError {
    MergerTreeError::AggregationIntegrity {
        ntrees_sum: forests.iter().map(|f| f.ntrees.max(0) as usize).sum(),
        expected: ntrees,
        detail: detail.to_string(),
    }
    .into()
}

impl ForestCatalog {
    /// Wrap already computed tables, e.g. after loading them from disk.
    ///
    /// The tables are checked against each other: every tree must span at
    /// least one byte, and the trees counted for a forest must carry its id.
    pub fn from_tables(trees: Vec<TreeLocationRecord>, forests: Vec<ForestInfoRecord>) -> Result<Self> {
        if let Some(bad) = trees.iter().find(|t| t.tree_nbytes <= 0) {
            return Err(MergerTreeError::CorruptCatalog {
                tree_root_id: bad.tree_root_id,
                filename: bad.filename.clone(),
                detail: format!("tree spans {} bytes", bad.tree_nbytes),
            }
            .into());
        }

        if forests.iter().any(|f| f.ntrees < 0) {
            return Err(table_mismatch(&forests, trees.len(), "negative tree count"));
        }
        let spans = forest_tree_spans(&forests);
        let ntrees = spans.last().map_or(0, |s| s.end);
        if ntrees != trees.len() {
            return Err(table_mismatch(&forests, trees.len(), "forest table does not match the tree table"));
        }
        for (forest, span) in forests.iter().zip(&spans) {
            if let Some(t) = trees[span.clone()].iter().find(|t| t.forest_id != forest.forest_id) {
                let detail = format!("tree {} of forest {} is listed under forest {}", t.tree_root_id, t.forest_id, forest.forest_id);
                return Err(table_mismatch(&forests, trees.len(), &detail));
            }
        }

        let forest_index = forests.iter().enumerate().map(|(i, f)| (f.forest_id, i)).collect();
        Ok(ForestCatalog { trees, forests, spans, forest_index })
    }

    /// Read `forests.list` and `locations.dat`, compute the byte span of every
    /// tree and the per-forest totals.
    ///
    /// # Arguments
    ///
    /// * `forests_file` - path to `forests.list`
    /// * `locations_file` - path to `locations.dat`; tree data files are looked up next to it
    ///
    /// # Returns
    ///
    /// * `catalog` - tree and forest tables
    ///
    pub fn open(forests_file: &Path, locations_file: &Path) -> Result<Self> {
        let (memberships, locations) = read_locations_and_forests(forests_file, locations_file)?;
        let file_sizes = file_size_table(&locations)?;

        let t0 = Instant::now();
        info!("Computing tree byte ranges over {} files", file_sizes.len());
        let trees = resolve_byte_ranges(locations, &memberships, &file_sizes)?;
        info!(
            "Computing tree byte ranges...done. Time taken = {:.2} seconds",
            t0.elapsed().as_secs_f64()
        );

        let t0 = Instant::now();
        let forests = aggregate_forest_info(&trees)?;
        info!(
            "Aggregating {} trees into {} forests...done. Time taken = {:.2} seconds",
            trees.len(),
            forests.len(),
            t0.elapsed().as_secs_f64()
        );

        Self::from_tables(trees, forests)
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_forests(&self) -> usize {
        self.forests.len()
    }

    fn position(&self, forest_id: i64) -> Result<usize> {
        self.forest_index
            .get(&forest_id)
            .copied()
            .ok_or(DataError::UnknownForest(forest_id))
    }

    pub fn forest_info(&self, forest_id: i64) -> Result<&ForestInfoRecord> {
        Ok(&self.forests[self.position(forest_id)?])
    }

    /// The trees of one forest, grouped by file and in offset order.
    pub fn forest_trees(&self, forest_id: i64) -> Result<&[TreeLocationRecord]> {
        let span = self.spans[self.position(forest_id)?].clone();
        Ok(&self.trees[span])
    }

    /// Record the number of halos found once the forest has been parsed.
    pub fn set_forest_nhalos(&mut self, forest_id: i64, nhalos: i64) -> Result<()> {
        let i = self.position(forest_id)?;
        self.forests[i].forest_nhalos = nhalos;
        Ok(())
    }

    /// Read the exact byte range of every tree in a forest.
    ///
    /// Each data file is opened once; the trees in it are read in offset
    /// order.
    pub fn read_forest_blocks(&self, forest_id: i64) -> Result<Vec<TreeBlock>> {
        let trees = self.forest_trees(forest_id)?;
        let mut blocks = Vec::with_capacity(trees.len());

        for run in trees.chunk_by(|a, b| a.filename == b.filename) {
            let filename = &run[0].filename;
            let mut file = File::open(filename).map_err(|e| DataError::io(filename, e))?;

            for tree in run {
                let mut bytes = vec![0u8; tree.tree_nbytes as usize];
                file.seek(SeekFrom::Start(tree.offset as u64))
                    .and_then(|_| file.read_exact(&mut bytes))
                    .map_err(|e| DataError::io(filename, e))?;

                blocks.push(TreeBlock { tree_root_id: tree.tree_root_id, bytes });
            }
        }

        Ok(blocks)
    }
}
