use std::cmp::Ordering;
use std::collections::HashMap;

use crate::algorithm::utility::tree_header_nbytes;
use crate::data::tree::{FileSizeTable, ForestMembership, TreeLocation, TreeLocationRecord};
use crate::error::{MergerTreeError, Result};

/// Inner join of the tree locations with the forest memberships on
/// `tree_root_id`.
///
/// Forest rows without a location are dropped. Every location has to pair
/// with exactly one forest row: a tree without a forest, or a tree root
/// listed twice on either side, is reported as a join failure.
///
/// # Arguments
///
/// * `locations` - rows of the locations table
/// * `memberships` - rows of the forests table
///
/// # Returns
///
/// * `trees` - one record per location, in location order, `tree_nbytes` still 0
///
pub fn join_locations_and_forests(
    locations: Vec<TreeLocation>,
    memberships: &[ForestMembership],
) -> Result<Vec<TreeLocationRecord>> {
    let expected = locations.len();

    let mut forest_of: HashMap<i64, i64> = HashMap::with_capacity(memberships.len());
    for m in memberships {
        if let Some(previous) = forest_of.insert(m.tree_root_id, m.forest_id) {
            return Err(MergerTreeError::JoinIntegrity {
                expected,
                joined: 0,
                detail: format!(
                    "tree {} is listed in forests {} and {}",
                    m.tree_root_id, previous, m.forest_id
                ),
            });
        }
    }

    let mut seen_roots: HashMap<i64, usize> = HashMap::with_capacity(expected);
    let mut unmatched: Vec<i64> = Vec::new();
    let mut trees = Vec::with_capacity(expected);

    for loc in locations {
        if seen_roots.insert(loc.tree_root_id, trees.len()).is_some() {
            return Err(MergerTreeError::JoinIntegrity {
                expected,
                joined: trees.len(),
                detail: format!("tree {} has more than one location", loc.tree_root_id),
            });
        }
        match forest_of.get(&loc.tree_root_id) {
            Some(&forest_id) => trees.push(TreeLocationRecord {
                tree_root_id: loc.tree_root_id,
                forest_id,
                filename: loc.filename,
                file_id: loc.file_id,
                offset: loc.offset,
                tree_nbytes: 0,
            }),
            None => unmatched.push(loc.tree_root_id),
        }
    }

    if trees.len() != expected {
        return Err(MergerTreeError::JoinIntegrity {
            expected,
            joined: trees.len(),
            detail: format!(
                "{} trees have no forest, first few: {:?}",
                unmatched.len(),
                &unmatched[..unmatched.len().min(5)]
            ),
        });
    }

    Ok(trees)
}

fn by_file_and_offset(a: &TreeLocationRecord, b: &TreeLocationRecord) -> Ordering {
    (a.file_id, a.offset, a.tree_root_id).cmp(&(b.file_id, b.offset, b.tree_root_id))
}

fn by_forest_file_and_offset(a: &TreeLocationRecord, b: &TreeLocationRecord) -> Ordering {
    a.forest_id
        .cmp(&b.forest_id)
        .then_with(|| a.filename.cmp(&b.filename))
        .then_with(|| a.offset.cmp(&b.offset))
        .then_with(|| a.tree_root_id.cmp(&b.tree_root_id))
}

/// Fill `tree_nbytes` for every tree.
///
/// Trees are sorted by `(file_id, offset)`. A tree ends where the header line
/// of the next tree in the same file starts; the last tree of a file ends at
/// the end of that file. On return the trees are left in file order.
pub fn compute_tree_nbytes(trees: &mut [TreeLocationRecord], file_sizes: &FileSizeTable) -> Result<()> {
    trees.sort_by(by_file_and_offset);

    let mut nbytes = Vec::with_capacity(trees.len());
    for (i, tree) in trees.iter().enumerate() {
        let end = match trees.get(i + 1) {
            Some(next) if next.file_id == tree.file_id => {
                if next.filename != tree.filename {
                    return Err(MergerTreeError::CorruptCatalog {
                        tree_root_id: next.tree_root_id,
                        filename: next.filename.clone(),
                        detail: format!(
                            "file id {} is also used for '{}'",
                            tree.file_id, tree.filename
                        ),
                    });
                }
                next.offset - tree_header_nbytes(next.tree_root_id)
            }
            _ => file_sizes
                .get(&tree.filename)
                .ok_or_else(|| MergerTreeError::UnknownFile {
                    filename: tree.filename.clone(),
                })?,
        };

        let len = end - tree.offset;
        if len <= 0 {
            return Err(MergerTreeError::CorruptCatalog {
                tree_root_id: tree.tree_root_id,
                filename: tree.filename.clone(),
                detail: format!(
                    "trees must span more than 0 bytes, computed {} bytes at offset {}",
                    len, tree.offset
                ),
            });
        }
        nbytes.push(len);
    }

    for (tree, len) in trees.iter_mut().zip(nbytes) {
        tree.tree_nbytes = len;
    }
    Ok(())
}

/// Order trees so that every forest is contiguous, and within a forest the
/// trees of one file appear in offset order.
pub fn sort_trees_by_forest(trees: &mut [TreeLocationRecord]) {
    trees.sort_by(by_forest_file_and_offset);
}

/// Join locations with forests, compute the byte span of every tree and
/// return the trees sorted by `(forest_id, filename, offset)`.
///
/// # Arguments
///
/// * `locations` - rows of the locations table
/// * `memberships` - rows of the forests table
/// * `file_sizes` - size of every tree data file, used for the last tree in a file
///
/// # Returns
///
/// * `trees` - joined records with `tree_nbytes > 0`
///
pub fn resolve_byte_ranges(
    locations: Vec<TreeLocation>,
    memberships: &[ForestMembership],
    file_sizes: &FileSizeTable,
) -> Result<Vec<TreeLocationRecord>> {
    let mut trees = join_locations_and_forests(locations, memberships)?;
    compute_tree_nbytes(&mut trees, file_sizes)?;
    sort_trees_by_forest(&mut trees);
    Ok(trees)
}
