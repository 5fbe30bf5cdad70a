use crate::data::halo::{HaloRecord, NO_HALO};
use crate::error::{MergerTreeError, Result};

/// Prefix of the line the tree writer emits before every tree: `#tree <id>\n`.
pub const TREE_HEADER_PREFIX: &str = "#tree ";

/// Exact number of bytes of the `#tree <id>\n` line written before a tree.
///
/// # Arguments
///
/// * `tree_root_id` - id of the tree root printed on the header line
///
/// # Returns
///
/// * `nbytes` - prefix + decimal digits (and sign) + newline
///
pub fn tree_header_nbytes(tree_root_id: i64) -> i64 {
    let mut digits = 1;
    let mut rest = tree_root_id.unsigned_abs();
    while rest >= 10 {
        rest /= 10;
        digits += 1;
    }
    let sign = if tree_root_id < 0 { 1 } else { 0 };
    (TREE_HEADER_PREFIX.len() + sign + digits + 1) as i64
}

/// Lookup from halo id to position within a forest, built once by sorting
/// the positions on `id` and answered by binary search.
pub struct IdIndex {
    sorted_ids: Vec<i64>,
    positions: Vec<usize>,
}

impl IdIndex {
    /// Build the index; fails if two halos share an id.
    pub fn new(forest: &[HaloRecord]) -> Result<Self> {
        let mut positions: Vec<usize> = (0..forest.len()).collect();
        positions.sort_unstable_by_key(|&i| forest[i].id);
        let sorted_ids: Vec<i64> = positions.iter().map(|&i| forest[i].id).collect();

        if let Some(pair) = sorted_ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(MergerTreeError::DuplicateHaloId { id: pair[0] });
        }

        Ok(IdIndex { sorted_ids, positions })
    }

    /// Position of the halo with `id`, or `None` for the sentinel or an id
    /// not present in the forest.
    #[inline]
    pub fn position_of(&self, id: i64) -> Option<usize> {
        if id == NO_HALO {
            return None;
        }
        self.sorted_ids
            .binary_search(&id)
            .ok()
            .map(|k| self.positions[k])
    }

    pub fn len(&self) -> usize {
        self.sorted_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted_ids.is_empty()
    }
}

/// Walk a run of positions and hand each member its predecessor and
/// successor in the run (`NO_HALO` at both ends).
pub fn link_run<F>(run: &[usize], mut link: F)
where
    F: FnMut(usize, i64, i64),
{
    for (k, &pos) in run.iter().enumerate() {
        let prev = if k == 0 { NO_HALO } else { run[k - 1] as i64 };
        let next = run.get(k + 1).map_or(NO_HALO, |&p| p as i64);
        link(pos, prev, next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_header_nbytes() {
        for id in [0i64, 7, 10, 99, 12345, 3_000_000_000, -1, -42, i64::MAX, i64::MIN] {
            assert_eq!(tree_header_nbytes(id), format!("#tree {}\n", id).len() as i64, "id {}", id);
        }
    }

    #[test]
    fn test_id_index_lookup() {
        let forest = vec![
            HaloRecord::new(30, -1, -1, -1, 1.0, -1.0, 1.0),
            HaloRecord::new(10, 30, -1, -1, 0.5, 1.0, 1.0),
            HaloRecord::new(20, 30, -1, -1, 0.5, 1.0, 1.0),
        ];
        let index = IdIndex::new(&forest).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.position_of(30), Some(0));
        assert_eq!(index.position_of(10), Some(1));
        assert_eq!(index.position_of(20), Some(2));
        assert_eq!(index.position_of(25), None);
        assert_eq!(index.position_of(NO_HALO), None);
    }

    #[test]
    fn test_id_index_rejects_duplicates() {
        let forest = vec![
            HaloRecord::new(5, -1, -1, -1, 1.0, -1.0, 1.0),
            HaloRecord::new(5, -1, -1, -1, 0.5, -1.0, 1.0),
        ];
        assert!(matches!(
            IdIndex::new(&forest),
            Err(MergerTreeError::DuplicateHaloId { id: 5 })
        ));
    }

    #[test]
    fn test_link_run() {
        let mut links = Vec::new();
        link_run(&[4, 1, 7], |pos, prev, next| links.push((pos, prev, next)));
        assert_eq!(links, vec![(4, -1, 1), (1, 4, 7), (7, 1, -1)]);

        links.clear();
        link_run(&[2], |pos, prev, next| links.push((pos, prev, next)));
        assert_eq!(links, vec![(2, -1, -1)]);
    }
}
