use std::cmp::Reverse;

use ordered_float::OrderedFloat;

use crate::algorithm::utility::{link_run, IdIndex};
use crate::data::halo::{HaloRecord, NO_HALO};
use crate::error::{MergerTreeError, Result};

/// Positions of the forest ordered by `(scale, fof_id, upid, -mvir, id)`.
///
/// Within a FOF group the host comes first (its `upid` is -1), followed by
/// the subhalos from most to least massive.
pub fn fof_group_order(forest: &[HaloRecord]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..forest.len()).collect();
    order.sort_unstable_by_key(|&i| {
        let h = &forest[i];
        (
            OrderedFloat(h.scale),
            h.fof_id,
            h.upid,
            Reverse(OrderedFloat(h.mvir)),
            h.id,
        )
    });
    order
}

/// Positions of the forest ordered by `(desc_id, -mvir, id)`: the
/// progenitors of one descendant are adjacent, most massive first.
pub fn progenitor_order(forest: &[HaloRecord]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..forest.len()).collect();
    order.sort_unstable_by_key(|&i| {
        let h = &forest[i];
        (h.desc_id, Reverse(OrderedFloat(h.mvir)), h.id)
    });
    order
}

/// Fill `first_halo_in_fof_group`, `next_halo_in_fof_group` and
/// `prev_halo_in_fof_group`. Requires `fof_id` to be assigned.
pub fn link_fof_groups(forest: &mut [HaloRecord]) -> Result<()> {
    let order = fof_group_order(forest);
    let groups: Vec<&[usize]> = order
        .chunk_by(|&a, &b| forest[a].fof_id == forest[b].fof_id)
        .collect();

    for group in groups {
        let head = group[0];
        let fof_id = forest[head].fof_id;
        if fof_id == NO_HALO || forest[head].id != fof_id {
            return Err(MergerTreeError::LineageConsistency {
                halo_id: forest[head].id,
                detail: format!(
                    "first halo of FOF group {} at scale {} is not the FOF host",
                    fof_id, forest[head].scale
                ),
            });
        }

        link_run(group, |pos, prev, next| {
            let h = &mut forest[pos];
            h.first_halo_in_fof_group = head as i64;
            h.prev_halo_in_fof_group = prev;
            h.next_halo_in_fof_group = next;
        });
    }

    Ok(())
}

/// Fill `descendant` for every halo with a `desc_id`.
///
/// The descendant must be in the same forest and live at the scale the
/// halo's `desc_scale` announces.
pub fn link_descendants(forest: &mut [HaloRecord], index: &IdIndex) -> Result<()> {
    for i in 0..forest.len() {
        if !forest[i].has_descendant() {
            continue;
        }
        let (halo_id, desc_id, desc_scale) = (forest[i].id, forest[i].desc_id, forest[i].desc_scale);

        let found = index.position_of(desc_id);
        let found_scale = found.map(|d| forest[d].scale);
        match found {
            Some(d) if found_scale == Some(desc_scale) => forest[i].descendant = d as i64,
            _ => {
                return Err(MergerTreeError::DanglingDescendant {
                    halo_id,
                    desc_id,
                    desc_scale,
                    found_scale,
                })
            }
        }
    }
    Ok(())
}

/// Fill `first_progenitor` on descendants and `next_progenitor` /
/// `prev_progenitor` on their progenitors. Requires `descendant` to be
/// linked already.
pub fn link_progenitors(forest: &mut [HaloRecord], index: &IdIndex) -> Result<()> {
    let order = progenitor_order(forest);
    let runs: Vec<&[usize]> = order
        .chunk_by(|&a, &b| forest[a].desc_id == forest[b].desc_id)
        .collect();

    for run in runs {
        let head = run[0];
        let desc_id = forest[head].desc_id;
        if desc_id == NO_HALO {
            continue;
        }

        let desc = index
            .position_of(desc_id)
            .ok_or_else(|| MergerTreeError::DanglingDescendant {
                halo_id: forest[head].id,
                desc_id,
                desc_scale: forest[head].desc_scale,
                found_scale: None,
            })?;

        if let Some(w) = run.windows(2).find(|w| forest[w[0]].mvir < forest[w[1]].mvir) {
            return Err(MergerTreeError::LineageConsistency {
                halo_id: forest[w[1]].id,
                detail: format!(
                    "progenitors of {} are not ordered by decreasing mass ({} before {})",
                    desc_id, forest[w[0]].mvir, forest[w[1]].mvir
                ),
            });
        }
        if let Some(&p) = run.iter().find(|&&p| forest[p].descendant != desc as i64) {
            return Err(MergerTreeError::LineageConsistency {
                halo_id: forest[p].id,
                detail: format!("progenitor does not point at its descendant {}", desc_id),
            });
        }
        if forest[desc].first_progenitor != NO_HALO {
            return Err(MergerTreeError::LineageConsistency {
                halo_id: desc_id,
                detail: format!(
                    "first progenitor already set to position {}",
                    forest[desc].first_progenitor
                ),
            });
        }

        forest[desc].first_progenitor = head as i64;
        link_run(run, |pos, prev, next| {
            let h = &mut forest[pos];
            h.prev_progenitor = prev;
            h.next_progenitor = next;
        });
    }

    Ok(())
}

/// Build the FOF-group chains and the descendant/progenitor links of a
/// forest whose `fof_id` is already assigned.
pub fn link_lineage(forest: &mut [HaloRecord]) -> Result<()> {
    link_fof_groups(forest)?;
    let index = IdIndex::new(forest)?;
    link_descendants(forest, &index)?;
    link_progenitors(forest, &index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::fof::assign_fof_ids;

    fn linked(mut forest: Vec<HaloRecord>) -> Result<Vec<HaloRecord>> {
        assign_fof_ids(&mut forest)?;
        link_lineage(&mut forest)?;
        Ok(forest)
    }

    #[test]
    fn test_fof_chain_orders_subhalos_by_mass() {
        // host 1 and three subhalos; 4 and 5 share a mass so id breaks the tie
        let forest = linked(vec![
            HaloRecord::new(4, -1, 1, 1, 1.0, -1.0, 2.0),
            HaloRecord::new(1, -1, -1, -1, 1.0, -1.0, 1.0),
            HaloRecord::new(5, -1, 1, 1, 1.0, -1.0, 2.0),
            HaloRecord::new(3, -1, 1, 1, 1.0, -1.0, 9.0),
        ])
        .unwrap();

        // chain: 1 (pos 1) -> 3 (pos 3) -> 4 (pos 0) -> 5 (pos 2)
        assert!(forest.iter().all(|h| h.first_halo_in_fof_group == 1));
        assert_eq!(forest[1].next_halo_in_fof_group, 3);
        assert_eq!(forest[3].next_halo_in_fof_group, 0);
        assert_eq!(forest[0].next_halo_in_fof_group, 2);
        assert_eq!(forest[2].next_halo_in_fof_group, -1);
        assert_eq!(forest[1].prev_halo_in_fof_group, -1);
        assert_eq!(forest[2].prev_halo_in_fof_group, 0);
    }

    #[test]
    fn test_missing_descendant_is_dangling() {
        let result = linked(vec![
            HaloRecord::new(1, -1, -1, -1, 1.0, -1.0, 1.0),
            HaloRecord::new(2, 42, -1, -1, 0.5, 1.0, 1.0),
        ]);
        match result {
            Err(MergerTreeError::DanglingDescendant { halo_id, desc_id, found_scale, .. }) => {
                assert_eq!((halo_id, desc_id, found_scale), (2, 42, None));
            }
            other => panic!("expected dangling descendant, got {other:?}"),
        }
    }

    #[test]
    fn test_descendant_scale_mismatch_is_dangling() {
        let result = linked(vec![
            HaloRecord::new(1, -1, -1, -1, 1.0, -1.0, 1.0),
            HaloRecord::new(2, 1, -1, -1, 0.5, 0.9, 1.0),
        ]);
        assert!(matches!(
            result,
            Err(MergerTreeError::DanglingDescendant { halo_id: 2, found_scale: Some(s), .. }) if s == 1.0
        ));
    }

    #[test]
    fn test_progenitor_chain_by_mass() {
        let forest = linked(vec![
            HaloRecord::new(1, -1, -1, -1, 1.0, -1.0, 10.0),
            HaloRecord::new(2, 1, -1, -1, 0.5, 1.0, 1.0),
            HaloRecord::new(3, 1, -1, -1, 0.5, 1.0, 7.0),
            HaloRecord::new(4, 1, 3, 3, 0.5, 1.0, 3.0),
        ])
        .unwrap();

        assert_eq!(forest[0].first_progenitor, 2);
        assert_eq!(forest[2].next_progenitor, 3);
        assert_eq!(forest[3].next_progenitor, 1);
        assert_eq!(forest[1].next_progenitor, -1);
        assert_eq!(forest[1].prev_progenitor, 3);
        assert_eq!(forest[2].prev_progenitor, -1);
        assert!(forest[1..].iter().all(|h| h.descendant == 0));
        assert_eq!(forest[0].descendant, -1);
        // halos without progenitors keep the sentinel
        assert!(forest[1..].iter().all(|h| h.first_progenitor == -1));
    }

    #[test]
    fn test_fof_group_spread_over_scales_is_inconsistent() {
        // subhalo claims a host living at another snapshot
        let result = linked(vec![
            HaloRecord::new(1, -1, -1, -1, 1.0, -1.0, 1.0),
            HaloRecord::new(2, -1, 1, 1, 0.5, -1.0, 5.0),
        ]);
        assert!(matches!(
            result,
            Err(MergerTreeError::LineageConsistency { halo_id: 2, .. })
        ));
    }
}
