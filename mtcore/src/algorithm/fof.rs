use crate::algorithm::utility::IdIndex;
use crate::data::halo::{HaloRecord, NO_HALO};
use crate::error::{MergerTreeError, Result};

#[derive(Clone, Copy)]
enum ParentField {
    Upid,
    Pid,
}

impl ParentField {
    #[inline]
    fn of(self, halo: &HaloRecord) -> i64 {
        match self {
            ParentField::Upid => halo.upid,
            ParentField::Pid => halo.pid,
        }
    }
}

/// Fill `fof_id` for every halo of one forest.
///
/// Halos with `pid == -1` are FOF hosts and get their own id. Every other
/// halo inherits the group of the halo its `upid` (then `pid`) points to,
/// repeating until nested subhalos are resolved as well. Within a pass the
/// `upid` phase only sees groups resolved before the pass started. The tree-walk
/// indices are expected to hold `-1` on entry.
///
/// # Arguments
///
/// * `forest` - every halo of the forest, all snapshots mixed
///
/// # Returns
///
/// * `()` - `fof_id` is filled in place; `upid` is unchanged on return,
///   also when an error is returned
///
pub fn assign_fof_ids(forest: &mut [HaloRecord]) -> Result<()> {
    let hosts: Vec<usize> = (0..forest.len()).filter(|&i| forest[i].is_fof_host()).collect();
    if hosts.is_empty() {
        return Err(MergerTreeError::OrphanedHalo { nhalos: forest.len() });
    }

    // hosts point at themselves while resolving, so upid works for every halo
    for &i in &hosts {
        let id = forest[i].id;
        forest[i].upid = id;
        forest[i].fof_id = id;
    }

    let result = resolve_subhalos(forest);

    for &i in &hosts {
        forest[i].upid = NO_HALO;
    }

    result
}

fn resolve_subhalos(forest: &mut [HaloRecord]) -> Result<()> {
    let index = IdIndex::new(forest)?;

    let mut remaining: Vec<usize> = (0..forest.len())
        .filter(|&i| forest[i].fof_id == NO_HALO)
        .collect();

    while !remaining.is_empty() {
        let before = remaining.len();

        for field in [ParentField::Upid, ParentField::Pid] {
            // a phase only sees groups resolved before it started
            let resolved: Vec<(usize, i64)> = remaining
                .iter()
                .filter_map(|&i| {
                    let parent = index.position_of(field.of(&forest[i]))?;
                    let fof_id = forest[parent].fof_id;
                    (fof_id != NO_HALO).then_some((i, fof_id))
                })
                .collect();
            for (i, fof_id) in resolved {
                forest[i].fof_id = fof_id;
            }
            remaining.retain(|&i| forest[i].fof_id == NO_HALO);
            if remaining.is_empty() {
                break;
            }
        }

        if remaining.len() == before {
            return Err(MergerTreeError::UnresolvableHierarchy {
                unresolved: remaining.len(),
                sample_ids: remaining.iter().take(5).map(|&i| forest[i].id).collect(),
            });
        }
    }

    Ok(())
}
