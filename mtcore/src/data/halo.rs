use serde::{Deserialize, Serialize};

/// Sentinel used by the catalogues for "no halo", and by the tree-walk
/// indices for "not linked".
pub const NO_HALO: i64 = -1;

/// Names of the tree-walk index columns, in the order the writer lays them out.
pub const TREE_WALK_COLUMNS: [&str; 8] = [
    "FofID",
    "FirstHaloInFOFgroup",
    "NextHaloInFOFgroup",
    "PrevHaloInFOFgroup",
    "FirstProgenitor",
    "NextProgenitor",
    "PrevProgenitor",
    "Descendant",
];

/// A single halo of a forest with the catalogue columns the index builder
/// needs, plus the tree-walk indices it fills.
///
/// `fof_id` is a catalogue id. The other seven index fields are positions
/// into the forest slice the halo lives in; reordering that slice
/// invalidates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaloRecord {
    pub id: i64,
    pub desc_id: i64,
    pub pid: i64,
    pub upid: i64,
    pub scale: f64,
    pub desc_scale: f64,
    pub mvir: f64,

    pub fof_id: i64,
    pub first_halo_in_fof_group: i64,
    pub next_halo_in_fof_group: i64,
    pub prev_halo_in_fof_group: i64,
    pub first_progenitor: i64,
    pub next_progenitor: i64,
    pub prev_progenitor: i64,
    pub descendant: i64,
}

impl HaloRecord {
    pub fn new(
        id: i64,
        desc_id: i64,
        pid: i64,
        upid: i64,
        scale: f64,
        desc_scale: f64,
        mvir: f64,
    ) -> Self {
        HaloRecord {
            id,
            desc_id,
            pid,
            upid,
            scale,
            desc_scale,
            mvir,
            fof_id: NO_HALO,
            first_halo_in_fof_group: NO_HALO,
            next_halo_in_fof_group: NO_HALO,
            prev_halo_in_fof_group: NO_HALO,
            first_progenitor: NO_HALO,
            next_progenitor: NO_HALO,
            prev_progenitor: NO_HALO,
            descendant: NO_HALO,
        }
    }

    pub fn is_fof_host(&self) -> bool {
        self.pid == NO_HALO
    }

    pub fn has_descendant(&self) -> bool {
        self.desc_id != NO_HALO
    }

    /// Set all eight tree-walk indices back to `NO_HALO`.
    pub fn reset_tree_walk_indices(&mut self) {
        self.fof_id = NO_HALO;
        self.first_halo_in_fof_group = NO_HALO;
        self.next_halo_in_fof_group = NO_HALO;
        self.prev_halo_in_fof_group = NO_HALO;
        self.first_progenitor = NO_HALO;
        self.next_progenitor = NO_HALO;
        self.prev_progenitor = NO_HALO;
        self.descendant = NO_HALO;
    }

    /// The tree-walk indices in `TREE_WALK_COLUMNS` order.
    pub fn tree_walk_indices(&self) -> [i64; 8] {
        [
            self.fof_id,
            self.first_halo_in_fof_group,
            self.next_halo_in_fof_group,
            self.prev_halo_in_fof_group,
            self.first_progenitor,
            self.next_progenitor,
            self.prev_progenitor,
            self.descendant,
        ]
    }
}

/// All halos of one forest, every snapshot mixed, in file order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaloForest {
    pub forest_id: i64,
    pub halos: Vec<HaloRecord>,
}

impl HaloForest {
    pub fn new(forest_id: i64, halos: Vec<HaloRecord>) -> Self {
        HaloForest { forest_id, halos }
    }

    pub fn nhalos(&self) -> usize {
        self.halos.len()
    }
}
