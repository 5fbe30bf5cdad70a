pub mod error;

pub mod data {
    pub mod halo;
    pub mod tree;
}

pub mod algorithm {
    pub mod byte_range;
    pub mod fof;
    pub mod forest_info;
    pub mod lineage;
    pub mod tree_walk;
    pub mod utility;
}

pub use algorithm::byte_range::resolve_byte_ranges;
pub use algorithm::fof::assign_fof_ids;
pub use algorithm::forest_info::aggregate_forest_info;
pub use algorithm::tree_walk::{build_tree_walk_indices, build_tree_walk_indices_par, TreeWalkOpts};
pub use error::{MergerTreeError, Result};
