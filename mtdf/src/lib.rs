pub mod config;
pub mod error;

pub mod data {
    pub mod catalog;
    pub mod handle;
    pub mod io;
}
