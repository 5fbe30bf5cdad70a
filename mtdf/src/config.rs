use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use mtcore::algorithm::tree_walk::TreeWalkOpts;

use crate::error::{DataError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Bincode,
}

/// Settings of the `mtdf` tool. Every field may be left out of a config
/// file; command line flags override whatever the file sets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    pub forests_file: Option<PathBuf>,
    pub locations_file: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
    /// zstd-compress bincode output
    pub compress: bool,
    /// 0 = all cores
    pub num_threads: usize,
    pub skip_failed_forests: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        ConvertConfig {
            forests_file: None,
            locations_file: None,
            output: None,
            format: OutputFormat::Bincode,
            compress: true,
            num_threads: 0,
            skip_failed_forests: false,
        }
    }
}

impl ConvertConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let f = BufReader::new(File::open(path).map_err(|e| DataError::io(path, e))?);
        Ok(serde_json::from_reader(f)?)
    }

    pub fn tree_walk_opts(&self) -> TreeWalkOpts {
        TreeWalkOpts {
            num_threads: self.num_threads,
            skip_failed_forests: self.skip_failed_forests,
        }
    }
}
