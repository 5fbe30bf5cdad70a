use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use mtcore::data::halo::HaloForest;
use mtcore::data::tree::{ForestInfoRecord, TreeLocationRecord};

use crate::config::OutputFormat;
use crate::data::handle::ForestCatalog;
use crate::error::{DataError, Result};

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

#[derive(Serialize, Deserialize)]
pub struct CatalogFile {
    pub version: u32,
    pub trees: Vec<TreeLocationRecord>,
    pub forests: Vec<ForestInfoRecord>,
}

impl CatalogFile {
    pub fn new(trees: Vec<TreeLocationRecord>, forests: Vec<ForestInfoRecord>) -> Self {
        Self { version: 1, trees, forests }
    }
}

#[derive(Serialize, Deserialize)]
pub struct HaloForestFile {
    pub version: u32,
    pub forests: Vec<HaloForest>,
}

impl HaloForestFile {
    pub fn new(forests: Vec<HaloForest>) -> Self {
        Self { version: 1, forests }
    }
}

// --- JSON (human-readable) ---
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let f = BufWriter::new(File::create(path).map_err(|e| DataError::io(path, e))?);
    serde_json::to_writer_pretty(f, value)?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = BufReader::new(File::open(path).map_err(|e| DataError::io(path, e))?);
    Ok(serde_json::from_reader(f)?)
}

// --- Bincode + optional zstd compression ---
pub fn save_bincode<T: Serialize>(path: &Path, value: &T, compress: bool) -> Result<()> {
    let f = File::create(path).map_err(|e| DataError::io(path, e))?;
    if compress {
        let mut zw = zstd::Encoder::new(f, 3).map_err(|e| DataError::io(path, e))?;
        bincode::serialize_into(&mut zw, value)?;
        zw.finish().map_err(|e| DataError::io(path, e))?;
        Ok(())
    } else {
        let mut bw = BufWriter::new(f);
        bincode::serialize_into(&mut bw, value)?;
        Ok(())
    }
}

/// Load a bincode file, zstd-compressed or not.
pub fn load_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut magic = [0u8; 4];
    let is_zstd = File::open(path)
        .and_then(|mut f| f.read_exact(&mut magic))
        .map(|_| magic == ZSTD_MAGIC)
        .unwrap_or(false);

    let f = BufReader::new(File::open(path).map_err(|e| DataError::io(path, e))?);
    if is_zstd {
        let zr = zstd::Decoder::with_buffer(f).map_err(|e| DataError::io(path, e))?;
        Ok(bincode::deserialize_from(zr)?)
    } else {
        Ok(bincode::deserialize_from(f)?)
    }
}

fn save<T: Serialize>(path: &Path, value: &T, format: OutputFormat, compress: bool) -> Result<()> {
    match format {
        OutputFormat::Json => save_json(path, value),
        OutputFormat::Bincode => save_bincode(path, value, compress),
    }
}

fn load<T: DeserializeOwned>(path: &Path, format: OutputFormat) -> Result<T> {
    match format {
        OutputFormat::Json => load_json(path),
        OutputFormat::Bincode => load_bincode(path),
    }
}

pub fn save_catalog(path: &Path, catalog: &ForestCatalog, format: OutputFormat, compress: bool) -> Result<()> {
    let file = CatalogFile::new(catalog.trees.clone(), catalog.forests.clone());
    save(path, &file, format, compress)
}

pub fn load_catalog(path: &Path, format: OutputFormat) -> Result<ForestCatalog> {
    let file: CatalogFile = load(path, format)?;
    ForestCatalog::from_tables(file.trees, file.forests)
}

pub fn save_halo_forests(path: &Path, forests: &[HaloForest], format: OutputFormat, compress: bool) -> Result<()> {
    save(path, &HaloForestFile::new(forests.to_vec()), format, compress)
}

pub fn load_halo_forests(path: &Path, format: OutputFormat) -> Result<Vec<HaloForest>> {
    let file: HaloForestFile = load(path, format)?;
    Ok(file.forests)
}
