use std::path::PathBuf;

use mtcore::error::MergerTreeError;
use thiserror::Error;

/// Errors raised while reading catalogue tables, tree data files or
/// persisted tables.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {detail}")]
    Parse {
        path: PathBuf,
        line: usize,
        detail: String,
    },

    #[error("Expected column '{column}' in '{path}', found columns {found:?}")]
    MissingColumn {
        path: PathBuf,
        column: String,
        found: Vec<String>,
    },

    #[error("Consistent-Trees writes the forests and locations files to the same directory, found {forests:?} and {locations:?}")]
    DirectoryMismatch { forests: PathBuf, locations: PathBuf },

    #[error("'{path}' is not a Consistent-Trees {expected} file (first line: '{first_line}')")]
    NotCtreesFile {
        path: PathBuf,
        expected: &'static str,
        first_line: String,
    },

    #[error("No forest with id {0} in the catalogue")]
    UnknownForest(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    MergerTree(#[from] MergerTreeError),
}

pub type Result<T> = std::result::Result<T, DataError>;

impl DataError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DataError::Io { path: path.into(), source }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(e: serde_json::Error) -> Self {
        DataError::Serialization(e.to_string())
    }
}

impl From<bincode::Error> for DataError {
    fn from(e: bincode::Error) -> Self {
        DataError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_display() {
        let err = DataError::MissingColumn {
            path: PathBuf::from("trees/forests.list"),
            column: "TreeRootID".to_string(),
            found: vec!["ForestID".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Expected column 'TreeRootID' in 'trees/forests.list', found columns [\"ForestID\"]"
        );
    }

    #[test]
    fn test_core_error_is_transparent() {
        let err: DataError = MergerTreeError::OrphanedHalo { nhalos: 3 }.into();
        assert_eq!(err.to_string(), "There are no FOF halos among the 3 halos passed");
    }
}
