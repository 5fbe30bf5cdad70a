use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use mtcore::data::tree::{FileSizeTable, ForestMembership, TreeLocation};

use crate::error::{DataError, Result};

/// Column shared by `forests.list` and `locations.dat`, used to join them.
pub const JOIN_COLUMN: &str = "TreeRootID";

const FOREST_COLUMNS: [&str; 2] = [JOIN_COLUMN, "ForestID"];
const LOCATION_COLUMNS: [&str; 4] = [JOIN_COLUMN, "FileID", "Offset", "Filename"];

fn first_line(path: &Path) -> Result<String> {
    let f = File::open(path).map_err(|e| DataError::io(path, e))?;
    let mut line = String::new();
    BufReader::new(f)
        .read_line(&mut line)
        .map_err(|e| DataError::io(path, e))?;
    Ok(line.trim_end().to_string())
}

/// Read a whitespace separated table whose first line names the columns
/// (`#TreeRootID ForestID ...`). Only the `required` columns are handed to
/// `row`, in the order they are listed there. Later `#` lines are comments.
fn read_table<T, F>(path: &Path, required: &[&str], mut row: F) -> Result<Vec<T>>
where
    F: FnMut(&[&str], usize) -> Result<T>,
{
    let f = File::open(path).map_err(|e| DataError::io(path, e))?;
    let mut lines = BufReader::new(f).lines();

    let header = match lines.next() {
        Some(line) => line.map_err(|e| DataError::io(path, e))?,
        None => String::new(),
    };
    let columns: Vec<String> = header
        .trim_start_matches('#')
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let mut picks = Vec::with_capacity(required.len());
    for &name in required {
        match columns.iter().position(|c| c == name) {
            Some(i) => picks.push(i),
            None => {
                return Err(DataError::MissingColumn {
                    path: path.to_path_buf(),
                    column: name.to_string(),
                    found: columns,
                })
            }
        }
    }

    let mut rows = Vec::new();
    for (lineno, line) in lines.enumerate() {
        let line = line.map_err(|e| DataError::io(path, e))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        // header is line 1
        let lineno = lineno + 2;

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < columns.len() {
            return Err(DataError::Parse {
                path: path.to_path_buf(),
                line: lineno,
                detail: format!("expected {} columns, found {}", columns.len(), fields.len()),
            });
        }
        let picked: Vec<&str> = picks.iter().map(|&i| fields[i]).collect();
        rows.push(row(&picked, lineno)?);
    }
    Ok(rows)
}

fn parse_i64(path: &Path, line: usize, column: &str, value: &str) -> Result<i64> {
    value.parse::<i64>().map_err(|e| DataError::Parse {
        path: path.to_path_buf(),
        line,
        detail: format!("column '{}': cannot parse '{}' as an integer ({})", column, value, e),
    })
}

/// Read a `forests.list` table.
pub fn read_forests_list(path: &Path) -> Result<Vec<ForestMembership>> {
    read_table(path, &FOREST_COLUMNS, |f, line| {
        Ok(ForestMembership::new(
            parse_i64(path, line, FOREST_COLUMNS[0], f[0])?,
            parse_i64(path, line, FOREST_COLUMNS[1], f[1])?,
        ))
    })
}

/// Read a `locations.dat` table.
///
/// Consistent-Trees writes bare filenames; those are prefixed with the
/// directory of the locations file so they can be opened from anywhere.
/// Filenames that already carry a directory are kept as they are.
pub fn read_locations(path: &Path) -> Result<Vec<TreeLocation>> {
    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    read_table(path, &LOCATION_COLUMNS, |f, line| {
        let filename = if f[3].contains('/') || dir.as_os_str().is_empty() {
            f[3].to_string()
        } else {
            dir.join(f[3]).to_string_lossy().into_owned()
        };
        Ok(TreeLocation::new(
            parse_i64(path, line, LOCATION_COLUMNS[0], f[0])?,
            parse_i64(path, line, LOCATION_COLUMNS[1], f[1])?,
            parse_i64(path, line, LOCATION_COLUMNS[2], f[2])?,
            filename,
        ))
    })
}

/// Read both catalogue tables.
///
/// # Arguments
///
/// * `forests_file` - path to `forests.list`
/// * `locations_file` - path to `locations.dat`, in the same directory
///
/// # Returns
///
/// * `(memberships, locations)` - the rows of both tables, in file order
///
pub fn read_locations_and_forests(
    forests_file: &Path,
    locations_file: &Path,
) -> Result<(Vec<ForestMembership>, Vec<TreeLocation>)> {
    if forests_file.parent() != locations_file.parent() {
        return Err(DataError::DirectoryMismatch {
            forests: forests_file.to_path_buf(),
            locations: locations_file.to_path_buf(),
        });
    }

    let t0 = Instant::now();
    info!("Reading forests file {:?}", forests_file);
    let memberships = read_forests_list(forests_file)?;
    info!(
        "Reading forests file {:?}...done ({} trees). Time taken = {:.2} seconds",
        forests_file,
        memberships.len(),
        t0.elapsed().as_secs_f64()
    );

    let t0 = Instant::now();
    info!("Reading locations file {:?}", locations_file);
    let locations = read_locations(locations_file)?;
    info!(
        "Reading locations file {:?}...done ({} trees). Time taken = {:.2} seconds",
        locations_file,
        locations.len(),
        t0.elapsed().as_secs_f64()
    );

    Ok((memberships, locations))
}

/// Size of every tree data file referenced by `locations`.
///
/// The files are stat'ed in parallel; catalogues on parallel file systems
/// can reference thousands of them.
pub fn file_size_table(locations: &[TreeLocation]) -> Result<FileSizeTable> {
    let filenames: BTreeSet<&str> = locations.iter().map(|l| l.filename.as_str()).collect();
    let filenames: Vec<&str> = filenames.into_iter().collect();

    let sizes: Vec<(&str, i64)> = filenames
        .par_iter()
        .map(|&filename| {
            let nbytes = fs::metadata(filename)
                .map_err(|e| DataError::io(filename, e))?
                .len() as i64;
            Ok((filename, nbytes))
        })
        .collect::<Result<_>>()?;

    for (filename, nbytes) in &sizes {
        debug!("{}: {} bytes", filename, nbytes);
    }
    Ok(sizes.into_iter().collect())
}

/// Sort two catalogue paths given in either order into
/// `(forests_file, locations_file)`.
///
/// The file whose header names `ForestID` is taken as the forests table. The
/// other one has to name `FileID`, `Offset` and `Filename`.
pub fn check_forests_locations_filenames(first: &Path, second: &Path) -> Result<(PathBuf, PathBuf)> {
    let (forests, locations) = if first_line(first)?.contains("ForestID") {
        (first, second)
    } else {
        (second, first)
    };

    let header = first_line(locations)?;
    if !LOCATION_COLUMNS[1..].iter().all(|c| header.contains(c)) {
        return Err(DataError::NotCtreesFile {
            path: locations.to_path_buf(),
            expected: "locations",
            first_line: header,
        });
    }

    Ok((forests.to_path_buf(), locations.to_path_buf()))
}

/// Companion files of a tree data file written by the parallel
/// Consistent-Trees code: `<dir>/<base>.forest`, `<dir>/<base>.loc` and
/// `<dir>/<base>.tree`.
pub fn parallel_ctrees_filenames(tree_file: &Path) -> (PathBuf, PathBuf, PathBuf) {
    (
        tree_file.with_extension("forest"),
        tree_file.with_extension("loc"),
        tree_file.with_extension("tree"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_read_forests_list_by_header() {
        let dir = tempfile::tempdir().unwrap();
        // columns out of the usual order, plus a comment line
        let path = write(dir.path(), "forests.list", "#ForestID TreeRootID\n#comment\n7 70\n7 71\n9 90\n");
        let rows = read_forests_list(&path).unwrap();
        assert_eq!(rows, vec![
            ForestMembership::new(70, 7),
            ForestMembership::new(71, 7),
            ForestMembership::new(90, 9),
        ]);
    }

    #[test]
    fn test_read_locations_prefixes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "locations.dat",
            "#TreeRootID FileID Offset Filename\n70 0 130 tree_0_0_0.dat\n71 1 80 /abs/tree_0_0_1.dat\n",
        );
        let rows = read_locations(&path).unwrap();
        assert_eq!(rows[0].filename, dir.path().join("tree_0_0_0.dat").to_string_lossy());
        assert_eq!(rows[0].offset, 130);
        assert_eq!(rows[1].filename, "/abs/tree_0_0_1.dat");
        assert_eq!(rows[1].file_id, 1);
    }

    #[test]
    fn test_missing_join_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "forests.list", "#RootID ForestID\n1 1\n");
        match read_forests_list(&path) {
            Err(DataError::MissingColumn { column, found, .. }) => {
                assert_eq!(column, "TreeRootID");
                assert_eq!(found, vec!["RootID", "ForestID"]);
            }
            other => panic!("expected missing column, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_row_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "forests.list", "#TreeRootID ForestID\n1 1\n2 x\n");
        assert!(matches!(read_forests_list(&path), Err(DataError::Parse { line: 3, .. })));

        let path = write(dir.path(), "short.list", "#TreeRootID ForestID\n1\n");
        assert!(matches!(read_forests_list(&path), Err(DataError::Parse { line: 2, .. })));
    }

    #[test]
    fn test_tables_in_different_directories() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let forests = write(a.path(), "forests.list", "#TreeRootID ForestID\n");
        let locations = write(b.path(), "locations.dat", "#TreeRootID FileID Offset Filename\n");
        assert!(matches!(
            read_locations_and_forests(&forests, &locations),
            Err(DataError::DirectoryMismatch { .. })
        ));
    }

    #[test]
    fn test_check_filenames_in_either_order() {
        let dir = tempfile::tempdir().unwrap();
        let forests = write(dir.path(), "forests.list", "#TreeRootID ForestID\n1 1\n");
        let locations = write(dir.path(), "locations.dat", "#TreeRootID FileID Offset Filename\n1 0 10 t.dat\n");

        let expected = (forests.clone(), locations.clone());
        assert_eq!(check_forests_locations_filenames(&forests, &locations).unwrap(), expected);
        assert_eq!(check_forests_locations_filenames(&locations, &forests).unwrap(), expected);

        let bogus = write(dir.path(), "bogus.dat", "#TreeRootID Offset\n");
        assert!(matches!(
            check_forests_locations_filenames(&forests, &bogus),
            Err(DataError::NotCtreesFile { expected: "locations", .. })
        ));
    }

    #[test]
    fn test_parallel_ctrees_filenames() {
        let (f, l, t) = parallel_ctrees_filenames(Path::new("/data/uchuu/tree_3.dat"));
        assert_eq!(f, PathBuf::from("/data/uchuu/tree_3.forest"));
        assert_eq!(l, PathBuf::from("/data/uchuu/tree_3.loc"));
        assert_eq!(t, PathBuf::from("/data/uchuu/tree_3.tree"));
    }

    #[test]
    fn test_file_size_table() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.dat", "0123456789");
        let b = write(dir.path(), "b.dat", "0123");
        let name = |p: &PathBuf| p.to_string_lossy().into_owned();
        let locations = vec![
            TreeLocation::new(1, 0, 0, name(&a)),
            TreeLocation::new(2, 0, 5, name(&a)),
            TreeLocation::new(3, 1, 0, name(&b)),
        ];
        let sizes = file_size_table(&locations).unwrap();
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes.get(&name(&a)), Some(10));
        assert_eq!(sizes.get(&name(&b)), Some(4));

        let missing = vec![TreeLocation::new(1, 0, 0, name(&dir.path().join("gone.dat")))];
        assert!(matches!(file_size_table(&missing), Err(DataError::Io { .. })));
    }
}
