//! Database reset - start every test from an empty server database

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::E2eResult;

/// Files SQLite may leave next to the main database
const SIDECAR_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// Delete the server database and its SQLite sidecar files.
///
/// The server recreates an empty database on next start. Missing files are
/// not an error. Returns the number of files removed.
pub fn reset(db_path: &Path) -> E2eResult<usize> {
    let mut removed = 0;

    for path in std::iter::once(db_path.to_path_buf()).chain(sidecar_paths(db_path)) {
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed {}", path.display());
                removed += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    info!("Database reset ({} file(s) removed from {})", removed, db_path.display());
    Ok(removed)
}

fn sidecar_paths(db_path: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    SIDECAR_SUFFIXES.iter().map(move |suffix| {
        let mut name = OsString::from(db_path.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    })
}
