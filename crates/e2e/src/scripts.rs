//! Script store cleanup - automation rule scripts left by previous runs

use std::path::Path;
use tracing::info;

use crate::error::E2eResult;

/// Remove everything inside the script store, leaving an empty directory.
///
/// A missing store is created. Returns the number of top-level entries removed.
pub fn delete_all(scripts_dir: &Path) -> E2eResult<usize> {
    if !scripts_dir.exists() {
        std::fs::create_dir_all(scripts_dir)?;
        info!("Created empty script store at {}", scripts_dir.display());
        return Ok(0);
    }

    let mut removed = 0;
    for entry in std::fs::read_dir(scripts_dir)? {
        let path = entry?.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        removed += 1;
    }

    info!("Deleted {} script store entries in {}", removed, scripts_dir.display());
    Ok(removed)
}
