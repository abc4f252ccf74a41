//! Configuration deployment by named profile
//!
//! A profile is a directory under the profiles root, e.g.
//! `tests/resources/configs/nominal/`. Deploying copies its whole tree into
//! the server working directory, overwriting what is there.

use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{E2eError, E2eResult};

/// Profile used by the dashboard tests
pub const NOMINAL_PROFILE: &str = "nominal";

/// Copy the files of `profile` into `target_dir`. Returns the number of files deployed.
pub fn deploy(profiles_dir: &Path, profile: &str, target_dir: &Path) -> E2eResult<usize> {
    let source = profiles_dir.join(profile);
    if !source.is_dir() {
        return Err(E2eError::ProfileNotFound(format!(
            "{} (looked in {})",
            profile,
            profiles_dir.display()
        )));
    }

    std::fs::create_dir_all(target_dir)?;
    let mut deployed = 0;

    for entry in WalkDir::new(&source).min_depth(1) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(&source)
            .map_err(|e| E2eError::ProfileNotFound(format!("{}: {}", entry.path().display(), e)))?;
        let destination = target_dir.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&destination)?;
        } else {
            if let Some(parent) = destination.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &destination)?;
            debug!("Deployed {}", relative.display());
            deployed += 1;
        }
    }

    info!("Deployed configuration '{}' ({} file(s)) to {}", profile, deployed, target_dir.display());
    Ok(deployed)
}
