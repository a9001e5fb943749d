use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::{Identify, Identity};

/// Search immediate entries of `dir` for a file with given identity
///
/// Returns `Ok(None)` if nothing matches (for example, rotated file was already removed), and an
/// error only if the directory itself could not be listed. Entries that disappear while scanning
/// are skipped. Symlinks are not followed.
pub fn find_by_identity(
    identity: Identity,
    dir: impl AsRef<Path>,
    identify: &impl Identify,
) -> io::Result<Option<PathBuf>> {
    if !identity.is_known() {
        return Ok(None);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if identity.matches(identify.identify(&metadata)) {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}
