use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{RenderError, Result};

/// Writes `bytes` to `path` through a temporary file in the same directory.
///
/// The temporary file is removed on every failure path when it drops.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    persist(stage(path, bytes)?, path)
}

/// Writes several files so that either all of them land or none do.
///
/// Every file is staged before any is persisted. If a later rename fails,
/// the files already moved into place are removed again.
pub(crate) fn write_all_atomic(files: &[(&Path, &[u8])]) -> Result<()> {
    let staged = files
        .iter()
        .map(|(path, bytes)| stage(path, bytes))
        .collect::<Result<Vec<_>>>()?;

    let mut placed: Vec<&Path> = Vec::with_capacity(files.len());
    for (tmp, (path, _)) in staged.into_iter().zip(files) {
        if let Err(e) = persist(tmp, path) {
            for done in placed {
                let _ = std::fs::remove_file(done);
            }
            return Err(e);
        }
        placed.push(path);
    }
    Ok(())
}

fn stage(path: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

fn persist(tmp: NamedTempFile, path: &Path) -> Result<()> {
    tmp.persist(path).map_err(|e| RenderError::Persist {
        path: path.display().to_string(),
        source: e.error,
    })?;
    Ok(())
}
