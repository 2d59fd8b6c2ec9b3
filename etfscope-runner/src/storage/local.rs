//! Local directory backend.

use super::StorageError;
use std::fs;
use std::path::Path;

/// Recursively list files under `dir` with the given extension (no dot).
///
/// A directory that does not exist yet has no files.
pub fn list(dir: &Path, extension: &str) -> Result<Vec<String>, StorageError> {
    let mut files = Vec::new();
    if dir.is_dir() {
        walk(dir, extension, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn walk(dir: &Path, extension: &str, out: &mut Vec<String>) -> Result<(), StorageError> {
    let entries = fs::read_dir(dir).map_err(|e| StorageError::io(dir.display(), e))?;
    for entry in entries {
        let path = entry.map_err(|e| StorageError::io(dir.display(), e))?.path();
        if path.is_dir() {
            walk(&path, extension, out)?;
        } else if path.extension().is_some_and(|ext| ext == extension) {
            out.push(path.display().to_string());
        }
    }
    Ok(())
}

/// Write to `<path>.tmp` then rename into place, creating parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent.display(), e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    fs::write(tmp, bytes).map_err(|e| StorageError::io(tmp.display(), e))?;
    fs::rename(tmp, path).map_err(|e| {
        let _ = fs::remove_file(tmp);
        StorageError::io(path.display(), e)
    })
}
