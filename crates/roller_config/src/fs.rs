//! Filesystem helpers shared by every config writer.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

/// Replace the file at `path` with `contents` atomically.
///
/// The data goes to a temporary file in the same directory, is synced, and is
/// then renamed over `path`. A reader (or a crash) sees either the old file or
/// the new one, never a truncated mix.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
