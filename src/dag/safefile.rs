//! Atomic file writes and durable appends.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// Write `data` to `path` atomically: tempfile in the same directory, write,
/// fsync, chmod, rename over the target. Readers never observe partial
/// content; the tempfile is removed if any step before the rename fails.
pub fn safe_write(path: &Path, data: &[u8], mode: u32) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new().prefix(".tmp-").tempfile_in(dir)?;

    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    set_mode(tmp.as_file(), mode)?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(file: &std::fs::File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &std::fs::File, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Open `path` for append (creating it if missing), write `data`, fsync.
pub fn safe_append(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).create(true).open(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}
