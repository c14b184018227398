use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory missing or not writable: {0}")]
    Directory(String),
    #[error("not a file path: {0}")]
    NotAFile(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure the state directory exists; create it if missing.
pub fn ensure_state_dir(dir: &Path) -> Result<(), PersistError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(PersistError::Directory(format!(
            "{} is not a directory",
            dir.display()
        ))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| PersistError::Directory(e.to_string()))
        }
        Err(err) => Err(PersistError::Directory(err.to_string())),
    }
}

/// Replace `target` with `content` through a synced sibling temp file and a
/// single rename. Readers see the old record or the new one, never a mix.
pub fn replace_atomically(target: &Path, content: &[u8]) -> Result<(), PersistError> {
    let Some(name) = target.file_name() else {
        return Err(PersistError::NotAFile(target.display().to_string()));
    };
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_state_dir(dir)?;

    let prefix = format!(".{}.", name.to_string_lossy());
    let mut tmp = Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file_mut().sync_all()?;

    tmp.persist(target).map_err(|e| PersistError::Io(e.error))?;
    Ok(())
}
