use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempPath};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory {path} missing or not writable: {message}")]
    OutputDir { path: PathBuf, message: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl PersistError {
    fn output_dir(dir: &Path, message: impl ToString) -> Self {
        PersistError::OutputDir {
            path: dir.to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::output_dir(dir, e))?;
        if !meta.is_dir() {
            return Err(PersistError::output_dir(dir, "path is not a directory"));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::output_dir(dir, e))?;
    }
    // Creating a temp file checks writability.
    NamedTempFile::new_in(dir).map_err(|e| PersistError::output_dir(dir, e))?;
    Ok(())
}

/// A hidden scratch file next to its final destination.
///
/// Writers fill [`StagedFile::path`] and call [`StagedFile::commit`] once the
/// content is complete. Dropping an uncommitted `StagedFile` deletes the
/// scratch file, so a failed write never leaves anything under the final name.
#[derive(Debug)]
pub struct StagedFile {
    scratch: TempPath,
    target: PathBuf,
}

impl StagedFile {
    pub fn new(target: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let target = target.into();
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let scratch = tempfile::Builder::new()
            .prefix(".bundler-")
            .suffix(".part")
            .tempfile_in(&dir)?
            .into_temp_path();
        Ok(Self { scratch, target })
    }

    pub fn path(&self) -> &Path {
        &self.scratch
    }

    /// Move the scratch file to its destination, replacing any existing file.
    pub fn commit(self) -> Result<PathBuf, PersistError> {
        if self.target.exists() {
            fs::remove_file(&self.target)?;
        }
        self.scratch
            .persist(&self.target)
            .map_err(|e| PersistError::Io(e.error))?;
        Ok(self.target)
    }
}
