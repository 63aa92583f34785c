//! Process-wide serialisation of updates to one target

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use tracing::{debug, warn};

use crate::error::{Result, UpdateError};

/// Exclusive advisory lock on `<target>.update.lock`, released on drop
#[derive(Debug)]
pub struct UpdateLock {
    file: File,
    path: PathBuf,
}

impl UpdateLock {
    /// Take the lock without waiting; a held lock is `Locked`
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| UpdateError::staging(path, e))?;

        match file.try_lock_exclusive() {
            Ok(true) => {
                debug!(path = %path.display(), "update lock acquired");
                Ok(Self {
                    file,
                    path: path.to_path_buf(),
                })
            }
            Ok(false) => Err(UpdateError::Locked {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(UpdateError::staging(path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release update lock");
        }
    }
}
