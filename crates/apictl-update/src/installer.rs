//! Atomic replacement of the running executable
//!
//! The live binary is never rewritten in place. It is renamed aside to a
//! sibling backup, the verified staging file is renamed into its place,
//! and the result is re-checked. Any failure after the backup exists rolls
//! back by renaming the backup home again. All three paths share one
//! directory so every rename stays on one filesystem.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::download::{hash_file, remove_quietly};
use crate::error::{Result, UpdateError};
use crate::verify::VerifiedArtifact;

const BACKUP_SUFFIX: &str = ".backup";
const STAGING_SUFFIX: &str = ".staging";
const LOCK_SUFFIX: &str = ".update.lock";

/// Where the installer is in its sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Planning,
    BackingUp,
    Swapping,
    VerifyingSwap,
    Installed,
    RolledBack,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallState::Planning => "planning",
            InstallState::BackingUp => "backing-up",
            InstallState::Swapping => "swapping",
            InstallState::VerifyingSwap => "verifying-swap",
            InstallState::Installed => "installed",
            InstallState::RolledBack => "rolled-back",
        };
        f.write_str(name)
    }
}

/// What happens to the previous binary after a successful install
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackupRetention {
    #[default]
    Delete,
    /// Keep it until the next update replaces it
    KeepOne,
}

/// Target, backup, and staging paths for one install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    target_path: PathBuf,
    backup_path: PathBuf,
    staging_path: PathBuf,
    lock_path: PathBuf,
}

impl InstallPlan {
    /// Plan an install over `target`; touches nothing on disk
    pub fn for_target(target: impl Into<PathBuf>) -> Result<Self> {
        let target_path = target.into();
        let Some(file_name) = target_path.file_name().map(|n| n.to_os_string()) else {
            return Err(UpdateError::staging(
                &target_path,
                io::Error::new(io::ErrorKind::InvalidInput, "install target has no file name"),
            ));
        };

        let sibling = |suffix: &str| {
            let mut name = OsString::from(&file_name);
            name.push(suffix);
            target_path.with_file_name(name)
        };

        Ok(Self {
            backup_path: sibling(BACKUP_SUFFIX),
            staging_path: sibling(STAGING_SUFFIX),
            lock_path: sibling(LOCK_SUFFIX),
            target_path,
        })
    }

    /// Plan an install over the running executable
    pub fn for_current_exe() -> Result<Self> {
        let exe = std::env::current_exe()
            .and_then(|p| p.canonicalize())
            .map_err(|e| UpdateError::staging("<current executable>", e))?;
        Self::for_target(exe)
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

/// Result of a completed install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub state: InstallState,
    /// Previous binary, if it was kept
    pub backup: Option<PathBuf>,
}

/// Swaps a verified artifact into place
#[derive(Debug, Clone)]
pub struct Installer {
    retention: BackupRetention,
    verify_swap: bool,
}

impl Default for Installer {
    fn default() -> Self {
        Self {
            retention: BackupRetention::Delete,
            verify_swap: true,
        }
    }
}

impl Installer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(mut self, retention: BackupRetention) -> Self {
        self.retention = retention;
        self
    }

    /// Re-hash the installed file after the swap (on by default)
    pub fn with_verify_swap(mut self, verify: bool) -> Self {
        self.verify_swap = verify;
        self
    }

    /// Replace `plan.target_path()` with `artifact`
    pub fn install(
        &self,
        plan: &InstallPlan,
        artifact: VerifiedArtifact,
        cancel: &CancellationToken,
    ) -> Result<InstallReport> {
        let target = plan.target_path();
        let backup = plan.backup_path();
        transition(InstallState::Planning, target);

        transition(InstallState::BackingUp, target);
        if cancel.is_cancelled() {
            remove_quietly(artifact.path());
            return Err(UpdateError::Cancelled);
        }
        if let Err(source) = self.back_up(target, backup) {
            remove_quietly(artifact.path());
            return Err(UpdateError::BackupFailed {
                target: target.to_path_buf(),
                source,
            });
        }

        transition(InstallState::Swapping, target);
        if let Err(e) = swap_in(artifact.path(), target) {
            remove_quietly(artifact.path());
            return Err(self.roll_back(plan, format!("swap failed: {e}")));
        }

        if self.verify_swap {
            transition(InstallState::VerifyingSwap, target);
            if let Err(reason) = verify_installed(target, &artifact) {
                return Err(self.roll_back(plan, reason));
            }
        }

        transition(InstallState::Installed, target);
        let kept = self.settle_backup(backup);
        info!(target = %target.display(), sha256 = %artifact.sha256(), "new binary installed");

        Ok(InstallReport {
            state: InstallState::Installed,
            backup: kept,
        })
    }

    fn back_up(&self, target: &Path, backup: &Path) -> io::Result<()> {
        if fs::symlink_metadata(backup).is_ok() {
            // After a failed rollback the backup may be the only good copy.
            if !is_installed_binary(target) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!(
                        "{} holds the only copy of the previous binary; restore it before updating",
                        backup.display()
                    ),
                ));
            }
            fs::remove_file(backup)?;
            debug!(backup = %backup.display(), "removed stale backup");
        }
        fs::rename(target, backup)?;
        debug!(target = %target.display(), backup = %backup.display(), "live binary moved aside");
        Ok(())
    }

    fn settle_backup(&self, backup: &Path) -> Option<PathBuf> {
        match self.retention {
            BackupRetention::KeepOne => {
                info!(backup = %backup.display(), "previous binary kept");
                Some(backup.to_path_buf())
            }
            BackupRetention::Delete => match fs::remove_file(backup) {
                Ok(()) => None,
                Err(e) => {
                    // The old image can stay mapped on some platforms.
                    warn!(backup = %backup.display(), error = %e, "could not delete previous binary; keeping it");
                    Some(backup.to_path_buf())
                }
            },
        }
    }

    /// Put the backup back; `reason` is the failure that triggered this
    fn roll_back(&self, plan: &InstallPlan, reason: String) -> UpdateError {
        let target = plan.target_path();
        let backup = plan.backup_path();
        warn!(target = %target.display(), reason = %reason, "rolling back");

        // rename replaces whatever sits at the target in one step
        match fs::rename(backup, target) {
            Ok(()) => {
                transition(InstallState::RolledBack, target);
                UpdateError::SwapFailed {
                    target: target.to_path_buf(),
                    reason,
                }
            }
            Err(e) => {
                error!(
                    target = %target.display(),
                    backup = %backup.display(),
                    error = %e,
                    "rollback failed; restore the backup manually"
                );
                UpdateError::Fatal {
                    target: target.to_path_buf(),
                    backup: backup.to_path_buf(),
                    reason: format!("{reason}; restoring backup failed: {e}"),
                }
            }
        }
    }
}

fn is_installed_binary(target: &Path) -> bool {
    fs::metadata(target).is_ok_and(|m| m.is_file() && m.len() > 0)
}

fn transition(state: InstallState, target: &Path) {
    debug!(state = %state, target = %target.display(), "install state");
}

fn swap_in(staging: &Path, target: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staging, fs::Permissions::from_mode(0o755))?;
    }
    fs::rename(staging, target)
}

fn verify_installed(target: &Path, artifact: &VerifiedArtifact) -> std::result::Result<(), String> {
    let size = fs::metadata(target)
        .map_err(|e| format!("installed file unreadable: {e}"))?
        .len();
    if size != artifact.size() {
        return Err(format!(
            "installed size {size} does not match artifact size {}",
            artifact.size()
        ));
    }
    let (digest, _) = hash_file(target).map_err(|e| format!("re-hashing installed file: {e}"))?;
    if &digest != artifact.digest() {
        return Err(format!(
            "installed sha256 {} does not match artifact {}",
            hex::encode(digest),
            artifact.sha256()
        ));
    }
    Ok(())
}
