//! Helpers for coordinator and installer tests

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use apictl_update::{
    ArtifactFetcher, DownloadResult, IntegrityVerifier, Result, UpdateDescriptor, UpdateRequest,
    VerifiedArtifact, VersionOracle,
};
use async_trait::async_trait;
use tempfile::TempDir;

use super::builders::sha256_hex;
use super::constants::*;

/// Oracle that always offers the same descriptor
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    descriptor: Option<UpdateDescriptor>,
    calls: Arc<AtomicU32>,
    last_request: Arc<std::sync::Mutex<Option<UpdateRequest>>>,
}

impl StaticOracle {
    pub fn offering(descriptor: UpdateDescriptor) -> Self {
        Self {
            descriptor: Some(descriptor),
            ..Self::default()
        }
    }

    pub fn nothing() -> Self {
        Self::default()
    }

    /// Shared call counter, usable after the oracle is moved
    pub fn calls(&self) -> Arc<AtomicU32> {
        self.calls.clone()
    }

    pub fn last_request(&self) -> Arc<std::sync::Mutex<Option<UpdateRequest>>> {
        self.last_request.clone()
    }
}

#[async_trait]
impl VersionOracle for StaticOracle {
    async fn next_update(&self, request: &UpdateRequest) -> Result<Option<UpdateDescriptor>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(self.descriptor.clone())
    }
}

/// Fetcher without a progress bar
pub fn quiet_fetcher() -> ArtifactFetcher {
    ArtifactFetcher::new(reqwest::Client::new()).with_progress(false)
}

/// Temp dir holding a fake live binary; returns (dir, target path)
pub fn install_dir() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join(TARGET_NAME);
    write_executable(&target, LIVE_BINARY_CONTENT);
    (dir, target)
}

/// Write a file and mark it executable
pub fn write_executable(path: &Path, content: &[u8]) {
    fs::write(path, content).unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }
}

/// Stage `content` at `staging` and push it through an unsigned verifier
pub fn verified_artifact(staging: &Path, content: &[u8]) -> VerifiedArtifact {
    fs::write(staging, content).unwrap();
    let download = DownloadResult::from_file(staging).unwrap();
    IntegrityVerifier::new()
        .verify(download, &sha256_hex(content), None)
        .unwrap()
}

/// Sorted (file name, contents) of every file in `dir`
pub fn dir_snapshot(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_file())
        .map(|p| {
            let name = p.file_name().unwrap().to_string_lossy().into_owned();
            let bytes = fs::read(&p).unwrap();
            (name, bytes)
        })
        .collect();
    entries.sort();
    entries
}

/// File names in `dir`, sorted
pub fn dir_names(dir: &Path) -> Vec<String> {
    dir_snapshot(dir).into_iter().map(|(name, _)| name).collect()
}
