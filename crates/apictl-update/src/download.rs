//! Streaming artifact download into a staging file
//!
//! The body is written chunk by chunk while a SHA-256 accumulator runs
//! alongside, so the artifact is never held in memory. A drop guard owns
//! the staging file until the download completes; every early return,
//! including cancellation, removes it.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use apictl_core::RuntimeConfig;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, UpdateError};

/// Read buffer size for hashing files already on disk (1MB)
const HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// A fully downloaded, not yet verified, staging file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    path: PathBuf,
    sha256: String,
    digest: [u8; 32],
    size: u64,
}

impl DownloadResult {
    /// Adopt a file that is already on disk, hashing it
    pub fn from_file(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let (digest, size) = hash_file(&path)?;
        Ok(Self {
            sha256: hex::encode(digest),
            path,
            digest,
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercase hex SHA-256 of the content
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Remove the staging file; used when the download is rejected
    pub(crate) fn discard(self) {
        remove_quietly(&self.path);
    }
}

/// Downloads artifacts over HTTP
#[derive(Debug, Clone)]
pub struct ArtifactFetcher {
    client: reqwest::Client,
    show_progress: bool,
}

impl ArtifactFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            show_progress: false,
        }
    }

    /// Build a client with the configured download timeout and user agent
    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.network.user_agent)
            .timeout(Duration::from_secs(config.network.download_timeout_secs))
            .build()
            .map_err(|e| UpdateError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::new(client).with_progress(config.display.progress))
    }

    /// Enable or disable the terminal progress bar
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Stream `url` into `staging_path`, hashing as it goes
    ///
    /// A stale file at `staging_path` is replaced. On any error the staging
    /// file is gone by the time this returns.
    pub async fn fetch(
        &self,
        url: &str,
        staging_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<DownloadResult> {
        debug!(url, staging = %staging_path.display(), "starting download");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
            res = self.client.get(url).send() => res
                .map_err(|e| UpdateError::Network(format!("request to {url} failed: {e}")))?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Server {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let expected_len = response.content_length();
        if let Some(len) = expected_len {
            info!("Downloading {} ({})", url, human_readable_size(len));
        }

        let mut guard = StagingGuard::new(staging_path);
        let mut file = tokio::fs::File::create(staging_path)
            .await
            .map_err(|e| UpdateError::staging(staging_path, e))?;

        let progress = self.progress_bar(expected_len);
        let mut hasher = Sha256::new();
        let mut size: u64 = 0;
        let mut stream = response.bytes_stream();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    progress.abandon();
                    debug!(bytes = size, "download cancelled");
                    return Err(UpdateError::Cancelled);
                }
                next = stream.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(|e| {
                progress.abandon();
                UpdateError::Network(format!("reading body of {url}: {e}"))
            })?;

            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| UpdateError::staging(staging_path, e))?;
            size += chunk.len() as u64;
            progress.set_position(size);
        }

        if let Some(expected) = expected_len {
            if size != expected {
                progress.abandon();
                return Err(UpdateError::Network(format!(
                    "body of {url} truncated: expected {expected} bytes, got {size}"
                )));
            }
        }

        file.flush()
            .await
            .map_err(|e| UpdateError::staging(staging_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| UpdateError::staging(staging_path, e))?;
        drop(file);
        progress.finish_and_clear();

        let digest: [u8; 32] = hasher.finalize().into();
        guard.disarm();

        let result = DownloadResult {
            path: staging_path.to_path_buf(),
            sha256: hex::encode(digest),
            digest,
            size,
        };
        info!(size, sha256 = %result.sha256, "download complete");
        Ok(result)
    }

    fn progress_bar(&self, total: Option<u64>) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total.unwrap_or(0));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

/// Deletes the staging file on drop unless disarmed
struct StagingGuard {
    path: PathBuf,
    armed: bool,
}

impl StagingGuard {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if self.armed {
            remove_quietly(&self.path);
        }
    }
}

pub(crate) fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed staging file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove staging file"),
    }
}

/// SHA-256 digest and size of a file on disk
pub fn hash_file(path: &Path) -> io::Result<([u8; 32], u64)> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];
    let mut size = 0u64;

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        size += bytes_read as u64;
    }

    Ok((hasher.finalize().into(), size))
}

/// Convert bytes to human-readable size
fn human_readable_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}
