//! Integrity checks between download and install
//!
//! A [`DownloadResult`] goes in; either a [`VerifiedArtifact`] comes out or
//! the staging file is deleted and an error returned. `VerifiedArtifact`
//! can only be minted here, so the installer never sees unchecked bytes.

use std::path::{Path, PathBuf};

use apictl_core::types::UpdateConfig;
use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use tracing::{debug, warn};

use crate::download::DownloadResult;
use crate::error::{Result, UpdateError};

/// A staging file whose hash (and signature, when present) checked out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedArtifact {
    path: PathBuf,
    sha256: String,
    digest: [u8; 32],
    size: u64,
}

impl VerifiedArtifact {
    pub(crate) fn new(download: DownloadResult) -> Self {
        Self {
            path: download.path().to_path_buf(),
            sha256: download.sha256().to_string(),
            digest: *download.digest(),
            size: download.size(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Checks SHA-256 and optional Ed25519 signatures
#[derive(Debug, Clone, Default)]
pub struct IntegrityVerifier {
    trusted_key: Option<VerifyingKey>,
    require_signature: bool,
}

impl IntegrityVerifier {
    /// A verifier with no trusted key that accepts unsigned artifacts
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure from the `update` section of the runtime config
    pub fn from_config(config: &UpdateConfig) -> Result<Self> {
        let verifier = Self::new().require_signature(config.require_signature);
        match config.trusted_public_key.as_deref() {
            Some(key) if !key.trim().is_empty() => verifier.with_trusted_key(key),
            _ => Ok(verifier),
        }
    }

    /// Trust an Ed25519 public key given as hex or base64
    pub fn with_trusted_key(mut self, encoded: &str) -> Result<Self> {
        self.trusted_key = Some(parse_public_key(encoded)?);
        Ok(self)
    }

    pub fn with_verifying_key(mut self, key: VerifyingKey) -> Self {
        self.trusted_key = Some(key);
        self
    }

    /// Reject artifacts that carry no signature
    pub fn require_signature(mut self, required: bool) -> Self {
        self.require_signature = required;
        self
    }

    /// Check a download against the advertised hash and signature
    ///
    /// The signature, when present, is checked even if the hash matches and
    /// is over the 32-byte SHA-256 digest of the artifact.
    pub fn verify(
        &self,
        download: DownloadResult,
        expected_sha256: &str,
        signature: Option<&str>,
    ) -> Result<VerifiedArtifact> {
        match self.check(&download, expected_sha256, signature) {
            Ok(()) => {
                debug!(path = %download.path().display(), "artifact verified");
                Ok(VerifiedArtifact::new(download))
            }
            Err(err) => {
                warn!(error = %err, "rejecting downloaded artifact");
                download.discard();
                Err(err)
            }
        }
    }

    fn check(
        &self,
        download: &DownloadResult,
        expected_sha256: &str,
        signature: Option<&str>,
    ) -> Result<()> {
        let expected = expected_sha256.trim();
        if !expected.eq_ignore_ascii_case(download.sha256()) {
            return Err(UpdateError::HashMismatch {
                expected: expected.to_ascii_lowercase(),
                actual: download.sha256().to_string(),
            });
        }

        let signature = signature.map(str::trim).filter(|s| !s.is_empty());
        let Some(signature) = signature else {
            if self.require_signature {
                return Err(UpdateError::SignatureMissing);
            }
            warn!("artifact is not signed; accepting on hash alone");
            return Ok(());
        };

        let key = self.trusted_key.as_ref().ok_or_else(|| {
            UpdateError::SignatureInvalid("artifact is signed but no trusted key is configured".into())
        })?;
        let signature = parse_signature(signature)?;
        key.verify(download.digest(), &signature)
            .map_err(|_| UpdateError::SignatureInvalid("signature does not match artifact".into()))
    }
}

fn parse_public_key(raw: &str) -> Result<VerifyingKey> {
    let bytes = decode_hex_or_base64(raw).map_err(UpdateError::InvalidPublicKey)?;
    let key_bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| UpdateError::InvalidPublicKey("Ed25519 public key must decode to 32 bytes".into()))?;
    VerifyingKey::from_bytes(&key_bytes)
        .map_err(|_| UpdateError::InvalidPublicKey("not a valid Ed25519 point".into()))
}

fn parse_signature(raw: &str) -> Result<Signature> {
    let bytes = decode_hex_or_base64(raw).map_err(UpdateError::SignatureInvalid)?;
    let sig_bytes: [u8; 64] = bytes
        .try_into()
        .map_err(|_| UpdateError::SignatureInvalid("Ed25519 signature must decode to 64 bytes".into()))?;
    Ok(Signature::from_bytes(&sig_bytes))
}

fn decode_hex_or_base64(raw: &str) -> std::result::Result<Vec<u8>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("value is empty".into());
    }
    if trimmed.len() % 2 == 0 && trimmed.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return hex::decode(trimmed).map_err(|e| e.to_string());
    }

    general_purpose::STANDARD
        .decode(trimmed)
        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(trimmed))
        .or_else(|_| general_purpose::URL_SAFE.decode(trimmed))
        .or_else(|_| general_purpose::URL_SAFE_NO_PAD.decode(trimmed))
        .map_err(|_| "value must be base64 or hex encoded".into())
}
