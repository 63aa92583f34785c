//! Builders and helpers for update descriptors
//!
//! Provides a fluent API for UpdateDescriptor with sensible defaults,
//! plus hashing and Ed25519 signing that mirror what the release
//! pipeline produces.

use apictl_update::{Platform, UpdateDescriptor, Version};
use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};

use super::constants::*;

/// Lowercase hex SHA-256 of `content`
pub fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// The release signing key used across tests
pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&SIGNING_KEY_SEED)
}

/// Hex public key matching [`signing_key`]
pub fn public_key_hex() -> String {
    hex::encode(signing_key().verifying_key().to_bytes())
}

/// Sign the SHA-256 digest of `content`, hex encoded
pub fn sign_hex(key: &SigningKey, content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    hex::encode(key.sign(digest.as_slice()).to_bytes())
}

pub fn linux_amd64() -> Platform {
    Platform::new(ARCH_AMD64, OS_LINUX)
}

pub fn version(text: &str) -> Version {
    Version::parse(text).expect("test version must parse")
}

/// Builder for UpdateDescriptor with sensible test defaults
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    version: String,
    url: String,
    sha256: String,
    signature: Option<String>,
    platform: Platform,
}

impl DescriptorBuilder {
    /// Defaults: 0.10.0 for linux/amd64, hash of NEW_BINARY_CONTENT, unsigned
    pub fn new() -> Self {
        Self {
            version: VERSION_0_10_0.to_string(),
            url: format!("http://127.0.0.1:9{ARTIFACT_PATH}"),
            sha256: sha256_hex(NEW_BINARY_CONTENT),
            signature: None,
            platform: linux_amd64(),
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Point at ARTIFACT_PATH on a mock server
    pub fn served_by(self, server_uri: &str) -> Self {
        self.url(format!("{server_uri}{ARTIFACT_PATH}"))
    }

    pub fn sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = sha256.into();
        self
    }

    /// Advertise the hash of `content`
    pub fn content(mut self, content: &[u8]) -> Self {
        self.sha256 = sha256_hex(content);
        self
    }

    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn platform(mut self, arch: &str, os: &str) -> Self {
        self.platform = Platform::new(arch, os);
        self
    }

    pub fn build(self) -> UpdateDescriptor {
        UpdateDescriptor {
            next_version: version(&self.version),
            artifact_url: self.url,
            sha256: self.sha256,
            signature: self.signature,
            platform: self.platform,
        }
    }
}

impl Default for DescriptorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
