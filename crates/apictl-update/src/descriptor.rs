//! What the update service tells us about the next release

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// Machine platform in the update service's vocabulary
/// (`amd64`/`arm64`/`386`, `linux`/`darwin`/`windows`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
    pub architecture: String,
    pub operating_system: String,
}

impl Platform {
    pub fn new(architecture: impl Into<String>, operating_system: impl Into<String>) -> Self {
        Self {
            architecture: architecture.into(),
            operating_system: operating_system.into(),
        }
    }

    /// The platform this binary was compiled for
    pub fn current() -> Self {
        Self::new(
            service_arch(std::env::consts::ARCH),
            service_os(std::env::consts::OS),
        )
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.operating_system, self.architecture)
    }
}

fn service_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        other => other,
    }
}

fn service_os(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

/// An available update: version, artifact location, and integrity data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDescriptor {
    pub next_version: Version,
    pub artifact_url: String,
    /// Lowercase hex SHA-256 of the artifact
    pub sha256: String,
    /// Ed25519 signature over the artifact digest (hex or base64)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(flatten)]
    pub platform: Platform,
}
