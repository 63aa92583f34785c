//! Safe self-update for the apictl CLI
//!
//! Provides:
//! - Semantic version model with semver precedence
//! - Client for the release service's next-update RPC
//! - Streaming artifact download with SHA-256 accumulation
//! - Hash and Ed25519 signature verification
//! - Rename-based binary swap with automatic rollback
//! - An update lock so only one update touches a binary at a time

pub mod descriptor;
pub mod download;
pub mod error;
pub mod installer;
pub mod lock;
pub mod oracle;
pub mod updater;
pub mod verify;
pub mod version;

pub use descriptor::{Platform, UpdateDescriptor};
pub use download::{ArtifactFetcher, DownloadResult};
pub use error::{Result, UpdateError};
pub use installer::{BackupRetention, InstallPlan, InstallReport, InstallState, Installer};
pub use lock::UpdateLock;
pub use oracle::{HttpVersionOracle, NextUpdateReply, UpdateRequest, VersionOracle};
pub use updater::{UpdateCoordinator, UpdateOutcome};
pub use verify::{IntegrityVerifier, VerifiedArtifact};
pub use version::{compare, is_update_available, ParseError, Version};

/// Current CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Project name reported to the release service
pub const PROJECT_NAME: &str = "apictl";
