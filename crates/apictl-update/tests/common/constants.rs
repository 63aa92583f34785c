//! Shared constants for test infrastructure

pub const APP_NAME: &str = "apictl";

// Version constants
pub const VERSION_0_9_0: &str = "0.9.0";
pub const VERSION_0_10_0: &str = "0.10.0";
pub const VERSION_1_0_0: &str = "1.0.0";

// Platform names as the update service spells them
pub const ARCH_AMD64: &str = "amd64";
pub const ARCH_ARM64: &str = "arm64";
pub const OS_LINUX: &str = "linux";
pub const OS_DARWIN: &str = "darwin";

// Binary content for testing
pub const LIVE_BINARY_CONTENT: &[u8] = b"#!/bin/sh\necho apictl 0.9.0\n";
pub const NEW_BINARY_CONTENT: &[u8] = b"#!/bin/sh\necho apictl 0.10.0\n";

/// Artifact path served by the mock server
pub const ARTIFACT_PATH: &str = "/artifacts/apictl-linux-amd64";

/// Name of the fake installed binary inside a temp dir
pub const TARGET_NAME: &str = "apictl";

// Checksum constants
pub const WRONG_CHECKSUM: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Seed for the deterministic Ed25519 release key
pub const SIGNING_KEY_SEED: [u8; 32] = [7u8; 32];
pub const OTHER_KEY_SEED: [u8; 32] = [9u8; 32];
