//! # apictl-core
//!
//! Core library for the apictl CLI providing:
//! - Hierarchical runtime configuration (embedded defaults, file, environment)
//! - Retry execution engine with policy-based configuration
//! - Shared error types

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::HierarchicalConfigLoader;
pub use error::{Error, Result};
pub use types::RuntimeConfig;
