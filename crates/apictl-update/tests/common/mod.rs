//! Common test infrastructure for apictl-update tests
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::*;
//! ```
//!
//! # Modules
//!
//! - `constants`: Versions, platforms, artifact bytes
//! - `builders`: Fluent builder for UpdateDescriptor, hashing and signing helpers
//! - `mock_server`: Wiremock setup for artifact and update-service endpoints
//! - `updater_helpers`: Static oracle, install directories, filesystem snapshots

// Not every test binary uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod builders;
pub mod constants;
pub mod mock_server;
pub mod updater_helpers;

pub use builders::*;
pub use constants::*;
pub use mock_server::*;
pub use updater_helpers::*;
