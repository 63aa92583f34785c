//! Type definitions for apictl configuration

mod runtime_config;

pub use runtime_config::*;
