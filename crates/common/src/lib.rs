//! Coverreel Common Utilities
//!
//! Shared infrastructure for all Coverreel crates:
//! - Error taxonomy and result alias
//! - Artifact timestamps
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
