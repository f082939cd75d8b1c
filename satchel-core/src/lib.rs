//! Satchel Core - shared infrastructure
//!
//! Error types, configuration and logging used by every Satchel crate

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use tracing;
