//! Core data type definitions

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatchelConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Session engine configuration
///
/// Fields missing from a config file take their `Default` values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Backend the session payload is persisted through
    pub driver: HandlerDriver,
    /// Name the transport layer uses to locate the identifier (cookie name)
    pub name: String,
    /// Minutes a session may sit idle before garbage collection reclaims it
    pub lifetime_minutes: u64,
    /// Whether the transport should expire the identifier when the client closes
    pub expire_on_close: bool,
    /// Wire format of the persisted attribute set
    pub serialization: Serialization,
    /// Directory used by the file driver
    pub files: String,
    /// Garbage collection odds as `[hits, out_of]`
    pub lottery: [u32; 2],
    /// Length of generated session identifiers
    pub id_length: usize,
}

/// Supported persistence backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerDriver {
    /// In-process map, lost on exit
    Array,
    /// One file per session identifier
    File,
    /// Payload carried in a client cookie
    Cookie,
    /// Discards everything
    Null,
}

/// Supported payload codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Serialization {
    /// Compact binary MessagePack encoding
    Native,
    /// JSON object mirroring the top-level attributes
    Json,
}

impl SessionConfig {
    /// Lifetime in seconds, as handed to handler garbage collection
    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime_minutes.saturating_mul(60)
    }
}
