//! Persistence backends
//!
//! A [`SessionHandler`] stores opaque payloads keyed by session identifier.
//! Backends that need the inbound request (for example to read cookies)
//! expose that through [`SessionHandler::request_aware`] rather than by
//! runtime probing.

pub mod array;
pub mod cookie;
pub mod file;
pub mod null;

pub use array::ArrayHandler;
pub use cookie::{CookieHandler, QueuedCookie};
pub use file::{FileHandler, StorageStats};
pub use null::NullHandler;

use satchel_core::SatchelResult;
use std::collections::HashMap;

pub trait SessionHandler: Send + Sync {
    /// Payload stored under `id`, empty when there is none
    fn read(&self, id: &str) -> SatchelResult<Vec<u8>>;

    fn write(&self, id: &str, payload: &[u8]) -> SatchelResult<()>;

    fn destroy(&self, id: &str) -> SatchelResult<()>;

    /// Remove records idle for longer than `max_lifetime_secs`; returns how many went
    fn gc(&self, _max_lifetime_secs: u64) -> SatchelResult<usize> {
        Ok(0)
    }

    /// The request-context capability, for backends that have it
    fn request_aware(&self) -> Option<&dyn RequestAwareHandler> {
        None
    }
}

/// Backends that read part of their state from the current request
pub trait RequestAwareHandler: Send + Sync {
    fn set_request(&self, request: RequestContext);
}

/// The slice of an inbound request a handler may consult
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    cookies: HashMap<String, String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}
