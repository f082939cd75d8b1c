//! Handler that keeps the payload in a client cookie
//!
//! The cookie named after the session identifier carries
//! `{"data": <base64 payload>, "expires": <unix seconds>}`. Inbound cookies
//! arrive through [`RequestAwareHandler::set_request`]; outbound cookies are
//! queued for the transport layer to attach to the response.

use super::{RequestAwareHandler, RequestContext, SessionHandler};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use satchel_core::SatchelResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A cookie the transport layer should set on the response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedCookie {
    pub name: String,
    pub value: String,
    /// `None` for a browser-session cookie
    pub max_age_secs: Option<u64>,
}

impl QueuedCookie {
    /// An expiring cookie with an empty value removes the client copy
    pub fn is_removal(&self) -> bool {
        self.value.is_empty() && self.max_age_secs == Some(0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CookieEnvelope {
    data: String,
    expires: i64,
}

#[derive(Debug)]
pub struct CookieHandler {
    lifetime_secs: u64,
    expire_on_close: bool,
    request: RwLock<Option<RequestContext>>,
    queued: Mutex<Vec<QueuedCookie>>,
}

impl CookieHandler {
    pub fn new(lifetime_secs: u64, expire_on_close: bool) -> Self {
        Self {
            lifetime_secs,
            expire_on_close,
            request: RwLock::new(None),
            queued: Mutex::new(Vec::new()),
        }
    }

    /// Cookies queued since construction, oldest first
    pub fn queued_cookies(&self) -> Vec<QueuedCookie> {
        self.queued.lock().clone()
    }

    /// Take and clear the queue
    pub fn drain_queued_cookies(&self) -> Vec<QueuedCookie> {
        std::mem::take(&mut *self.queued.lock())
    }

    fn queue(&self, cookie: QueuedCookie) {
        let mut queued = self.queued.lock();
        queued.retain(|existing| existing.name != cookie.name);
        queued.push(cookie);
    }

    fn lifetime_i64(&self) -> i64 {
        i64::try_from(self.lifetime_secs).unwrap_or(i64::MAX)
    }
}

impl SessionHandler for CookieHandler {
    fn read(&self, id: &str) -> SatchelResult<Vec<u8>> {
        let request = self.request.read();
        let Some(raw) = request.as_ref().and_then(|request| request.cookie(id)) else {
            return Ok(Vec::new());
        };

        let envelope: CookieEnvelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(session_id = id, error = %e, "Ignoring malformed session cookie");
                return Ok(Vec::new());
            }
        };

        if envelope.expires <= Utc::now().timestamp() {
            debug!(session_id = id, "Session cookie has expired");
            return Ok(Vec::new());
        }

        match STANDARD.decode(envelope.data.as_bytes()) {
            Ok(data) => Ok(data),
            Err(e) => {
                warn!(session_id = id, error = %e, "Ignoring undecodable session cookie");
                Ok(Vec::new())
            }
        }
    }

    fn write(&self, id: &str, payload: &[u8]) -> SatchelResult<()> {
        let expires = Utc::now().timestamp().saturating_add(self.lifetime_i64());
        let envelope = CookieEnvelope {
            data: STANDARD.encode(payload),
            expires,
        };

        self.queue(QueuedCookie {
            name: id.to_string(),
            value: serde_json::to_string(&envelope)?,
            max_age_secs: (!self.expire_on_close).then_some(self.lifetime_secs),
        });
        Ok(())
    }

    fn destroy(&self, id: &str) -> SatchelResult<()> {
        self.queue(QueuedCookie {
            name: id.to_string(),
            value: String::new(),
            max_age_secs: Some(0),
        });
        Ok(())
    }

    fn request_aware(&self) -> Option<&dyn RequestAwareHandler> {
        Some(self)
    }
}

impl RequestAwareHandler for CookieHandler {
    fn set_request(&self, request: RequestContext) {
        *self.request.write() = Some(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie_value(data: &[u8], expires: i64) -> String {
        serde_json::json!({ "data": STANDARD.encode(data), "expires": expires }).to_string()
    }

    #[test]
    fn test_reads_nothing_without_request() {
        let handler = CookieHandler::new(60, false);
        assert!(handler.read("abc").unwrap().is_empty());
    }

    #[test]
    fn test_reads_live_cookie() {
        let handler = CookieHandler::new(60, false);
        let expires = Utc::now().timestamp() + 60;
        handler
            .request_aware()
            .unwrap()
            .set_request(RequestContext::new().with_cookie("abc", cookie_value(b"payload", expires)));

        assert_eq!(handler.read("abc").unwrap(), b"payload");
        assert!(handler.read("other").unwrap().is_empty());
    }

    #[test]
    fn test_expired_or_malformed_cookie_reads_empty() {
        let handler = CookieHandler::new(60, false);
        let past = Utc::now().timestamp() - 1;
        handler.set_request(
            RequestContext::new()
                .with_cookie("old", cookie_value(b"payload", past))
                .with_cookie("junk", "not json"),
        );

        assert!(handler.read("old").unwrap().is_empty());
        assert!(handler.read("junk").unwrap().is_empty());
    }

    #[test]
    fn test_write_then_destroy_queues_cookies() {
        let handler = CookieHandler::new(120, false);
        handler.write("abc", b"payload").unwrap();

        let queued = handler.queued_cookies();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].name, "abc");
        assert_eq!(queued[0].max_age_secs, Some(120));

        // The queued value is readable when it comes back on the next request
        handler.set_request(RequestContext::new().with_cookie("abc", queued[0].value.clone()));
        assert_eq!(handler.read("abc").unwrap(), b"payload");

        handler.destroy("abc").unwrap();
        let queued = handler.drain_queued_cookies();
        assert_eq!(queued.len(), 1);
        assert!(queued[0].is_removal());
        assert!(handler.queued_cookies().is_empty());
    }

    #[test]
    fn test_expire_on_close_sets_session_cookie() {
        let handler = CookieHandler::new(120, true);
        handler.write("abc", b"payload").unwrap();
        assert_eq!(handler.queued_cookies()[0].max_age_secs, None);
    }
}
