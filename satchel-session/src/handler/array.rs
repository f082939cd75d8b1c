//! In-memory handler

use super::SessionHandler;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use satchel_core::SatchelResult;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredPayload {
    data: Vec<u8>,
    last_activity: DateTime<Utc>,
}

/// Keeps payloads in a process-local map
///
/// Reads ignore records older than the configured lifetime, matching what
/// a later [`SessionHandler::gc`] would reclaim.
#[derive(Debug)]
pub struct ArrayHandler {
    lifetime_secs: u64,
    entries: RwLock<HashMap<String, StoredPayload>>,
}

impl ArrayHandler {
    pub fn new(lifetime_secs: u64) -> Self {
        Self {
            lifetime_secs,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    fn cutoff(lifetime_secs: u64) -> DateTime<Utc> {
        let secs = i64::try_from(lifetime_secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
        Utc::now()
            .checked_sub_signed(Duration::seconds(secs))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl SessionHandler for ArrayHandler {
    fn read(&self, id: &str) -> SatchelResult<Vec<u8>> {
        let entries = self.entries.read();
        match entries.get(id) {
            Some(entry) if entry.last_activity > Self::cutoff(self.lifetime_secs) => {
                Ok(entry.data.clone())
            }
            _ => Ok(Vec::new()),
        }
    }

    fn write(&self, id: &str, payload: &[u8]) -> SatchelResult<()> {
        self.entries.write().insert(
            id.to_string(),
            StoredPayload {
                data: payload.to_vec(),
                last_activity: Utc::now(),
            },
        );
        Ok(())
    }

    fn destroy(&self, id: &str) -> SatchelResult<()> {
        self.entries.write().remove(id);
        Ok(())
    }

    fn gc(&self, max_lifetime_secs: u64) -> SatchelResult<usize> {
        let cutoff = Self::cutoff(max_lifetime_secs);
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.last_activity > cutoff);
        let removed = before - entries.len();

        debug!("Array handler collected {} expired sessions", removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_destroy() {
        let handler = ArrayHandler::new(3600);
        assert!(handler.read("abc").unwrap().is_empty());

        handler.write("abc", b"payload").unwrap();
        assert_eq!(handler.read("abc").unwrap(), b"payload");
        assert!(handler.contains("abc"));

        handler.destroy("abc").unwrap();
        assert!(handler.read("abc").unwrap().is_empty());
        assert!(handler.is_empty());
    }

    #[test]
    fn test_gc_with_zero_lifetime_collects_everything() {
        let handler = ArrayHandler::new(3600);
        handler.write("a", b"1").unwrap();
        handler.write("b", b"2").unwrap();

        assert_eq!(handler.gc(3600).unwrap(), 0);
        assert_eq!(handler.len(), 2);

        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(handler.gc(0).unwrap(), 2);
        assert!(handler.is_empty());
    }

    #[test]
    fn test_expired_entries_read_empty() {
        let handler = ArrayHandler::new(0);
        handler.write("a", b"1").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(handler.read("a").unwrap().is_empty());
    }
}
