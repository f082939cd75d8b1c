//! File handler - one payload file per session identifier

use super::SessionHandler;
use chrono::{DateTime, Duration, Utc};
use satchel_core::{handler_error, SatchelResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Stores each session as `<storage_dir>/<id>`
#[derive(Debug, Clone)]
pub struct FileHandler {
    /// Base directory for session files
    storage_dir: PathBuf,
    /// Files untouched for longer than this read as empty
    lifetime_secs: u64,
}

impl FileHandler {
    /// Create a file handler, creating `storage_dir` if it doesn't exist
    pub fn new<P: AsRef<Path>>(storage_dir: P, lifetime_secs: u64) -> SatchelResult<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();

        std::fs::create_dir_all(&storage_dir).map_err(|e| {
            handler_error!(
                format!("Cannot create session directory {}", storage_dir.display()),
                "file_handler",
                e
            )
        })?;

        info!("Session storage initialized at: {}", storage_dir.display());

        Ok(Self {
            storage_dir,
            lifetime_secs,
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn session_file(&self, id: &str) -> SatchelResult<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(handler_error!(
                format!("Refusing to map session id '{}' to a file", id),
                "file_handler"
            ));
        }
        Ok(self.storage_dir.join(id))
    }

    /// Get storage statistics
    pub fn stats(&self) -> SatchelResult<StorageStats> {
        let mut total_sessions = 0;
        let mut total_size = 0;

        let entries = std::fs::read_dir(&self.storage_dir)?;

        for entry in entries {
            let entry = entry?;
            if let Ok(metadata) = entry.metadata() {
                if metadata.is_file() {
                    total_sessions += 1;
                    total_size += metadata.len();
                }
            }
        }

        Ok(StorageStats {
            total_sessions,
            total_size_bytes: total_size,
            storage_dir: self.storage_dir.clone(),
        })
    }
}

fn cutoff(lifetime_secs: u64) -> DateTime<Utc> {
    let secs = i64::try_from(lifetime_secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
    Utc::now()
        .checked_sub_signed(Duration::seconds(secs))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

impl SessionHandler for FileHandler {
    fn read(&self, id: &str) -> SatchelResult<Vec<u8>> {
        let session_file = self.session_file(id)?;

        match modified_at(&session_file) {
            Some(modified) if modified > cutoff(self.lifetime_secs) => {}
            _ => return Ok(Vec::new()),
        }

        let data = std::fs::read(&session_file).map_err(|e| {
            handler_error!(format!("Failed to read session {}", id), "file_handler", e)
        })?;

        debug!("Loaded session {} from {}", id, session_file.display());
        Ok(data)
    }

    fn write(&self, id: &str, payload: &[u8]) -> SatchelResult<()> {
        let session_file = self.session_file(id)?;

        std::fs::write(&session_file, payload).map_err(|e| {
            handler_error!(format!("Failed to write session {}", id), "file_handler", e)
        })?;

        debug!("Saved session {} to {}", id, session_file.display());
        Ok(())
    }

    fn destroy(&self, id: &str) -> SatchelResult<()> {
        let session_file = self.session_file(id)?;

        if session_file.exists() {
            std::fs::remove_file(&session_file).map_err(|e| {
                handler_error!(format!("Failed to delete session {}", id), "file_handler", e)
            })?;
            debug!("Deleted session file: {}", session_file.display());
        }

        Ok(())
    }

    fn gc(&self, max_lifetime_secs: u64) -> SatchelResult<usize> {
        let cutoff_time = cutoff(max_lifetime_secs);
        let mut cleaned_count = 0;

        let entries = std::fs::read_dir(&self.storage_dir).map_err(|e| {
            handler_error!("Failed to list session directory", "file_handler", e)
        })?;

        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!("Skipping unreadable session entry: {}", e);
                    continue;
                }
            };

            if !path.is_file() {
                continue;
            }

            match modified_at(&path) {
                Some(modified) if modified > cutoff_time => {}
                _ => {
                    if let Err(e) = std::fs::remove_file(&path) {
                        warn!("Failed to delete expired session {}: {}", path.display(), e);
                    } else {
                        cleaned_count += 1;
                    }
                }
            }
        }

        info!("Cleaned up {} expired sessions", cleaned_count);
        Ok(cleaned_count)
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub total_sessions: usize,
    pub total_size_bytes: u64,
    pub storage_dir: PathBuf,
}

impl StorageStats {
    pub fn total_size_kb(&self) -> f64 {
        self.total_size_bytes as f64 / 1024.0
    }

    pub fn summary(&self) -> String {
        format!(
            "Sessions: {}, Size: {:.2} KB, Dir: {}",
            self.total_sessions,
            self.total_size_kb(),
            self.storage_dir.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let handler = FileHandler::new(&nested, 60).unwrap();
        assert!(nested.is_dir());
        assert_eq!(handler.storage_dir(), nested.as_path());
    }

    #[test]
    fn test_write_read_destroy() {
        let dir = tempfile::tempdir().unwrap();
        let handler = FileHandler::new(dir.path(), 3600).unwrap();

        assert!(handler.read("abc").unwrap().is_empty());

        handler.write("abc", b"payload").unwrap();
        assert_eq!(handler.read("abc").unwrap(), b"payload");

        handler.destroy("abc").unwrap();
        assert!(handler.read("abc").unwrap().is_empty());
        // Destroying twice is fine
        handler.destroy("abc").unwrap();
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let handler = FileHandler::new(dir.path(), 3600).unwrap();

        assert!(handler.write("../escape", b"x").is_err());
        assert!(handler.read("a/b").is_err());
        assert!(handler.destroy("").is_err());
    }

    #[test]
    fn test_gc_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let handler = FileHandler::new(dir.path(), 3600).unwrap();
        handler.write("one", b"12345").unwrap();
        handler.write("two", b"678").unwrap();

        let stats = handler.stats().unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.total_size_bytes, 8);
        assert!(stats.summary().contains("Sessions: 2"));

        assert_eq!(handler.gc(3600).unwrap(), 0);

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(handler.gc(0).unwrap(), 2);
        assert_eq!(handler.stats().unwrap().total_sessions, 0);
    }
}
