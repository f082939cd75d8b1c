//! Session Manager - config-driven session construction
//!
//! Builds the configured handler and codec once and hands out sessions that
//! share them. Garbage collection runs through the configured lottery so
//! that only a fraction of requests pay for sweeping expired records.

use crate::codec::codec_for;
use crate::handler::{ArrayHandler, CookieHandler, FileHandler, NullHandler, SessionHandler};
use crate::identifier::IdentifierPolicy;
use crate::store::Session;
use satchel_core::{HandlerDriver, SatchelConfig, SatchelResult};
use std::sync::Arc;
use tracing::{debug, info};

pub struct SessionManager {
    /// Validated configuration
    config: SatchelConfig,
    /// Backend shared by every session built here
    handler: Arc<dyn SessionHandler>,
}

impl SessionManager {
    /// Validate `config` and create its handler
    pub fn new(config: SatchelConfig) -> SatchelResult<Self> {
        config.validate()?;

        let lifetime_secs = config.session.lifetime_secs();
        let handler: Arc<dyn SessionHandler> = match config.session.driver {
            HandlerDriver::Array => Arc::new(ArrayHandler::new(lifetime_secs)),
            HandlerDriver::File => Arc::new(FileHandler::new(
                config.session.files_path(),
                lifetime_secs,
            )?),
            HandlerDriver::Cookie => Arc::new(CookieHandler::new(
                lifetime_secs,
                config.session.expire_on_close,
            )),
            HandlerDriver::Null => Arc::new(NullHandler),
        };

        info!(
            driver = ?config.session.driver,
            serialization = ?config.session.serialization,
            "Session manager ready"
        );

        Ok(Self { config, handler })
    }

    /// Use an existing handler instead of the configured driver
    pub fn with_handler(config: SatchelConfig, handler: Arc<dyn SessionHandler>) -> SatchelResult<Self> {
        config.validate()?;
        Ok(Self { config, handler })
    }

    pub fn config(&self) -> &SatchelConfig {
        &self.config
    }

    pub fn handler(&self) -> &Arc<dyn SessionHandler> {
        &self.handler
    }

    /// An unstarted session for `id`, or for a fresh identifier
    pub fn build(&self, id: Option<&str>) -> Session {
        Session::with_policy(
            self.config.session.name.clone(),
            Arc::clone(&self.handler),
            id,
            codec_for(self.config.session.serialization),
            IdentifierPolicy::new(self.config.session.id_length),
        )
    }

    /// Whether this call wins the garbage-collection lottery
    pub fn lottery_hits(&self) -> bool {
        let [hits, out_of] = self.config.session.lottery;
        fastrand::u32(1..=out_of) <= hits
    }

    /// Collect expired sessions if the lottery hits; `None` when it didn't
    pub fn collect_garbage(&self) -> SatchelResult<Option<usize>> {
        if !self.lottery_hits() {
            return Ok(None);
        }
        self.force_collect_garbage().map(Some)
    }

    /// Collect expired sessions unconditionally
    pub fn force_collect_garbage(&self) -> SatchelResult<usize> {
        let lifetime_secs = self.config.session.lifetime_secs();
        debug!(lifetime_secs, "Collecting expired sessions");
        self.handler.gc(lifetime_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_core::Serialization;

    fn config(driver: HandlerDriver) -> SatchelConfig {
        let mut config = SatchelConfig::default();
        config.session.driver = driver;
        config
    }

    #[test]
    fn test_build_uses_configured_name_and_length() {
        let mut config = config(HandlerDriver::Array);
        config.session.name = "app_session".to_string();
        config.session.id_length = 16;
        let manager = SessionManager::new(config).unwrap();

        let session = manager.build(None);
        assert_eq!(session.name(), "app_session");
        assert_eq!(session.id().len(), 16);

        let id = "abcdefghij123456";
        assert_eq!(manager.build(Some(id)).id(), id);
    }

    #[test]
    fn test_sessions_share_the_handler() {
        let mut config = config(HandlerDriver::Array);
        config.session.serialization = Serialization::Json;
        let manager = SessionManager::new(config).unwrap();

        let mut first = manager.build(None);
        first.start();
        first.put("foo", "bar");
        first.save().unwrap();

        let mut second = manager.build(Some(first.id()));
        second.start();
        assert_eq!(second.get("foo"), Some(&serde_json::json!("bar")));
    }

    #[test]
    fn test_with_handler_uses_given_backend() {
        let backend = Arc::new(ArrayHandler::new(3600));
        let manager =
            SessionManager::with_handler(config(HandlerDriver::File), backend.clone()).unwrap();

        let mut session = manager.build(None);
        session.start();
        session.put("foo", "bar");
        session.save().unwrap();
        assert!(backend.contains(session.id()));
        assert_eq!(backend.len(), 1);

        let mut invalid = config(HandlerDriver::Array);
        invalid.session.lifetime_minutes = 0;
        assert!(SessionManager::with_handler(invalid, backend).is_err());
    }

    #[test]
    fn test_lottery_bounds() {
        let mut always = config(HandlerDriver::Null);
        always.session.lottery = [1, 1];
        let manager = SessionManager::new(always).unwrap();
        assert!(manager.lottery_hits());
        assert_eq!(manager.collect_garbage().unwrap(), Some(0));

        let mut never = config(HandlerDriver::Null);
        never.session.lottery = [0, 100];
        let manager = SessionManager::new(never).unwrap();
        assert!(!manager.lottery_hits());
        assert_eq!(manager.collect_garbage().unwrap(), None);
    }

    #[test]
    fn test_file_driver_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(HandlerDriver::File);
        config.session.files = dir.path().join("sessions").to_string_lossy().into_owned();

        let manager = SessionManager::new(config).unwrap();
        assert!(dir.path().join("sessions").is_dir());
        assert_eq!(manager.force_collect_garbage().unwrap(), 0);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = config(HandlerDriver::Null);
        config.session.lifetime_minutes = 0;
        assert!(SessionManager::new(config).is_err());
    }
}
