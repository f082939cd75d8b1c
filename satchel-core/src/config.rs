//! Configuration management

use crate::error::{SatchelError, SatchelResult};
use crate::logging::LoggingConfig;
use crate::types::{HandlerDriver, SatchelConfig, Serialization, SessionConfig};

use std::path::{Path, PathBuf};

impl Default for SatchelConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            driver: HandlerDriver::File,
            name: "satchel_session".to_string(),
            lifetime_minutes: 120,
            expire_on_close: false,
            serialization: Serialization::Native,
            files: "~/.satchel/sessions".to_string(),
            lottery: [2, 100],
            id_length: 40,
        }
    }
}

impl SatchelConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> SatchelResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SatchelError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: crate::ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: SatchelConfig = toml::from_str(&content).map_err(|e| SatchelError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: crate::ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> SatchelResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| SatchelError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: crate::ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| SatchelError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: crate::ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SatchelResult<()> {
        let session = &self.session;

        if session.lifetime_minutes == 0 {
            return Err(SatchelError::Config {
                message: "Session lifetime_minutes must be greater than 0".to_string(),
                source: None,
                context: crate::ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set session.lifetime_minutes to a positive value"),
            });
        }

        if session.name.trim().is_empty() {
            return Err(SatchelError::Config {
                message: "Session name must not be empty".to_string(),
                source: None,
                context: crate::ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set session.name, e.g. \"satchel_session\""),
            });
        }

        let [hits, out_of] = session.lottery;
        if out_of == 0 || hits > out_of {
            return Err(SatchelError::Config {
                message: format!("Invalid session lottery [{}, {}]", hits, out_of),
                source: None,
                context: crate::ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Use [hits, out_of] with out_of > 0 and hits <= out_of"),
            });
        }

        if session.id_length == 0 {
            return Err(SatchelError::Config {
                message: "Session id_length must be greater than 0".to_string(),
                source: None,
                context: crate::ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set session.id_length to a positive value (default 40)"),
            });
        }

        if session.driver == HandlerDriver::File && session.files.trim().is_empty() {
            return Err(SatchelError::Config {
                message: "The file driver requires session.files".to_string(),
                source: None,
                context: crate::ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Point session.files at a writable directory"),
            });
        }

        Ok(())
    }
}

impl SessionConfig {
    /// Directory for the file driver with a leading `~` expanded
    pub fn files_path(&self) -> PathBuf {
        expand_home(&self.files)
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/tmp/sessions"), PathBuf::from("/tmp/sessions"));
        assert_eq!(expand_home("relative/dir"), PathBuf::from("relative/dir"));
    }

    #[test]
    fn test_expand_home_replaces_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.satchel"), home.join(".satchel"));
        }
    }

    #[test]
    fn test_lifetime_secs() {
        let config = SessionConfig::default();
        assert_eq!(config.lifetime_secs(), 7200);
    }
}
