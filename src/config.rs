//! Configuration loading
//!
//! Accounts are declared in a TOML file; each `[[accounts]]` entry spawns
//! one independent watcher. The classifier endpoint and the watermark file
//! are shared across accounts.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, WatchError};

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// External classification service
    pub classifier: ClassifierConfig,

    /// Path of the shared watermark file. Defaults to
    /// `<data dir>/scamwatch/watermarks.json`.
    #[serde(default)]
    pub watermark_path: Option<PathBuf>,

    /// Watched accounts, one watcher each
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

/// Classification service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Endpoint receiving `{from, subject, body}` POSTs
    pub url: String,
}

/// One watched account
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// Human-readable identifier used in logs and the watermark file
    pub label: String,

    /// IMAP server hostname
    pub host: String,

    /// IMAP server port (default: 993)
    #[serde(default = "default_imap_port")]
    pub port: u16,

    /// Use TLS encryption. Plain connections are not supported; `false`
    /// is rejected at connect time.
    #[serde(default = "default_true")]
    pub tls: bool,

    /// Login name
    pub email: String,

    /// Login password
    pub password: String,

    /// Watched mailbox (default: INBOX)
    #[serde(default = "default_mailbox")]
    pub mailbox: String,

    /// Scam probability (0-100) at or above which a message is quarantined
    #[serde(default = "default_scam_threshold")]
    pub scam_threshold: u8,

    /// Maximum number of body characters sent to the classifier,
    /// applied after whitespace normalization
    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,

    /// Initial watermark, used only when the watermark file has no entry
    /// for this account yet. Absent means "classify the entire mailbox".
    pub watermark: Option<chrono::DateTime<chrono::Utc>>,
}

fn default_imap_port() -> u16 {
    993
}

fn default_true() -> bool {
    true
}

fn default_mailbox() -> String {
    "INBOX".to_string()
}

fn default_scam_threshold() -> u8 {
    80
}

fn default_max_body_chars() -> usize {
    3000
}

impl Config {
    /// Load and validate the configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| WatchError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&raw)?;

        if config.accounts.is_empty() {
            return Err(WatchError::Config("no [[accounts]] configured".into()));
        }
        for account in &config.accounts {
            if account.label.trim().is_empty() {
                return Err(WatchError::Config("account label must not be empty".into()));
            }
        }
        Ok(config)
    }

    /// Resolved watermark file path.
    pub fn watermark_path(&self) -> PathBuf {
        self.watermark_path
            .clone()
            .unwrap_or_else(default_watermark_path)
    }
}

/// Default config location: `~/.config/scamwatch/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scamwatch")
        .join("config.toml")
}

fn default_watermark_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scamwatch")
        .join("watermarks.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [classifier]
        url = "http://localhost:9000/classify"

        [[accounts]]
        label = "personal"
        host = "imap.example.com"
        email = "me@example.com"
        password = "hunter2"

        [[accounts]]
        label = "work"
        host = "imap.work.example"
        port = 1993
        email = "me@work.example"
        password = "secret"
        mailbox = "Inbox"
        scam_threshold = 95
        max_body_chars = 500
        watermark = "2025-06-01T12:00:00Z"
    "#;

    #[test]
    fn parses_sample_with_defaults() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.accounts.len(), 2);

        let personal = &config.accounts[0];
        assert_eq!(personal.port, 993);
        assert!(personal.tls);
        assert_eq!(personal.mailbox, "INBOX");
        assert_eq!(personal.scam_threshold, 80);
        assert_eq!(personal.max_body_chars, 3000);
        assert!(personal.watermark.is_none());

        let work = &config.accounts[1];
        assert_eq!(work.port, 1993);
        assert_eq!(work.scam_threshold, 95);
        assert!(work.watermark.is_some());
    }

    #[test]
    fn rejects_empty_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[classifier]\nurl = \"http://x/\"\n").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(WatchError::Config(_))
        ));
    }
}
