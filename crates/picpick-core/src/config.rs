//! Session configuration
//!
//! Every field has a default, so a TOML file only needs the keys it
//! changes:
//!
//! ```toml
//! scan_interval_ms = 1000
//!
//! [fetch]
//! max_concurrent = 4
//!
//! [archive]
//! target = "png"
//! ```

use crate::error::ConfigError;
use picpick_archive::{FetchSettings, TargetFormat, DEFAULT_ARCHIVE_NAME};
use picpick_harvest::DEFAULT_MARKER_PREFIX;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Periodic rescan interval in milliseconds
    pub scan_interval_ms: u64,
    /// Reserved marker class prefix
    pub marker_prefix: String,
    /// Payload fetching
    pub fetch: FetchConfig,
    /// Archive output
    pub archive: ArchiveConfig,
}

impl HarvestConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With rescan interval
    #[inline]
    #[must_use]
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With marker prefix
    #[inline]
    #[must_use]
    pub fn with_marker_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.marker_prefix = prefix.into();
        self
    }

    /// With fetch concurrency
    #[inline]
    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.fetch.max_concurrent = max;
        self
    }

    /// With conversion target
    #[inline]
    #[must_use]
    pub fn with_target(mut self, target: Option<TargetFormat>) -> Self {
        self.archive.target = target;
        self
    }

    /// Rescan interval; never zero
    #[inline]
    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }

    /// Parse a TOML document
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` on malformed TOML or `ConfigError::Invalid`
    /// when a value is out of range
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`HarvestConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.marker_prefix.is_empty() || !self.marker_prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(ConfigError::Invalid(format!(
                "marker_prefix must be a non-empty class name, got {:?}",
                self.marker_prefix
            )));
        }
        if self.fetch.max_concurrent == 0 {
            return Err(ConfigError::Invalid("fetch.max_concurrent must be at least 1".into()));
        }
        if let Some(level) = self.archive.compression_level {
            if !(0..=9).contains(&level) {
                return Err(ConfigError::Invalid(format!("archive.compression_level {level} is outside 0..=9")));
            }
        }
        Ok(())
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 3000,
            marker_prefix: DEFAULT_MARKER_PREFIX.to_string(),
            fetch: FetchConfig::default(),
            archive: ArchiveConfig::default(),
        }
    }
}

/// Fetch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Records fetched at once
    pub max_concurrent: usize,
}

impl FetchConfig {
    #[must_use]
    pub fn settings(&self) -> FetchSettings {
        FetchSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        let settings = FetchSettings::default();
        Self {
            timeout_secs: settings.timeout.as_secs(),
            user_agent: settings.user_agent,
            max_concurrent: 8,
        }
    }
}

/// Archive settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Output file stem
    pub name: String,
    /// Conversion target, unset to keep source formats
    pub target: Option<TargetFormat>,
    /// Deflate level, unset for the library default
    pub compression_level: Option<i64>,
}

impl ArchiveConfig {
    /// Archive file name with extension
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.zip", self.name)
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_ARCHIVE_NAME.to_string(),
            target: None,
            compression_level: None,
        }
    }
}
