//! Sound Map Configuration: TOML-based settings for a pipeline run

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rf_bank::DumpParseOptions;
use serde::{Deserialize, Serialize};

use crate::container::{DEFAULT_CONTAINER_PATTERN, INDEX_PLACEHOLDER};
use crate::error::{SoundMapError, SoundMapResult};

/// Default recursion bound for event resolution
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Upper bound on `max_depth`, keeps recursion within worker stacks
pub const MAX_DEPTH_LIMIT: usize = 4096;

/// Default progress interval in milliseconds
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 200;

/// Complete run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundMapConfig {
    /// Worker threads for both phases (0 = one per core)
    pub threads: usize,

    /// Maximum descent depth below an event root
    pub max_depth: usize,

    /// Minimum interval between progress log lines
    pub progress_interval_ms: u64,

    /// Container file name pattern, `{index}` is replaced by the container number
    pub container_pattern: String,

    /// Bank paths are recorded relative to this directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_root: Option<PathBuf>,

    /// Write the index without whitespace
    pub minify: bool,

    /// Directory scanned for loose payload files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loose_dir: Option<PathBuf>,
}

impl Default for SoundMapConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            container_pattern: DEFAULT_CONTAINER_PATTERN.to_string(),
            bank_root: None,
            minify: false,
            loose_dir: None,
        }
    }
}

impl SoundMapConfig {
    /// Load from TOML string
    pub fn from_toml(toml_str: &str) -> SoundMapResult<Self> {
        toml::from_str(toml_str).map_err(|e| SoundMapError::Config(e.to_string()))
    }

    /// Save to TOML string
    pub fn to_toml(&self) -> SoundMapResult<String> {
        toml::to_string_pretty(self).map_err(|e| SoundMapError::Config(e.to_string()))
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> SoundMapResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_progress_interval_ms(mut self, interval_ms: u64) -> Self {
        self.progress_interval_ms = interval_ms;
        self
    }

    pub fn with_container_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.container_pattern = pattern.into();
        self
    }

    pub fn with_bank_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.bank_root = Some(root.into());
        self
    }

    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    pub fn with_loose_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.loose_dir = Some(dir.into());
        self
    }

    /// Worker count with 0 resolved to the number of cores
    pub fn worker_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Options for the dump parse phase
    pub fn parse_options(&self) -> DumpParseOptions {
        let options = DumpParseOptions::default()
            .with_threads(self.worker_threads())
            .with_progress_interval(self.progress_interval());
        match &self.bank_root {
            Some(root) => options.with_bank_root(root),
            None => options,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> SoundMapResult<()> {
        if self.max_depth == 0 {
            return Err(SoundMapError::Config(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.max_depth > MAX_DEPTH_LIMIT {
            return Err(SoundMapError::Config(format!(
                "max_depth cannot exceed {MAX_DEPTH_LIMIT}"
            )));
        }
        if self.progress_interval_ms == 0 {
            return Err(SoundMapError::Config(
                "progress_interval_ms must be at least 1".to_string(),
            ));
        }
        if self.container_pattern.is_empty() {
            return Err(SoundMapError::Config(
                "container_pattern cannot be empty".to_string(),
            ));
        }
        if !self.container_pattern.contains(INDEX_PLACEHOLDER) {
            return Err(SoundMapError::Config(format!(
                "container_pattern must contain {INDEX_PLACEHOLDER}"
            )));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = SoundMapConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_depth, 64);
        assert_eq!(config.container_pattern, "sfx_container_{index}.opuspak");
        assert!(config.worker_threads() >= 1);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = SoundMapConfig::default()
            .with_threads(4)
            .with_max_depth(32)
            .with_container_pattern("pak_{index}.bin")
            .with_bank_root("/game/banks")
            .with_minify(true);

        let text = config.to_toml().unwrap();
        let parsed = SoundMapConfig::from_toml(&text).unwrap();
        assert_eq!(parsed, config);
        assert!(!text.contains("loose_dir"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = SoundMapConfig::from_toml("threads = 2\nloose_dir = \"/loose\"\n").unwrap();
        assert_eq!(config.threads, 2);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.loose_dir, Some(PathBuf::from("/loose")));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(SoundMapConfig::default().with_max_depth(0).validate().is_err());
        assert!(SoundMapConfig::default().with_container_pattern("").validate().is_err());
        assert!(SoundMapConfig::default()
            .with_container_pattern("fixed.opuspak")
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_bounds() {
        let at_limit = SoundMapConfig::default().with_max_depth(MAX_DEPTH_LIMIT);
        assert!(at_limit.validate().is_ok());

        let too_deep = SoundMapConfig::default().with_max_depth(1_000_000);
        assert!(matches!(too_deep.validate(), Err(SoundMapError::Config(_))));

        let no_interval = SoundMapConfig::default().with_progress_interval_ms(0);
        assert!(matches!(no_interval.validate(), Err(SoundMapError::Config(_))));
    }

    #[test]
    fn test_parse_options() {
        let options = SoundMapConfig::default()
            .with_threads(3)
            .with_progress_interval_ms(50)
            .with_bank_root("/banks")
            .parse_options();
        assert_eq!(options.threads, 3);
        assert_eq!(options.progress_interval, Duration::from_millis(50));
        assert_eq!(options.bank_root, Some(PathBuf::from("/banks")));
    }
}
