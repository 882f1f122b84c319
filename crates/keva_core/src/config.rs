//! Database configuration.

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to error if the database already exists.
    pub error_if_exists: bool,

    /// Whether to fsync the WAL on every commit (safer but slower).
    pub sync_on_commit: bool,

    /// Garbage ratio (obsolete versions and tombstones over total bytes)
    /// above which the record log is compacted.
    pub compaction_threshold: f64,

    /// Minimum log size in bytes before compaction is considered.
    pub compaction_min_bytes: u64,

    /// Format version to use for new databases.
    pub format_version: (u16, u16),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            sync_on_commit: true,
            compaction_threshold: 0.5,
            compaction_min_bytes: 4 * 1024 * 1024, // 4 MB
            format_version: (1, 0),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to error if the database exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether to fsync the WAL on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the compaction garbage-ratio threshold.
    #[must_use]
    pub const fn compaction_threshold(mut self, ratio: f64) -> Self {
        self.compaction_threshold = ratio;
        self
    }

    /// Sets the minimum log size before compaction is considered.
    #[must_use]
    pub const fn compaction_min_bytes(mut self, bytes: u64) -> Self {
        self.compaction_min_bytes = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(!config.error_if_exists);
        assert!(config.sync_on_commit);
        assert!(config.compaction_threshold > 0.0);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .sync_on_commit(false)
            .compaction_min_bytes(1024);

        assert!(!config.create_if_missing);
        assert!(!config.sync_on_commit);
        assert_eq!(config.compaction_min_bytes, 1024);
    }
}
