//! Configuration loading
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (passed in by the binary, highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default cron expression: daily at 02:00 (seconds first, 6-field format)
pub const DEFAULT_CRON: &str = "0 0 2 * * *";

/// Default timezone for scheduled runs
pub const DEFAULT_TIMEZONE: &str = "Asia/Seoul";

/// Default batch size for keyset reconciliation scans
pub const DEFAULT_BATCH_SIZE: i64 = 1000;

/// Default SQLite busy timeout in milliseconds
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Top-level service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_path: PathBuf,
    /// Reconciliation job settings
    pub reconcile: ReconcileConfig,
}

/// Reconciliation job settings
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Cron expression (6-field, seconds first) for scheduled runs
    pub cron: String,
    /// IANA timezone name the cron expression is evaluated in
    pub timezone: String,
    /// Scan page size for the like-count job
    pub like_count_batch_size: i64,
    /// Scan page size for the keyword-summary job
    pub keyword_summary_batch_size: i64,
    /// SQLite busy timeout applied to every pooled connection
    pub busy_timeout_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            cron: DEFAULT_CRON.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            like_count_batch_size: DEFAULT_BATCH_SIZE,
            keyword_summary_batch_size: DEFAULT_BATCH_SIZE,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

/// On-disk TOML layout; every key is optional and falls back to defaults
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database_path: Option<PathBuf>,
    #[serde(default)]
    reconcile: FileReconcile,
}

#[derive(Debug, Default, Deserialize)]
struct FileReconcile {
    cron: Option<String>,
    timezone: Option<String>,
    like_count_batch_size: Option<i64>,
    keyword_summary_batch_size: Option<i64>,
    busy_timeout_ms: Option<u64>,
}

impl Config {
    /// Load configuration, merging the file (if any) with environment
    /// overrides and the command-line database path.
    pub fn load(config_path: Option<&Path>, database_path: Option<&Path>) -> Result<Config> {
        let file = load_file_config(config_path)?;

        let database_path = database_path
            .map(Path::to_path_buf)
            .or(file.database_path)
            .unwrap_or_else(default_database_path);

        let defaults = ReconcileConfig::default();
        let mut reconcile = ReconcileConfig {
            cron: file.reconcile.cron.unwrap_or(defaults.cron),
            timezone: file.reconcile.timezone.unwrap_or(defaults.timezone),
            like_count_batch_size: file
                .reconcile
                .like_count_batch_size
                .unwrap_or(defaults.like_count_batch_size),
            keyword_summary_batch_size: file
                .reconcile
                .keyword_summary_batch_size
                .unwrap_or(defaults.keyword_summary_batch_size),
            busy_timeout_ms: file
                .reconcile
                .busy_timeout_ms
                .unwrap_or(defaults.busy_timeout_ms),
        };

        if let Ok(cron) = std::env::var("ENCORE_RECONCILE_CRON") {
            reconcile.cron = cron;
        }
        if let Ok(tz) = std::env::var("ENCORE_RECONCILE_TZ") {
            reconcile.timezone = tz;
        }
        if let Some(size) = env_i64("ENCORE_LIKE_COUNT_BATCH_SIZE")? {
            reconcile.like_count_batch_size = size;
        }
        if let Some(size) = env_i64("ENCORE_KEYWORD_SUMMARY_BATCH_SIZE")? {
            reconcile.keyword_summary_batch_size = size;
        }
        if let Some(timeout) = env_u64("ENCORE_BUSY_TIMEOUT_MS")? {
            reconcile.busy_timeout_ms = timeout;
        }

        if reconcile.like_count_batch_size < 1 || reconcile.keyword_summary_batch_size < 1 {
            return Err(Error::Config(
                "reconciliation batch sizes must be at least 1".to_string(),
            ));
        }

        Ok(Config {
            database_path,
            reconcile,
        })
    }
}

/// Parse the TOML config file; a missing default file is not an error,
/// an explicitly-passed path that cannot be read is.
fn load_file_config(config_path: Option<&Path>) -> Result<FileConfig> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(FileConfig::default()),
        },
    };

    let contents = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Could not read {}: {}", path.display(), e)))?;
    toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Could not parse {}: {}", path.display(), e)))
}

/// Platform config file location: `<config_dir>/encore/config.toml`
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("encore").join("config.toml"))
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("encore").join("encore.db"))
        .unwrap_or_else(|| PathBuf::from("./encore.db"))
}

fn env_i64(name: &str) -> Result<Option<i64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} must be an integer, got '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} must be an integer, got '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        for name in [
            "ENCORE_RECONCILE_CRON",
            "ENCORE_RECONCILE_TZ",
            "ENCORE_LIKE_COUNT_BATCH_SIZE",
            "ENCORE_KEYWORD_SUMMARY_BATCH_SIZE",
            "ENCORE_BUSY_TIMEOUT_MS",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_file() {
        clear_env();
        let config = Config::load(None, Some(Path::new("/tmp/encore-test.db"))).unwrap();
        assert_eq!(config.reconcile.cron, DEFAULT_CRON);
        assert_eq!(config.reconcile.timezone, DEFAULT_TIMEZONE);
        assert_eq!(config.reconcile.like_count_batch_size, 1000);
        assert_eq!(config.reconcile.keyword_summary_batch_size, 1000);
        assert_eq!(config.database_path, PathBuf::from("/tmp/encore-test.db"));
    }

    #[test]
    #[serial]
    fn test_file_values_override_defaults() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
database_path = "/var/lib/encore/encore.db"

[reconcile]
cron = "0 30 3 * * *"
timezone = "UTC"
like_count_batch_size = 250
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path()), None).unwrap();
        assert_eq!(
            config.database_path,
            PathBuf::from("/var/lib/encore/encore.db")
        );
        assert_eq!(config.reconcile.cron, "0 30 3 * * *");
        assert_eq!(config.reconcile.timezone, "UTC");
        assert_eq!(config.reconcile.like_count_batch_size, 250);
        // Keys absent from the file keep their defaults
        assert_eq!(config.reconcile.keyword_summary_batch_size, 1000);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[reconcile]\nlike_count_batch_size = 250").unwrap();

        std::env::set_var("ENCORE_LIKE_COUNT_BATCH_SIZE", "50");
        let config = Config::load(Some(file.path()), Some(Path::new("/tmp/e.db"))).unwrap();
        clear_env();

        assert_eq!(config.reconcile.like_count_batch_size, 50);
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_is_an_error() {
        clear_env();
        std::env::set_var("ENCORE_LIKE_COUNT_BATCH_SIZE", "lots");
        let result = Config::load(None, Some(Path::new("/tmp/e.db")));
        clear_env();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    fn test_zero_batch_size_rejected() {
        clear_env();
        std::env::set_var("ENCORE_KEYWORD_SUMMARY_BATCH_SIZE", "0");
        let result = Config::load(None, Some(Path::new("/tmp/e.db")));
        clear_env();

        assert!(matches!(result, Err(Error::Config(_))));
    }
}
