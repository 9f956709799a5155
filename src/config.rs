//! Configuration file handling.
//!
//! Settings come from an optional `.edudash.toml`; command-line flags
//! override individual values afterwards.

use crate::dashboard::DashboardSettings;
use crate::fetch::FallbackConfig;
use crate::lms::{FunctionNames, LmsClientConfig};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".edudash.toml";

/// Allowed range for the refresh interval, in seconds.
pub const MIN_REFRESH_SECS: u64 = 30;
pub const MAX_REFRESH_SECS: u64 = 300;

/// Upper bounds for the aggregation windows.
pub const MAX_ACTIVITY_WINDOW_DAYS: i64 = 3650;
pub const MAX_TREND_WEEKS: usize = 520;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub lms: LmsConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Synthetic data used when a source is unavailable.
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Web service function names, for sites that expose the data under
    /// different plugins.
    #[serde(default)]
    pub functions: FunctionNames,
}

/// LMS connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmsConfig {
    /// Web service endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Web service token. Prefer the EDUDASH_TOKEN environment variable.
    #[serde(default)]
    pub token: String,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for LmsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token: String::new(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    LmsClientConfig::default().endpoint
}

fn default_timeout() -> u64 {
    30
}

/// Cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prefix separating this dashboard's entries from other users of the store.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,

    /// Where persisted entries live.
    #[serde(default = "default_cache_dir")]
    pub directory: PathBuf,

    /// Keep entries on disk between runs (false: in memory only).
    #[serde(default = "default_true")]
    pub persist: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: default_namespace(),
            ttl_seconds: default_ttl(),
            directory: default_cache_dir(),
            persist: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_namespace() -> String {
    "edudash".to_string()
}

fn default_ttl() -> u64 {
    600 // 10 min
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".edudash-cache")
}

/// Aggregation and refresh settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// A user counts as active if seen within this many days.
    #[serde(default = "default_activity_window")]
    pub activity_window_days: i64,

    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,

    #[serde(default = "default_trend_weeks")]
    pub trend_weeks: usize,

    /// Per-source limit on one fetch; 0 disables it.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            activity_window_days: default_activity_window(),
            refresh_interval_seconds: default_refresh_interval(),
            trend_weeks: default_trend_weeks(),
            fetch_timeout_seconds: default_fetch_timeout(),
        }
    }
}

fn default_activity_window() -> i64 {
    30
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_trend_weeks() -> usize {
    8
}

fn default_fetch_timeout() -> u64 {
    20
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line (or via the
    /// environment) replace file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref endpoint) = args.endpoint {
            self.lms.endpoint = endpoint.clone();
        }
        if let Some(ref token) = args.token {
            self.lms.token = token.clone();
        }
        if let Some(ttl) = args.ttl {
            self.cache.ttl_seconds = ttl;
        }
        if let Some(interval) = args.interval {
            self.dashboard.refresh_interval_seconds = interval;
        }
        if args.no_cache {
            self.cache.enabled = false;
        }
    }

    /// Check the merged settings.
    pub fn validate(&self) -> Result<()> {
        if !self.lms.endpoint.starts_with("http://") && !self.lms.endpoint.starts_with("https://")
        {
            bail!("LMS endpoint must start with 'http://' or 'https://'");
        }
        if self.lms.timeout_seconds == 0 {
            bail!("LMS timeout must be at least 1 second");
        }
        if self.cache.enabled && self.cache.ttl_seconds == 0 {
            bail!("Cache TTL must be at least 1 second");
        }
        if !(MIN_REFRESH_SECS..=MAX_REFRESH_SECS)
            .contains(&self.dashboard.refresh_interval_seconds)
        {
            bail!(
                "Refresh interval must be between {} and {} seconds",
                MIN_REFRESH_SECS,
                MAX_REFRESH_SECS
            );
        }
        if !(1..=MAX_ACTIVITY_WINDOW_DAYS).contains(&self.dashboard.activity_window_days) {
            bail!(
                "Activity window must be between 1 and {} days",
                MAX_ACTIVITY_WINDOW_DAYS
            );
        }
        if !(1..=MAX_TREND_WEEKS).contains(&self.dashboard.trend_weeks) {
            bail!("Trend must cover between 1 and {} weeks", MAX_TREND_WEEKS);
        }
        if self.fallback.courses > 0 && self.fallback.categories == 0 {
            bail!("Fallback data needs at least one category when it has courses");
        }
        Ok(())
    }

    pub fn lms_client_config(&self) -> LmsClientConfig {
        LmsClientConfig {
            endpoint: self.lms.endpoint.clone(),
            token: self.lms.token.clone(),
            timeout_seconds: self.lms.timeout_seconds,
        }
    }

    pub fn dashboard_settings(&self) -> DashboardSettings {
        let fetch_timeout = match self.dashboard.fetch_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        DashboardSettings {
            functions: self.functions.clone(),
            fallback: self.fallback.clone(),
            activity_window: chrono::Duration::try_days(
                self.dashboard
                    .activity_window_days
                    .clamp(1, MAX_ACTIVITY_WINDOW_DAYS),
            )
            .unwrap_or_else(|| chrono::Duration::days(default_activity_window())),
            trend_weeks: self.dashboard.trend_weeks.clamp(1, MAX_TREND_WEEKS),
            fetch_timeout,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.dashboard.refresh_interval_seconds)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_seconds)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cache.ttl_seconds, 600);
        assert_eq!(config.cache.namespace, "edudash");
        assert_eq!(config.dashboard.activity_window_days, 30);
        assert_eq!(config.dashboard.refresh_interval_seconds, 60);
        assert_eq!(config.fallback.seed, 42);
        assert_eq!(config.functions.users, "core_user_get_users");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[lms]
endpoint = "https://school.example/webservice/rest/server.php"
token = "abc123"

[cache]
ttl_seconds = 120
persist = false

[dashboard]
refresh_interval_seconds = 90

[functions]
activity = "report_log_get_entries"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.lms.token, "abc123");
        assert_eq!(config.lms.timeout_seconds, 30);
        assert_eq!(config.cache.ttl_seconds, 120);
        assert!(!config.cache.persist);
        assert!(config.cache.enabled);
        assert_eq!(config.refresh_interval(), Duration::from_secs(90));
        assert_eq!(config.functions.activity, "report_log_get_entries");
        assert_eq!(config.functions.courses, "core_course_get_courses");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_toml_round_trips() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[lms]"));
        assert!(toml_str.contains("[dashboard]"));
        assert!(toml_str.contains("[functions]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_validation_bounds() {
        let mut config = Config::default();
        config.dashboard.refresh_interval_seconds = 29;
        assert!(config.validate().is_err());
        config.dashboard.refresh_interval_seconds = 300;
        assert!(config.validate().is_ok());

        config.cache.ttl_seconds = 0;
        assert!(config.validate().is_err());
        config.cache.enabled = false;
        assert!(config.validate().is_ok());

        config.lms.endpoint = "ftp://example".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_activity_window_bounds() {
        let mut config = Config::default();
        config.dashboard.activity_window_days = MAX_ACTIVITY_WINDOW_DAYS;
        assert!(config.validate().is_ok());

        config.dashboard.activity_window_days = MAX_ACTIVITY_WINDOW_DAYS + 1;
        assert!(config.validate().is_err());
        config.dashboard.activity_window_days = 1_000_000_000_000;
        assert!(config.validate().is_err());
        config.dashboard.activity_window_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trend_weeks_bounds() {
        let mut config = Config::default();
        config.dashboard.trend_weeks = MAX_TREND_WEEKS;
        assert!(config.validate().is_ok());

        config.dashboard.trend_weeks = 20_000_000;
        assert!(config.validate().is_err());
        config.dashboard.trend_weeks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_settings_never_exceed_bounds() {
        let mut config = Config::default();
        config.dashboard.activity_window_days = 1_000_000_000_000;
        config.dashboard.trend_weeks = 20_000_000;

        let settings = config.dashboard_settings();
        assert_eq!(
            settings.activity_window,
            chrono::Duration::days(MAX_ACTIVITY_WINDOW_DAYS)
        );
        assert_eq!(settings.trend_weeks, MAX_TREND_WEEKS);
    }

    #[test]
    fn test_fallback_courses_need_categories() {
        let mut config = Config::default();
        config.fallback.categories = 0;
        assert!(config.validate().is_err());

        config.fallback.courses = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config = Config::default();
        let args = Args::parse_from([
            "edudash",
            "--user",
            "7",
            "--endpoint",
            "https://lms.example/server.php",
            "--ttl",
            "30",
            "--interval",
            "45",
            "--no-cache",
        ]);

        config.merge_with_args(&args);

        assert_eq!(config.lms.endpoint, "https://lms.example/server.php");
        assert_eq!(config.cache.ttl_seconds, 30);
        assert_eq!(config.dashboard.refresh_interval_seconds, 45);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.namespace, "edudash");
    }

    #[test]
    fn test_dashboard_settings() {
        let mut config = Config::default();
        config.dashboard.fetch_timeout_seconds = 0;
        config.dashboard.activity_window_days = 14;

        let settings = config.dashboard_settings();
        assert_eq!(settings.fetch_timeout, None);
        assert_eq!(settings.activity_window, chrono::Duration::days(14));
        assert_eq!(settings.trend_weeks, 8);
    }
}
