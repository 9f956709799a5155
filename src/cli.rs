//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::{MAX_REFRESH_SECS, MIN_REFRESH_SECS};
use clap::Parser;
use std::path::PathBuf;

/// edudash - role-aware LMS dashboard data
///
/// Fetches users, courses, enrolments, completions and activity from a
/// Moodle-style web service, classifies the requesting user's role and
/// prints the dashboard that role is allowed to see. Sources that cannot
/// be fetched are filled with synthetic data and flagged.
///
/// Examples:
///   edudash --user 42 --endpoint https://lms.example/webservice/rest/server.php
///   edudash --user 42 --format json --output dashboard.json
///   edudash --user 42 --watch --interval 120
///   edudash --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// LMS user id whose dashboard to build
    #[arg(short, long, value_name = "ID", required_unless_present = "init_config")]
    pub user: Option<i64>,

    /// LMS web service endpoint URL
    #[arg(short, long, value_name = "URL", env = "EDUDASH_ENDPOINT")]
    pub endpoint: Option<String>,

    /// LMS web service token
    #[arg(long, value_name = "TOKEN", env = "EDUDASH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .edudash.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache time-to-live in seconds
    #[arg(long, value_name = "SECS")]
    pub ttl: Option<u64>,

    /// Refresh interval in seconds for --watch (30-300)
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Keep refreshing until interrupted (Ctrl+C)
    #[arg(short, long)]
    pub watch: bool,

    /// Always go to the LMS; neither read nor write the cache
    #[arg(long)]
    pub no_cache: bool,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .edudash.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        match self.user {
            Some(id) if id > 0 => {}
            _ => return Err("User id must be a positive number".to_string()),
        }

        if let Some(ref endpoint) = self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err("Endpoint must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.ttl == Some(0) {
            return Err("TTL must be at least 1 second".to_string());
        }

        if let Some(interval) = self.interval {
            if !(MIN_REFRESH_SECS..=MAX_REFRESH_SECS).contains(&interval) {
                return Err(format!(
                    "Interval must be between {} and {} seconds",
                    MIN_REFRESH_SECS, MAX_REFRESH_SECS
                ));
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    pub fn user_id(&self) -> i64 {
        self.user.unwrap_or_default()
    }
}
