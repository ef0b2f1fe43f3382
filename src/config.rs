//! Command line and environment configuration.

use crate::services::retry::RetryPolicy;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Review Roster - pull request reviewer assignment service
#[derive(Parser, Debug, Clone)]
#[command(name = "review-roster")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Path to the SQLite database file
    #[arg(long, env = "REVIEW_ROSTER_DB", default_value = "review-roster.db")]
    pub database_path: PathBuf,

    /// Address to bind the HTTP server to
    #[arg(long, env = "REVIEW_ROSTER_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port to bind the HTTP server to
    #[arg(long, env = "REVIEW_ROSTER_PORT", default_value = "8080")]
    pub port: u16,

    /// Backoff step between transaction retries, in milliseconds
    #[arg(long, env = "REVIEW_ROSTER_RETRY_DELAY_MS", default_value = "100")]
    pub retry_base_delay_ms: u64,

    /// Deadline for a single request, in seconds
    #[arg(long, env = "REVIEW_ROSTER_REQUEST_TIMEOUT", default_value = "10")]
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_base_delay(Duration::from_millis(self.retry_base_delay_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
