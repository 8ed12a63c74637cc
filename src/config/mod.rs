//! Tunable parameters for the pipeline, loaded from environment variables
//! with a fixed `RECON_` prefix and overridable by CLI flags.
//!
//! Mirrors the layered-defaults approach used for execution limits
//! elsewhere in this codebase: a `Default` impl holding safe values, and a
//! `from_env()` constructor that reads named variables on top of it.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_TESTS_PER_ENDPOINT: usize = 30;
pub const DEFAULT_IDOR_COUNT: usize = 10;
pub const DEFAULT_AUTH_BYPASS_COUNT: usize = 5;
pub const DEFAULT_METHOD_CONFUSION_COUNT: usize = 10;
pub const DEFAULT_MASS_ASSIGNMENT_COUNT: usize = 5;
pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_RATE_PER_SEC: f64 = 2.0;
pub const DEFAULT_MAX_BODY_BYTES: usize = 20_480;
pub const DEFAULT_LENGTH_DIFF_THRESHOLD: f64 = 0.30;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const RESEARCHER_HEADER_NAME: &str = "User-Agent";
pub const RESEARCHER_HEADER_VALUE: &str = "surfacerecon/1.0";

/// Tunable parameters shared across the generator, replay engine, and
/// analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub max_tests_per_endpoint: usize,
    pub idor_count: usize,
    pub auth_bypass_count: usize,
    pub method_confusion_count: usize,
    pub mass_assignment_count: usize,
    pub concurrency: usize,
    pub rate_per_sec: f64,
    pub max_body_bytes: usize,
    pub length_diff_threshold: f64,
    pub seed: u64,
    pub allow_destructive: bool,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_tests_per_endpoint: DEFAULT_MAX_TESTS_PER_ENDPOINT,
            idor_count: DEFAULT_IDOR_COUNT,
            auth_bypass_count: DEFAULT_AUTH_BYPASS_COUNT,
            method_confusion_count: DEFAULT_METHOD_CONFUSION_COUNT,
            mass_assignment_count: DEFAULT_MASS_ASSIGNMENT_COUNT,
            concurrency: DEFAULT_CONCURRENCY,
            rate_per_sec: DEFAULT_RATE_PER_SEC,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            length_diff_threshold: DEFAULT_LENGTH_DIFF_THRESHOLD,
            seed: DEFAULT_SEED,
            allow_destructive: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Loads config from `RECON_*` environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RECON_MAX_TESTS_PER_ENDPOINT") {
            if let Ok(n) = val.parse() {
                config.max_tests_per_endpoint = n;
            }
        }
        if let Ok(val) = std::env::var("RECON_IDOR_COUNT") {
            if let Ok(n) = val.parse() {
                config.idor_count = n;
            }
        }
        if let Ok(val) = std::env::var("RECON_AUTH_BYPASS_COUNT") {
            if let Ok(n) = val.parse() {
                config.auth_bypass_count = n;
            }
        }
        if let Ok(val) = std::env::var("RECON_METHOD_CONFUSION_COUNT") {
            if let Ok(n) = val.parse() {
                config.method_confusion_count = n;
            }
        }
        if let Ok(val) = std::env::var("RECON_MASS_ASSIGNMENT_COUNT") {
            if let Ok(n) = val.parse() {
                config.mass_assignment_count = n;
            }
        }
        if let Ok(val) = std::env::var("RECON_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                config.concurrency = n;
            }
        }
        if let Ok(val) = std::env::var("RECON_RATE") {
            if let Ok(n) = val.parse() {
                config.rate_per_sec = n;
            }
        }
        if let Ok(val) = std::env::var("RECON_MAX_BODY_BYTES") {
            if let Ok(n) = val.parse() {
                config.max_body_bytes = n;
            }
        }
        if let Ok(val) = std::env::var("RECON_LENGTH_DIFF_THRESHOLD") {
            if let Ok(n) = val.parse() {
                config.length_diff_threshold = n;
            }
        }
        if let Ok(val) = std::env::var("RECON_SEED") {
            if let Ok(n) = val.parse() {
                config.seed = n;
            }
        }
        if let Ok(val) = std::env::var("RECON_ALLOW_DESTRUCTIVE") {
            config.allow_destructive = matches!(val.as_str(), "1" | "true" | "yes");
        }
        if let Ok(val) = std::env::var("RECON_REQUEST_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                config.request_timeout_secs = n;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_tests_per_endpoint, 30);
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.rate_per_sec, 2.0);
        assert!(!config.allow_destructive);
    }
}
