use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::MetricsError;
use crate::format::{DEFAULT_MAX_LEADING_ZEROS, DEFAULT_PRECISION};

/// What `emit_report` does when building the report fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Return the error to the training loop
    #[default]
    Fail,
    /// Log a warning and skip this iteration's report
    Skip,
}

/// Configuration for scale logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    // --- Enable predicate ---
    #[serde(default)]
    pub log_scales: bool,               // Record scales at all
    #[serde(default = "default_log_interval")]
    pub log_interval: u64,              // Record on iterations where (iteration + 1) % log_interval == 0

    // --- Report layout ---
    #[serde(default = "default_logging_width")]
    pub logging_width: usize,           // Columns filled by label + dots + value
    #[serde(default = "default_precision")]
    pub precision: usize,               // Significant digits after the leading one
    #[serde(default = "default_max_leading_zeros")]
    pub max_leading_zeros: usize,       // Beyond this, small values switch to scientific notation

    #[serde(default)]
    pub on_error: ErrorPolicy,
}

// Default values for optional fields
fn default_log_interval() -> u64 { 1 }
fn default_logging_width() -> usize { 50 }
fn default_precision() -> usize { DEFAULT_PRECISION }
fn default_max_leading_zeros() -> usize { DEFAULT_MAX_LEADING_ZEROS }

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            log_scales: false,
            log_interval: default_log_interval(),
            logging_width: default_logging_width(),
            precision: default_precision(),
            max_leading_zeros: default_max_leading_zeros(),
            on_error: ErrorPolicy::default(),
        }
    }
}

impl MetricsConfig {
    /// Config with recording switched on for every `log_interval`-th iteration
    pub fn enabled(log_interval: u64) -> Self {
        Self {
            log_scales: true,
            log_interval,
            ..Default::default()
        }
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, MetricsError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, MetricsError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), MetricsError> {
        if self.log_interval == 0 {
            return Err(MetricsError::Config("log_interval must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Whether scales are recorded (and reported) on `iteration`
    pub fn should_log(&self, iteration: u64) -> bool {
        self.log_scales && self.log_interval > 0 && (iteration + 1) % self.log_interval == 0
    }
}
