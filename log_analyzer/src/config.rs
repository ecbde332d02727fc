use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::discovery::DEFAULT_LOG_PREFIX;
use crate::quality::DEFAULT_ERROR_THRESHOLD;

/// Run configuration. Keys missing from the config file keep their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Number of URLs shown in the report.
    #[serde(rename = "REPORT_SIZE")]
    pub report_size: usize,
    #[serde(rename = "REPORT_DIR")]
    pub report_dir: PathBuf,
    /// Local directory or `s3://bucket/prefix`.
    #[serde(rename = "LOG_DIR")]
    pub log_dir: String,
    /// File for the analyzer's own log; stderr when unset.
    pub program_logs: Option<PathBuf>,
    /// Largest tolerated fraction of unparsed lines.
    #[serde(rename = "ERROR_THRESHOLD")]
    pub error_threshold: f64,
    #[serde(rename = "LOG_PREFIX")]
    pub log_prefix: String,
    #[serde(rename = "REPORT_TEMPLATE")]
    pub report_template: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            report_size: 1000,
            report_dir: PathBuf::from("./reports"),
            log_dir: "./log".to_string(),
            program_logs: None,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            log_prefix: DEFAULT_LOG_PREFIX.to_string(),
            report_template: None,
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text).context("Invalid config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config file at `path`. A missing file is only an error when
    /// the path was given explicitly; otherwise defaults apply.
    pub fn load(path: &Path, explicit: bool) -> Result<Self> {
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Bad config file: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.report_size == 0 {
            bail!("REPORT_SIZE must be greater than 0");
        }
        if !(0.0..=1.0).contains(&self.error_threshold) {
            bail!(
                "ERROR_THRESHOLD must be between 0 and 1, got {}",
                self.error_threshold
            );
        }
        if self.log_prefix.is_empty() {
            bail!("LOG_PREFIX must not be empty");
        }
        Ok(())
    }
}
