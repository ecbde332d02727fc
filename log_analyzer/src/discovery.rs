use std::{
    fmt,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::AnalyzerError;

pub const DEFAULT_LOG_PREFIX: &str = "nginx-access-ui.log-";

/// How a log file is stored, from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Plain,
    Gzip,
}

/// Where a rotated log lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLocation {
    Local(PathBuf),
    S3 { bucket: String, key: String },
}

impl fmt::Display for LogLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLocation::Local(path) => write!(f, "{}", path.display()),
            LogLocation::S3 { bucket, key } => write!(f, "s3://{bucket}/{key}"),
        }
    }
}

/// A rotated log file whose name matched the filename grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub location: LogLocation,
    pub date: NaiveDate,
    pub compression: Compression,
}

/// Filename grammar for rotated logs: `<prefix>YYYYMMDD` with an optional
/// `.gz`. Any other extension is not a candidate.
#[derive(Debug, Clone)]
pub struct LogNamePattern {
    pattern: Regex,
}

impl LogNamePattern {
    pub fn new(prefix: &str) -> Result<Self, AnalyzerError> {
        let pattern = Regex::new(&format!(
            r"^{}(?P<date>\d{{8}})(?P<ext>\.gz)?$",
            regex::escape(prefix)
        ))?;
        Ok(Self { pattern })
    }

    pub fn parse(&self, file_name: &str) -> Option<(NaiveDate, Compression)> {
        let caps = self.pattern.captures(file_name)?;
        let raw_date = caps.name("date")?.as_str();

        let date = match NaiveDate::parse_from_str(raw_date, "%Y%m%d") {
            Ok(date) => date,
            Err(e) => {
                warn!(file_name, error = %e, "log name has an invalid date, skipping");
                return None;
            }
        };

        let compression = if caps.name("ext").is_some() {
            Compression::Gzip
        } else {
            Compression::Plain
        };

        Some((date, compression))
    }
}

/// Pick the most recent log by the date in its name. On equal dates the
/// plain file wins over the compressed one.
pub fn select_latest(candidates: impl IntoIterator<Item = LogFile>) -> Option<LogFile> {
    candidates.into_iter().max_by(|a, b| {
        a.date.cmp(&b.date).then_with(|| {
            let plain_first = |c: Compression| matches!(c, Compression::Plain);
            plain_first(a.compression).cmp(&plain_first(b.compression))
        })
    })
}

/// Scan a local directory for rotated logs and return the most recent one.
pub fn find_latest_local(
    dir: &Path,
    names: &LogNamePattern,
) -> Result<Option<LogFile>, AnalyzerError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| AnalyzerError::source_unavailable(dir.display().to_string(), e))?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| AnalyzerError::source_unavailable(dir.display().to_string(), e))?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };

        match names.parse(file_name) {
            Some((date, compression)) => candidates.push(LogFile {
                location: LogLocation::Local(entry.path()),
                date,
                compression,
            }),
            None => debug!(file_name, "not a rotated log, skipping"),
        }
    }

    Ok(select_latest(candidates))
}

/// Same selection over object keys under an S3 prefix.
pub fn select_latest_key<'a>(
    bucket: &str,
    keys: impl IntoIterator<Item = &'a str>,
    names: &LogNamePattern,
) -> Option<LogFile> {
    let candidates = keys.into_iter().filter_map(|key| {
        let file_name = key.rsplit('/').next().unwrap_or(key);
        let (date, compression) = names.parse(file_name)?;
        Some(LogFile {
            location: LogLocation::S3 {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            date,
            compression,
        })
    });
    select_latest(candidates)
}
