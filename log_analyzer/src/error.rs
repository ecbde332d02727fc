use thiserror::Error;

/// Fatal outcomes of a run. A line that does not match the grammar is not
/// one of these; it is reported as `ParseOutcome::Unmatched` and counted.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error(
        "unparsed part of log is too large: {unparsed} of {total} lines (threshold {threshold})"
    )]
    QualityThresholdExceeded {
        unparsed: u64,
        total: u64,
        threshold: f64,
    },

    #[error("nothing to report: {matched} matched records, total request time {total_time}")]
    EmptyOrZeroTotals { matched: u64, total_time: f64 },

    #[error("log source {source_name} is unavailable: {source}")]
    SourceUnavailable {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("log line grammar failed to compile: {0}")]
    InvalidGrammar(#[from] regex::Error),
}

impl AnalyzerError {
    pub fn source_unavailable(source_name: impl Into<String>, source: std::io::Error) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            source,
        }
    }
}
