use std::io::BufRead;

use tracing::{debug, info};

use crate::aggregate::UrlAccumulator;
use crate::error::AnalyzerError;
use crate::parser::LineParser;
use crate::quality::QualityGate;
use crate::stats::{calc_stats, UrlStatRow};

/// Result of a complete pass over one log.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub rows: Vec<UrlStatRow>,
    pub lines_seen: u64,
    pub lines_unparsed: u64,
}

/// Stream every line of `reader` through the parser into the per-URL
/// accumulator, then apply the quality gate and compute the ranked rows.
///
/// The log is read once, line by line. Nothing is returned unless every
/// stage succeeds.
pub fn analyze<R: BufRead>(
    reader: R,
    parser: &LineParser,
    threshold: f64,
    source_name: &str,
) -> Result<Analysis, AnalyzerError> {
    let mut gate = QualityGate::new(threshold);
    let mut urls = UrlAccumulator::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| {
            AnalyzerError::source_unavailable(format!("{source_name} (line {})", line_no + 1), e)
        })?;

        let outcome = parser.parse(&line);
        if !outcome.is_matched() {
            debug!(line = line_no + 1, "unparsed log line");
        }
        gate.observe(&outcome);
        urls.observe(outcome);
    }

    info!(
        lines_seen = gate.lines_seen(),
        lines_unparsed = gate.lines_unparsed(),
        urls = urls.url_count(),
        "log consumed"
    );
    gate.check()?;

    let rows = calc_stats(&urls, urls.totals())?;

    Ok(Analysis {
        rows,
        lines_seen: gate.lines_seen(),
        lines_unparsed: gate.lines_unparsed(),
    })
}
