use crate::error::AnalyzerError;
use crate::parser::ParseOutcome;

pub const DEFAULT_ERROR_THRESHOLD: f64 = 0.3;

/// Run-scoped counters of seen vs. unparsed lines.
#[derive(Debug, Clone)]
pub struct QualityGate {
    threshold: f64,
    lines_seen: u64,
    lines_unparsed: u64,
}

impl QualityGate {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            lines_seen: 0,
            lines_unparsed: 0,
        }
    }

    /// Count one line.
    pub fn observe(&mut self, outcome: &ParseOutcome) {
        self.lines_seen += 1;
        if !outcome.is_matched() {
            self.lines_unparsed += 1;
        }
    }

    pub fn lines_seen(&self) -> u64 {
        self.lines_seen
    }

    pub fn lines_unparsed(&self) -> u64 {
        self.lines_unparsed
    }

    /// Fraction of unparsed lines. An empty log has nothing unparsed, so 0.
    pub fn unparsed_ratio(&self) -> f64 {
        if self.lines_seen == 0 {
            return 0.0;
        }
        self.lines_unparsed as f64 / self.lines_seen as f64
    }

    /// Called once, after the whole log has been consumed.
    pub fn check(&self) -> Result<(), AnalyzerError> {
        if self.unparsed_ratio() > self.threshold {
            return Err(AnalyzerError::QualityThresholdExceeded {
                unparsed: self.lines_unparsed,
                total: self.lines_seen,
                threshold: self.threshold,
            });
        }
        Ok(())
    }
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_THRESHOLD)
    }
}
