use std::collections::BTreeMap;

use crate::parser::{LogRecord, ParseOutcome};

/// Global counters over all matched records of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RunTotals {
    pub total_matched: u64,
    pub total_time: f64,
}

/// Request times per URL, in arrival order.
///
/// Keys are ordered so that the ranking built from this map breaks ties the
/// same way on every run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UrlAccumulator {
    by_url: BTreeMap<String, Vec<f64>>,
    totals: RunTotals,
}

impl UrlAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parse outcome; unmatched lines are skipped.
    pub fn observe(&mut self, outcome: ParseOutcome) {
        if let ParseOutcome::Matched(record) = outcome {
            self.record(record);
        }
    }

    pub fn record(&mut self, record: LogRecord) {
        self.push(record.url, record.request_time);
    }

    /// Append one request time under `url` and update the totals.
    pub fn push(&mut self, url: String, request_time: f64) {
        self.by_url.entry(url).or_default().push(request_time);
        self.totals.total_matched += 1;
        self.totals.total_time += request_time;
    }

    /// Fold another shard into this one. Per-URL lists are concatenated and
    /// totals added, so the resulting statistics do not depend on merge order.
    pub fn merge(&mut self, other: UrlAccumulator) {
        for (url, mut times) in other.by_url {
            self.by_url.entry(url).or_default().append(&mut times);
        }
        self.totals.total_matched += other.totals.total_matched;
        self.totals.total_time += other.totals.total_time;
    }

    pub fn totals(&self) -> RunTotals {
        self.totals
    }

    pub fn url_count(&self) -> usize {
        self.by_url.len()
    }

    /// URLs in key order with their times.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.by_url
            .iter()
            .map(|(url, times)| (url.as_str(), times.as_slice()))
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<f64>)> for UrlAccumulator {
    fn from_iter<I: IntoIterator<Item = (S, Vec<f64>)>>(iter: I) -> Self {
        let mut acc = UrlAccumulator::new();
        for (url, times) in iter {
            let url = url.into();
            for time in times {
                acc.push(url.clone(), time);
            }
        }
        acc
    }
}
