use std::cmp::Ordering;

use serde::Serialize;

use crate::aggregate::{RunTotals, UrlAccumulator};
use crate::error::AnalyzerError;

/// Report row for one URL. Float fields are rounded to 3 decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlStatRow {
    pub url: String,
    pub count: u64,
    pub count_perc: f64,
    pub time_sum: f64,
    pub time_perc: f64,
    pub time_avg: f64,
    pub time_max: f64,
    pub time_med: f64,
}

/// Half-to-even, so an exact tie such as 1.2345 goes to 1.234.
fn round3(value: f64) -> f64 {
    (value * 1000.0).round_ties_even() / 1000.0
}

fn median(times: &[f64]) -> f64 {
    let mut sorted = times.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn url_row(url: &str, times: &[f64], totals: RunTotals) -> UrlStatRow {
    let count = times.len() as u64;
    let time_sum: f64 = times.iter().sum();
    let time_max = times.iter().copied().fold(f64::MIN, f64::max);

    UrlStatRow {
        url: url.to_string(),
        count,
        count_perc: round3(100.0 * count as f64 / totals.total_matched as f64),
        time_sum: round3(time_sum),
        time_perc: round3(100.0 * time_sum / totals.total_time),
        time_avg: round3(time_sum / count as f64),
        time_max: round3(time_max),
        time_med: round3(median(times)),
    }
}

/// Compute one row per URL against the given totals, ranked by `time_sum`
/// descending. Rows with equal `time_sum` stay in URL order.
///
/// The totals are taken separately from the accumulator so that a partial
/// view (one shard, a filtered map) can be ranked against the full run.
pub fn calc_stats(
    urls: &UrlAccumulator,
    totals: RunTotals,
) -> Result<Vec<UrlStatRow>, AnalyzerError> {
    if totals.total_matched == 0 || totals.total_time <= 0.0 {
        return Err(AnalyzerError::EmptyOrZeroTotals {
            matched: totals.total_matched,
            total_time: totals.total_time,
        });
    }

    let mut rows: Vec<UrlStatRow> = urls
        .iter()
        .filter(|(_, times)| !times.is_empty())
        .map(|(url, times)| url_row(url, times, totals))
        .collect();

    rows.sort_by(|a, b| {
        b.time_sum
            .partial_cmp(&a.time_sum)
            .unwrap_or(Ordering::Equal)
    });

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_accumulator() -> UrlAccumulator {
        vec![
            ("url1", vec![10.0, 15.0, 20.0, 25.0, 30.0, 45.0, 50.0, 100.0]),
            ("url2", (0..20).map(|i| i as f64).collect()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_calc_stats_scenario() {
        let totals = RunTotals {
            total_matched: 100,
            total_time: 500.0,
        };
        let rows = calc_stats(&scenario_accumulator(), totals).unwrap();

        assert_eq!(
            rows,
            vec![
                UrlStatRow {
                    url: "url1".to_string(),
                    count: 8,
                    count_perc: 8.0,
                    time_sum: 295.0,
                    time_perc: 59.0,
                    time_avg: 36.875,
                    time_max: 100.0,
                    time_med: 27.5,
                },
                UrlStatRow {
                    url: "url2".to_string(),
                    count: 20,
                    count_perc: 20.0,
                    time_sum: 190.0,
                    time_perc: 38.0,
                    time_avg: 9.5,
                    time_max: 19.0,
                    time_med: 9.5,
                },
            ]
        );
    }

    #[test]
    fn test_single_element_list() {
        let acc: UrlAccumulator = vec![("/only", vec![0.731])].into_iter().collect();
        let rows = calc_stats(&acc, acc.totals()).unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.count, 1);
        assert_eq!(row.time_med, 0.731);
        assert_eq!(row.time_max, 0.731);
        assert_eq!(row.time_avg, 0.731);
        assert_eq!(row.count_perc, 100.0);
        assert_eq!(row.time_perc, 100.0);
    }

    #[test]
    fn test_odd_length_median_ignores_arrival_order() {
        let acc: UrlAccumulator = vec![("/x", vec![9.0, 1.0, 5.0])].into_iter().collect();
        let rows = calc_stats(&acc, acc.totals()).unwrap();
        assert_eq!(rows[0].time_med, 5.0);
    }

    #[test]
    fn test_rounding_to_three_decimals() {
        let acc: UrlAccumulator = vec![("/a", vec![0.1, 0.2]), ("/b", vec![0.0004])]
            .into_iter()
            .collect();
        let rows = calc_stats(&acc, acc.totals()).unwrap();

        assert_eq!(rows[0].url, "/a");
        assert_eq!(rows[0].time_sum, 0.3);
        assert_eq!(rows[0].time_avg, 0.15);
        assert_eq!(rows[0].count_perc, 66.667);
        assert_eq!(rows[1].time_sum, 0.0);
    }

    #[test]
    fn test_even_length_median_ties_round_to_even() {
        let acc: UrlAccumulator = vec![("/m", vec![1.234, 1.235]), ("/n", vec![0.002, 0.003])]
            .into_iter()
            .collect();
        let rows = calc_stats(&acc, acc.totals()).unwrap();

        let med = |url: &str| rows.iter().find(|r| r.url == url).unwrap().time_med;
        assert_eq!(med("/m"), 1.234);
        assert_eq!(med("/n"), 0.002);
    }

    #[test]
    fn test_sorted_by_time_sum_desc_with_stable_ties() {
        let acc: UrlAccumulator = vec![
            ("/c", vec![1.0]),
            ("/a", vec![1.0]),
            ("/big", vec![5.0]),
            ("/b", vec![0.5, 0.5]),
        ]
        .into_iter()
        .collect();
        let rows = calc_stats(&acc, acc.totals()).unwrap();

        let urls: Vec<&str> = rows.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["/big", "/a", "/b", "/c"]);
    }

    #[test]
    fn test_totals_round_trip() {
        let acc: UrlAccumulator = vec![
            ("/a", vec![0.123, 0.456, 0.789]),
            ("/b", vec![1.5]),
            ("/c", vec![0.001, 0.002]),
        ]
        .into_iter()
        .collect();
        let totals = acc.totals();
        let rows = calc_stats(&acc, totals).unwrap();

        let count: u64 = rows.iter().map(|r| r.count).sum();
        assert_eq!(count, totals.total_matched);

        let time: f64 = rows.iter().map(|r| r.time_sum).sum();
        assert!((time - totals.total_time).abs() <= 0.001 * rows.len() as f64);
    }

    #[test]
    fn test_idempotent() {
        let acc = scenario_accumulator();
        let totals = acc.totals();
        let first = calc_stats(&acc, totals).unwrap();
        let second = calc_stats(&acc, totals).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_totals_is_an_error() {
        let empty = UrlAccumulator::new();
        assert!(matches!(
            calc_stats(&empty, empty.totals()),
            Err(AnalyzerError::EmptyOrZeroTotals { matched: 0, .. })
        ));

        // Every request logged with "-" as its time.
        let untimed: UrlAccumulator = vec![("/a", vec![0.0, 0.0])].into_iter().collect();
        assert!(matches!(
            calc_stats(&untimed, untimed.totals()),
            Err(AnalyzerError::EmptyOrZeroTotals { matched: 2, .. })
        ));
    }

    #[test]
    fn test_merge_order_does_not_change_rows() {
        let a: UrlAccumulator = vec![("/x", vec![3.0, 1.0]), ("/y", vec![2.0])]
            .into_iter()
            .collect();
        let b: UrlAccumulator = vec![("/x", vec![7.0]), ("/z", vec![4.0])]
            .into_iter()
            .collect();

        let mut ab = a.clone();
        ab.merge(b.clone());
        let mut ba = b;
        ba.merge(a);

        let rows_ab = calc_stats(&ab, ab.totals()).unwrap();
        let rows_ba = calc_stats(&ba, ba.totals()).unwrap();
        assert_eq!(rows_ab, rows_ba);
    }
}
