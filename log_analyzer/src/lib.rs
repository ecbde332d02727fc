//! Per-URL request time report for rotated nginx access logs.
//!
//! The latest log is found by the date in its file name, streamed line by
//! line through a fixed grammar, and aggregated into per-URL statistics that
//! are rendered into a static HTML report.

pub mod aggregate;
pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod quality;
pub mod report;
pub mod source;
pub mod stats;
