use regex::{Captures, Regex};

use crate::error::AnalyzerError;

/// nginx `log_format` used by the UI frontends:
///
/// ```text
/// $remote_addr $remote_user $http_x_real_ip [$time_local] "$request"
/// $status $body_bytes_sent "$http_referer" "$http_user_agent"
/// "$http_x_forwarded_for" "$http_X_REQUEST_ID" "$http_X_RB_USER" $request_time
/// ```
///
/// Digit classes are ASCII-only so every captured number converts.
const LOG_LINE_PATTERN: &str = concat!(
    r"(?i)",
    r"(?P<remote_addr>[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}) ",
    r"(?P<remote_user>-|.+) ",
    r"(?P<http_x_real_ip>-|.+) ",
    r"\[(?P<time_local>[0-9]{2}/[a-z]{3}/[0-9]{4}:[0-9]{2}:[0-9]{2}:[0-9]{2} [+-][0-9]{4})\] ",
    r#""(?P<method>GET|POST) (?P<url>.+)" "#,
    r"(?P<statuscode>[0-9]{3}) ",
    r"(?P<body_bytes_sent>[0-9]+) ",
    r#""(?P<http_referer>-|.+)" "#,
    r#""(?P<http_user_agent>.+)" "#,
    r#""(?P<http_x_forwarded_for>-|.+)" "#,
    r#""(?P<request_id>.+)" "#,
    r#""(?P<rb_user>.+)" "#,
    r"(?P<request_time>-|[0-9]+(?:\.[0-9]+)?)",
);

/// One successfully parsed access log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub remote_addr: String,
    pub remote_user: String,
    pub http_x_real_ip: String,
    pub time_local: String,
    pub method: String,
    /// Raw request target including the protocol, e.g. `/api/v2/banner/1 HTTP/1.1`.
    pub url: String,
    pub statuscode: u16,
    pub body_bytes_sent: String,
    pub http_referer: String,
    pub http_user_agent: String,
    pub http_x_forwarded_for: String,
    pub request_id: String,
    pub rb_user: String,
    /// Seconds; `-` in the log is read as 0.
    pub request_time: f64,
}

/// Result of matching one line against the grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Matched(LogRecord),
    Unmatched,
}

impl ParseOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, ParseOutcome::Matched(_))
    }
}

/// Compiled log line grammar. Build once per run and reuse for every line.
#[derive(Debug, Clone)]
pub struct LineParser {
    pattern: Regex,
}

impl LineParser {
    pub fn new() -> Result<Self, AnalyzerError> {
        Ok(Self {
            pattern: Regex::new(LOG_LINE_PATTERN)?,
        })
    }

    /// Match one line. Anything the grammar rejects is `Unmatched`, never an error.
    pub fn parse(&self, line: &str) -> ParseOutcome {
        match self.pattern.captures(line).and_then(|caps| record_from(&caps)) {
            Some(record) => ParseOutcome::Matched(record),
            None => ParseOutcome::Unmatched,
        }
    }
}

fn record_from(caps: &Captures<'_>) -> Option<LogRecord> {
    let field = |name: &str| caps.name(name).map(|m| m.as_str().to_string());

    let statuscode = caps.name("statuscode")?.as_str().parse::<u16>().ok()?;
    let request_time = parse_request_time(caps.name("request_time")?.as_str())?;

    Some(LogRecord {
        remote_addr: field("remote_addr")?,
        remote_user: field("remote_user")?,
        http_x_real_ip: field("http_x_real_ip")?,
        time_local: field("time_local")?,
        method: field("method")?,
        url: field("url")?,
        statuscode,
        body_bytes_sent: field("body_bytes_sent")?,
        http_referer: field("http_referer")?,
        http_user_agent: field("http_user_agent")?,
        http_x_forwarded_for: field("http_x_forwarded_for")?,
        request_id: field("request_id")?,
        rb_user: field("rb_user")?,
        request_time,
    })
}

fn parse_request_time(raw: &str) -> Option<f64> {
    if raw == "-" {
        return Some(0.0);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|t| t.is_finite() && *t >= 0.0)
}

/// Minimal matched record for tests of the later pipeline stages.
#[cfg(test)]
pub(crate) fn record_for(url: &str, request_time: f64) -> LogRecord {
    LogRecord {
        remote_addr: "127.0.0.1".to_string(),
        remote_user: "-".to_string(),
        http_x_real_ip: "-".to_string(),
        time_local: "29/Jun/2017:03:50:22 +0300".to_string(),
        method: "GET".to_string(),
        url: url.to_string(),
        statuscode: 200,
        body_bytes_sent: "0".to_string(),
        http_referer: "-".to_string(),
        http_user_agent: "-".to_string(),
        http_x_forwarded_for: "-".to_string(),
        request_id: "-".to_string(),
        rb_user: "-".to_string(),
        request_time,
    }
}
