use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Result;
use aws_sdk_s3::Client as S3Client;
use clap::Parser;
use tracing::{error, info};

use log_analyzer::{
    config::Config,
    discovery::{find_latest_local, LogNamePattern},
    logging,
    parser::LineParser,
    pipeline::analyze,
    report::{load_template, render_report, report_name, write_report},
    source::{find_latest_s3, open_log, parse_s3_uri},
};

const DEFAULT_CONFIG_PATH: &str = "./config.json";

/// Build an HTML report of per-URL request times from the latest nginx access log.
#[derive(Debug, Parser)]
#[command(name = "log_analyzer", version)]
struct Cli {
    /// JSON config merged over the built-in defaults [default: ./config.json]
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

async fn run(config: &Config) -> Result<()> {
    let names = LogNamePattern::new(&config.log_prefix)?;

    info!(log_dir = %config.log_dir, "looking for the latest log");
    let (latest, s3) = if let Some((bucket, prefix)) = parse_s3_uri(&config.log_dir) {
        let aws_conf = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        let client = S3Client::new(&aws_conf);
        let latest = find_latest_s3(&client, &bucket, &prefix, &names).await?;
        (latest, Some(client))
    } else {
        (find_latest_local(Path::new(&config.log_dir), &names)?, None)
    };

    let Some(log) = latest else {
        info!(log_dir = %config.log_dir, "no logs found");
        return Ok(());
    };
    info!(log = %log.location, date = %log.date, "found latest log");

    let name = report_name(log.date);
    let report_path = config.report_dir.join(&name);
    if report_path.exists() {
        info!(report = %report_path.display(), "report already exists");
        return Ok(());
    }

    // Read the template before parsing so a bad path fails fast.
    let template = load_template(config.report_template.as_deref())?;

    let reader = open_log(&log, s3.as_ref()).await?;
    let parser = LineParser::new()?;
    let analysis = analyze(
        reader,
        &parser,
        config.error_threshold,
        &log.location.to_string(),
    )?;
    info!(
        urls = analysis.rows.len(),
        lines_seen = analysis.lines_seen,
        lines_unparsed = analysis.lines_unparsed,
        "statistics computed"
    );

    let html = render_report(&template, &analysis.rows, config.report_size)?;
    let written = write_report(&config.report_dir, &name, &html)?;
    info!(report = %written.display(), "report written");

    Ok(())
}

/// Report a failed run exactly once and map it to the process exit status.
fn exit_status(result: Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            // Logging may not be up yet when the config itself is bad.
            if tracing::dispatcher::has_been_set() {
                error!("log analysis failed: {e:#}");
            } else {
                eprintln!("log analysis failed: {e:#}");
            }
            1
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    ExitCode::from(exit_status(try_main().await))
}

async fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path, true)?,
        None => Config::load(Path::new(DEFAULT_CONFIG_PATH), false)?,
    };
    logging::init_logging(config.program_logs.as_deref())?;

    info!("start");
    run(&config).await?;
    info!("done");

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{fs::File, io::Write};

    use flate2::{write::GzEncoder, Compression};

    use super::*;
    use log_analyzer::error::AnalyzerError;

    fn line(url: &str, request_time: &str) -> String {
        format!(
            concat!(
                r#"1.169.137.128 -  - [29/Jun/2017:03:50:23 +0300] "GET {} HTTP/1.1" 200 1002 "-" "#,
                r#""Configovod" "-" "1498697423-2118016444-4708-9752777" "712e90144abee9" {}"#,
            ),
            url, request_time
        )
    }

    fn write_gz(path: &Path, lines: &[String]) {
        let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        for l in lines {
            writeln!(encoder, "{l}").unwrap();
        }
        encoder.finish().unwrap();
    }

    fn test_config(root: &Path) -> Config {
        let log_dir = root.join("log");
        std::fs::create_dir_all(&log_dir).unwrap();
        Config {
            log_dir: log_dir.display().to_string(),
            report_dir: root.join("reports"),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_run_writes_report_for_latest_log() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let log_dir = PathBuf::from(&config.log_dir);

        write_gz(
            &log_dir.join("nginx-access-ui.log-20170630.gz"),
            &[
                line("/api/v2/banner/1", "0.500"),
                line("/api/v2/banner/1", "1.500"),
                line("/api/1/photogenic_banners/list/?server_name=WIN7RB4", "0.133"),
            ],
        );
        std::fs::write(
            log_dir.join("nginx-access-ui.log-20170629"),
            line("/older", "9.0"),
        )
        .unwrap();

        run(&config).await.unwrap();

        let report = root.path().join("reports").join("report-2017.06.30.html");
        let html = std::fs::read_to_string(&report).unwrap();
        assert!(html.contains("/api/v2/banner/1 HTTP/1.1"));
        assert!(!html.contains("/older"));
        assert!(html.contains("var lastRow = 1000"));

        // A second run leaves the existing report alone.
        std::fs::write(&report, "kept").unwrap();
        run(&config).await.unwrap();
        assert_eq!(std::fs::read_to_string(&report).unwrap(), "kept");
    }

    #[tokio::test]
    async fn test_run_without_logs_is_ok() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());

        run(&config).await.unwrap();
        assert!(!root.path().join("reports").exists());
    }

    #[tokio::test]
    async fn test_run_rejects_unparseable_log() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let log_dir = PathBuf::from(&config.log_dir);

        let mut lines = vec![line("/ok", "0.1"); 6];
        lines.extend(vec!["garbage".to_string(); 4]);
        std::fs::write(log_dir.join("nginx-access-ui.log-20170630"), lines.join("\n")).unwrap();

        let err = run(&config).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalyzerError>(),
            Some(AnalyzerError::QualityThresholdExceeded { unparsed: 4, total: 10, .. })
        ));
        assert!(!root.path().join("reports").join("report-2017.06.30.html").exists());
    }

    #[tokio::test]
    async fn test_run_rejects_empty_log() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        File::create(PathBuf::from(&config.log_dir).join("nginx-access-ui.log-20170630")).unwrap();

        let err = run(&config).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalyzerError>(),
            Some(AnalyzerError::EmptyOrZeroTotals { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_run_maps_to_nonzero_status() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        File::create(PathBuf::from(&config.log_dir).join("nginx-access-ui.log-20170630")).unwrap();

        assert_eq!(exit_status(run(&config).await), 1);
        assert_eq!(exit_status(Ok(())), 0);
    }

    #[test]
    fn test_cli_parses_config_flag() {
        let cli = Cli::try_parse_from(["log_analyzer", "--config", "/etc/analyzer.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/analyzer.json")));

        let cli = Cli::try_parse_from(["log_analyzer"]).unwrap();
        assert_eq!(cli.config, None);
    }
}
