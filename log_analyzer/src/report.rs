use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::stats::UrlStatRow;

const DEFAULT_TEMPLATE: &str = include_str!("../templates/report.html");
const TABLE_PLACEHOLDER: &str = "$table_json";
const LAST_ROW_DEFAULT: &str = "var lastRow = 150";

/// `report-YYYY.MM.DD.html` for the log of the given day.
pub fn report_name(date: NaiveDate) -> String {
    format!("report-{}.html", date.format("%Y.%m.%d"))
}

/// Report template text: a configured file, or the one built into the binary.
pub fn load_template(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read report template: {}", path.display())),
        None => Ok(DEFAULT_TEMPLATE.to_string()),
    }
}

/// Fill the template with the top `report_size` rows.
pub fn render_report(template: &str, rows: &[UrlStatRow], report_size: usize) -> Result<String> {
    let shown = &rows[..rows.len().min(report_size)];

    // "</" inside a URL must not terminate the surrounding <script> element.
    let table_json = serde_json::to_string(shown)
        .context("Failed to serialize report rows to JSON")?
        .replace("</", "<\\/");

    Ok(template
        .replace(LAST_ROW_DEFAULT, &format!("var lastRow = {report_size}"))
        .replace(TABLE_PLACEHOLDER, &table_json))
}

/// Write the report under `dir`, creating it if needed. The file appears
/// under its final name only once it is completely written.
pub fn write_report(dir: &Path, name: &str, html: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory: {}", dir.display()))?;

    let path = dir.join(name);
    let tmp_path = dir.join(format!(".{name}.tmp"));

    std::fs::write(&tmp_path, html)
        .with_context(|| format!("Failed to write HTML report to {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, &path)
        .with_context(|| format!("Failed to move HTML report into place: {}", path.display()))?;

    Ok(path)
}
