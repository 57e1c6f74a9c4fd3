use std::io;
use std::path::Path;

use crate::models::ScanReport;

const REPORT_FILENAME: &str = "rg_report.json";

/// Check if a saved report exists in the given directory.
pub fn report_exists(dir: &Path) -> bool {
    dir.join(REPORT_FILENAME).exists()
}

/// Load a saved scan report from `rg_report.json` in the given directory.
/// Returns `None` if the file is missing or cannot be parsed.
pub fn load_cached_report(dir: &Path) -> Option<ScanReport> {
    let path = dir.join(REPORT_FILENAME);
    let data = std::fs::read_to_string(&path).ok()?;
    serde_json::from_str(&data).ok()
}

/// Save a scan report as pretty-printed JSON to `rg_report.json` in the
/// given directory. Aborted scans are not cached.
pub fn save_report(dir: &Path, report: &ScanReport) -> io::Result<()> {
    if report.aborted {
        return Ok(());
    }
    let path = dir.join(REPORT_FILENAME);
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    std::fs::write(&path, json)
}
