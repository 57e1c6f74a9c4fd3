use crate::models::{ScanReport, TrackResult, TrackStatus};

/// Short status label for table and CSV output.
pub fn status_label(status: &TrackStatus) -> &'static str {
    match status {
        TrackStatus::NotStarted => "not started",
        TrackStatus::Done => "ok",
        TrackStatus::Aborted => "aborted",
        TrackStatus::Failed { .. } => "failed",
    }
}

fn format_db(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:+.2} dB", v),
        Some(v) if v > 0.0 => "+inf dB".to_string(),
        Some(_) => "-inf dB".to_string(),
        None => "-".to_string(),
    }
}

fn format_lufs(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.2} LUFS", v),
        Some(_) => "-inf LUFS".to_string(),
        None => "-".to_string(),
    }
}

fn format_peak(value: Option<f64>) -> String {
    value
        .map(|p| format!("{:.6}", p))
        .unwrap_or_else(|| "-".to_string())
}

fn format_row(track: &TrackResult) -> String {
    let mut row = format!(
        "{:>10} {:>10} {:>12} {:>12}  {}",
        format_db(track.gain_db),
        format_peak(track.peak),
        format_lufs(track.loudness_lufs),
        status_label(&track.status),
        track.name,
    );
    if let TrackStatus::Failed { message, .. } = &track.status {
        row.push_str(&format!(" ({})", message));
    }
    row
}

/// Format a scan report as a table, one row per track plus album footer.
pub fn format_table(report: &ScanReport) -> String {
    let separator = "\u{2500}".repeat(66);
    let mut output = String::new();

    // Header
    output.push_str(&format!(
        "{:>10} {:>10} {:>12} {:>12}  {}\n",
        "Gain", "Peak", "Loudness", "Status", "Track"
    ));
    output.push_str(&separator);
    output.push('\n');

    // Track rows
    for track in &report.tracks {
        output.push_str(&format_row(track));
        output.push('\n');
    }

    output.push_str(&separator);
    output.push('\n');

    // Footer
    output.push_str(&format!(
        "Tracks measured:   {}/{}\n",
        report.completed_count(),
        report.tracks.len()
    ));
    match &report.album {
        Some(album) => output.push_str(&format!(
            "Album gain:        {}\n\
             Album peak:        {:.6}\n\
             Album loudness:    {}",
            format_db(Some(album.gain_db)),
            album.peak,
            format_lufs(Some(album.loudness_lufs)),
        )),
        None if report.aborted => output.push_str("Album gain:        n/a (scan aborted)"),
        None => output.push_str("Album gain:        n/a"),
    }

    output
}

/// Format a scan report as pretty-printed JSON.
pub fn format_json(report: &ScanReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}

/// Format a scan report as CSV, one line per track.
pub fn format_csv(report: &ScanReport) -> String {
    let mut output = String::from("Gain dB,Peak,Loudness LUFS,Status,Track\n");
    let cell = |v: Option<f64>, precision: usize| {
        v.map(|v| format!("{:.*}", precision, v)).unwrap_or_default()
    };
    for track in &report.tracks {
        output.push_str(&format!(
            "{},{},{},{},{}\n",
            cell(track.gain_db, 2),
            cell(track.peak, 6),
            cell(track.loudness_lufs, 2),
            status_label(&track.status),
            track.name,
        ));
    }
    output
}
