use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::models::{ScanEvent, ScanReport, TrackResult};

#[derive(Debug, Clone)]
pub enum RowState {
    Pending,
    Scanning(f32),
    Finished(TrackResult),
}

#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Main,
    About,
    Export,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportFormat {
    Text,
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

pub struct App {
    pub tracks: Vec<(String, RowState)>,
    pub report: Option<ScanReport>,
    pub view: View,
    pub selected: usize,
    pub scroll_offset: usize,
    pub should_quit: bool,
    /// Directory exports are written to
    pub path: PathBuf,
    pub export_format: ExportFormat,
    pub export_message: Option<String>,
    /// Visible height of the track table (updated each frame by the renderer)
    pub visible_rows: usize,
    pub abort_requested: bool,
    pub scan_start: Instant,
    pub scan_elapsed: Option<Duration>,
    pub jobs: usize,
}

impl App {
    pub fn new(names: Vec<String>, path: PathBuf, jobs: usize) -> Self {
        let tracks = names
            .into_iter()
            .map(|name| (name, RowState::Pending))
            .collect();
        Self {
            tracks,
            report: None,
            view: View::Main,
            selected: 0,
            scroll_offset: 0,
            should_quit: false,
            path,
            export_format: ExportFormat::Text,
            export_message: None,
            visible_rows: 20,
            abort_requested: false,
            scan_start: Instant::now(),
            scan_elapsed: None,
            jobs,
        }
    }

    pub fn handle_event(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::TrackStarted { index } => {
                if let Some(track) = self.tracks.get_mut(index) {
                    track.1 = RowState::Scanning(0.0);
                }
            }
            ScanEvent::TrackProgress { index, percent } => {
                if let Some(track) = self.tracks.get_mut(index) {
                    track.1 = RowState::Scanning(percent);
                }
            }
            ScanEvent::TrackFinished { index, result } => {
                if let Some(track) = self.tracks.get_mut(index) {
                    track.1 = RowState::Finished(result);
                }
            }
            ScanEvent::ScanFinished { report } => {
                // rows never started are only known once the scan is over
                for (track, result) in self.tracks.iter_mut().zip(&report.tracks) {
                    track.1 = RowState::Finished(result.clone());
                }
                self.scan_elapsed = Some(self.scan_start.elapsed());
                self.report = Some(report);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.report.is_none()
    }

    pub fn completed_count(&self) -> usize {
        self.tracks
            .iter()
            .filter(|(_, s)| matches!(s, RowState::Finished(r) if r.status.is_done()))
            .count()
    }

    pub fn in_flight_count(&self) -> usize {
        self.tracks
            .iter()
            .filter(|(_, s)| matches!(s, RowState::Scanning(_)))
            .count()
    }

    pub fn select_next(&mut self) {
        if !self.tracks.is_empty() {
            self.selected = (self.selected + 1).min(self.tracks.len() - 1);
            self.ensure_visible();
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
        self.ensure_visible();
    }

    /// Adjust scroll_offset so that self.selected is within the visible window.
    fn ensure_visible(&mut self) {
        if self.visible_rows == 0 {
            return;
        }
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + self.visible_rows {
            self.scroll_offset = self.selected - self.visible_rows + 1;
        }
    }

    pub fn cycle_export_format(&mut self) {
        self.export_format = match self.export_format {
            ExportFormat::Text => ExportFormat::Json,
            ExportFormat::Json => ExportFormat::Csv,
            ExportFormat::Csv => ExportFormat::Text,
        };
    }
}
