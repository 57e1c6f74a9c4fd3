pub mod app;
pub mod ui;

use std::io;
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::abort::AbortHandle;
use crate::config::ScanConfig;
use crate::decoder::DecoderRegistry;
use crate::format;
use crate::models::{ScanEvent, ScanReport};
use crate::playlist::{Playlist, TrackId};
use crate::scanner::scan_with_events;

use app::{App, ExportFormat, View};

/// Run a scan behind a live progress view. Quitting while the scan runs
/// aborts it; the (possibly partial) report is returned once workers stop.
pub fn run(
    playlist: Arc<Playlist>,
    decoders: Arc<DecoderRegistry>,
    tracks: Vec<TrackId>,
    names: Vec<String>,
    config: ScanConfig,
    export_dir: &Path,
) -> Result<ScanReport> {
    let mut app = App::new(names, export_dir.to_path_buf(), config.jobs);
    let abort = AbortHandle::new();

    // Spawn scan thread
    let (tx, rx) = mpsc::channel::<ScanEvent>();
    let scan_abort = abort.clone();
    let handle = std::thread::spawn(move || {
        scan_with_events(&playlist, &decoders, &tracks, &config, &scan_abort, tx)
    });

    // Setup terminal
    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app, &rx, &abort);

    // Restore terminal
    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;

    if app.is_running() {
        abort.abort();
    }
    result?;
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("scan thread panicked"))
}

fn export(app: &App, report: &ScanReport) -> String {
    let content = match app.export_format {
        ExportFormat::Text => format::format_table(report),
        ExportFormat::Json => format::format_json(report),
        ExportFormat::Csv => format::format_csv(report),
    };
    let output_path = app
        .path
        .join(format!("rg_report.{}", app.export_format.extension()));
    match std::fs::write(&output_path, &content) {
        Ok(_) => format!("Saved to {}", output_path.display()),
        Err(e) => format!("Error: {}", e),
    }
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    rx: &mpsc::Receiver<ScanEvent>,
    abort: &AbortHandle,
) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::render(frame, app))?;

        // Drain scan events
        while let Ok(event) = rx.try_recv() {
            app.handle_event(event);
        }

        // Poll for key events
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match app.view {
                    View::Main => match key.code {
                        KeyCode::Char('q') => {
                            app.should_quit = true;
                        }
                        KeyCode::Esc | KeyCode::Char('c') => {
                            if app.is_running() {
                                abort.abort();
                                app.abort_requested = true;
                            }
                        }
                        KeyCode::Char('e') => {
                            if !app.is_running() {
                                app.view = View::Export;
                                app.export_message = None;
                            }
                        }
                        KeyCode::Char('a') => {
                            app.view = View::About;
                        }
                        KeyCode::Char('j') | KeyCode::Down => {
                            app.select_next();
                        }
                        KeyCode::Char('k') | KeyCode::Up => {
                            app.select_prev();
                        }
                        _ => {}
                    },
                    View::About => match key.code {
                        KeyCode::Esc | KeyCode::Char('q') => {
                            app.view = View::Main;
                        }
                        _ => {}
                    },
                    View::Export => match key.code {
                        KeyCode::Esc => {
                            app.view = View::Main;
                        }
                        KeyCode::Tab => {
                            app.cycle_export_format();
                            app.export_message = None;
                        }
                        KeyCode::Enter => {
                            if let Some(ref report) = app.report {
                                app.export_message = Some(export(app, report));
                            }
                        }
                        _ => {}
                    },
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
