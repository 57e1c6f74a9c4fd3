//! Scan orchestration: a bounded pool of worker threads over a track list.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};

use tracing::{debug, error, info};

use crate::abort::AbortHandle;
use crate::aggregate::aggregate;
use crate::config::ScanConfig;
use crate::decoder::DecoderRegistry;
use crate::models::{ScanEvent, ScanReport, TrackResult};
use crate::playlist::{Playlist, TrackId, META_URI};
use crate::worker::{scan_track, track_name, ScanBuffers, ScanContext, TrackOutcome};

/// Scan `tracks` with at most `config.jobs` tracks in flight.
///
/// `report.tracks[i]` always belongs to `tracks[i]`. Tracks not started
/// before `abort` was raised come back as `NotStarted`.
pub fn scan(
    playlist: &Playlist,
    decoders: &DecoderRegistry,
    tracks: &[TrackId],
    config: &ScanConfig,
    abort: &AbortHandle,
) -> ScanReport {
    run_scan(playlist, decoders, tracks, config, abort, None)
}

/// Like [`scan`], also streaming progress to `sender` and finishing with
/// `ScanEvent::ScanFinished`.
pub fn scan_with_events(
    playlist: &Playlist,
    decoders: &DecoderRegistry,
    tracks: &[TrackId],
    config: &ScanConfig,
    abort: &AbortHandle,
    sender: Sender<ScanEvent>,
) -> ScanReport {
    run_scan(playlist, decoders, tracks, config, abort, Some(sender))
}

fn track_names(playlist: &Playlist, tracks: &[TrackId]) -> Vec<String> {
    let guard = playlist.lock();
    tracks
        .iter()
        .map(|&id| match guard.find_meta(id, META_URI) {
            Some(uri) => track_name(uri),
            None => id.to_string(),
        })
        .collect()
}

fn run_scan(
    playlist: &Playlist,
    decoders: &DecoderRegistry,
    tracks: &[TrackId],
    config: &ScanConfig,
    abort: &AbortHandle,
    events: Option<Sender<ScanEvent>>,
) -> ScanReport {
    let names = track_names(playlist, tracks);
    let jobs = config.jobs.max(1).min(tracks.len());
    let next_index = AtomicUsize::new(0);
    let ctx = ScanContext {
        playlist,
        decoders,
        config,
        abort,
        events,
    };
    debug!("scanning {} tracks with {} workers", tracks.len(), jobs);

    let mut slots: Vec<Option<TrackOutcome>> = (0..tracks.len()).map(|_| None).collect();

    std::thread::scope(|scope| {
        let (results_tx, results_rx) = mpsc::channel::<(usize, TrackOutcome)>();

        for _ in 0..jobs {
            let ctx = ctx.clone();
            let results_tx = results_tx.clone();
            let next_index = &next_index;
            let names = &names;
            scope.spawn(move || {
                let mut buffers = ScanBuffers::new();
                loop {
                    if ctx.abort.is_aborted() {
                        break;
                    }
                    let index = next_index.fetch_add(1, Ordering::SeqCst);
                    if index >= tracks.len() {
                        break;
                    }
                    ctx.emit(ScanEvent::TrackStarted { index });
                    let outcome =
                        scan_track(&ctx, index, tracks[index], &names[index], &mut buffers);
                    ctx.emit(ScanEvent::TrackFinished {
                        index,
                        result: outcome.result.clone(),
                    });
                    if results_tx.send((index, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(results_tx);

        for (index, outcome) in results_rx {
            slots[index] = Some(outcome);
        }
    });

    let aborted = abort.is_aborted();
    let outcomes: Vec<TrackOutcome> = slots
        .into_iter()
        .zip(names)
        .map(|(slot, name)| {
            slot.unwrap_or_else(|| TrackOutcome {
                result: TrackResult::not_started(name),
                loudness: None,
            })
        })
        .collect();

    let album = if aborted {
        info!("scan aborted, album values omitted");
        None
    } else {
        aggregate(&outcomes, config.target_db).unwrap_or_else(|err| {
            error!("internal error while combining album loudness: {}", err);
            None
        })
    };

    let report = ScanReport {
        tracks: outcomes.into_iter().map(|o| o.result).collect(),
        album,
        target_db: config.target_db,
        aborted,
    };
    ctx.emit(ScanEvent::ScanFinished {
        report: report.clone(),
    });
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackStatus;

    #[test]
    fn test_empty_track_list() {
        let playlist = Playlist::new();
        let report = scan(
            &playlist,
            &DecoderRegistry::new(),
            &[],
            &ScanConfig::default(),
            &AbortHandle::new(),
        );
        assert!(report.tracks.is_empty());
        assert!(report.album.is_none());
        assert!(!report.aborted);
    }

    #[test]
    fn test_pre_aborted_scan_starts_nothing() {
        let playlist = Playlist::new();
        let ids = vec![
            playlist.add_track("/a/one.flac", "none", 10.0),
            playlist.add_track("/a/two.flac", "none", 10.0),
        ];
        let abort = AbortHandle::new();
        abort.abort();

        let report = scan(
            &playlist,
            &DecoderRegistry::new(),
            &ids,
            &ScanConfig::default(),
            &abort,
        );
        assert!(report.aborted);
        assert!(report.album.is_none());
        assert_eq!(report.tracks[0].name, "one.flac");
        assert_eq!(report.tracks[1].name, "two.flac");
        assert!(report
            .tracks
            .iter()
            .all(|t| t.status == TrackStatus::NotStarted));
    }

    #[test]
    fn test_events_end_with_scan_finished() {
        let playlist = Playlist::new();
        let ids = vec![playlist.add_track("live", "stream", f64::INFINITY)];
        let (tx, rx) = mpsc::channel();

        let report = scan_with_events(
            &playlist,
            &DecoderRegistry::new(),
            &ids,
            &ScanConfig::default(),
            &AbortHandle::new(),
            tx,
        );

        let events: Vec<ScanEvent> = rx.iter().collect();
        assert!(matches!(events[0], ScanEvent::TrackStarted { index: 0 }));
        match events.last() {
            Some(ScanEvent::ScanFinished { report: finished }) => assert_eq!(finished, &report),
            other => panic!("unexpected last event {:?}", other),
        }
    }
}
