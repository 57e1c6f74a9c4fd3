//! Scanner behaviour with synthetic decoders, independent of any file format.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use rgscan::abort::AbortHandle;
use rgscan::config::{FailurePolicy, ScanConfig};
use rgscan::convert::{PcmFormat, SampleEncoding};
use rgscan::decoder::{Decoder, DecoderRegistry, DecoderSession, TrackSource};
use rgscan::error::{FailureKind, Result, ScanError};
use rgscan::models::{ScanEvent, TrackStatus};
use rgscan::playlist::{Playlist, TrackId};
use rgscan::scanner::{scan, scan_with_events};

const RATE: u32 = 48000;

/// Generates a sine described by its URI: `"<amplitude>,<channels>,<seconds>"`.
#[derive(Default)]
struct Synth {
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    /// Sleep per block, to keep several tracks in flight at once
    delay: Option<Duration>,
    /// Raise this handle once a session has produced this many blocks
    abort_after: Option<(AbortHandle, usize)>,
    /// Most blocks any one session was asked for after the abort was raised
    late_reads: Arc<AtomicUsize>,
}

impl Decoder for Synth {
    fn id(&self) -> &str {
        "synth"
    }

    fn open(&self) -> Box<dyn DecoderSession> {
        Box::new(SynthSession {
            active: Arc::clone(&self.active),
            max_active: Arc::clone(&self.max_active),
            delay: self.delay,
            abort_after: self.abort_after.clone(),
            late_reads: Arc::clone(&self.late_reads),
            reads_after_abort: 0,
            amplitude: 0.0,
            channels: 0,
            remaining: 0,
            position: 0,
            blocks: 0,
            counted: false,
        })
    }
}

struct SynthSession {
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    delay: Option<Duration>,
    abort_after: Option<(AbortHandle, usize)>,
    late_reads: Arc<AtomicUsize>,
    reads_after_abort: usize,
    amplitude: f32,
    channels: usize,
    remaining: usize,
    position: usize,
    blocks: usize,
    counted: bool,
}

impl DecoderSession for SynthSession {
    fn init(&mut self, source: &TrackSource) -> Result<PcmFormat> {
        let parts: Vec<&str> = source.uri.split(',').collect();
        let [amplitude, channels, seconds] = parts.as_slice() else {
            return Err(ScanError::DecodeInit {
                uri: source.uri.clone(),
                reason: "bad synth uri".to_string(),
            });
        };
        self.amplitude = amplitude.parse().unwrap();
        self.channels = channels.parse().unwrap();
        self.remaining = (seconds.parse::<f64>().unwrap() * RATE as f64) as usize;

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.counted = true;
        Ok(PcmFormat::new(self.channels, RATE, SampleEncoding::F32))
    }

    fn read(&mut self, buffer: &mut [u8]) -> usize {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.blocks += 1;
        if let Some((ref abort, after)) = self.abort_after {
            if abort.is_aborted() {
                self.reads_after_abort += 1;
                self.late_reads
                    .fetch_max(self.reads_after_abort, Ordering::SeqCst);
            } else if self.blocks >= after {
                abort.abort();
            }
        }

        let frame_bytes = self.channels * 4;
        let frames = (buffer.len() / frame_bytes).min(self.remaining);
        for frame in 0..frames {
            let t = (self.position + frame) as f32 / RATE as f32;
            let sample = self.amplitude * (2.0 * std::f32::consts::PI * 1000.0 * t).sin();
            for ch in 0..self.channels {
                let offset = (frame * self.channels + ch) * 4;
                buffer[offset..offset + 4].copy_from_slice(&sample.to_le_bytes());
            }
        }
        self.position += frames;
        self.remaining -= frames;
        frames * frame_bytes
    }
}

impl Drop for SynthSession {
    fn drop(&mut self) {
        if self.counted {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

fn registry(synth: Synth) -> DecoderRegistry {
    let mut decoders = DecoderRegistry::new();
    decoders.register(Arc::new(synth));
    decoders
}

fn add(playlist: &Playlist, uris: &[&str]) -> Vec<TrackId> {
    uris.iter()
        .map(|uri| {
            let seconds: f64 = uri.rsplit(',').next().unwrap().parse().unwrap();
            playlist.add_track(uri, "synth", seconds)
        })
        .collect()
}

#[test]
fn test_concurrency_is_bounded() {
    let synth = Synth {
        delay: Some(Duration::from_millis(2)),
        ..Default::default()
    };
    let max_active = Arc::clone(&synth.max_active);
    let decoders = registry(synth);
    let playlist = Playlist::new();
    let tracks = add(&playlist, &["0.5,2,1"; 8]);

    let report = scan(
        &playlist,
        &decoders,
        &tracks,
        &ScanConfig::default().with_jobs(3),
        &AbortHandle::new(),
    );

    assert_eq!(report.completed_count(), 8);
    let peak_concurrency = max_active.load(Ordering::SeqCst);
    assert!(peak_concurrency <= 3, "{} sessions were open at once", peak_concurrency);
    assert!(peak_concurrency >= 1);
}

#[test]
fn test_all_tracks_run_when_jobs_exceed_count() {
    let synth = Synth {
        delay: Some(Duration::from_millis(5)),
        ..Default::default()
    };
    let max_active = Arc::clone(&synth.max_active);
    let decoders = registry(synth);
    let playlist = Playlist::new();
    let tracks = add(&playlist, &["0.5,2,1"; 4]);

    let report = scan(
        &playlist,
        &decoders,
        &tracks,
        &ScanConfig::default().with_jobs(16),
        &AbortHandle::new(),
    );

    assert_eq!(report.completed_count(), 4);
    assert_eq!(max_active.load(Ordering::SeqCst), 4);
}

#[test]
fn test_index_alignment_with_uneven_lengths() {
    let decoders = registry(Synth::default());
    let playlist = Playlist::new();
    let uris = ["0.9,1,4", "0.1,1,0.5", "0.5,2,2", "0.3,1,0.2"];
    let tracks = add(&playlist, &uris);

    let report = scan(
        &playlist,
        &decoders,
        &tracks,
        &ScanConfig::default().with_jobs(4),
        &AbortHandle::new(),
    );

    for (uri, result) in uris.iter().zip(&report.tracks) {
        let amplitude: f64 = uri.split(',').next().unwrap().parse().unwrap();
        assert_eq!(&result.name, uri);
        assert!((result.peak.unwrap() - amplitude).abs() < 0.01);
    }
}

#[test]
fn test_sequential_and_parallel_agree() {
    let uris = ["0.9,1,1", "0.1,2,1", "0.5,5,1"];
    let run = |jobs| {
        let decoders = registry(Synth::default());
        let playlist = Playlist::new();
        let tracks = add(&playlist, &uris);
        scan(
            &playlist,
            &decoders,
            &tracks,
            &ScanConfig::default().with_jobs(jobs),
            &AbortHandle::new(),
        )
    };
    assert_eq!(run(1), run(3));
}

#[test]
fn test_seven_channels_fail_only_that_track() {
    let decoders = registry(Synth::default());
    let playlist = Playlist::new();
    let tracks = add(&playlist, &["0.5,2,1", "0.5,7,1", "0.5,6,1"]);

    let report = scan(
        &playlist,
        &decoders,
        &tracks,
        &ScanConfig::default().with_jobs(1),
        &AbortHandle::new(),
    );

    assert!(!report.aborted);
    assert_eq!(report.tracks[0].status, TrackStatus::Done);
    match &report.tracks[1].status {
        TrackStatus::Failed { kind, message } => {
            assert_eq!(*kind, FailureKind::UnsupportedChannelCount);
            assert!(message.contains("7 channels"));
        }
        other => panic!("unexpected status {:?}", other),
    }
    assert_eq!(report.tracks[2].status, TrackStatus::Done);
    assert_eq!(report.album.unwrap().tracks_measured, 2);
}

#[test]
fn test_abort_on_error_policy_stops_scan() {
    let decoders = registry(Synth::default());
    let playlist = Playlist::new();
    let tracks = add(&playlist, &["0.5,7,1", "0.5,2,1", "0.5,2,1"]);

    let report = scan(
        &playlist,
        &decoders,
        &tracks,
        &ScanConfig::default()
            .with_jobs(1)
            .with_failure_policy(FailurePolicy::AbortScan),
        &AbortHandle::new(),
    );

    assert!(report.aborted);
    assert!(report.album.is_none());
    assert!(matches!(report.tracks[0].status, TrackStatus::Failed { .. }));
    assert_eq!(report.tracks[1].status, TrackStatus::NotStarted);
    assert_eq!(report.tracks[2].status, TrackStatus::NotStarted);
}

#[test]
fn test_abort_mid_scan() {
    let abort = AbortHandle::new();
    let decoders = registry(Synth {
        abort_after: Some((abort.clone(), 5)),
        ..Default::default()
    });
    let playlist = Playlist::new();
    let tracks = add(&playlist, &["0.5,2,10", "0.5,2,10", "0.5,2,10"]);

    let report = scan(
        &playlist,
        &decoders,
        &tracks,
        &ScanConfig::default().with_jobs(1),
        &abort,
    );

    assert!(report.aborted);
    assert!(report.album.is_none());
    let first = &report.tracks[0];
    assert_eq!(first.status, TrackStatus::Aborted);
    // partial measurement from the blocks read before the abort
    assert!((first.peak.unwrap() - 0.5).abs() < 0.01);
    assert_eq!(report.tracks[1].status, TrackStatus::NotStarted);
    assert_eq!(report.tracks[2].status, TrackStatus::NotStarted);
}

#[test]
fn test_workers_stop_within_one_block_of_abort() {
    let abort = AbortHandle::new();
    let synth = Synth {
        delay: Some(Duration::from_millis(1)),
        abort_after: Some((abort.clone(), 20)),
        ..Default::default()
    };
    let late_reads = Arc::clone(&synth.late_reads);
    let decoders = registry(synth);
    let playlist = Playlist::new();
    let tracks = add(&playlist, &["0.5,2,30"; 3]);

    let report = scan(
        &playlist,
        &decoders,
        &tracks,
        &ScanConfig::default().with_jobs(3),
        &abort,
    );

    assert!(report.aborted);
    assert!(report.tracks.iter().all(|t| !t.status.is_done()));
    let late = late_reads.load(Ordering::SeqCst);
    assert!(late <= 1, "a session read {} blocks after the abort", late);
}

#[test]
fn test_non_finite_durations_are_skipped() {
    let decoders = registry(Synth::default());
    let playlist = Playlist::new();
    let tracks = vec![
        playlist.add_track("0.5,2,1", "synth", 1.0),
        playlist.add_track("0.5,2,1", "synth", f64::INFINITY),
        playlist.add_track("0.5,2,1", "synth", -1.0),
        playlist.add_track("0.5,2,1", "synth", f64::NAN),
    ];

    let report = scan(
        &playlist,
        &decoders,
        &tracks,
        &ScanConfig::default(),
        &AbortHandle::new(),
    );

    assert_eq!(report.tracks[0].status, TrackStatus::Done);
    for track in &report.tracks[1..] {
        assert!(matches!(
            track.status,
            TrackStatus::Failed {
                kind: FailureKind::NonFiniteDuration,
                ..
            }
        ));
    }
    assert!(!report.aborted);
}

#[test]
fn test_progress_events() {
    let decoders = registry(Synth::default());
    let playlist = Playlist::new();
    let tracks = add(&playlist, &["0.5,1,2", "0.5,1,2"]);
    let (tx, rx) = mpsc::channel();

    let report = scan_with_events(
        &playlist,
        &decoders,
        &tracks,
        &ScanConfig::default().with_jobs(2),
        &AbortHandle::new(),
        tx,
    );

    let events: Vec<ScanEvent> = rx.iter().collect();
    for index in 0..2 {
        let percents: Vec<f32> = events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::TrackProgress { index: i, percent } if *i == index => Some(*percent),
                _ => None,
            })
            .collect();
        assert!(!percents.is_empty());
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
        assert!(percents.len() <= 100);
        assert!((percents.last().unwrap() - 1.0).abs() < 1e-6);
        assert!(events
            .iter()
            .any(|e| matches!(e, ScanEvent::TrackFinished { index: i, .. } if *i == index)));
    }
    assert!(matches!(events.last(), Some(ScanEvent::ScanFinished { report: r }) if *r == report));
}
