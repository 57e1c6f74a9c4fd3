//! Scan of a single track: decode, convert, measure, finalize.

use std::path::Path;
use std::sync::mpsc::Sender;

use tracing::{debug, error, info, warn};

use crate::abort::AbortHandle;
use crate::accumulator::{Accumulator, AccumulatorPair};
use crate::aggregate::gain_db;
use crate::channel_map::channel_map;
use crate::config::{FailurePolicy, ScanConfig};
use crate::convert::{convert, PcmFormat};
use crate::decoder::{DecoderRegistry, DecoderSession, TrackSource};
use crate::error::{Result, ScanError};
use crate::models::{ScanEvent, TrackResult, TrackStatus};
use crate::playlist::{Playlist, TrackId};

/// Lifecycle of one track scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Init,
    Decoding,
    Finalizing,
    Done,
    Failed,
    Aborted,
}

/// Everything a worker shares with its siblings. One clone per pool thread.
#[derive(Clone)]
pub struct ScanContext<'a> {
    pub playlist: &'a Playlist,
    pub decoders: &'a DecoderRegistry,
    pub config: &'a ScanConfig,
    pub abort: &'a AbortHandle,
    pub events: Option<Sender<ScanEvent>>,
}

impl ScanContext<'_> {
    pub(crate) fn emit(&self, event: ScanEvent) {
        if let Some(ref sender) = self.events {
            let _ = sender.send(event);
        }
    }
}

/// Decode buffers owned by one pool thread and reused for every track it scans.
#[derive(Debug, Default)]
pub struct ScanBuffers {
    raw: Vec<u8>,
    samples: Vec<f32>,
}

impl ScanBuffers {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A finished worker: its result slot and, for `Done` tracks, the loudness
/// meter the album figures are combined from.
pub struct TrackOutcome {
    pub result: TrackResult,
    pub loudness: Option<Accumulator>,
}

/// Display name of a track: the file name of its URI.
pub fn track_name(uri: &str) -> String {
    Path::new(uri)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(uri)
        .to_string()
}

struct Measurement {
    meters: AccumulatorPair,
    state: WorkerState,
}

/// Emits progress at most once per whole percent.
struct Progress {
    index: usize,
    expected_frames: Option<f64>,
    frames: u64,
    last_percent: u32,
}

impl Progress {
    fn new(index: usize, source: &TrackSource, format: &PcmFormat) -> Self {
        let expected = source.duration * format.sample_rate as f64;
        Self {
            index,
            expected_frames: (expected > 0.0).then_some(expected),
            frames: 0,
            last_percent: 0,
        }
    }

    fn advance(&mut self, frames: usize, ctx: &ScanContext<'_>) {
        self.frames += frames as u64;
        let (Some(expected), Some(_)) = (self.expected_frames, ctx.events.as_ref()) else {
            return;
        };
        let fraction = (self.frames as f64 / expected).min(1.0);
        let percent = (fraction * 100.0) as u32;
        if percent > self.last_percent {
            self.last_percent = percent;
            ctx.emit(ScanEvent::TrackProgress {
                index: self.index,
                percent: fraction as f32,
            });
        }
    }
}

/// Scan `track` to completion, failure or cancellation.
pub fn scan_track(
    ctx: &ScanContext<'_>,
    index: usize,
    track: TrackId,
    name: &str,
    buffers: &mut ScanBuffers,
) -> TrackOutcome {
    let measurement = match ctx
        .playlist
        .source(track)
        .and_then(|source| measure(ctx, index, &source, buffers))
    {
        Ok(m) => m,
        Err(err) => return failed(ctx, name, err),
    };

    // Finalizing
    let meters = measurement.meters;
    let finalized = meters
        .track_peak()
        .and_then(|peak| Ok((peak, meters.loudness.finalize_loudness()?)));
    let (peak, loudness) = match finalized {
        Ok(values) => values,
        Err(err) => return failed(ctx, name, err),
    };

    let gain = gain_db(loudness, ctx.config.target_db);
    let done = measurement.state != WorkerState::Aborted;
    debug!(
        "{}: {:.2} LUFS, gain {:.2} dB, peak {:.6}{}",
        name,
        loudness,
        gain,
        peak,
        if done { "" } else { " (partial)" }
    );

    TrackOutcome {
        result: TrackResult {
            name: name.to_string(),
            status: if done {
                TrackStatus::Done
            } else {
                TrackStatus::Aborted
            },
            gain_db: Some(gain),
            peak: Some(peak),
            loudness_lufs: Some(loudness),
        },
        loudness: done.then_some(meters.loudness),
    }
}

/// Init and Decoding: open the track and feed every block to both meters.
fn measure(
    ctx: &ScanContext<'_>,
    index: usize,
    source: &TrackSource,
    buffers: &mut ScanBuffers,
) -> Result<Measurement> {
    if !(source.duration.is_finite() && source.duration >= 0.0) {
        return Err(ScanError::NonFiniteDuration {
            uri: source.uri.clone(),
        });
    }

    let decoder = ctx
        .decoders
        .get(&source.decoder)
        .ok_or_else(|| ScanError::DecoderNotFound {
            decoder: source.decoder.clone(),
            uri: source.uri.clone(),
        })?;
    let mut session: Box<dyn DecoderSession> = decoder.open();
    let format = session.init(source)?;

    let roles = channel_map(format.channels)?;
    let mut meters = AccumulatorPair::new(format.channels, format.sample_rate, roles)?;

    let block_bytes = ctx.config.block_frames * format.frame_bytes();
    buffers.raw.resize(block_bytes, 0);
    let mut progress = Progress::new(index, source, &format);

    loop {
        if ctx.abort.is_aborted() {
            info!("{}: scan aborted after {} frames", source.uri, progress.frames);
            return Ok(Measurement {
                meters,
                state: WorkerState::Aborted,
            });
        }

        let read = session.read(&mut buffers.raw[..block_bytes]);
        let frames = convert(&format, &buffers.raw[..read], &mut buffers.samples);
        meters.feed(&buffers.samples, frames)?;
        progress.advance(frames, ctx);

        if read < block_bytes {
            break;
        }
    }

    Ok(Measurement {
        meters,
        state: WorkerState::Finalizing,
    })
}

/// Record a failed track and apply the failure policy.
fn failed(ctx: &ScanContext<'_>, name: &str, err: ScanError) -> TrackOutcome {
    if err.is_internal() {
        error!("internal error while scanning {}: {}", name, err);
    } else {
        warn!("{} skipped: {}", name, err);
    }

    let stop_siblings = matches!(err, ScanError::InvalidMeasurementMode)
        || (err.is_fatal() && ctx.config.failure_policy == FailurePolicy::AbortScan);
    if stop_siblings {
        info!("aborting remaining tracks after fatal error on {}", name);
        ctx.abort.abort();
    }

    TrackOutcome {
        result: TrackResult {
            name: name.to_string(),
            status: TrackStatus::Failed {
                kind: err.kind(),
                message: err.to_string(),
            },
            gain_db: None,
            peak: None,
            loudness_lufs: None,
        },
        loudness: None,
    }
}
