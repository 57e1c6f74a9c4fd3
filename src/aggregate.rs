use crate::accumulator::Accumulator;
use crate::error::Result;
use crate::models::AlbumResult;
use crate::worker::TrackOutcome;

/// EBU R128 reference level, in LUFS
pub const REFERENCE_LUFS: f64 = -23.0;

/// Loudness in dB SPL that the R128 reference corresponds to
pub const REFERENCE_SPL_DB: f64 = 84.0;

/// ReplayGain for a measured loudness, re-based from the R128 reference
/// (-23 LUFS, about 84 dB SPL) to `target_db`.
pub fn gain_db(loudness_lufs: f64, target_db: f64) -> f64 {
    REFERENCE_LUFS - loudness_lufs + target_db - REFERENCE_SPL_DB
}

/// Combine the finished tracks of a scan into album figures.
///
/// Only tracks that reached `Done` take part: failed tracks have no
/// measurement and aborted ones only a partial one. Returns `None` when no
/// track finished.
pub fn aggregate(outcomes: &[TrackOutcome], target_db: f64) -> Result<Option<AlbumResult>> {
    let finished: Vec<&TrackOutcome> = outcomes
        .iter()
        .filter(|o| o.result.status.is_done())
        .collect();
    if finished.is_empty() {
        return Ok(None);
    }

    let peak = finished
        .iter()
        .filter_map(|o| o.result.peak)
        .fold(0.0_f64, f64::max);
    let loudness = Accumulator::combine(finished.iter().filter_map(|o| o.loudness.as_ref()))?;

    Ok(Some(AlbumResult {
        gain_db: gain_db(loudness, target_db),
        peak,
        loudness_lufs: loudness,
        tracks_measured: finished.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::AccumulatorPair;
    use crate::channel_map::channel_map;
    use crate::error::FailureKind;
    use crate::models::{TrackResult, TrackStatus};

    fn measured(amplitude: f32, status: TrackStatus) -> TrackOutcome {
        let mut pair = AccumulatorPair::new(1, 48000, channel_map(1).unwrap()).unwrap();
        let samples: Vec<f32> = (0..48000 * 5)
            .map(|i| amplitude * (i as f32 * 0.0576).sin())
            .collect();
        pair.feed(&samples, samples.len()).unwrap();
        let loudness = pair.loudness.finalize_loudness().unwrap();
        let peak = pair.track_peak().unwrap();
        let done = status.is_done();
        TrackOutcome {
            result: TrackResult {
                name: "t".to_string(),
                status,
                gain_db: Some(gain_db(loudness, 89.0)),
                peak: Some(peak),
                loudness_lufs: Some(loudness),
            },
            loudness: if done { Some(pair.loudness) } else { None },
        }
    }

    #[test]
    fn test_gain_formula() {
        // -16 LUFS at an 89 dB target
        assert!((gain_db(-16.0, 89.0) - (-2.0)).abs() < 1e-12);
        assert!((gain_db(-23.0, 84.0)).abs() < 1e-12);
        assert!((gain_db(-18.0, 89.0) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_silence_gain_is_infinite() {
        assert_eq!(gain_db(f64::NEG_INFINITY, 89.0), f64::INFINITY);
    }

    #[test]
    fn test_album_peak_is_max_of_done_tracks() {
        let outcomes = vec![
            measured(0.3, TrackStatus::Done),
            measured(0.7, TrackStatus::Done),
            measured(0.95, TrackStatus::Aborted),
        ];
        let album = aggregate(&outcomes, 89.0).unwrap().unwrap();
        assert!((album.peak - 0.7).abs() < 0.01, "album peak {}", album.peak);
        assert_eq!(album.tracks_measured, 2);
    }

    #[test]
    fn test_album_of_duplicates_matches_track() {
        let outcomes = vec![measured(0.5, TrackStatus::Done), measured(0.5, TrackStatus::Done)];
        let album = aggregate(&outcomes, 89.0).unwrap().unwrap();
        let track_gain = outcomes[0].result.gain_db.unwrap();
        assert!((album.gain_db - track_gain).abs() < 0.01);
    }

    #[test]
    fn test_failed_tracks_excluded() {
        let failed = TrackOutcome {
            result: TrackResult {
                name: "radio".to_string(),
                status: TrackStatus::Failed {
                    kind: FailureKind::NonFiniteDuration,
                    message: "stream".to_string(),
                },
                gain_db: None,
                peak: None,
                loudness_lufs: None,
            },
            loudness: None,
        };
        assert!(aggregate(&[failed], 89.0).unwrap().is_none());
        assert!(aggregate(&[], 89.0).unwrap().is_none());
    }
}
