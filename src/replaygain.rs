//! Writing scan results back to the playlist and the files behind it.

use tracing::{debug, warn};

use crate::decoder::DecoderRegistry;
use crate::error::{Result, ScanError};
use crate::models::ScanReport;
use crate::playlist::{Playlist, ReplayGainField, TrackId, META_DECODER, META_URI};
use crate::tags::ReplayGainTags;

/// Persist the playlist's ReplayGain fields of `track` into its file.
///
/// Sub-tracks share a container with their siblings and are skipped. A track
/// without a `:DECODER` field is a [`ScanError::DecoderNotFound`].
pub fn flush_to_container(
    playlist: &Playlist,
    decoders: &DecoderRegistry,
    track: TrackId,
) -> Result<()> {
    let (decoder_id, uri, tags) = {
        let guard = playlist.lock();
        if guard.is_subtrack(track) {
            return Ok(());
        }
        let uri = guard.find_meta(track, META_URI).unwrap_or_default().to_string();
        let Some(decoder_id) = guard.find_meta(track, META_DECODER) else {
            warn!("could not find a decoder field for {}", uri);
            return Err(ScanError::DecoderNotFound {
                decoder: String::new(),
                uri,
            });
        };
        (decoder_id.to_string(), uri, guard.replaygain_tags(track))
    };

    let decoder = decoders
        .get(&decoder_id)
        .ok_or_else(|| ScanError::DecoderNotFound {
            decoder: decoder_id,
            uri: uri.clone(),
        })?;
    debug!("writing tags to {}", uri);
    decoder.write_metadata(&uri, &tags)
}

/// Store `tags` on `track` and flush them. Fields that are `None` are left
/// as they are.
pub fn apply(
    playlist: &Playlist,
    decoders: &DecoderRegistry,
    track: TrackId,
    tags: &ReplayGainTags,
) -> Result<()> {
    {
        let mut guard = playlist.lock();
        if !guard.contains(track) {
            return Err(ScanError::UnknownTrack(track));
        }
        let values = [
            (ReplayGainField::TrackGain, tags.track_gain),
            (ReplayGainField::TrackPeak, tags.track_peak),
            (ReplayGainField::AlbumGain, tags.album_gain),
            (ReplayGainField::AlbumPeak, tags.album_peak),
        ];
        for (field, value) in values {
            if let Some(value) = value {
                guard.set_replaygain(track, field, value);
            }
        }
    }
    flush_to_container(playlist, decoders, track)
}

/// Delete all four ReplayGain fields from `tracks` and flush. Returns the
/// number of tracks flushed without error.
pub fn remove(playlist: &Playlist, decoders: &DecoderRegistry, tracks: &[TrackId]) -> usize {
    let mut flushed = 0;
    for &track in tracks {
        {
            let mut guard = playlist.lock();
            for field in ReplayGainField::ALL {
                guard.delete_meta(track, field.meta_key());
            }
        }
        match flush_to_container(playlist, decoders, track) {
            Ok(()) => flushed += 1,
            Err(err) => warn!("failed to remove tags from {}: {}", track, err),
        }
    }
    flushed
}

/// Apply every `Done` track of `report`, where `tracks[i]` is the track that
/// produced `report.tracks[i]`. Album fields are only written when the report
/// has an album result. Returns the number of tracks written.
pub fn apply_report(
    playlist: &Playlist,
    decoders: &DecoderRegistry,
    tracks: &[TrackId],
    report: &ScanReport,
) -> usize {
    // an all-silent album has infinite gain, which no tag can hold
    let album = report.album.as_ref().filter(|a| {
        let finite = a.gain_db.is_finite();
        if !finite {
            warn!("album gain is {}, album tags not written", a.gain_db);
        }
        finite
    });
    let mut written = 0;
    for (&track, result) in tracks.iter().zip(&report.tracks) {
        if !result.status.is_done() {
            continue;
        }
        let Some(track_gain) = result.gain_db.filter(|g| g.is_finite()) else {
            warn!("{}: track gain is not finite, tags not written", result.name);
            continue;
        };
        let tags = ReplayGainTags {
            track_gain: Some(track_gain),
            track_peak: result.peak,
            album_gain: album.map(|a| a.gain_db),
            album_peak: album.map(|a| a.peak),
        };
        match apply(playlist, decoders, track, &tags) {
            Ok(()) => written += 1,
            Err(err) => warn!("failed to write tags for {}: {}", result.name, err),
        }
    }
    written
}
