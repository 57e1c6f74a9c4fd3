//! ReplayGain tag reading and writing for local files.
//!
//! Values are written to the primary tag of the container (ID3v2 TXXX
//! frames, Vorbis comments, APE items or MP4 freeform atoms), using the
//! conventional `REPLAYGAIN_*` fields.

use std::path::Path;

use lofty::{ItemKey, Probe, TagExt, TaggedFileExt};
use tracing::debug;

use crate::error::{Result, ScanError};

/// The four ReplayGain values kept for a track.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplayGainTags {
    pub track_gain: Option<f64>,
    pub track_peak: Option<f64>,
    pub album_gain: Option<f64>,
    pub album_peak: Option<f64>,
}

impl ReplayGainTags {
    pub fn is_empty(&self) -> bool {
        self.track_gain.is_none()
            && self.track_peak.is_none()
            && self.album_gain.is_none()
            && self.album_peak.is_none()
    }
}

/// Format a gain the way ReplayGain readers expect it ("-6.48 dB").
pub fn format_gain(gain_db: f64) -> String {
    format!("{:.2} dB", gain_db)
}

/// Format a linear peak ("0.988403").
pub fn format_peak(peak: f64) -> String {
    format!("{:.6}", peak)
}

/// Parse a gain value ("-5.23 dB" -> -5.23).
pub fn parse_gain(s: &str) -> Option<f64> {
    let s = s.trim();
    let s = s.strip_suffix("dB").unwrap_or(s);
    s.trim().parse().ok()
}

pub fn parse_peak(s: &str) -> Option<f64> {
    s.trim().parse().ok()
}

const ITEM_KEYS: [ItemKey; 4] = [
    ItemKey::ReplayGainTrackGain,
    ItemKey::ReplayGainTrackPeak,
    ItemKey::ReplayGainAlbumGain,
    ItemKey::ReplayGainAlbumPeak,
];

fn tag_error(path: &Path, e: impl std::fmt::Display) -> ScanError {
    ScanError::Tag {
        uri: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// Read the ReplayGain fields from the primary tag of `path`.
pub fn read_replaygain_tags(path: &Path) -> Result<ReplayGainTags> {
    let tagged_file = Probe::open(path)
        .and_then(|p| p.read())
        .map_err(|e| tag_error(path, e))?;

    let mut tags = ReplayGainTags::default();
    if let Some(tag) = tagged_file.primary_tag() {
        tags.track_gain = tag.get_string(&ItemKey::ReplayGainTrackGain).and_then(parse_gain);
        tags.track_peak = tag.get_string(&ItemKey::ReplayGainTrackPeak).and_then(parse_peak);
        tags.album_gain = tag.get_string(&ItemKey::ReplayGainAlbumGain).and_then(parse_gain);
        tags.album_peak = tag.get_string(&ItemKey::ReplayGainAlbumPeak).and_then(parse_peak);
    }
    Ok(tags)
}

/// Replace the ReplayGain fields of `path` with `tags`.
///
/// Fields that are `None` are removed from the file, so writing an empty
/// set strips ReplayGain information entirely. Other tags are preserved.
pub fn write_replaygain_tags(path: &Path, tags: &ReplayGainTags) -> Result<()> {
    let mut tagged_file = Probe::open(path)
        .and_then(|p| p.read())
        .map_err(|e| tag_error(path, e))?;

    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        if tags.is_empty() {
            // nothing to remove
            return Ok(());
        }
        tagged_file.insert_tag(lofty::Tag::new(tag_type));
    }
    let Some(tag) = tagged_file.tag_mut(tag_type) else {
        return Err(tag_error(path, "container has no writable tag"));
    };

    let values = [
        tags.track_gain.map(format_gain),
        tags.track_peak.map(format_peak),
        tags.album_gain.map(format_gain),
        tags.album_peak.map(format_peak),
    ];
    for (key, value) in ITEM_KEYS.iter().zip(values) {
        tag.remove_key(key);
        if let Some(value) = value {
            tag.insert_text(key.clone(), value);
        }
    }

    tag.save_to_path(path).map_err(|e| tag_error(path, e))?;
    debug!("wrote ReplayGain tags to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gain() {
        assert_eq!(parse_gain("-5.23 dB"), Some(-5.23));
        assert_eq!(parse_gain("+2.00dB"), Some(2.0));
        assert_eq!(parse_gain(" 1.5 "), Some(1.5));
        assert_eq!(parse_gain("loud"), None);
    }

    #[test]
    fn test_format_values() {
        assert_eq!(format_gain(-2.0), "-2.00 dB");
        assert_eq!(format_peak(0.5), "0.500000");
        assert_eq!(parse_gain(&format_gain(-6.481)), Some(-6.48));
        assert_eq!(parse_peak(&format_peak(1.25)), Some(1.25));
    }

    #[test]
    fn test_empty_tags() {
        assert!(ReplayGainTags::default().is_empty());
        let tags = ReplayGainTags {
            album_peak: Some(1.0),
            ..Default::default()
        };
        assert!(!tags.is_empty());
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_replaygain_tags(Path::new("/nonexistent/a.flac")).unwrap_err();
        assert!(matches!(err, ScanError::Tag { .. }));
    }
}
