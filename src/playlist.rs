//! Host playlist state: track handles, their metadata, and the lock that
//! guards them.
//!
//! Metadata may be changed from outside a scan at any time, so every read or
//! write goes through [`Playlist::lock`]. Workers hold the guard only long
//! enough to copy what they need.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::decoder::file::{probe_duration, DECODER_ID};
use crate::decoder::TrackSource;
use crate::error::{Result, ScanError};
use crate::tags::{self, ReplayGainTags};

pub const META_URI: &str = ":URI";
pub const META_DECODER: &str = ":DECODER";

const AUDIO_EXTENSIONS: &[&str] = &[
    "flac", "mp3", "wav", "ogg", "m4a", "opus", "wv", "aif", "aiff",
];

/// Opaque handle of a playlist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One of the four ReplayGain values stored on a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayGainField {
    AlbumGain,
    AlbumPeak,
    TrackGain,
    TrackPeak,
}

impl ReplayGainField {
    pub const ALL: [ReplayGainField; 4] = [
        ReplayGainField::AlbumGain,
        ReplayGainField::AlbumPeak,
        ReplayGainField::TrackGain,
        ReplayGainField::TrackPeak,
    ];

    pub fn meta_key(self) -> &'static str {
        match self {
            ReplayGainField::AlbumGain => ":REPLAYGAIN_ALBUMGAIN",
            ReplayGainField::AlbumPeak => ":REPLAYGAIN_ALBUMPEAK",
            ReplayGainField::TrackGain => ":REPLAYGAIN_TRACKGAIN",
            ReplayGainField::TrackPeak => ":REPLAYGAIN_TRACKPEAK",
        }
    }

    fn is_gain(self) -> bool {
        matches!(self, ReplayGainField::AlbumGain | ReplayGainField::TrackGain)
    }
}

#[derive(Debug, Clone)]
struct TrackEntry {
    meta: BTreeMap<String, String>,
    duration: f64,
    subtrack: bool,
}

#[derive(Debug, Default)]
struct PlaylistState {
    next_id: u64,
    entries: HashMap<TrackId, TrackEntry>,
}

/// Shared, lock-protected track list.
#[derive(Debug, Default)]
pub struct Playlist {
    state: Mutex<PlaylistState>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the playlist lock. Released when the guard is dropped.
    pub fn lock(&self) -> PlaylistGuard<'_> {
        PlaylistGuard {
            state: self.state.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Add a track decoded by `decoder`. A negative or infinite `duration`
    /// marks a stream without a bounded length.
    pub fn add_track(&self, uri: &str, decoder: &str, duration: f64) -> TrackId {
        let mut guard = self.lock();
        let state = &mut *guard.state;
        let id = TrackId(state.next_id);
        state.next_id += 1;

        let mut meta = BTreeMap::new();
        meta.insert(META_URI.to_string(), uri.to_string());
        meta.insert(META_DECODER.to_string(), decoder.to_string());
        state.entries.insert(
            id,
            TrackEntry {
                meta,
                duration,
                subtrack: false,
            },
        );
        id
    }

    /// Add a local audio file, loading any ReplayGain tags it already has.
    pub fn add_file(&self, path: &Path) -> TrackId {
        // containers that don't declare a length are still bounded files
        let duration = probe_duration(path).unwrap_or(0.0);
        let id = self.add_track(&path.to_string_lossy(), DECODER_ID, duration);

        if let Ok(existing) = tags::read_replaygain_tags(path) {
            let mut guard = self.lock();
            guard.load_replaygain(id, &existing);
        }
        id
    }

    /// Add every file in `paths`, in order.
    pub fn add_files(&self, paths: &[PathBuf]) -> Vec<TrackId> {
        paths.iter().map(|p| self.add_file(p)).collect()
    }

    /// Copy the fields a worker needs to open `id`.
    pub fn source(&self, id: TrackId) -> Result<TrackSource> {
        let guard = self.lock();
        let entry = guard.entry(id).ok_or(ScanError::UnknownTrack(id))?;
        Ok(TrackSource {
            uri: entry.meta.get(META_URI).cloned().unwrap_or_default(),
            decoder: entry.meta.get(META_DECODER).cloned().unwrap_or_default(),
            duration: entry.duration,
        })
    }

    pub fn len(&self) -> usize {
        self.lock().state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scoped access to the playlist; the lock is held for the guard's lifetime.
pub struct PlaylistGuard<'a> {
    state: MutexGuard<'a, PlaylistState>,
}

impl PlaylistGuard<'_> {
    fn entry(&self, id: TrackId) -> Option<&TrackEntry> {
        self.state.entries.get(&id)
    }

    fn entry_mut(&mut self, id: TrackId) -> Option<&mut TrackEntry> {
        self.state.entries.get_mut(&id)
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.state.entries.contains_key(&id)
    }

    pub fn find_meta(&self, id: TrackId, key: &str) -> Option<&str> {
        self.entry(id)?.meta.get(key).map(String::as_str)
    }

    pub fn set_meta(&mut self, id: TrackId, key: &str, value: &str) {
        if let Some(entry) = self.entry_mut(id) {
            entry.meta.insert(key.to_string(), value.to_string());
        }
    }

    pub fn delete_meta(&mut self, id: TrackId, key: &str) {
        if let Some(entry) = self.entry_mut(id) {
            entry.meta.remove(key);
        }
    }

    pub fn duration(&self, id: TrackId) -> Option<f64> {
        self.entry(id).map(|e| e.duration)
    }

    pub fn is_subtrack(&self, id: TrackId) -> bool {
        self.entry(id).map(|e| e.subtrack).unwrap_or(false)
    }

    /// Mark `id` as one of several tracks sharing a single container file.
    pub fn set_subtrack(&mut self, id: TrackId, subtrack: bool) {
        if let Some(entry) = self.entry_mut(id) {
            entry.subtrack = subtrack;
        }
    }

    pub fn set_replaygain(&mut self, id: TrackId, field: ReplayGainField, value: f64) {
        let text = if field.is_gain() {
            tags::format_gain(value)
        } else {
            tags::format_peak(value)
        };
        self.set_meta(id, field.meta_key(), &text);
    }

    pub fn replaygain(&self, id: TrackId, field: ReplayGainField) -> Option<f64> {
        let value = self.find_meta(id, field.meta_key())?;
        if field.is_gain() {
            tags::parse_gain(value)
        } else {
            tags::parse_peak(value)
        }
    }

    pub fn replaygain_tags(&self, id: TrackId) -> ReplayGainTags {
        ReplayGainTags {
            track_gain: self.replaygain(id, ReplayGainField::TrackGain),
            track_peak: self.replaygain(id, ReplayGainField::TrackPeak),
            album_gain: self.replaygain(id, ReplayGainField::AlbumGain),
            album_peak: self.replaygain(id, ReplayGainField::AlbumPeak),
        }
    }

    fn load_replaygain(&mut self, id: TrackId, tags: &ReplayGainTags) {
        let pairs = [
            (ReplayGainField::TrackGain, tags.track_gain),
            (ReplayGainField::TrackPeak, tags.track_peak),
            (ReplayGainField::AlbumGain, tags.album_gain),
            (ReplayGainField::AlbumPeak, tags.album_peak),
        ];
        for (field, value) in pairs {
            if let Some(value) = value {
                self.set_replaygain(id, field, value);
            }
        }
    }
}

/// Check if a path has a recognized audio file extension.
fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Scan a directory for audio files, sorted by filename.
pub fn scan_audio_files(path: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(path)
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_audio_file(p))
        .collect();
    files.sort();
    files
}
