use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::playlist::TrackId;

/// Result type for scanner operations
pub type Result<T> = std::result::Result<T, ScanError>;

/// Errors raised while scanning or tagging a track.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The track is a stream without a bounded length
    #[error("stream {uri} doesn't have finite length")]
    NonFiniteDuration { uri: String },

    #[error("track {0} is not in the playlist")]
    UnknownTrack(TrackId),

    #[error("no decoder registered as '{decoder}' for {uri}")]
    DecoderNotFound { decoder: String, uri: String },

    #[error("failed to decode {uri}: {reason}")]
    DecodeInit { uri: String, reason: String },

    #[error("failed to initialise loudness meter: {0}")]
    AccumulatorInit(ebur128::Error),

    #[error("loudness measurement failed: {0}")]
    Measurement(ebur128::Error),

    /// Only mono through 5.1 layouts can be weighted
    #[error("{0} channels are not supported (1 to 6 channels)")]
    UnsupportedChannelCount(usize),

    /// A measurement was requested from a meter built for the other mode
    #[error("invalid measurement mode requested from meter")]
    InvalidMeasurementMode,

    #[error("failed to write tags to {uri}: {reason}")]
    Tag { uri: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serializable classification of a failed track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NonFiniteDuration,
    DecodeInit,
    AccumulatorInit,
    UnsupportedChannelCount,
    InvalidMeasurementMode,
    Io,
}

impl ScanError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ScanError::NonFiniteDuration { .. } => FailureKind::NonFiniteDuration,
            ScanError::UnknownTrack(_)
            | ScanError::DecoderNotFound { .. }
            | ScanError::DecodeInit { .. } => FailureKind::DecodeInit,
            ScanError::AccumulatorInit(_) | ScanError::Measurement(_) => {
                FailureKind::AccumulatorInit
            }
            ScanError::UnsupportedChannelCount(_) => FailureKind::UnsupportedChannelCount,
            ScanError::InvalidMeasurementMode => FailureKind::InvalidMeasurementMode,
            ScanError::Tag { .. } | ScanError::Io(_) => FailureKind::Io,
        }
    }

    /// Broken invariants inside the scanner rather than problems with the input.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ScanError::InvalidMeasurementMode
                | ScanError::AccumulatorInit(_)
                | ScanError::Measurement(_)
        )
    }

    /// Errors that may stop sibling workers, depending on the failure policy.
    pub fn is_fatal(&self) -> bool {
        self.is_internal() || matches!(self, ScanError::UnsupportedChannelCount(_))
    }
}
