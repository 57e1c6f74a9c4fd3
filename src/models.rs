use serde::{Deserialize, Serialize};

use crate::error::FailureKind;

/// Terminal state of one track in a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrackStatus {
    /// Cancelled before its worker started
    NotStarted,
    Done,
    /// Stopped by the abort signal; values are from the frames read so far
    Aborted,
    Failed { kind: FailureKind, message: String },
}

impl TrackStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, TrackStatus::Done)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackResult {
    pub name: String,
    pub status: TrackStatus,
    /// ReplayGain track gain in dB, `+inf` for silence
    #[serde(default, with = "extended_f64::option")]
    pub gain_db: Option<f64>,
    /// Linear sample peak, may exceed 1.0
    pub peak: Option<f64>,
    #[serde(default, with = "extended_f64::option")]
    pub loudness_lufs: Option<f64>,
}

impl TrackResult {
    pub fn not_started(name: String) -> Self {
        Self {
            name,
            status: TrackStatus::NotStarted,
            gain_db: None,
            peak: None,
            loudness_lufs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumResult {
    #[serde(with = "extended_f64")]
    pub gain_db: f64,
    pub peak: f64,
    #[serde(with = "extended_f64")]
    pub loudness_lufs: f64,
    /// Number of tracks combined into the album figures
    pub tracks_measured: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Index-aligned with the scanned track list
    pub tracks: Vec<TrackResult>,
    pub album: Option<AlbumResult>,
    pub target_db: f64,
    #[serde(default)]
    pub aborted: bool,
}

impl ScanReport {
    pub fn completed_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.status.is_done()).count()
    }
}

/// Sent from scan workers to a listener (the TUI) for live progress
#[derive(Debug, Clone)]
pub enum ScanEvent {
    TrackStarted { index: usize },
    TrackProgress { index: usize, percent: f32 },
    TrackFinished { index: usize, result: TrackResult },
    ScanFinished { report: ScanReport },
}

/// JSON has no infinities, and silence measures as `-inf` LUFS with a `+inf`
/// dB gain. Non-finite values travel as the strings `"inf"`, `"-inf"` and
/// `"nan"`; finite ones stay plain numbers.
mod extended_f64 {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Finite(f64),
        Text(String),
    }

    fn to_repr(value: f64) -> Repr {
        if value.is_finite() {
            Repr::Finite(value)
        } else if value.is_nan() {
            Repr::Text("nan".to_string())
        } else if value > 0.0 {
            Repr::Text("inf".to_string())
        } else {
            Repr::Text("-inf".to_string())
        }
    }

    fn from_repr<E: Error>(repr: Repr) -> Result<f64, E> {
        match repr {
            Repr::Finite(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(E::custom(format!("invalid number '{}'", other))),
            },
        }
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        to_repr(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        from_repr(Repr::deserialize(deserializer)?)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<f64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            value.map(to_repr).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<f64>, D::Error> {
            Option::<Repr>::deserialize(deserializer)?
                .map(from_repr)
                .transpose()
        }
    }
}
