//! Streaming loudness and sample-peak accumulators.
//!
//! Each track gets two meters: one gated integrated-loudness meter and one
//! sample-peak meter. Both are fed the same interleaved `f32` blocks in
//! temporal order and finalized once the decoder reaches end of stream.
//! The filtering and gating itself is done by the `ebur128` crate.

use ebur128::{EbuR128, Mode};

use crate::channel_map::ChannelRole;
use crate::error::{Result, ScanError};

/// What a meter was built to measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementMode {
    /// Gated integrated loudness (EBU R128 "I" mode)
    Loudness,
    /// Maximum absolute sample value per channel
    SamplePeak,
}

impl MeasurementMode {
    fn ebur128_mode(self) -> Mode {
        match self {
            MeasurementMode::Loudness => Mode::I,
            MeasurementMode::SamplePeak => Mode::SAMPLE_PEAK,
        }
    }
}

/// Running measurement state of one track in one mode.
pub struct Accumulator {
    meter: EbuR128,
    mode: MeasurementMode,
    channels: usize,
    frames: u64,
}

impl Accumulator {
    /// Build a meter for `channels` interleaved channels weighted by `roles`.
    pub fn new(
        channels: usize,
        sample_rate: u32,
        mode: MeasurementMode,
        roles: &[ChannelRole],
    ) -> Result<Self> {
        if channels == 0 || roles.len() != channels {
            return Err(ScanError::UnsupportedChannelCount(channels));
        }
        let mut meter = EbuR128::new(channels as u32, sample_rate, mode.ebur128_mode())
            .map_err(ScanError::AccumulatorInit)?;
        for (index, role) in roles.iter().enumerate() {
            meter
                .set_channel(index as u32, (*role).into())
                .map_err(ScanError::AccumulatorInit)?;
        }
        Ok(Self {
            meter,
            mode,
            channels,
            frames: 0,
        })
    }

    pub fn mode(&self) -> MeasurementMode {
        self.mode
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of frames fed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Append `frames` interleaved frames from the front of `samples`.
    pub fn feed(&mut self, samples: &[f32], frames: usize) -> Result<()> {
        let len = (frames * self.channels).min(samples.len());
        let len = len - len % self.channels;
        if len == 0 {
            return Ok(());
        }
        self.meter
            .add_frames_f32(&samples[..len])
            .map_err(ScanError::Measurement)?;
        self.frames += (len / self.channels) as u64;
        Ok(())
    }

    /// Linear sample peak of every channel.
    pub fn finalize_peak(&self) -> Result<Vec<f64>> {
        if self.mode != MeasurementMode::SamplePeak {
            return Err(ScanError::InvalidMeasurementMode);
        }
        (0..self.channels)
            .map(|ch| {
                self.meter.sample_peak(ch as u32).map_err(|e| match e {
                    ebur128::Error::InvalidMode => ScanError::InvalidMeasurementMode,
                    other => ScanError::Measurement(other),
                })
            })
            .collect()
    }

    /// Integrated loudness in LUFS over everything fed so far.
    ///
    /// Silence (nothing above the absolute gate) yields negative infinity.
    pub fn finalize_loudness(&self) -> Result<f64> {
        if self.mode != MeasurementMode::Loudness {
            return Err(ScanError::InvalidMeasurementMode);
        }
        self.meter.loudness_global().map_err(|e| match e {
            ebur128::Error::InvalidMode => ScanError::InvalidMeasurementMode,
            other => ScanError::Measurement(other),
        })
    }

    /// Integrated loudness of several loudness meters taken as one program.
    ///
    /// Gating blocks of all meters are pooled in the energy domain, so two
    /// identical tracks combine to the loudness of either one.
    pub fn combine<'a, I>(accumulators: I) -> Result<f64>
    where
        I: IntoIterator<Item = &'a Accumulator>,
    {
        let meters: Vec<&EbuR128> = accumulators
            .into_iter()
            .map(|acc| {
                if acc.mode == MeasurementMode::Loudness {
                    Ok(&acc.meter)
                } else {
                    Err(ScanError::InvalidMeasurementMode)
                }
            })
            .collect::<Result<_>>()?;
        if meters.is_empty() {
            return Ok(f64::NEG_INFINITY);
        }
        EbuR128::loudness_global_multiple(meters.into_iter()).map_err(|e| match e {
            ebur128::Error::InvalidMode => ScanError::InvalidMeasurementMode,
            other => ScanError::Measurement(other),
        })
    }
}

/// The loudness and peak meters of a single track.
pub struct AccumulatorPair {
    pub loudness: Accumulator,
    pub peak: Accumulator,
}

impl AccumulatorPair {
    pub fn new(channels: usize, sample_rate: u32, roles: &[ChannelRole]) -> Result<Self> {
        Ok(Self {
            loudness: Accumulator::new(channels, sample_rate, MeasurementMode::Loudness, roles)?,
            peak: Accumulator::new(channels, sample_rate, MeasurementMode::SamplePeak, roles)?,
        })
    }

    /// Feed the same block to both meters.
    pub fn feed(&mut self, samples: &[f32], frames: usize) -> Result<()> {
        self.loudness.feed(samples, frames)?;
        self.peak.feed(samples, frames)
    }

    /// Highest per-channel sample peak, linear. Values above 1.0 are kept.
    pub fn track_peak(&self) -> Result<f64> {
        Ok(self
            .peak
            .finalize_peak()?
            .into_iter()
            .fold(0.0_f64, f64::max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_map::channel_map;

    fn sine(frequency: f64, amplitude: f32, secs: f64, rate: u32, channels: usize) -> Vec<f32> {
        let frames = (rate as f64 * secs) as usize;
        let mut out = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            let t = i as f64 / rate as f64;
            let s = amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin() as f32;
            for _ in 0..channels {
                out.push(s);
            }
        }
        out
    }

    fn pair(channels: usize, rate: u32) -> AccumulatorPair {
        AccumulatorPair::new(channels, rate, channel_map(channels).unwrap()).unwrap()
    }

    #[test]
    fn test_peak_of_sine() {
        let mut acc = pair(2, 44100);
        let samples = sine(1000.0, 0.5, 2.0, 44100, 2);
        acc.feed(&samples, samples.len() / 2).unwrap();
        let peak = acc.track_peak().unwrap();
        assert!((peak - 0.5).abs() < 0.001, "peak was {}", peak);
    }

    #[test]
    fn test_peak_above_full_scale_is_kept() {
        let mut acc = pair(1, 48000);
        let samples = vec![1.5f32; 4800];
        acc.feed(&samples, 4800).unwrap();
        assert!((acc.track_peak().unwrap() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_streaming_matches_single_feed() {
        let samples = sine(440.0, 0.3, 5.0, 44100, 2);

        let mut whole = pair(2, 44100);
        whole.feed(&samples, samples.len() / 2).unwrap();

        let mut streamed = pair(2, 44100);
        for block in samples.chunks(2000 * 2) {
            streamed.feed(block, block.len() / 2).unwrap();
        }

        let a = whole.loudness.finalize_loudness().unwrap();
        let b = streamed.loudness.finalize_loudness().unwrap();
        assert!((a - b).abs() < 1e-6, "{} vs {}", a, b);
        assert_eq!(whole.loudness.frames(), streamed.loudness.frames());
    }

    #[test]
    fn test_feed_respects_frame_count() {
        let mut acc = pair(2, 44100);
        let samples = vec![0.25f32; 400];
        acc.feed(&samples, 50).unwrap();
        assert_eq!(acc.peak.frames(), 50);
        acc.feed(&samples, 0).unwrap();
        assert_eq!(acc.peak.frames(), 50);
    }

    #[test]
    fn test_silence_is_below_gate() {
        let mut acc = pair(2, 44100);
        let samples = vec![0.0f32; 44100 * 2 * 3];
        acc.feed(&samples, 44100 * 3).unwrap();
        assert_eq!(acc.track_peak().unwrap(), 0.0);
        let loudness = acc.loudness.finalize_loudness().unwrap();
        assert!(loudness < -70.0, "silence measured {}", loudness);
    }

    #[test]
    fn test_wrong_mode_is_rejected() {
        let acc = pair(2, 44100);
        assert!(matches!(
            acc.loudness.finalize_peak(),
            Err(ScanError::InvalidMeasurementMode)
        ));
        assert!(matches!(
            acc.peak.finalize_loudness(),
            Err(ScanError::InvalidMeasurementMode)
        ));
        assert!(matches!(
            Accumulator::combine([&acc.peak]),
            Err(ScanError::InvalidMeasurementMode)
        ));
    }

    #[test]
    fn test_combine_duplicates_is_idempotent() {
        let samples = sine(440.0, 0.4, 6.0, 48000, 2);
        let mut first = pair(2, 48000);
        let mut second = pair(2, 48000);
        first.feed(&samples, samples.len() / 2).unwrap();
        second.feed(&samples, samples.len() / 2).unwrap();

        let single = first.loudness.finalize_loudness().unwrap();
        let combined = Accumulator::combine([&first.loudness, &second.loudness]).unwrap();
        assert!((single - combined).abs() < 0.01, "{} vs {}", single, combined);
    }

    #[test]
    fn test_combine_is_not_arithmetic_mean() {
        let loud = sine(440.0, 0.8, 6.0, 48000, 1);
        let quiet = sine(440.0, 0.05, 6.0, 48000, 1);
        let mut a = pair(1, 48000);
        let mut b = pair(1, 48000);
        a.feed(&loud, loud.len()).unwrap();
        b.feed(&quiet, quiet.len()).unwrap();

        let la = a.loudness.finalize_loudness().unwrap();
        let lb = b.loudness.finalize_loudness().unwrap();
        let combined = Accumulator::combine([&a.loudness, &b.loudness]).unwrap();
        let mean = (la + lb) / 2.0;
        // relative gating drops the quiet track, so the album sits at the loud one
        assert!(combined > mean + 1.0, "combined {} mean {}", combined, mean);
        assert!(combined <= la + 0.01);
    }

    #[test]
    fn test_combine_empty_set() {
        let empty: Vec<&Accumulator> = Vec::new();
        assert_eq!(Accumulator::combine(empty).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_lfe_does_not_raise_loudness() {
        let rate = 48000;
        let frames = rate as usize * 4;
        let tone = sine(1000.0, 0.5, 4.0, rate, 1);

        // 5.1 with signal only in front left
        let mut front_only = vec![0.0f32; frames * 6];
        let mut with_lfe = vec![0.0f32; frames * 6];
        for i in 0..frames {
            front_only[i * 6] = tone[i];
            with_lfe[i * 6] = tone[i];
            with_lfe[i * 6 + 3] = 0.9;
        }

        let mut a = pair(6, rate);
        let mut b = pair(6, rate);
        a.feed(&front_only, frames).unwrap();
        b.feed(&with_lfe, frames).unwrap();
        let la = a.loudness.finalize_loudness().unwrap();
        let lb = b.loudness.finalize_loudness().unwrap();
        assert!((la - lb).abs() < 1e-6);
    }
}
