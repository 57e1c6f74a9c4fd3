use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBufferRef, SampleBuffer, SignalSpec};
use symphonia::core::codecs::{CodecParameters, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::ConvertibleSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::{Sample, SampleFormat};
use tracing::{debug, warn};

use super::{Decoder, DecoderSession, TrackSource};
use crate::convert::{PcmFormat, SampleEncoding};
use crate::error::{Result, ScanError};
use crate::tags::{self, ReplayGainTags};

/// Value of the `:DECODER` field for tracks decoded by [`SymphoniaDecoder`].
pub const DECODER_ID: &str = "symphonia";

/// Local file decoder backed by symphonia, tags written with lofty.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDecoder;

impl Decoder for SymphoniaDecoder {
    fn id(&self) -> &str {
        DECODER_ID
    }

    fn open(&self) -> Box<dyn DecoderSession> {
        Box::new(SymphoniaSession::new())
    }

    fn write_metadata(&self, uri: &str, tags: &ReplayGainTags) -> Result<()> {
        tags::write_replaygain_tags(Path::new(uri), tags)
    }
}

/// Reusable interleaving buffer, reallocated only when a packet outgrows it.
struct Interleaver<T: Sample> {
    buf: Option<SampleBuffer<T>>,
    frames: u64,
    spec: Option<SignalSpec>,
}

impl<T: Sample + ConvertibleSample> Interleaver<T> {
    fn new() -> Self {
        Self {
            buf: None,
            frames: 0,
            spec: None,
        }
    }

    fn interleave(&mut self, decoded: AudioBufferRef<'_>) -> &[T] {
        let spec = *decoded.spec();
        let frames = decoded.frames() as u64;
        let stale = self.buf.is_none() || self.frames < frames || self.spec != Some(spec);
        if stale {
            self.buf = Some(SampleBuffer::new(frames, spec));
            self.frames = frames;
            self.spec = Some(spec);
        }
        match self.buf.as_mut() {
            Some(buf) => {
                buf.copy_interleaved_ref(decoded);
                buf.samples()
            }
            None => &[],
        }
    }
}

struct OpenStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    pcm: PcmFormat,
}

/// One decode of a local file, producing raw little-endian PCM.
pub struct SymphoniaSession {
    stream: Option<OpenStream>,
    pending: Vec<u8>,
    cursor: usize,
    ints: Interleaver<i32>,
    floats: Interleaver<f32>,
    /// Layout of the most recently decoded packet
    last_spec: Option<SignalSpec>,
}

impl SymphoniaSession {
    fn new() -> Self {
        Self {
            stream: None,
            pending: Vec::new(),
            cursor: 0,
            ints: Interleaver::new(),
            floats: Interleaver::new(),
            last_spec: None,
        }
    }

    /// Decode the next packet of our track into `pending`.
    /// Returns false at end of stream.
    fn decode_next(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };

        loop {
            let packet = match stream.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return false;
                }
                Err(SymphoniaError::ResetRequired) => return false,
                Err(e) => {
                    warn!("decode stopped early: {}", e);
                    return false;
                }
            };

            if packet.track_id() != stream.track_id {
                continue;
            }

            let decoded = match stream.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!("skipping corrupt packet: {}", e);
                    continue;
                }
                Err(e) => {
                    warn!("decode stopped early: {}", e);
                    return false;
                }
            };

            self.last_spec = Some(*decoded.spec());
            self.pending.clear();
            self.cursor = 0;
            encode_packet(
                stream.pcm.encoding,
                decoded,
                &mut self.ints,
                &mut self.floats,
                &mut self.pending,
            );
            if !self.pending.is_empty() {
                return true;
            }
        }
    }
}

impl DecoderSession for SymphoniaSession {
    fn init(&mut self, source: &TrackSource) -> Result<PcmFormat> {
        let decode_err = |reason: String| ScanError::DecodeInit {
            uri: source.uri.clone(),
            reason,
        };

        let path = Path::new(&source.uri);
        let file = File::open(path).map_err(|e| decode_err(e.to_string()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| decode_err(e.to_string()))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| decode_err("no audio track found".to_string()))?;

        let codec_params = track.codec_params.clone();
        let track_id = track.id;
        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| decode_err(e.to_string()))?;

        // layout resolved below, from the first packet if the container omits it
        self.stream = Some(OpenStream {
            format,
            decoder,
            track_id,
            pcm: PcmFormat::new(0, 0, encoding_for(&codec_params)),
        });
        self.pending.clear();
        self.cursor = 0;
        self.last_spec = None;

        let undeclared = codec_params.channels.is_none() || codec_params.sample_rate.is_none();
        if undeclared && !self.decode_next() {
            self.stream = None;
            return Err(decode_err("no decodable audio packets".to_string()));
        }
        let Some(pcm) = pcm_format(&codec_params, self.last_spec.as_ref()) else {
            self.stream = None;
            return Err(decode_err("unknown channel layout or sample rate".to_string()));
        };
        if let Some(stream) = self.stream.as_mut() {
            stream.pcm = pcm;
        }

        debug!(
            "opened {} ({} ch, {} Hz, {} bit)",
            source.uri,
            pcm.channels,
            pcm.sample_rate,
            pcm.encoding.bits()
        );

        Ok(pcm)
    }

    fn read(&mut self, buffer: &mut [u8]) -> usize {
        let mut written = 0;
        while written < buffer.len() {
            if self.cursor < self.pending.len() {
                let n = (self.pending.len() - self.cursor).min(buffer.len() - written);
                buffer[written..written + n]
                    .copy_from_slice(&self.pending[self.cursor..self.cursor + n]);
                self.cursor += n;
                written += n;
                continue;
            }
            if !self.decode_next() {
                break;
            }
        }
        written
    }
}

/// Output layout from the container's declared parameters, falling back to
/// the first decoded packet for whatever the container leaves out.
fn pcm_format(params: &CodecParameters, first_packet: Option<&SignalSpec>) -> Option<PcmFormat> {
    let channels = params
        .channels
        .or_else(|| first_packet.map(|spec| spec.channels))?
        .count();
    let sample_rate = params
        .sample_rate
        .or_else(|| first_packet.map(|spec| spec.rate))?;
    if channels == 0 || sample_rate == 0 {
        return None;
    }
    Some(PcmFormat::new(channels, sample_rate, encoding_for(params)))
}

/// Pick the raw output encoding closest to the source material.
fn encoding_for(params: &CodecParameters) -> SampleEncoding {
    if matches!(
        params.sample_format,
        Some(SampleFormat::F32) | Some(SampleFormat::F64)
    ) {
        return SampleEncoding::F32;
    }
    match params.bits_per_sample {
        Some(bits) if bits <= 8 => SampleEncoding::U8,
        Some(bits) if bits <= 16 => SampleEncoding::S16,
        Some(bits) if bits <= 24 => SampleEncoding::S24,
        Some(_) => SampleEncoding::S32,
        // lossy codecs decode to float
        None => SampleEncoding::F32,
    }
}

fn encode_packet(
    encoding: SampleEncoding,
    decoded: AudioBufferRef<'_>,
    ints: &mut Interleaver<i32>,
    floats: &mut Interleaver<f32>,
    out: &mut Vec<u8>,
) {
    match encoding {
        SampleEncoding::F32 => {
            for s in floats.interleave(decoded) {
                out.extend_from_slice(&s.to_le_bytes());
            }
        }
        SampleEncoding::U8 => {
            for s in ints.interleave(decoded) {
                out.push(((s >> 24) + 128) as u8);
            }
        }
        SampleEncoding::S16 => {
            for s in ints.interleave(decoded) {
                out.extend_from_slice(&((s >> 16) as i16).to_le_bytes());
            }
        }
        SampleEncoding::S24 => {
            for s in ints.interleave(decoded) {
                out.extend_from_slice(&s.to_le_bytes()[1..4]);
            }
        }
        SampleEncoding::S32 => {
            for s in ints.interleave(decoded) {
                out.extend_from_slice(&s.to_le_bytes());
            }
        }
    }
}

/// Length of a local file in seconds, when the container declares it.
pub fn probe_duration(path: &Path) -> Option<f64> {
    let file = File::open(path).ok()?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .ok()?;
    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)?;
    let frames = track.codec_params.n_frames?;
    let rate = track.codec_params.sample_rate?;
    Some(frames as f64 / rate as f64)
}
