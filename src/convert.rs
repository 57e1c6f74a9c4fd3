/// Sample encoding of raw interleaved PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    /// Unsigned 8-bit, midpoint 128
    U8,
    S16,
    /// Packed 3-byte little-endian
    S24,
    S32,
    F32,
}

impl SampleEncoding {
    pub fn bytes(self) -> usize {
        match self {
            SampleEncoding::U8 => 1,
            SampleEncoding::S16 => 2,
            SampleEncoding::S24 => 3,
            SampleEncoding::S32 | SampleEncoding::F32 => 4,
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    pub fn is_float(self) -> bool {
        self == SampleEncoding::F32
    }
}

/// Layout of the raw PCM a decoder session produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub channels: usize,
    pub sample_rate: u32,
    pub encoding: SampleEncoding,
}

impl PcmFormat {
    pub fn new(channels: usize, sample_rate: u32, encoding: SampleEncoding) -> Self {
        Self {
            channels,
            sample_rate,
            encoding,
        }
    }

    /// Size of one interleaved frame in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.channels * self.encoding.bytes()
    }
}

/// Convert little-endian raw PCM to normalized interleaved `f32`.
///
/// `output` is cleared and refilled; its allocation is reused between calls.
/// Trailing bytes that do not form a whole frame are ignored. Returns the
/// number of frames converted.
pub fn convert(format: &PcmFormat, input: &[u8], output: &mut Vec<f32>) -> usize {
    output.clear();
    let frame_bytes = format.frame_bytes();
    if frame_bytes == 0 {
        return 0;
    }
    let frames = input.len() / frame_bytes;
    let input = &input[..frames * frame_bytes];
    output.reserve(frames * format.channels);

    match format.encoding {
        SampleEncoding::U8 => {
            output.extend(input.iter().map(|&b| (b as f32 - 128.0) / 128.0));
        }
        SampleEncoding::S16 => {
            output.extend(
                input
                    .chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0),
            );
        }
        SampleEncoding::S24 => {
            output.extend(input.chunks_exact(3).map(|b| {
                // sign-extend through the top byte of an i32
                let v = i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8;
                v as f32 / 8_388_608.0
            }));
        }
        SampleEncoding::S32 => {
            output.extend(
                input
                    .chunks_exact(4)
                    .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0),
            );
        }
        SampleEncoding::F32 => {
            output.extend(
                input
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            );
        }
    }

    frames
}
