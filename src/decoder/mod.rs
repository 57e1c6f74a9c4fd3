pub mod file;

use std::collections::HashMap;
use std::sync::Arc;

use crate::convert::PcmFormat;
use crate::error::Result;
use crate::tags::ReplayGainTags;

pub use self::file::SymphoniaDecoder;

/// Snapshot of the playlist fields a decoder needs to open a track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSource {
    pub uri: String,
    pub decoder: String,
    pub duration: f64,
}

/// An open decode of one track. Closing happens on drop.
pub trait DecoderSession: Send {
    /// Open `source` and report the PCM layout `read` will produce.
    fn init(&mut self, source: &TrackSource) -> Result<PcmFormat>;

    /// Fill `buffer` with raw interleaved PCM. Returning fewer bytes than
    /// `buffer.len()` signals end of stream.
    fn read(&mut self, buffer: &mut [u8]) -> usize;
}

/// A decoder plugin that can open sessions and persist tags.
pub trait Decoder: Send + Sync {
    fn id(&self) -> &str;

    fn open(&self) -> Box<dyn DecoderSession>;

    /// Write ReplayGain tags into the file behind `uri`.
    ///
    /// Decoders without tag support keep the values in the playlist only.
    fn write_metadata(&self, _uri: &str, _tags: &ReplayGainTags) -> Result<()> {
        Ok(())
    }
}

/// Decoders addressable by the id stored in a track's `:DECODER` field.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn Decoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in symphonia file decoder.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SymphoniaDecoder));
        registry
    }

    pub fn register(&mut self, decoder: Arc<dyn Decoder>) {
        self.decoders.insert(decoder.id().to_string(), decoder);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Decoder>> {
        self.decoders.get(id).cloned()
    }
}
