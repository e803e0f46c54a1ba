use super::params::CodecKind;

/// The offload path only plays back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComprCaps {
    pub min_fragment_size: u32,
    pub max_fragment_size: u32,
    pub min_fragments: u32,
    pub max_fragments: u32,
    pub codecs: &'static [CodecKind],
}

pub const COMPR_CAPS: ComprCaps = ComprCaps {
    min_fragment_size: 4 * 1024,
    max_fragment_size: 32 * 1024,
    min_fragments: 1,
    max_fragments: 5,
    codecs: &[CodecKind::Mp3, CodecKind::Aac, CodecKind::Flac],
};

impl ComprCaps {
    /// Size of the buffer reserved at probe time.
    pub const fn buffer_bytes(&self) -> usize {
        self.max_fragments as usize * self.max_fragment_size as usize
    }

    pub fn supports(&self, codec: CodecKind) -> bool {
        self.codecs.contains(&codec)
    }
}
