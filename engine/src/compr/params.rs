use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

pub const SND_AUDIOCODEC_MP3: u32 = 0x0000_0002;
pub const SND_AUDIOCODEC_AAC: u32 = 0x0000_0006;
pub const SND_AUDIOCODEC_FLAC: u32 = 0x0000_000A;

/// Decoder selected in firmware. The discriminant is the firmware ip type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    Mp3 = 0,
    Aac = 1,
    Flac = 2,
}

impl CodecKind {
    pub fn from_audiocodec(id: u32) -> Result<Self> {
        match id {
            SND_AUDIOCODEC_MP3 => Ok(CodecKind::Mp3),
            SND_AUDIOCODEC_AAC => Ok(CodecKind::Aac),
            SND_AUDIOCODEC_FLAC => Ok(CodecKind::Flac),
            other => Err(Error::InvalidArgument(format!("unknown codec id {other:#x}"))),
        }
    }

    /// Value written to IP_TYPE.
    pub const fn ip_type(self) -> u32 {
        (self as u32) << 16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComprParams {
    pub codec: CodecKind,
    pub sample_rate: u32,
    pub channels: u32,
    pub fragment_size: u32,
    pub fragments: u32,
}

impl ComprParams {
    pub fn buffer_size(&self) -> u64 {
        u64::from(self.fragment_size) * u64::from(self.fragments)
    }

    pub fn channel_mask(&self) -> u32 {
        match self.channels {
            0 => 0,
            n if n >= 32 => u32::MAX,
            n => (1 << n) - 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Start,
    PauseRelease,
    PausePush,
    Stop,
    Drain,
    PartialDrain,
    NextTrack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKey {
    EncoderDelay,
    EncoderPadding,
    Other(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub key: MetadataKey,
    pub value: u32,
}

/// Snapshot returned by a pointer query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Timestamp {
    pub sampling_rate: u32,
    pub byte_offset: u64,
    pub copied_total: u64,
    pub pcm_io_frames: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_ids_map_to_ip_types() {
        assert_eq!(CodecKind::from_audiocodec(SND_AUDIOCODEC_MP3), Ok(CodecKind::Mp3));
        assert_eq!(CodecKind::from_audiocodec(SND_AUDIOCODEC_FLAC).map(CodecKind::ip_type), Ok(0x2_0000));
        assert_eq!(CodecKind::Aac.ip_type(), 0x1_0000);
        assert!(matches!(
            CodecKind::from_audiocodec(0x9),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn channel_mask_covers_low_bits() {
        let mut params = ComprParams {
            codec: CodecKind::Mp3,
            sample_rate: 44_100,
            channels: 2,
            fragment_size: 0x1000,
            fragments: 4,
        };
        assert_eq!(params.channel_mask(), 0x3);
        assert_eq!(params.buffer_size(), 0x4000);
        params.channels = 6;
        assert_eq!(params.channel_mask(), 0x3F);
    }
}
