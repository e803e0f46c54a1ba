use abox_engine::{
    compr::{CodecKind, ComprParams},
    config::OffloadConfig,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// What the harness plays through the simulated firmware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub codec: CodecKind,
    pub sample_rate: u32,
    pub channels: u32,
    pub fragment_size: u32,
    pub fragments: u32,
    /// Fragments written before draining.
    pub writes: u32,
    pub partial_drain: bool,
    pub volume: u32,
    pub drain_timeout_ms: u64,
    /// Gapless metadata in frames.
    pub encoder_delay: u32,
    pub encoder_padding: u32,
    /// Period size of the companion RDMA ring.
    pub rdma_period_bytes: u64,
    pub rdma_periods: u64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            codec: CodecKind::Mp3,
            sample_rate: 44_100,
            channels: 2,
            fragment_size: 0x1000,
            fragments: 4,
            writes: 16,
            partial_drain: false,
            volume: 0x2000,
            drain_timeout_ms: 1000,
            encoder_delay: 0,
            encoder_padding: 0,
            rdma_period_bytes: 0x600,
            rdma_periods: 4,
        }
    }
}

impl Scenario {
    pub fn params(&self) -> ComprParams {
        ComprParams {
            codec: self.codec,
            sample_rate: self.sample_rate,
            channels: self.channels,
            fragment_size: self.fragment_size,
            fragments: self.fragments,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub offload: OffloadConfig,
    pub scenario: Scenario,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abox_engine::hw::pcm::PlatformType;

    #[test]
    fn missing_tables_fall_back_to_defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn overrides_are_applied() {
        let settings = Settings::parse(
            r#"
            [offload]
            id = 1
            ack_timeout_ms = 50
            platform = "sync"
            rdma_disable_timeout_ms = 10

            [scenario]
            codec = "flac"
            writes = 3
            "#,
        )
        .unwrap();
        assert_eq!(settings.offload.id, 1);
        assert_eq!(settings.offload.ack_timeout_ms, 50);
        assert_eq!(settings.offload.stop_timeout_ms, 1000);
        assert_eq!(settings.offload.platform, PlatformType::Sync);
        assert_eq!(settings.offload.rdma_disable_timeout_ms, 10);
        assert_eq!(settings.scenario.codec, CodecKind::Flac);
        assert_eq!(settings.scenario.writes, 3);
        assert_eq!(settings.scenario.sample_rate, 44_100);
    }

    #[test]
    fn unknown_codec_is_an_error() {
        assert!(Settings::parse("[scenario]\ncodec = \"opus\"\n").is_err());
    }
}
