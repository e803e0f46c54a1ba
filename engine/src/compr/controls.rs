use crate::error::{Error, Result};
use crate::hw::{Transport, regs};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

pub const VOLUME_CONTROL: &str = "ComprTx0 Volume";
pub const FORMAT_CONTROL: &str = "ComprTx0 Format";
pub const VOLUME_MAX_STEPS: u32 = 0x2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Volume {
    pub left: u32,
    pub right: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum OutputFormat {
    #[default]
    Rate48kS16 = 0,
    Rate192kS24 = 1,
    Rate384kS32 = 2,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [
        OutputFormat::Rate48kS16,
        OutputFormat::Rate192kS24,
        OutputFormat::Rate384kS32,
    ];

    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|f| *f as u32 == raw)
    }

    pub const fn label(self) -> &'static str {
        match self {
            OutputFormat::Rate48kS16 => "48kHz 16bit",
            OutputFormat::Rate192kS24 => "192kHz 24bit",
            OutputFormat::Rate384kS32 => "384kHz 32bit",
        }
    }

    pub const fn rate(self) -> u32 {
        match self {
            OutputFormat::Rate48kS16 => 48_000,
            OutputFormat::Rate192kS24 => 192_000,
            OutputFormat::Rate384kS32 => 384_000,
        }
    }

    pub const fn sample_format(self) -> SampleFormat {
        match self {
            OutputFormat::Rate48kS16 => SampleFormat::S16,
            OutputFormat::Rate192kS24 => SampleFormat::S24,
            OutputFormat::Rate384kS32 => SampleFormat::S32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SampleFormat {
    S16,
    S24,
    S32,
}

/// Constraints the backend DAI link should apply to the decoded output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HwParams {
    pub channels_min: u32,
    pub rate_min: u32,
    pub format: SampleFormat,
}

/// Mixer controls backed by mailbox fields. None of these go through the
/// command path.
#[derive(Clone)]
pub struct Controls {
    transport: Arc<Transport>,
}

impl Controls {
    pub(crate) fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub fn volume(&self) -> Volume {
        Volume {
            left: self.transport.read(regs::LEFT_VOL),
            right: self.transport.read(regs::RIGHT_VOL),
        }
    }

    pub fn set_volume(&self, volume: Volume) -> Result<()> {
        if volume.left > VOLUME_MAX_STEPS || volume.right > VOLUME_MAX_STEPS {
            return Err(Error::InvalidArgument(format!(
                "{VOLUME_CONTROL}: {}/{} exceeds {VOLUME_MAX_STEPS:#x}",
                volume.left, volume.right
            )));
        }
        debug!("{VOLUME_CONTROL}: left={} right={}", volume.left, volume.right);
        self.transport.write(regs::LEFT_VOL, volume.left);
        self.transport.write(regs::RIGHT_VOL, volume.right);
        Ok(())
    }

    pub fn output_format(&self) -> OutputFormat {
        let raw = self.transport.read(regs::UPSCALE);
        OutputFormat::from_raw(raw).unwrap_or_else(|| {
            warn!("{FORMAT_CONTROL}: unknown upscale value {raw}, using default");
            OutputFormat::default()
        })
    }

    pub fn set_output_format(&self, format: OutputFormat) {
        debug!("{FORMAT_CONTROL}: {}", format.label());
        self.transport.write(regs::UPSCALE, format as u32);
    }

    pub fn hw_params(&self) -> HwParams {
        let format = self.output_format();
        HwParams {
            channels_min: 2,
            rate_min: format.rate(),
            format: format.sample_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_labels_follow_register_values() {
        assert_eq!(OutputFormat::from_raw(0), Some(OutputFormat::Rate48kS16));
        assert_eq!(OutputFormat::from_raw(1).map(OutputFormat::label), Some("192kHz 24bit"));
        assert_eq!(OutputFormat::from_raw(2).map(OutputFormat::rate), Some(384_000));
        assert_eq!(OutputFormat::from_raw(3), None);
    }
}
