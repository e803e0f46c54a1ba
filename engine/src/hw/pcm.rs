use super::pointer::{self, PointerQuery, RdmaStatus, RingGeometry};
use super::traits::RdmaStatusSource;
use crate::error::{Error, Result};
use crate::notify::StreamNotifier;
use serde::{Deserialize, Serialize};
use std::{
    str::FromStr,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformType {
    #[default]
    Normal,
    Call,
    Compress,
    Realtime,
    ViSensing,
    Sync,
}

impl PlatformType {
    /// Stream types whose pointer is rebuilt from the wrapped RDMA offset.
    pub const fn corrects_ring_offset(self) -> bool {
        matches!(self, PlatformType::Normal | PlatformType::Sync)
    }
}

impl FromStr for PlatformType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "call" => PlatformType::Call,
            "compress" => PlatformType::Compress,
            "realtime" => PlatformType::Realtime,
            "vi-sensing" | "vi_sensing" => PlatformType::ViSensing,
            "sync" => PlatformType::Sync,
            _ => PlatformType::Normal,
        })
    }
}

/// Sample widths accepted by the realtime RDMA path.
pub const SUPPORTED_WIDTHS: [u32; 3] = [16, 24, 32];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmHwParams {
    pub rate: u32,
    pub channels: u32,
    pub width: u32,
    pub period_bytes: u64,
    pub periods: u64,
}

impl PcmHwParams {
    pub fn bytes_per_frame(&self) -> u64 {
        u64::from(self.channels) * u64::from(self.width.div_ceil(8))
    }

    pub fn buffer_bytes(&self) -> u64 {
        self.period_bytes * self.periods
    }
}

/// One realtime playback DMA channel.
pub struct RdmaPcm {
    id: u32,
    platform: PlatformType,
    base: u64,
    status: Arc<dyn RdmaStatusSource>,
    notifier: Arc<dyn StreamNotifier>,
    geometry: RingGeometry,
    firmware_pointer: Option<u64>,
}

impl RdmaPcm {
    pub fn new(
        id: u32,
        platform: PlatformType,
        base: u64,
        status: Arc<dyn RdmaStatusSource>,
        notifier: Arc<dyn StreamNotifier>,
    ) -> Self {
        Self {
            id,
            platform,
            base,
            status,
            notifier,
            geometry: RingGeometry::default(),
            firmware_pointer: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn platform(&self) -> PlatformType {
        self.platform
    }

    pub fn geometry(&self) -> RingGeometry {
        self.geometry
    }

    pub fn hw_params(&mut self, params: &PcmHwParams) -> Result<()> {
        if params.rate == 0 || params.channels == 0 {
            return Err(Error::InvalidArgument(format!(
                "rdma{}: rate {} channels {}",
                self.id, params.rate, params.channels
            )));
        }
        if !SUPPORTED_WIDTHS.contains(&params.width) {
            return Err(Error::InvalidArgument(format!(
                "rdma{}: unsupported width {}",
                self.id, params.width
            )));
        }
        if params.period_bytes == 0 || params.periods == 0 {
            return Err(Error::InvalidArgument(format!(
                "rdma{}: empty ring ({} x {})",
                self.id, params.periods, params.period_bytes
            )));
        }
        self.geometry = RingGeometry {
            buffer_bytes: params.buffer_bytes(),
            period_bytes: params.period_bytes,
            bytes_per_frame: params.bytes_per_frame(),
        };
        debug!(
            "rdma{}: rate={} width={} channels={} period={} periods={}",
            self.id, params.rate, params.width, params.channels, params.period_bytes, params.periods
        );
        Ok(())
    }

    pub fn prepare(&mut self) {
        self.firmware_pointer = None;
    }

    /// Firmware-reported position, as a bus address inside the ring.
    pub fn set_firmware_pointer(&mut self, pointer: u64) {
        self.firmware_pointer = Some(pointer);
    }

    pub fn in_progress(&self) -> bool {
        RdmaStatus::decode(self.status.rdma_status(self.id)).progress
    }

    /// Waits for the DMA to leave its progress state after a stop.
    pub fn disable_barrier(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_progress() {
            if Instant::now() > deadline {
                warn!("RDMA disable timeout[{}]", self.id);
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    pub fn pointer(&self) -> u64 {
        let query = PointerQuery {
            platform: self.platform,
            firmware_pointer: self.firmware_pointer,
            base: self.base,
            status: RdmaStatus::decode(self.status.rdma_status(self.id)),
            geometry: self.geometry,
        };
        let frames = pointer::resolve_frames(&query);
        debug!("rdma{}: pointer={} frames", self.id, frames);
        frames
    }

    /// Pointer-update IPC from firmware. Returns whether it was ours.
    pub fn on_pointer_ipc(&self, channel_id: u32) -> bool {
        if channel_id != self.id {
            return false;
        }
        self.notifier.period_elapsed(self.id);
        true
    }
}
