use crate::settings::Scenario;
use abox_engine::{
    compr::{
        CodecKind, ComprDevice, HwParams, Metadata, MetadataKey, Timestamp, Tracker, Trigger,
        Volume,
    },
    hw::{
        pcm::{PcmHwParams, PlatformType, RdmaPcm},
        pointer::RdmaStatus,
    },
    sim::SimFirmware,
};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// PCM frames the simulated decoder renders per fragment.
const FRAMES_PER_FRAGMENT: u32 = 1152;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub codec: CodecKind,
    pub handle_id: Option<u32>,
    pub fragments_written: u32,
    pub bytes_written: u64,
    pub timestamp: Timestamp,
    pub tracker: Option<Tracker>,
    pub hw_params: HwParams,
    pub volume: Volume,
    pub encoder_gaps: Option<(u32, u32)>,
    pub rdma: Option<RdmaReport>,
    pub fragment_notifications: u64,
    pub drain_notifications: u64,
    pub period_notifications: u64,
    pub free_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RdmaReport {
    pub platform: PlatformType,
    pub pointer_frames: u64,
    pub disabled_cleanly: bool,
}

/// Opens, configures and starts the stream, pushes `writes` fragments
/// through the simulated decoder and requests a drain.
pub fn play(device: &ComprDevice, sim: &SimFirmware, scenario: &Scenario) -> Result<u32> {
    device.open().context("open")?;
    device
        .set_params(&scenario.params())
        .context("set_params")?;
    for (key, value) in [
        (MetadataKey::EncoderDelay, scenario.encoder_delay),
        (MetadataKey::EncoderPadding, scenario.encoder_padding),
    ] {
        device.set_metadata(Metadata { key, value })?;
    }
    device.controls().set_volume(Volume {
        left: scenario.volume,
        right: scenario.volume,
    })?;
    device.trigger(Trigger::Start).context("start")?;

    let fragment = vec![0u8; scenario.fragment_size as usize];
    let pcm_bytes_per_fragment = FRAMES_PER_FRAGMENT * 2 * scenario.channels;
    for i in 0..scenario.writes {
        device.wait_for_space(u64::from(scenario.fragment_size), Duration::from_secs(1))?;
        device.write(&fragment).with_context(|| format!("write {i}"))?;
        if !sim.decode(scenario.fragment_size) {
            bail!("decode of fragment {i} was not taken");
        }
        sim.set_rendered_pcm((i + 1) * pcm_bytes_per_fragment);
    }
    info!("wrote {} fragments", scenario.writes);

    let drain = if scenario.partial_drain {
        Trigger::PartialDrain
    } else {
        Trigger::Drain
    };
    device.trigger(drain).context("drain")?;
    Ok(scenario.writes)
}

/// Collects the final position and tears the stream down.
pub fn finish(device: &ComprDevice, scenario: &Scenario, written: u32) -> Result<Report> {
    let timestamp = device.pointer()?;
    let tracker = device.tracker();
    let handle_id = device.handle_id();
    let encoder_gaps = device.encoder_gaps();
    let controls = device.controls();
    let free_error = match device.free() {
        Ok(()) => None,
        Err(e) => {
            warn!("free: {e}");
            Some(e.to_string())
        }
    };
    Ok(Report {
        codec: scenario.codec,
        handle_id,
        fragments_written: written,
        bytes_written: u64::from(written) * u64::from(scenario.fragment_size),
        timestamp,
        tracker,
        hw_params: controls.hw_params(),
        volume: controls.volume(),
        encoder_gaps,
        rdma: None,
        fragment_notifications: 0,
        drain_notifications: 0,
        period_notifications: 0,
        free_error,
    })
}

/// Runs one period of the companion RDMA ring: the DMA is parked one period
/// and a bit into the ring, firmware posts a pointer IPC, then the channel
/// is stopped behind the disable barrier.
pub fn sweep_rdma(
    rdma: &mut RdmaPcm,
    sim: &SimFirmware,
    scenario: &Scenario,
    disable_timeout: Duration,
) -> Result<RdmaReport> {
    rdma.hw_params(&PcmHwParams {
        rate: scenario.sample_rate,
        channels: scenario.channels,
        width: 16,
        period_bytes: scenario.rdma_period_bytes,
        periods: scenario.rdma_periods,
    })
    .context("rdma hw_params")?;
    rdma.prepare();

    let running = RdmaStatus {
        progress: true,
        offset: scenario.rdma_period_bytes,
        count: 0x40,
    };
    sim.set_rdma_status(rdma.id(), running.encode());
    let pointer_frames = rdma.pointer();
    rdma.on_pointer_ipc(rdma.id());

    sim.set_rdma_status(rdma.id(), RdmaStatus::default().encode());
    let disabled_cleanly = rdma.disable_barrier(disable_timeout);
    if !disabled_cleanly {
        warn!("rdma{}: still in progress after stop", rdma.id());
    }
    info!(
        "rdma{}: {:?} pointer={} frames",
        rdma.id(),
        rdma.platform(),
        pointer_frames
    );
    Ok(RdmaReport {
        platform: rdma.platform(),
        pointer_frames,
        disabled_cleanly,
    })
}
