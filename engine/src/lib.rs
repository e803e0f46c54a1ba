pub mod buffer;
pub mod compr;
pub mod config;
pub mod error;
pub mod hw;
pub mod message;
pub mod notify;
pub mod sim;
pub mod worker;

pub use error::{Error, Result};

use buffer::FixedPool;
use compr::{COMPR_CAPS, ComprDevice};
use config::OffloadConfig;
use hw::{Mailbox, RdmaStatusSource, Transport, pcm::RdmaPcm};
use notify::ChannelNotifier;
use std::sync::Arc;
use tokio::sync::mpsc::{Receiver, channel};

const COMPR_IOVA_BASE: u32 = 0x1000_0000;
const RDMA_IOVA_BASE: u32 = 0x2000_0000;
const IOVA_STRIDE: u32 = 0x0010_0000;

/// Firmware view of the compressed ring for device `id`, if it fits the
/// 32-bit window.
pub const fn iova_compr_buffer(id: u32) -> Option<u32> {
    match id.checked_mul(IOVA_STRIDE) {
        Some(offset) => COMPR_IOVA_BASE.checked_add(offset),
        None => None,
    }
}

/// Bus address of the realtime PCM ring for RDMA channel `id`.
pub fn iova_rdma_buffer(id: u32) -> u64 {
    u64::from(RDMA_IOVA_BASE) + u64::from(id) * u64::from(IOVA_STRIDE)
}

/// Everything built by [`init`].
pub struct Offload {
    pub device: ComprDevice,
    pub rdma: RdmaPcm,
    pub notifications: Receiver<message::Message>,
}

/// Builds the compressed device and its companion RDMA channel over one
/// ABox register block. The caller wires [`ComprDevice::irq_line`] into its
/// interrupt source and reads notifications from [`Offload::notifications`].
pub fn init<H>(config: &OffloadConfig, hw: Arc<H>) -> Result<Offload>
where
    H: Mailbox + RdmaStatusSource + 'static,
{
    let iova = iova_compr_buffer(config.id)
        .ok_or_else(|| Error::InvalidArgument(format!("device id {} out of range", config.id)))?;
    let (tx, rx) = channel::<message::Message>(config.notify_queue_depth.max(1));
    let notifier = Arc::new(ChannelNotifier::new(tx));
    let mailbox: Arc<dyn Mailbox> = hw.clone();
    let transport = Arc::new(Transport::new(mailbox, config.ack_policy()));
    let pool = Arc::new(FixedPool::new(iova, COMPR_CAPS.buffer_bytes()));
    let device = ComprDevice::new(config, transport, pool, notifier.clone())?;
    let rdma = RdmaPcm::new(
        config.id,
        config.platform,
        iova_rdma_buffer(config.id),
        hw,
        notifier,
    );
    Ok(Offload {
        device,
        rdma,
        notifications: rx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimFirmware;

    #[test]
    fn compr_iova_rejects_ids_past_the_window() {
        assert_eq!(iova_compr_buffer(0), Some(0x1000_0000));
        assert_eq!(iova_compr_buffer(2), Some(0x1020_0000));
        assert_eq!(iova_compr_buffer(0xEFF), Some(0xFFF0_0000));
        assert_eq!(iova_compr_buffer(0xF00), None);
        assert_eq!(iova_compr_buffer(0x1000), None);
        assert_eq!(iova_compr_buffer(u32::MAX), None);
    }

    #[test]
    fn init_rejects_out_of_range_id() {
        let config = OffloadConfig {
            id: 0xF00,
            ..OffloadConfig::default()
        };
        let err = init(&config, Arc::new(SimFirmware::default())).err();
        assert!(matches!(err, Some(Error::InvalidArgument(_))));
    }

    #[test]
    fn rdma_channel_follows_config() {
        let config = OffloadConfig {
            id: 1,
            platform: hw::pcm::PlatformType::Sync,
            ..OffloadConfig::default()
        };
        let offload = init(&config, Arc::new(SimFirmware::default())).unwrap();
        assert_eq!(offload.device.id(), 1);
        assert_eq!(offload.rdma.id(), 1);
        assert_eq!(offload.rdma.platform(), hw::pcm::PlatformType::Sync);
    }
}
