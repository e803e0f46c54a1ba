use crate::error::Result;

/// Shared register window plus the doorbell that tells firmware to look at it.
pub trait Mailbox: Send + Sync {
    fn read(&self, index: u32) -> u32;
    fn write(&self, index: u32, value: u32);
    fn doorbell(&self) -> Result<()>;
}

/// Raw RDMA status register of one realtime PCM channel.
pub trait RdmaStatusSource: Send + Sync {
    fn rdma_status(&self, id: u32) -> u32;
}
