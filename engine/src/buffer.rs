use crate::error::{Error, Result};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Firmware-addressable memory that stays mapped for the life of a session.
///
/// Not `Clone`: whoever holds it owns the firmware's view of that memory.
#[derive(Debug)]
pub struct PinnedBuffer {
    iova: u32,
    data: Box<[u8]>,
}

impl PinnedBuffer {
    pub fn new(iova: u32, bytes: usize) -> Self {
        Self {
            iova,
            data: vec![0; bytes].into_boxed_slice(),
        }
    }

    pub fn iova(&self) -> u32 {
        self.iova
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Copies `src` into the first `ring` bytes starting at `offset`, wrapping at `ring`.
    pub fn write_wrapped(&mut self, offset: usize, ring: usize, src: &[u8]) -> Result<()> {
        if ring == 0 || ring > self.data.len() || src.len() > ring {
            return Err(Error::InvalidArgument(format!(
                "copy of {} bytes into ring of {} (capacity {})",
                src.len(),
                ring,
                self.data.len()
            )));
        }
        let start = offset % ring;
        let first = src.len().min(ring - start);
        self.data[start..start + first].copy_from_slice(&src[..first]);
        self.data[..src.len() - first].copy_from_slice(&src[first..]);
        Ok(())
    }
}

pub trait DmaAllocator: Send + Sync {
    fn acquire(&self) -> Result<PinnedBuffer>;
    fn release(&self, buffer: PinnedBuffer);
}

/// A single buffer reserved up front and lent to one session at a time.
#[derive(Debug)]
pub struct FixedPool {
    slot: Mutex<Option<PinnedBuffer>>,
    capacity: usize,
}

impl FixedPool {
    pub fn new(iova: u32, bytes: usize) -> Self {
        Self {
            slot: Mutex::new(Some(PinnedBuffer::new(iova, bytes))),
            capacity: bytes,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_available(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl DmaAllocator for FixedPool {
    fn acquire(&self) -> Result<PinnedBuffer> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| Error::NoMemory("pinned buffer already in use".to_string()))
    }

    fn release(&self, buffer: PinnedBuffer) {
        debug!("pinned buffer {:#x} returned", buffer.iova());
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_lends_one_buffer_at_a_time() {
        let pool = FixedPool::new(0x4000_0000, 64);
        let buffer = pool.acquire().unwrap();
        assert_eq!(buffer.capacity(), 64);
        assert!(!pool.is_available());
        assert!(matches!(pool.acquire(), Err(Error::NoMemory(_))));
        pool.release(buffer);
        assert!(pool.is_available());
    }

    #[test]
    fn wrapped_copy_splits_at_ring_end() {
        let mut buffer = PinnedBuffer::new(0, 16);
        buffer.write_wrapped(6, 8, &[1, 2, 3, 4]).unwrap();
        assert_eq!(&buffer.as_slice()[..8], &[3, 4, 0, 0, 0, 0, 1, 2]);
        assert!(buffer.write_wrapped(0, 32, &[0]).is_err());
    }
}
