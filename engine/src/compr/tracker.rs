use serde::Serialize;

/// Byte accounting for one offload ring.
///
/// `received_total` counts bytes acknowledged by firmware as queued,
/// `copied_total` counts bytes firmware reported as decoded, and
/// `byte_offset` is where the decoder sits inside the ring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tracker {
    capacity: u64,
    received_total: u64,
    copied_total: u64,
    byte_offset: u64,
}

impl Tracker {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn received_total(&self) -> u64 {
        self.received_total
    }

    pub fn copied_total(&self) -> u64 {
        self.copied_total
    }

    pub fn byte_offset(&self) -> u64 {
        self.byte_offset
    }

    pub fn bytes_available(&self) -> u64 {
        self.received_total - self.copied_total
    }

    pub fn free_space(&self) -> u64 {
        self.capacity.saturating_sub(self.bytes_available())
    }

    /// Where the next write lands inside the ring.
    pub fn app_offset(&self) -> u64 {
        if self.capacity == 0 {
            0
        } else {
            self.received_total % self.capacity
        }
    }

    pub fn record_write(&mut self, bytes: u64) {
        self.received_total += bytes;
    }

    /// Applies a decode completion and returns the bytes actually counted,
    /// which is less than `bytes` only if firmware reports more than was queued.
    pub fn record_decoded(&mut self, bytes: u64) -> u64 {
        if self.capacity == 0 {
            return 0;
        }
        let applied = bytes.min(self.bytes_available());
        self.copied_total += applied;
        self.byte_offset = (self.byte_offset + applied) % self.capacity;
        applied
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_advances_offset_and_wraps() {
        let mut tracker = Tracker::new(0x4000);
        tracker.record_write(0x3000);
        assert_eq!(tracker.record_decoded(0x3000), 0x3000);
        tracker.record_write(0x2000);
        assert_eq!(tracker.record_decoded(0x2000), 0x2000);
        assert_eq!(tracker.copied_total(), 0x5000);
        assert_eq!(tracker.byte_offset(), 0x1000);
        assert_eq!(tracker.byte_offset(), tracker.copied_total() % tracker.capacity());
    }

    #[test]
    fn copied_never_passes_received() {
        let mut tracker = Tracker::new(0x8000);
        tracker.record_write(4096);
        assert_eq!(tracker.record_decoded(8192), 4096);
        assert_eq!(tracker.copied_total(), tracker.received_total());
        assert_eq!(tracker.record_decoded(1), 0);
        assert_eq!(tracker.bytes_available(), 0);
    }

    #[test]
    fn free_space_and_app_offset() {
        let mut tracker = Tracker::new(0x1000);
        assert_eq!(tracker.free_space(), 0x1000);
        tracker.record_write(0xC00);
        assert_eq!(tracker.free_space(), 0x400);
        tracker.record_decoded(0x800);
        tracker.record_write(0x800);
        assert_eq!(tracker.bytes_available(), 0xC00);
        assert_eq!(tracker.app_offset(), 0x400);
    }

    #[test]
    fn unconfigured_ring_ignores_decodes() {
        let mut tracker = Tracker::default();
        tracker.record_write(10);
        assert_eq!(tracker.record_decoded(10), 0);
        assert_eq!(tracker.byte_offset(), 0);
    }

    #[test]
    fn reset_keeps_capacity() {
        let mut tracker = Tracker::new(0x2000);
        tracker.record_write(100);
        tracker.record_decoded(50);
        tracker.reset();
        assert_eq!(tracker, Tracker::new(0x2000));
    }
}
