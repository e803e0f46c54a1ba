use super::pcm::PlatformType;
use super::regs;

/// Decoded RDMA status register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RdmaStatus {
    pub progress: bool,
    /// Ring offset in bytes. Hardware reports it in 16-byte units.
    pub offset: u64,
    /// Bytes consumed past `offset`.
    pub count: u64,
}

impl RdmaStatus {
    pub const fn decode(raw: u32) -> Self {
        Self {
            progress: raw & regs::RDMA_PROGRESS_MASK != 0,
            offset: (((raw & regs::RDMA_RBUF_OFFSET_MASK) >> regs::RDMA_RBUF_OFFSET_L) as u64) << 4,
            count: ((raw & regs::RDMA_RBUF_CNT_MASK) >> regs::RDMA_RBUF_CNT_L) as u64,
        }
    }

    /// Packs back into the register layout. Offsets are truncated to 16-byte units.
    pub const fn encode(&self) -> u32 {
        let progress = if self.progress { regs::RDMA_PROGRESS_MASK } else { 0 };
        let offset = ((self.offset >> 4) as u32) << regs::RDMA_RBUF_OFFSET_L;
        let count = (self.count as u32) << regs::RDMA_RBUF_CNT_L;
        progress | (offset & regs::RDMA_RBUF_OFFSET_MASK) | (count & regs::RDMA_RBUF_CNT_MASK)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingGeometry {
    pub buffer_bytes: u64,
    pub period_bytes: u64,
    pub bytes_per_frame: u64,
}

impl RingGeometry {
    pub fn bytes_to_frames(&self, bytes: u64) -> u64 {
        if self.bytes_per_frame == 0 {
            return 0;
        }
        bytes / self.bytes_per_frame
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PointerQuery {
    pub platform: PlatformType,
    pub firmware_pointer: Option<u64>,
    pub base: u64,
    pub status: RdmaStatus,
    pub geometry: RingGeometry,
}

/// Walks down from the end of the buffer one period at a time and adopts the
/// first period boundary whose bits cover `offset`. Stops once `offset` is
/// period aligned or the walk has gone below zero.
pub fn converge_offset(offset: i64, buffer_bytes: i64, period_bytes: i64) -> i64 {
    if period_bytes <= 0 {
        return offset;
    }
    let mut offset = offset;
    let mut buffer_bytes = buffer_bytes;
    while offset % period_bytes != 0 && buffer_bytes >= 0 {
        buffer_bytes -= period_bytes;
        if buffer_bytes & offset == offset {
            offset = buffer_bytes;
        }
    }
    offset
}

pub fn resolve_bytes(query: &PointerQuery) -> u64 {
    if let Some(pointer) = query.firmware_pointer {
        if pointer >= query.base {
            return pointer - query.base;
        }
    }
    if !(query.status.progress && query.platform.corrects_ring_offset()) {
        return 0;
    }
    let offset = converge_offset(
        query.status.offset as i64,
        query.geometry.buffer_bytes as i64,
        query.geometry.period_bytes as i64,
    );
    let pointer = offset + query.status.count as i64;
    u64::try_from(pointer).unwrap_or(0)
}

pub fn resolve_frames(query: &PointerQuery) -> u64 {
    query.geometry.bytes_to_frames(resolve_bytes(query))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(platform: PlatformType, status: RdmaStatus) -> PointerQuery {
        PointerQuery {
            platform,
            firmware_pointer: None,
            base: 0x1000_0000,
            status,
            geometry: RingGeometry {
                buffer_bytes: 0x1800,
                period_bytes: 0x600,
                bytes_per_frame: 4,
            },
        }
    }

    #[test]
    fn status_fields_decode() {
        let status = RdmaStatus::decode(0x8012_0034);
        assert!(status.progress);
        assert_eq!(status.offset, 0x12 << 4);
        assert_eq!(status.count, 0x34);

        let idle = RdmaStatus::decode(0x0012_0034);
        assert!(!idle.progress);
        assert_eq!(status.encode(), 0x8012_0034);
        assert_eq!(idle.encode(), 0x0012_0034);
    }

    #[test]
    fn firmware_pointer_wins_when_above_base() {
        let mut q = query(PlatformType::Normal, RdmaStatus::default());
        q.firmware_pointer = Some(0x1000_0400);
        assert_eq!(resolve_bytes(&q), 0x400);
        assert_eq!(resolve_frames(&q), 0x100);
    }

    #[test]
    fn firmware_pointer_below_base_falls_through() {
        let mut q = query(
            PlatformType::Normal,
            RdmaStatus {
                progress: true,
                offset: 0x600,
                count: 8,
            },
        );
        q.firmware_pointer = Some(0x0FFF_0000);
        assert_eq!(resolve_bytes(&q), 0x608);
    }

    #[test]
    fn wrapped_offset_snaps_to_covering_period() {
        // 0x200 is not period aligned; 0x1200 is the highest boundary covering its bits
        let q = query(
            PlatformType::Normal,
            RdmaStatus {
                progress: true,
                offset: 0x200,
                count: 0x40,
            },
        );
        assert_eq!(converge_offset(0x200, 0x1800, 0x600), 0x1200);
        assert_eq!(resolve_bytes(&q), 0x1240);
        assert_eq!(resolve_frames(&q), 0x1240 / 4);
    }

    #[test]
    fn aligned_offset_is_left_alone() {
        assert_eq!(converge_offset(0xC00, 0x1800, 0x600), 0xC00);
        assert_eq!(converge_offset(0, 0x1800, 0x600), 0);
    }

    #[test]
    fn offset_past_buffer_without_cover_passes_through() {
        // period 1024, offset = 3 periods + 50, buffer only two periods:
        // no boundary in [0, 2048] covers the offset bits and the walk stops below zero
        let period = 1024;
        let offset = 3 * period + 50;
        assert_eq!(converge_offset(offset, 2048, period), offset);

        let q = PointerQuery {
            platform: PlatformType::Sync,
            firmware_pointer: None,
            base: 0,
            status: RdmaStatus {
                progress: true,
                offset: offset as u64,
                count: 0,
            },
            geometry: RingGeometry {
                buffer_bytes: 2048,
                period_bytes: period as u64,
                bytes_per_frame: 2,
            },
        };
        assert_eq!(resolve_bytes(&q), offset as u64);
    }

    #[test]
    fn no_progress_or_other_platform_reports_zero() {
        let status = RdmaStatus {
            progress: false,
            offset: 0x600,
            count: 4,
        };
        assert_eq!(resolve_bytes(&query(PlatformType::Normal, status)), 0);

        let status = RdmaStatus {
            progress: true,
            ..status
        };
        assert_eq!(resolve_bytes(&query(PlatformType::Call, status)), 0);
        assert_eq!(resolve_bytes(&query(PlatformType::Compress, status)), 0);
        assert_eq!(resolve_bytes(&query(PlatformType::Sync, status)), 0x604);
    }

    #[test]
    fn zero_period_does_not_loop() {
        assert_eq!(converge_offset(0x130, 0x1000, 0), 0x130);
    }
}
