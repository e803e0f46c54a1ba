// Offload mailbox window, byte offsets.
pub const CMD_CODE: u32 = 0x0004;
pub const HANDLE_ID: u32 = 0x0008;
pub const IP_TYPE: u32 = 0x000C;
pub const SIZE_OF_FRAGMENT: u32 = 0x0010;
pub const PHY_ADDR_INBUF: u32 = 0x0014;
pub const SIZE_OF_INBUF: u32 = 0x0018;
pub const LEFT_VOL: u32 = 0x001C;
pub const RIGHT_VOL: u32 = 0x0020;
pub const EFFECT_EXT_ON: u32 = 0x0024;
pub const ALPA_NOTI: u32 = 0x0028;
pub const PARAM_RATE: u32 = 0x0034;
pub const PARAM_SAMPLE: u32 = 0x0038;
pub const PARAM_CH: u32 = 0x003C;
pub const RETURN_CMD: u32 = 0x0040;
pub const IP_ID: u32 = 0x0044;
pub const SIZE_OUT_DATA: u32 = 0x0048;
pub const RENDERED_PCM_SIZE: u32 = 0x004C;
pub const UPSCALE: u32 = 0x0050;
pub const CPU_LOCK_LV: u32 = 0x0054;
pub const CHECK_CMD: u32 = 0x0058;
pub const CHECK_RUNNING: u32 = 0x005C;
pub const ACK: u32 = 0x0060;
pub const INTR_ACK: u32 = 0x0064;
pub const INTR_DMA_ACK: u32 = 0x0068;

pub const WINDOW_BYTES: usize = 0x006C;

// RDMA status register.
pub const RDMA_PROGRESS_L: u32 = 31;
pub const RDMA_PROGRESS_MASK: u32 = 0x1 << RDMA_PROGRESS_L;
pub const RDMA_RBUF_OFFSET_L: u32 = 16;
pub const RDMA_RBUF_OFFSET_H: u32 = 27;
pub const RDMA_RBUF_OFFSET_MASK: u32 =
    ((1 << (RDMA_RBUF_OFFSET_H - RDMA_RBUF_OFFSET_L + 1)) - 1) << RDMA_RBUF_OFFSET_L;
pub const RDMA_RBUF_CNT_L: u32 = 0;
pub const RDMA_RBUF_CNT_H: u32 = 15;
pub const RDMA_RBUF_CNT_MASK: u32 =
    ((1 << (RDMA_RBUF_CNT_H - RDMA_RBUF_CNT_L + 1)) - 1) << RDMA_RBUF_CNT_L;

pub const fn name(index: u32) -> &'static str {
    match index {
        CMD_CODE => "CMD_CODE",
        HANDLE_ID => "HANDLE_ID",
        IP_TYPE => "IP_TYPE",
        SIZE_OF_FRAGMENT => "SIZE_OF_FRAGMENT",
        PHY_ADDR_INBUF => "PHY_ADDR_INBUF",
        SIZE_OF_INBUF => "SIZE_OF_INBUF",
        LEFT_VOL => "LEFT_VOL",
        RIGHT_VOL => "RIGHT_VOL",
        EFFECT_EXT_ON => "EFFECT_EXT_ON",
        ALPA_NOTI => "ALPA_NOTI",
        PARAM_RATE => "PARAM_RATE",
        PARAM_SAMPLE => "PARAM_SAMPLE",
        PARAM_CH => "PARAM_CH",
        RETURN_CMD => "RETURN_CMD",
        IP_ID => "IP_ID",
        SIZE_OUT_DATA => "SIZE_OUT_DATA",
        RENDERED_PCM_SIZE => "RENDERED_PCM_SIZE",
        UPSCALE => "UPSCALE",
        CPU_LOCK_LV => "CPU_LOCK_LV",
        CHECK_CMD => "CHECK_CMD",
        CHECK_RUNNING => "CHECK_RUNNING",
        ACK => "ACK",
        INTR_ACK => "INTR_ACK",
        INTR_DMA_ACK => "INTR_DMA_ACK",
        _ => "UNKNOWN",
    }
}
