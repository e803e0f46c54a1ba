#![allow(dead_code)]

use abox_engine::{
    buffer::FixedPool,
    compr::{CodecKind, ComprDevice, ComprParams},
    config::OffloadConfig,
    hw::Transport,
    notify::StreamNotifier,
    sim::SimFirmware,
};
use std::{
    sync::{Arc, Condvar, Mutex},
    time::Duration,
};

pub const IOVA: u32 = 0x1000_0000;
pub const WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub fragments: usize,
    pub drains: usize,
    pub periods: usize,
}

#[derive(Debug, Default)]
pub struct Recorder {
    counts: Mutex<Counts>,
    changed: Condvar,
}

impl Recorder {
    pub fn counts(&self) -> Counts {
        *self.counts.lock().unwrap()
    }

    pub fn wait_for(&self, timeout: Duration, done: impl Fn(&Counts) -> bool) -> bool {
        let guard = self.counts.lock().unwrap();
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |c| !done(c))
            .unwrap();
        done(&guard)
    }

    fn bump(&self, f: impl FnOnce(&mut Counts)) {
        f(&mut self.counts.lock().unwrap());
        self.changed.notify_all();
    }
}

impl StreamNotifier for Recorder {
    fn fragment_elapsed(&self, _id: u32) {
        self.bump(|c| c.fragments += 1);
    }

    fn drain_complete(&self, _id: u32) {
        self.bump(|c| c.drains += 1);
    }

    fn period_elapsed(&self, _id: u32) {
        self.bump(|c| c.periods += 1);
    }
}

pub struct Rig {
    pub sim: Arc<SimFirmware>,
    pub pool: Arc<FixedPool>,
    pub notes: Arc<Recorder>,
    pub device: ComprDevice,
}

pub fn fast_config() -> OffloadConfig {
    OffloadConfig {
        ack_timeout_ms: 50,
        create_timeout_ms: 150,
        stop_timeout_ms: 150,
        destroy_timeout_ms: 150,
        ..OffloadConfig::default()
    }
}

pub fn rig_with(config: OffloadConfig, capacity: usize) -> Rig {
    let sim = Arc::new(SimFirmware::default());
    let pool = Arc::new(FixedPool::new(IOVA, capacity));
    let notes = Arc::new(Recorder::default());
    let transport = Arc::new(Transport::new(sim.clone(), config.ack_policy()));
    let device = ComprDevice::new(&config, transport, pool.clone(), notes.clone()).unwrap();
    sim.connect(device.irq_line());
    Rig {
        sim,
        pool,
        notes,
        device,
    }
}

pub fn rig() -> Rig {
    rig_with(fast_config(), 0x4000)
}

pub fn stereo(fragment_size: u32, fragments: u32) -> ComprParams {
    ComprParams {
        codec: CodecKind::Mp3,
        sample_rate: 44_100,
        channels: 2,
        fragment_size,
        fragments,
    }
}

/// Open and configure a 4 x 4 KiB stereo MP3 stream.
pub fn created() -> Rig {
    let rig = rig();
    rig.device.open().unwrap();
    rig.device.set_params(&stereo(0x1000, 4)).unwrap();
    rig
}
