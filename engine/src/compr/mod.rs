pub mod caps;
pub mod controls;
pub(crate) mod dispatcher;
pub mod params;
pub(crate) mod session;
pub mod tracker;

pub use caps::{COMPR_CAPS, ComprCaps};
pub use controls::{Controls, HwParams, OutputFormat, Volume};
pub use params::{CodecKind, ComprParams, Metadata, MetadataKey, Timestamp, Trigger};
pub use session::StreamState;
pub use tracker::Tracker;

use crate::buffer::DmaAllocator;
use crate::config::OffloadConfig;
use crate::error::{Error, Result};
use crate::hw::{Transport, regs};
use crate::message::Command;
use crate::notify::StreamNotifier;
use crate::worker::{IrqLine, Worker};
use dispatcher::Dispatcher;
use session::{DrainKind, Session, Shared, Waiter};
use std::{sync::Arc, thread::JoinHandle, time::Duration};
use tracing::{debug, error, info, warn};

fn open_session(slot: &mut Option<Session>, id: u32) -> Result<&mut Session> {
    slot.as_mut()
        .ok_or_else(|| Error::InvalidState(format!("compr{id} is not open")))
}

/// One compressed-offload playback device.
///
/// Control operations run on the caller's thread and block on completions
/// delivered by a dedicated irq worker. Feed that worker through
/// [`ComprDevice::irq_line`].
pub struct ComprDevice {
    id: u32,
    transport: Arc<Transport>,
    shared: Arc<Shared>,
    allocator: Arc<dyn DmaAllocator>,
    notifier: Arc<dyn StreamNotifier>,
    create_timeout: Duration,
    stop_timeout: Duration,
    destroy_timeout: Duration,
    irq: IrqLine,
    worker: Option<JoinHandle<()>>,
}

impl ComprDevice {
    pub fn new(
        config: &OffloadConfig,
        transport: Arc<Transport>,
        allocator: Arc<dyn DmaAllocator>,
        notifier: Arc<dyn StreamNotifier>,
    ) -> Result<Self> {
        let shared = Arc::new(Shared::new());
        let dispatcher = Dispatcher::new(
            config.id,
            transport.clone(),
            shared.clone(),
            notifier.clone(),
        );
        let (irq, worker) = Worker::spawn(config.id, dispatcher)?;
        Ok(Self {
            id: config.id,
            transport,
            shared,
            allocator,
            notifier,
            create_timeout: config.create_timeout(),
            stop_timeout: config.stop_timeout(),
            destroy_timeout: config.destroy_timeout(),
            irq,
            worker: Some(worker),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn irq_line(&self) -> IrqLine {
        self.irq.clone()
    }

    pub fn caps(&self) -> &'static ComprCaps {
        &COMPR_CAPS
    }

    pub fn controls(&self) -> Controls {
        Controls::new(self.transport.clone())
    }

    pub fn hw_params(&self) -> HwParams {
        self.controls().hw_params()
    }

    pub fn state(&self) -> StreamState {
        self.shared
            .lock()
            .as_ref()
            .map_or(StreamState::Closed, |s| s.state)
    }

    pub fn tracker(&self) -> Option<Tracker> {
        self.shared.lock().as_ref().map(|s| s.tracker)
    }

    /// Firmware instance id, once CREATED has been confirmed.
    pub fn handle_id(&self) -> Option<u32> {
        self.shared
            .lock()
            .as_ref()
            .filter(|s| s.created)
            .map(|s| s.handle_id)
    }

    /// Gapless (delay, padding) in frames recorded through [`Self::set_metadata`].
    pub fn encoder_gaps(&self) -> Option<(u32, u32)> {
        self.shared
            .lock()
            .as_ref()
            .map(|s| (s.encoder_delay, s.encoder_padding))
    }

    pub fn is_created(&self) -> bool {
        self.shared.lock().as_ref().is_some_and(|s| s.created)
    }

    /// Most recent non-zero completion code seen for this session.
    pub fn firmware_error(&self) -> Option<Error> {
        self.shared
            .lock()
            .as_ref()
            .and_then(|s| s.firmware_error)
            .map(|(event, code)| Error::Firmware { event, code })
    }

    pub fn open(&self) -> Result<()> {
        let mut slot = self.shared.lock();
        if slot.is_some() {
            return Err(Error::InvalidState(format!("compr{} already open", self.id)));
        }
        let buffer = self.allocator.acquire()?;
        debug!(
            "compr{}: buffer {:#x} ({} bytes)",
            self.id,
            buffer.iova(),
            buffer.capacity()
        );
        *slot = Some(Session::new(buffer));
        info!("compr{}: open", self.id);
        Ok(())
    }

    pub fn set_params(&self, params: &ComprParams) -> Result<()> {
        if params.sample_rate == 0 || params.channels == 0 {
            return Err(Error::InvalidArgument(format!(
                "rate {} channels {}",
                params.sample_rate, params.channels
            )));
        }
        if params.fragment_size == 0 || params.fragments == 0 {
            return Err(Error::InvalidArgument(format!(
                "{} fragments of {} bytes",
                params.fragments, params.fragment_size
            )));
        }
        let buffer_size = params.buffer_size();

        let (iova, handle_id) = {
            let mut slot = self.shared.lock();
            let session = open_session(&mut slot, self.id)?;
            if buffer_size > session.buffer.capacity() as u64 {
                return Err(Error::InvalidArgument(format!(
                    "buffer size {:#x} exceeds capacity {:#x}",
                    buffer_size,
                    session.buffer.capacity()
                )));
            }
            if session.state != StreamState::Idle {
                return Err(Error::InvalidState(format!(
                    "set_params in {:?}",
                    session.state
                )));
            }
            session.codec = Some(params.codec);
            session.sample_rate = params.sample_rate;
            session.channel_mask = params.channel_mask();
            session.fragment_size = params.fragment_size;
            session.tracker = Tracker::new(buffer_size);
            session.created = false;
            session.started = false;
            session.firmware_error = None;
            session.state = StreamState::Configuring;
            (session.buffer.iova(), session.handle_id)
        };

        info!(
            "compr{}: {:?} rate={} channels={} buffer={:#x}",
            self.id, params.codec, params.sample_rate, params.channels, buffer_size
        );
        let payload = [
            (regs::SIZE_OF_INBUF, buffer_size as u32),
            (regs::PHY_ADDR_INBUF, iova),
            (regs::PARAM_SAMPLE, params.sample_rate),
            (regs::PARAM_CH, params.channels),
            (regs::IP_TYPE, params.codec.ip_type()),
        ];
        if let Err(e) = self
            .transport
            .send_with(Command::SetParam, handle_id, &payload)
        {
            self.abort_configure();
            return Err(e);
        }

        if !self
            .shared
            .wait_until(Waiter::Created, self.create_timeout, |s| s.created)
        {
            self.transport.write(regs::INTR_ACK, 0);
            self.abort_configure();
            error!("compr{}: CREATED not received", self.id);
            return Err(Error::ProtocolTimeout {
                what: "CREATED",
                after: self.create_timeout,
            });
        }

        let handle_id = self.transport.read(regs::IP_ID);
        let mut slot = self.shared.lock();
        let session = open_session(&mut slot, self.id)?;
        session.handle_id = handle_id;
        session.state = StreamState::Created;
        info!("compr{}: created, handle {:#x}", self.id, handle_id);
        Ok(())
    }

    fn abort_configure(&self) {
        if let Some(session) = self.shared.lock().as_mut() {
            session.created = false;
            session.state = StreamState::Idle;
        }
    }

    pub fn set_metadata(&self, metadata: Metadata) -> Result<()> {
        let mut slot = self.shared.lock();
        let session = open_session(&mut slot, self.id)?;
        match metadata.key {
            MetadataKey::EncoderDelay => session.encoder_delay = metadata.value,
            MetadataKey::EncoderPadding => session.encoder_padding = metadata.value,
            MetadataKey::Other(key) => {
                debug!("compr{}: ignoring metadata key {key:#x}", self.id);
                return Ok(());
            }
        }
        info!(
            "compr{}: {:?} = {}",
            self.id, metadata.key, metadata.value
        );
        Ok(())
    }

    pub fn trigger(&self, trigger: Trigger) -> Result<()> {
        debug!("compr{}: trigger {:?}", self.id, trigger);
        match trigger {
            Trigger::Start | Trigger::PauseRelease => self.start(),
            Trigger::PausePush => self.pause(),
            Trigger::Stop => self.stop(),
            Trigger::Drain => self.drain(DrainKind::Full),
            Trigger::PartialDrain => self.drain(DrainKind::Partial),
            Trigger::NextTrack => {
                info!("compr{}: next track", self.id);
                Ok(())
            }
        }
    }

    fn start(&self) -> Result<()> {
        let (handle_id, previous) = {
            let mut slot = self.shared.lock();
            let session = open_session(&mut slot, self.id)?;
            if !session.created {
                return Err(Error::InvalidState(format!(
                    "start before create ({:?})",
                    session.state
                )));
            }
            match session.state {
                StreamState::Idle | StreamState::Created | StreamState::Paused => {}
                other => return Err(Error::InvalidState(format!("start in {other:?}"))),
            }
            let previous = (session.state, session.started);
            session.started = true;
            session.state = StreamState::Started;
            (session.handle_id, previous)
        };

        if let Err(e) = self.transport.send(Command::Start, handle_id) {
            if let Some(session) = self.shared.lock().as_mut() {
                (session.state, session.started) = previous;
            }
            return Err(e);
        }
        info!("compr{}: started", self.id);
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        let handle_id = {
            let mut slot = self.shared.lock();
            let session = open_session(&mut slot, self.id)?;
            if session.state != StreamState::Started {
                return Err(Error::InvalidState(format!("pause in {:?}", session.state)));
            }
            session.handle_id
        };

        self.transport.send(Command::Pause, handle_id)?;
        if let Some(session) = self.shared.lock().as_mut() {
            if session.state == StreamState::Started {
                session.state = StreamState::Paused;
            }
        }
        info!("compr{}: paused", self.id);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let (handle_id, drained) = {
            let mut slot = self.shared.lock();
            let session = open_session(&mut slot, self.id)?;
            if !session.created {
                return Err(Error::InvalidState(format!("stop in {:?}", session.state)));
            }
            session.stop_acked = false;
            (session.handle_id, session.take_eos())
        };
        if drained {
            self.notifier.drain_complete(self.id);
        }

        let result = self
            .transport
            .send(Command::Stop, handle_id)
            .and_then(|()| {
                if self
                    .shared
                    .wait_until(Waiter::Stop, self.stop_timeout, |s| s.stop_acked)
                {
                    Ok(())
                } else {
                    Err(Error::ProtocolTimeout {
                        what: "FLUSH",
                        after: self.stop_timeout,
                    })
                }
            });

        if let Some(session) = self.shared.lock().as_mut() {
            session.started = false;
            session.stop_acked = false;
            session.tracker.reset();
            session.state = StreamState::Idle;
        }
        match &result {
            Ok(()) => info!("compr{}: stopped", self.id),
            Err(e) => error!("compr{}: stop: {e}", self.id),
        }
        result
    }

    fn drain(&self, kind: DrainKind) -> Result<()> {
        let (handle_id, previous) = {
            let mut slot = self.shared.lock();
            let session = open_session(&mut slot, self.id)?;
            if !session.started {
                return Err(Error::InvalidState(format!(
                    "drain while not started ({:?})",
                    session.state
                )));
            }
            let previous = session.state;
            session.eos_pending = true;
            session.drain = kind;
            session.state = StreamState::Draining;
            (session.handle_id, previous)
        };

        if let Err(e) = self.transport.send(Command::Eos, handle_id) {
            if let Some(session) = self.shared.lock().as_mut() {
                if session.take_eos() {
                    session.state = previous;
                }
            }
            return Err(e);
        }
        info!("compr{}: {:?} drain requested", self.id, kind);
        Ok(())
    }

    /// Reports `bytes` the caller already placed in the ring.
    pub fn ack(&self, bytes: u32) -> Result<()> {
        let mut slot = self.shared.lock();
        let session = open_session(&mut slot, self.id)?;
        self.queue(session, bytes)
    }

    /// Copies `data` into the ring at the write position and reports it.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let bytes = u32::try_from(data.len())
            .map_err(|_| Error::InvalidArgument(format!("write of {} bytes", data.len())))?;
        let mut slot = self.shared.lock();
        let session = open_session(&mut slot, self.id)?;
        if !session.is_live() {
            return Err(Error::InvalidState(format!("write in {:?}", session.state)));
        }
        let free = session.tracker.free_space();
        if u64::from(bytes) > free {
            return Err(Error::InvalidArgument(format!(
                "write of {bytes} bytes with {free} free"
            )));
        }
        let ring = session.tracker.capacity() as usize;
        let offset = session.tracker.app_offset() as usize;
        session.buffer.write_wrapped(offset, ring, data)?;
        self.queue(session, bytes)?;
        Ok(data.len())
    }

    // The session lock is held across the send so a DECODED for this
    // fragment cannot be applied before it has been counted.
    fn queue(&self, session: &mut Session, bytes: u32) -> Result<()> {
        if !session.is_live() {
            return Err(Error::InvalidState(format!("ack in {:?}", session.state)));
        }
        self.transport.send_with(
            Command::Write,
            session.handle_id,
            &[(regs::SIZE_OF_FRAGMENT, bytes)],
        )?;
        session.tracker.record_write(u64::from(bytes));
        debug!(
            "compr{}: queued {} received_total={}",
            self.id,
            bytes,
            session.tracker.received_total()
        );
        Ok(())
    }

    /// Blocks until at least `bytes` of the ring are free.
    pub fn wait_for_space(&self, bytes: u64, timeout: Duration) -> Result<()> {
        {
            let mut slot = self.shared.lock();
            let session = open_session(&mut slot, self.id)?;
            if bytes > session.tracker.capacity() {
                return Err(Error::InvalidArgument(format!(
                    "waiting for {bytes} bytes in a {} byte ring",
                    session.tracker.capacity()
                )));
            }
        }
        if self
            .shared
            .wait_until(Waiter::Completion, timeout, |s| {
                s.tracker.free_space() >= bytes
            })
        {
            Ok(())
        } else {
            Err(Error::ProtocolTimeout {
                what: "free space",
                after: timeout,
            })
        }
    }

    pub fn pointer(&self) -> Result<Timestamp> {
        let slot = self.shared.lock();
        let session = slot
            .as_ref()
            .ok_or_else(|| Error::InvalidState(format!("compr{} is not open", self.id)))?;
        let pcm_size = self.transport.read(regs::RENDERED_PCM_SIZE);
        let channels = session.channel_count();
        let pcm_io_frames = if pcm_size != 0 && channels != 0 {
            pcm_size / (2 * channels)
        } else {
            0
        };
        Ok(Timestamp {
            sampling_rate: session.sample_rate,
            byte_offset: session.tracker.byte_offset(),
            copied_total: session.tracker.copied_total(),
            pcm_io_frames,
        })
    }

    /// Destroys the firmware instance and returns the pinned buffer.
    ///
    /// Local resources are released even if firmware never confirms; that
    /// timeout is still reported.
    pub fn free(&self) -> Result<()> {
        let (was_created, handle_id, drained) = {
            let mut slot = self.shared.lock();
            let session = open_session(&mut slot, self.id)?;
            let was_created = session.created;
            session.created = false;
            session.destroy_acked = false;
            session.state = StreamState::Destroying;
            (was_created, session.handle_id, session.take_eos())
        };
        if drained {
            self.notifier.drain_complete(self.id);
        }

        let result = if was_created {
            match self.transport.send(Command::Destroy, handle_id) {
                Err(e) => {
                    error!("compr{}: can't send DESTROY: {e}", self.id);
                    Err(e)
                }
                Ok(()) => {
                    if self
                        .shared
                        .wait_until(Waiter::Destroy, self.destroy_timeout, |s| s.destroy_acked)
                    {
                        Ok(())
                    } else {
                        warn!("compr{}: DESTROY not confirmed, releasing anyway", self.id);
                        Err(Error::ProtocolTimeout {
                            what: "DESTROY",
                            after: self.destroy_timeout,
                        })
                    }
                }
            }
        } else {
            Ok(())
        };

        self.release_session();
        info!("compr{}: closed", self.id);
        result
    }

    fn release_session(&self) {
        let session = self.shared.lock().take();
        if let Some(session) = session {
            self.allocator.release(session.buffer);
        }
    }
}

impl Drop for ComprDevice {
    fn drop(&mut self) {
        if self.is_created() {
            warn!(
                "compr{}: dropped without free, firmware instance {:#x} left behind",
                self.id,
                self.handle_id().unwrap_or_default()
            );
        }
        self.release_session();
        self.irq.quit();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("compr{}: irq worker panicked", self.id);
            }
        }
    }
}
