use super::params::CodecKind;
use super::tracker::Tracker;
use crate::buffer::PinnedBuffer;
use crate::message::EventCode;
use std::{
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    Idle,
    Configuring,
    Created,
    Started,
    Paused,
    Draining,
    Destroying,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrainKind {
    Full,
    Partial,
}

pub(crate) const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub(crate) const DEFAULT_CHANNEL_MASK: u32 = 0x3;

#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) state: StreamState,
    pub(crate) codec: Option<CodecKind>,
    pub(crate) sample_rate: u32,
    pub(crate) channel_mask: u32,
    pub(crate) fragment_size: u32,
    pub(crate) handle_id: u32,
    pub(crate) buffer: PinnedBuffer,
    pub(crate) tracker: Tracker,
    pub(crate) created: bool,
    pub(crate) started: bool,
    pub(crate) eos_pending: bool,
    pub(crate) stop_acked: bool,
    pub(crate) destroy_acked: bool,
    pub(crate) drain: DrainKind,
    pub(crate) encoder_delay: u32,
    pub(crate) encoder_padding: u32,
    pub(crate) firmware_error: Option<(EventCode, u8)>,
}

impl Session {
    pub(crate) fn new(buffer: PinnedBuffer) -> Self {
        Self {
            state: StreamState::Idle,
            codec: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channel_mask: DEFAULT_CHANNEL_MASK,
            fragment_size: 0,
            handle_id: 0,
            buffer,
            tracker: Tracker::default(),
            created: false,
            started: false,
            eos_pending: false,
            stop_acked: false,
            destroy_acked: false,
            drain: DrainKind::Full,
            encoder_delay: 0,
            encoder_padding: 0,
            firmware_error: None,
        }
    }

    pub(crate) fn channel_count(&self) -> u32 {
        self.channel_mask.count_ones()
    }

    /// Configured, so decode completions have a ring to land in.
    pub(crate) fn is_live(&self) -> bool {
        self.tracker.capacity() > 0
    }

    /// Takes a pending drain so the caller can report it as complete.
    pub(crate) fn take_eos(&mut self) -> bool {
        std::mem::replace(&mut self.eos_pending, false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Waiter {
    Created,
    Stop,
    Destroy,
    Completion,
}

/// Session slot shared between the control path and the dispatch worker.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    session: Mutex<Option<Session>>,
    created: Condvar,
    stop: Condvar,
    destroy: Condvar,
    completion: Condvar,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn condvar(&self, waiter: Waiter) -> &Condvar {
        match waiter {
            Waiter::Created => &self.created,
            Waiter::Stop => &self.stop,
            Waiter::Destroy => &self.destroy,
            Waiter::Completion => &self.completion,
        }
    }

    pub(crate) fn wake(&self, waiter: Waiter) {
        self.condvar(waiter).notify_all();
    }

    /// Blocks until `done` holds for the open session or `timeout` elapses.
    /// Returns false on timeout or if the session went away.
    pub(crate) fn wait_until<F>(&self, waiter: Waiter, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut(&Session) -> bool,
    {
        let guard = self.lock();
        let (guard, _) = self
            .condvar(waiter)
            .wait_timeout_while(guard, timeout, |slot| match slot {
                Some(session) => !done(&*session),
                None => false,
            })
            .unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().is_some_and(done)
    }
}
