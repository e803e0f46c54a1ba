use super::session::{DrainKind, Session, Shared, StreamState, Waiter};
use crate::error::{Error, Result};
use crate::hw::{Transport, regs};
use crate::message::{Event, EventCode};
use crate::notify::StreamNotifier;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notice {
    FragmentElapsed,
    DrainComplete,
}

struct Outcome {
    result: Result<()>,
    waiter: Option<Waiter>,
    notice: Option<Notice>,
}

impl Outcome {
    fn quiet() -> Self {
        Self {
            result: Ok(()),
            waiter: None,
            notice: None,
        }
    }

    fn failed(error: Error) -> Self {
        Self {
            result: Err(error),
            ..Self::quiet()
        }
    }
}

/// Turns completion interrupts into session state changes.
pub(crate) struct Dispatcher {
    id: u32,
    transport: Arc<Transport>,
    shared: Arc<Shared>,
    notifier: Arc<dyn StreamNotifier>,
}

impl Dispatcher {
    pub(crate) fn new(
        id: u32,
        transport: Arc<Transport>,
        shared: Arc<Shared>,
        notifier: Arc<dyn StreamNotifier>,
    ) -> Self {
        Self {
            id,
            transport,
            shared,
            notifier,
        }
    }

    pub(crate) fn handle_status(&self, status: u32) {
        if status == 1 {
            error!("compr{}: possibility of firmware command failure ({status:#x})", self.id);
        }
        let event = Event::decode(status);
        debug!("compr{}: irq {:?} err={:#x}", self.id, event.code, event.error);

        let outcome = {
            let mut slot = self.shared.lock();
            let outcome = self.apply(slot.as_mut(), event);
            self.clear_intr_ack();
            outcome
        };

        if let Some(waiter) = outcome.waiter {
            self.shared.wake(waiter);
        }
        self.shared.wake(Waiter::Completion);

        match outcome.notice {
            Some(Notice::FragmentElapsed) => self.notifier.fragment_elapsed(self.id),
            Some(Notice::DrainComplete) => self.notifier.drain_complete(self.id),
            None => {}
        }

        match outcome.result {
            Ok(()) => {}
            Err(e @ Error::SpuriousEvent { .. }) => debug!("compr{}: {e}", self.id),
            Err(e) => error!("compr{}: {e}", self.id),
        }
    }

    fn clear_intr_ack(&self) {
        self.transport.write(regs::INTR_ACK, 0);
    }

    fn apply(&self, session: Option<&mut Session>, event: Event) -> Outcome {
        let Some(session) = session else {
            return Outcome::failed(Error::SpuriousEvent {
                event: event.code,
                reason: "no open session",
            });
        };

        if !event.is_ok() {
            session.firmware_error = Some((event.code, event.error));
        }

        match event.code {
            EventCode::Created => self.on_created(session, event),
            EventCode::Decoded => self.on_decoded(session, event),
            EventCode::Flush => self.on_flush(session, event),
            EventCode::Paused => {
                if event.is_ok() {
                    Outcome::quiet()
                } else {
                    Outcome::failed(firmware(event))
                }
            }
            EventCode::Eos => self.on_eos(session, event),
            EventCode::Destroy => self.on_destroy(session, event),
            _ => Outcome::quiet(),
        }
    }

    fn on_created(&self, session: &mut Session, event: Event) -> Outcome {
        // A configure that already timed out must not be revived.
        if session.state != StreamState::Configuring {
            return Outcome::failed(Error::SpuriousEvent {
                event: event.code,
                reason: "no configure pending",
            });
        }
        if !event.is_ok() {
            return Outcome {
                waiter: Some(Waiter::Created),
                ..Outcome::failed(firmware(event))
            };
        }
        session.created = true;
        Outcome {
            waiter: Some(Waiter::Created),
            ..Outcome::quiet()
        }
    }

    fn on_decoded(&self, session: &mut Session, event: Event) -> Outcome {
        if !event.is_ok() {
            return Outcome::failed(firmware(event));
        }
        if !session.is_live() {
            return Outcome::failed(Error::SpuriousEvent {
                event: event.code,
                reason: "session not configured",
            });
        }

        let size = u64::from(self.transport.read(regs::SIZE_OUT_DATA));
        let applied = session.tracker.record_decoded(size);
        if applied < size {
            warn!(
                "compr{}: firmware decoded {} bytes but only {} were queued",
                self.id, size, applied
            );
        }

        if !session.started && session.state != StreamState::Paused {
            error!(
                "compr{}: write_done received while not started ({:?})",
                self.id, session.state
            );
        } else {
            let avail = session.tracker.bytes_available();
            debug!(
                "compr{}: copied_total={} avail={} free={}",
                self.id,
                session.tracker.copied_total(),
                avail,
                session.tracker.free_space()
            );
            if avail < u64::from(session.fragment_size) {
                debug!("compr{}: insufficient data to send (avail={})", self.id, avail);
            }
        }

        Outcome {
            notice: Some(Notice::FragmentElapsed),
            ..Outcome::quiet()
        }
    }

    fn on_flush(&self, session: &mut Session, event: Event) -> Outcome {
        if !event.is_ok() {
            return Outcome::failed(firmware(event));
        }
        session.stop_acked = true;
        Outcome {
            waiter: Some(Waiter::Stop),
            ..Outcome::quiet()
        }
    }

    fn on_eos(&self, session: &mut Session, event: Event) -> Outcome {
        if !event.is_ok() {
            error!("compr{}: {}", self.id, firmware(event));
        }
        if !session.take_eos() {
            return Outcome::failed(Error::SpuriousEvent {
                event: event.code,
                reason: "no drain pending",
            });
        }

        let copied = session.tracker.copied_total();
        let received = session.tracker.received_total();
        if copied != received {
            warn!(
                "compr{}: EOS is not sync (copied {} / received {})",
                self.id, copied, received
            );
        }
        session.state = match session.drain {
            DrainKind::Full => {
                session.started = false;
                StreamState::Created
            }
            DrainKind::Partial => StreamState::Started,
        };
        info!("compr{}: drain complete", self.id);

        Outcome {
            notice: Some(Notice::DrainComplete),
            ..Outcome::quiet()
        }
    }

    fn on_destroy(&self, session: &mut Session, event: Event) -> Outcome {
        if !event.is_ok() {
            return Outcome::failed(firmware(event));
        }
        session.destroy_acked = true;
        Outcome {
            waiter: Some(Waiter::Destroy),
            ..Outcome::quiet()
        }
    }
}

fn firmware(event: Event) -> Error {
    Error::Firmware {
        event: event.code,
        code: event.error,
    }
}
