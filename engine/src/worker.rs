use crate::compr::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use std::{
    sync::mpsc::{Receiver, Sender, channel},
    thread::{self, JoinHandle},
};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Irq {
    Status(u32),
    Quit,
}

/// Producer end of the completion queue. Cheap to clone and hand to the
/// interrupt source.
#[derive(Debug, Clone)]
pub struct IrqLine {
    tx: Sender<Irq>,
}

impl IrqLine {
    /// Queues one status word. Returns false once the worker has gone away.
    pub fn raise(&self, status: u32) -> bool {
        self.tx.send(Irq::Status(status)).is_ok()
    }

    pub(crate) fn quit(&self) {
        let _ = self.tx.send(Irq::Quit);
    }
}

/// Single consumer of the completion queue.
pub(crate) struct Worker {
    id: u32,
    rx: Receiver<Irq>,
    dispatcher: Dispatcher,
}

impl Worker {
    pub(crate) fn spawn(id: u32, dispatcher: Dispatcher) -> Result<(IrqLine, JoinHandle<()>)> {
        let (tx, rx) = channel();
        let worker = Worker { id, rx, dispatcher };
        let handle = thread::Builder::new()
            .name(format!("abox-compr{id}-irq"))
            .spawn(move || worker.work())
            .map_err(|e| Error::Worker(e.to_string()))?;
        Ok((IrqLine { tx }, handle))
    }

    fn work(&self) {
        for irq in &self.rx {
            match irq {
                Irq::Quit => {
                    debug!("compr{}: irq worker exiting", self.id);
                    return;
                }
                Irq::Status(status) => self.dispatcher.handle_status(status),
            }
        }
    }
}
