use super::{regs, traits::Mailbox};
use crate::error::{Error, Result};
use crate::message::Command;
use std::{
    sync::{Arc, Mutex, PoisonError},
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, error};

/// How long `send` waits for the firmware to raise ACK, and how often it looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckPolicy {
    pub budget: Duration,
    pub poll_interval: Duration,
}

impl Default for AckPolicy {
    fn default() -> Self {
        Self {
            budget: Duration::from_millis(200),
            poll_interval: Duration::from_micros(100),
        }
    }
}

/// Serialized command path over the offload mailbox.
///
/// Plain register access goes straight to the window. `send` and `send_with`
/// hold the command lock from the first payload write until ACK has been
/// cleared, so at most one command is ever in flight.
pub struct Transport {
    mailbox: Arc<dyn Mailbox>,
    cmd_lock: Mutex<()>,
    policy: AckPolicy,
}

impl Transport {
    pub fn new(mailbox: Arc<dyn Mailbox>, policy: AckPolicy) -> Self {
        Self {
            mailbox,
            cmd_lock: Mutex::new(()),
            policy,
        }
    }

    pub fn policy(&self) -> AckPolicy {
        self.policy
    }

    pub fn read(&self, index: u32) -> u32 {
        self.mailbox.read(index)
    }

    pub fn write(&self, index: u32, value: u32) {
        self.mailbox.write(index, value);
    }

    pub fn send(&self, cmd: Command, handle_id: u32) -> Result<()> {
        self.send_with(cmd, handle_id, &[])
    }

    /// Writes `payload` fields, the handle and the command code, rings the
    /// doorbell and polls ACK. ACK is always cleared before returning.
    pub fn send_with(&self, cmd: Command, handle_id: u32, payload: &[(u32, u32)]) -> Result<()> {
        let _guard = self.cmd_lock.lock().unwrap_or_else(PoisonError::into_inner);

        for &(index, value) in payload {
            debug!("{} {} <- {:#x}", cmd, regs::name(index), value);
            self.mailbox.write(index, value);
        }
        self.mailbox.write(regs::HANDLE_ID, handle_id);
        self.mailbox.write(regs::CMD_CODE, cmd.code());

        if let Err(e) = self.mailbox.doorbell() {
            self.mailbox.write(regs::ACK, 0);
            error!("{cmd}: request_ipc failed: {e}");
            return Err(match e {
                Error::Doorbell { .. } => e,
                other => Error::Doorbell {
                    cmd,
                    reason: other.to_string(),
                },
            });
        }

        let started = Instant::now();
        let acked = self.poll_ack(started);
        self.mailbox.write(regs::ACK, 0);

        if !acked {
            error!(
                "{cmd} (handle {handle_id:#x}) not acked within {:?}",
                self.policy.budget
            );
            return Err(Error::ProtocolTimeout {
                what: cmd.name(),
                after: self.policy.budget,
            });
        }
        debug!("{cmd} acked after {:?}", started.elapsed());
        Ok(())
    }

    fn poll_ack(&self, started: Instant) -> bool {
        loop {
            if self.mailbox.read(regs::ACK) != 0 {
                return true;
            }
            if started.elapsed() >= self.policy.budget {
                return false;
            }
            thread::sleep(self.policy.poll_interval);
        }
    }
}
