//! In-process stand-in for the offload firmware.
//!
//! Implements the host side traits over a little-endian register window,
//! acknowledges commands and answers the ones that have a completion with the
//! matching interrupt. Used by the `abox` harness and the integration tests.

use crate::error::{Error, Result};
use crate::hw::{Mailbox, RdmaStatusSource, regs};
use crate::message::{Command, Event, EventCode};
use crate::worker::IrqLine;
use byteorder::{ByteOrder, LittleEndian};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

pub const DEFAULT_IP_ID: u32 = 0x0000_0A01;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimBehavior {
    /// Raise ACK for every command.
    pub ack: bool,
    /// Answer SET_PARAM, STOP, PAUSE, EOS and DESTROY with their interrupt.
    pub complete: bool,
    pub ip_id: u32,
    pub doorbell_fails: bool,
    pub errors: HashMap<Command, u8>,
}

impl Default for SimBehavior {
    fn default() -> Self {
        Self {
            ack: true,
            complete: true,
            ip_id: DEFAULT_IP_ID,
            doorbell_fails: false,
            errors: HashMap::new(),
        }
    }
}

#[derive(Debug)]
struct RegisterWindow {
    bytes: Vec<u8>,
}

impl RegisterWindow {
    fn new() -> Self {
        Self {
            bytes: vec![0; regs::WINDOW_BYTES],
        }
    }

    fn read(&self, index: u32) -> u32 {
        let at = index as usize;
        match self.bytes.get(at..at + 4) {
            Some(word) => LittleEndian::read_u32(word),
            None => 0,
        }
    }

    fn write(&mut self, index: u32, value: u32) {
        let at = index as usize;
        match self.bytes.get_mut(at..at + 4) {
            Some(word) => LittleEndian::write_u32(word, value),
            None => warn!("sim: write outside window at {index:#x}"),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct SimFirmware {
    regs: Mutex<RegisterWindow>,
    behavior: Mutex<SimBehavior>,
    irq: Mutex<Option<IrqLine>>,
    host_writes: Mutex<Vec<(u32, u32)>>,
    commands: Mutex<Vec<(Command, u32)>>,
    rdma: Mutex<HashMap<u32, u32>>,
    irq_timeout: Duration,
}

impl Default for SimFirmware {
    fn default() -> Self {
        Self::new(SimBehavior::default())
    }
}

impl SimFirmware {
    pub fn new(behavior: SimBehavior) -> Self {
        Self {
            regs: Mutex::new(RegisterWindow::new()),
            behavior: Mutex::new(behavior),
            irq: Mutex::new(None),
            host_writes: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            rdma: Mutex::new(HashMap::new()),
            irq_timeout: Duration::from_secs(1),
        }
    }

    pub fn connect(&self, line: IrqLine) {
        *lock(&self.irq) = Some(line);
    }

    pub fn set_ack(&self, ack: bool) {
        lock(&self.behavior).ack = ack;
    }

    pub fn set_complete(&self, complete: bool) {
        lock(&self.behavior).complete = complete;
    }

    pub fn set_ip_id(&self, ip_id: u32) {
        lock(&self.behavior).ip_id = ip_id;
    }

    pub fn set_doorbell_fails(&self, fails: bool) {
        lock(&self.behavior).doorbell_fails = fails;
    }

    /// Completion for `cmd` carries `code` from now on. Zero clears it.
    pub fn fail_with(&self, cmd: Command, code: u8) {
        let mut behavior = lock(&self.behavior);
        if code == 0 {
            behavior.errors.remove(&cmd);
        } else {
            behavior.errors.insert(cmd, code);
        }
    }

    /// Register value without recording a host access.
    pub fn peek(&self, index: u32) -> u32 {
        lock(&self.regs).read(index)
    }

    /// Firmware-side register write.
    pub fn poke(&self, index: u32, value: u32) {
        lock(&self.regs).write(index, value);
    }

    pub fn host_writes(&self) -> Vec<(u32, u32)> {
        lock(&self.host_writes).clone()
    }

    pub fn commands(&self) -> Vec<Command> {
        lock(&self.commands).iter().map(|(cmd, _)| *cmd).collect()
    }

    pub fn command_log(&self) -> Vec<(Command, u32)> {
        lock(&self.commands).clone()
    }

    pub fn clear_logs(&self) {
        lock(&self.host_writes).clear();
        lock(&self.commands).clear();
    }

    pub fn set_rendered_pcm(&self, bytes: u32) {
        self.poke(regs::RENDERED_PCM_SIZE, bytes);
    }

    pub fn set_rdma_status(&self, id: u32, raw: u32) {
        lock(&self.rdma).insert(id, raw);
    }

    /// Waits for the host to clear INTR_ACK.
    pub fn wait_irq_handled(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.peek(regs::INTR_ACK) != 0 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_micros(50));
        }
        true
    }

    /// Posts `event` the way firmware does: status in RETURN_CMD, INTR_ACK
    /// set, then the interrupt. Returns false if nothing is listening.
    pub fn raise(&self, event: Event) -> bool {
        if !self.wait_irq_handled(self.irq_timeout) {
            warn!("sim: previous interrupt still pending, overwriting");
        }
        let status = event.encode();
        {
            let mut window = lock(&self.regs);
            window.write(regs::RETURN_CMD, status);
            window.write(regs::INTR_ACK, 1);
        }
        debug!("sim: irq {:?} err={:#x}", event.code, event.error);
        match lock(&self.irq).as_ref() {
            Some(line) => line.raise(status),
            None => false,
        }
    }

    /// Reports `bytes` decoded and waits until the host has taken the interrupt.
    pub fn decode(&self, bytes: u32) -> bool {
        self.decode_with(bytes, 0)
    }

    pub fn decode_with(&self, bytes: u32, error: u8) -> bool {
        if !self.wait_irq_handled(self.irq_timeout) {
            warn!("sim: previous interrupt still pending before DECODED");
        }
        self.poke(regs::SIZE_OUT_DATA, bytes);
        self.raise(Event::new(EventCode::Decoded, error)) && self.wait_irq_handled(self.irq_timeout)
    }

    fn completion(cmd: Command) -> Option<EventCode> {
        match cmd {
            Command::SetParam => Some(EventCode::Created),
            Command::Stop => Some(EventCode::Flush),
            Command::Pause => Some(EventCode::Paused),
            Command::Eos => Some(EventCode::Eos),
            Command::Destroy => Some(EventCode::Destroy),
            _ => None,
        }
    }
}

impl Mailbox for SimFirmware {
    fn read(&self, index: u32) -> u32 {
        self.peek(index)
    }

    fn write(&self, index: u32, value: u32) {
        lock(&self.host_writes).push((index, value));
        self.poke(index, value);
    }

    fn doorbell(&self) -> Result<()> {
        let code = self.peek(regs::CMD_CODE);
        let handle_id = self.peek(regs::HANDLE_ID);
        let Some(cmd) = Command::from_code(code) else {
            warn!("sim: unknown command code {code:#x}");
            return Ok(());
        };
        let behavior = lock(&self.behavior).clone();
        if behavior.doorbell_fails {
            return Err(Error::Doorbell {
                cmd,
                reason: "mailbox busy".to_string(),
            });
        }
        lock(&self.commands).push((cmd, handle_id));
        debug!("sim: {cmd} handle={handle_id:#x}");

        if behavior.ack {
            self.poke(regs::ACK, 1);
        }
        if behavior.complete {
            if let Some(code) = Self::completion(cmd) {
                if cmd == Command::SetParam {
                    self.poke(regs::IP_ID, behavior.ip_id);
                }
                let error = behavior.errors.get(&cmd).copied().unwrap_or(0);
                self.raise(Event::new(code, error));
            }
        }
        Ok(())
    }
}

impl RdmaStatusSource for SimFirmware {
    fn rdma_status(&self, id: u32) -> u32 {
        lock(&self.rdma).get(&id).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_little_endian() {
        let sim = SimFirmware::default();
        sim.poke(regs::IP_ID, 0x1122_3344);
        assert_eq!(sim.peek(regs::IP_ID), 0x1122_3344);
        let window = lock(&sim.regs);
        let at = regs::IP_ID as usize;
        assert_eq!(&window.bytes[at..at + 4], &[0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn doorbell_acks_and_logs_command() {
        let sim = SimFirmware::default();
        sim.set_complete(false);
        Mailbox::write(&sim, regs::HANDLE_ID, 7);
        Mailbox::write(&sim, regs::CMD_CODE, Command::Start.code());
        sim.doorbell().unwrap();
        assert_eq!(sim.peek(regs::ACK), 1);
        assert_eq!(sim.command_log(), vec![(Command::Start, 7)]);
        assert_eq!(sim.host_writes().len(), 2);
    }

    #[test]
    fn out_of_window_access_is_ignored() {
        let sim = SimFirmware::default();
        sim.poke(0x1000, 5);
        assert_eq!(sim.peek(0x1000), 0);
    }
}
