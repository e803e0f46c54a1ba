use crate::message::{Command, EventCode};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No ACK, or no completion interrupt, before the deadline.
    #[error("{what} timed out after {after:?}")]
    ProtocolTimeout { what: &'static str, after: Duration },

    /// Completion arrived with a non-zero error code.
    #[error("firmware reported error {code:#04x} on {event:?}")]
    Firmware { event: EventCode, code: u8 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Event that does not fit the current session state. Only ever logged.
    #[error("spurious {event:?}: {reason}")]
    SpuriousEvent {
        event: EventCode,
        reason: &'static str,
    },

    #[error("doorbell for {cmd} failed: {reason}")]
    Doorbell { cmd: Command, reason: String },

    #[error("No DMA memory: {0}")]
    NoMemory(String),

    #[error("Dispatch worker error: {0}")]
    Worker(String),
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::ProtocolTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
