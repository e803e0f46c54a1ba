use std::fmt;

/// Mailbox command codes understood by the offload firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Command {
    Create = 0x50,
    Destroy,
    SetParam,
    Write,
    Read,
    Start,
    Stop,
    Pause,
    Eos,
    GetVolume,
    SetVolume,
    Ca5Wakeup,
    HpdetNotify,
}

impl Command {
    pub const ALL: [Command; 13] = [
        Command::Create,
        Command::Destroy,
        Command::SetParam,
        Command::Write,
        Command::Read,
        Command::Start,
        Command::Stop,
        Command::Pause,
        Command::Eos,
        Command::GetVolume,
        Command::SetVolume,
        Command::Ca5Wakeup,
        Command::HpdetNotify,
    ];

    pub const fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| cmd.code() == code)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Command::Create => "CREATE",
            Command::Destroy => "DESTROY",
            Command::SetParam => "SET_PARAM",
            Command::Write => "WRITE",
            Command::Read => "READ",
            Command::Start => "START",
            Command::Stop => "STOP",
            Command::Pause => "PAUSE",
            Command::Eos => "EOS",
            Command::GetVolume => "GET_VOLUME",
            Command::SetVolume => "SET_VOLUME",
            Command::Ca5Wakeup => "CA5_WAKEUP",
            Command::HpdetNotify => "HPDET_NOTIFY",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// High half of the interrupt status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCode {
    Wakeup,
    Ready,
    Dma,
    Created,
    Decoded,
    Rendered,
    Flush,
    Paused,
    Eos,
    Destroy,
    FxExt,
    EffRequest,
    SetCpuLock,
    FwLog,
    Unknown(u16),
}

impl EventCode {
    // Exact matches only: FLUSH and PAUSED differ in the low bit.
    pub const fn from_raw(raw: u16) -> Self {
        match raw {
            0x0000 => EventCode::Wakeup,
            0x1000 => EventCode::Ready,
            0x2000 => EventCode::Dma,
            0x3000 => EventCode::Created,
            0x4000 => EventCode::Decoded,
            0x5000 => EventCode::Rendered,
            0x6000 => EventCode::Flush,
            0x6001 => EventCode::Paused,
            0x7000 => EventCode::Eos,
            0x8000 => EventCode::Destroy,
            0x9000 => EventCode::FxExt,
            0xA000 => EventCode::EffRequest,
            0xC000 => EventCode::SetCpuLock,
            0xFFFF => EventCode::FwLog,
            other => EventCode::Unknown(other),
        }
    }

    pub const fn raw(self) -> u16 {
        match self {
            EventCode::Wakeup => 0x0000,
            EventCode::Ready => 0x1000,
            EventCode::Dma => 0x2000,
            EventCode::Created => 0x3000,
            EventCode::Decoded => 0x4000,
            EventCode::Rendered => 0x5000,
            EventCode::Flush => 0x6000,
            EventCode::Paused => 0x6001,
            EventCode::Eos => 0x7000,
            EventCode::Destroy => 0x8000,
            EventCode::FxExt => 0x9000,
            EventCode::EffRequest => 0xA000,
            EventCode::SetCpuLock => 0xC000,
            EventCode::FwLog => 0xFFFF,
            EventCode::Unknown(raw) => raw,
        }
    }
}

/// One decoded completion interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub code: EventCode,
    pub error: u8,
}

impl Event {
    pub const fn new(code: EventCode, error: u8) -> Self {
        Self { code, error }
    }

    pub const fn ok(code: EventCode) -> Self {
        Self { code, error: 0 }
    }

    pub const fn decode(status: u32) -> Self {
        Self {
            code: EventCode::from_raw((status >> 16) as u16),
            error: (status & 0xFF) as u8,
        }
    }

    pub const fn encode(self) -> u32 {
        ((self.code.raw() as u32) << 16) | self.error as u32
    }

    pub const fn is_ok(&self) -> bool {
        self.error == 0
    }
}

/// Notifications delivered to the stream owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    FragmentElapsed(u32),
    DrainComplete(u32),
    PeriodElapsed(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_codes_are_consecutive_from_create() {
        for (i, cmd) in Command::ALL.iter().enumerate() {
            assert_eq!(cmd.code(), 0x50 + i as u32);
            assert_eq!(Command::from_code(cmd.code()), Some(*cmd));
        }
        assert_eq!(Command::from_code(0x4F), None);
        assert_eq!(Command::from_code(0x5D), None);
    }

    #[test]
    fn status_word_splits_into_code_and_error() {
        let event = Event::decode(0x4000_0012);
        assert_eq!(event.code, EventCode::Decoded);
        assert_eq!(event.error, 0x12);
        assert!(!event.is_ok());

        // bits 8..15 are not part of the error code
        let event = Event::decode(0x3000_AB00);
        assert_eq!(event.code, EventCode::Created);
        assert!(event.is_ok());
    }

    #[test]
    fn flush_and_paused_are_distinct() {
        assert_eq!(Event::decode(0x6000_0000).code, EventCode::Flush);
        assert_eq!(Event::decode(0x6001_0000).code, EventCode::Paused);
        assert_eq!(Event::decode(0x6002_0000).code, EventCode::Unknown(0x6002));
    }

    #[test]
    fn encode_matches_decode_for_known_codes() {
        let event = Event::new(EventCode::Destroy, 3);
        assert_eq!(event.encode(), 0x8000_0003);
        assert_eq!(Event::decode(event.encode()), event);
    }
}
