use std::time::Duration;

use crate::status::Status;

/// Per-endpoint blocking behavior. One field, read by every call site;
/// applying it reconfigures the OS socket immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Calls wait, up to `timeout` when set, forever when `None`.
    Blocking { timeout: Option<Duration> },
    /// Calls that would wait return immediately instead.
    NonBlocking,
}

impl Mode {
    pub fn blocking() -> Mode {
        Mode::Blocking { timeout: None }
    }

    pub fn blocking_with_timeout(timeout: Duration) -> Mode {
        Mode::Blocking {
            timeout: Some(timeout),
        }
    }

    pub fn non_blocking() -> Mode {
        Mode::NonBlocking
    }

    pub fn is_non_blocking(&self) -> bool {
        matches!(self, Mode::NonBlocking)
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Mode::Blocking { timeout } => *timeout,
            Mode::NonBlocking => None,
        }
    }

    /// How a "would block" OS condition on send/receive/accept, or a
    /// re-polled connect, reads under this mode: nothing ready yet, or the
    /// blocking budget ran out.
    pub fn not_ready_status(&self) -> Status {
        match self {
            Mode::NonBlocking => Status::PacketNone,
            Mode::Blocking { .. } => Status::ConnTimeout,
        }
    }
}

impl Default for Mode {
    fn default() -> Mode {
        Mode::Blocking { timeout: None }
    }
}
