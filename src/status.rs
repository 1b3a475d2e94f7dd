use std::fmt;

/// Outcome of a network operation. Closed set: raw OS error codes never
/// cross this boundary, they are classified into one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    /// Nothing available right now, try again. Not a failure.
    PacketNone,
    /// Unclassified send/receive failure.
    PacketError,
    /// No progress within the configured blocking budget.
    ConnTimeout,
    /// Peer closed the connection gracefully.
    ConnClosed,
    /// Remote end went away without a close handshake.
    ForcedShutdown,
    AddrInUse,
    /// No usable OS resource behind the endpoint.
    Uninitialized,
    NotListening,
    Unreachable,
    InvalidAddress,
    AlreadyConnected,
    ConnRefused,
    AccessDenied,
    ConnResetByPeer,
    /// Unclassified control-plane failure.
    Error,
}

/// Coarse grouping of [`Status`] values, for callers that act per category
/// rather than per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Not failures: try again or give the call more time.
    FlowControl,
    /// Expected connection lifecycle events.
    Lifecycle,
    /// The caller did something out of order or malformed.
    CallerError,
    /// The environment refused: network, peer, permissions, dead resource.
    Environment,
    /// Catch-alls for codes outside the classified set.
    Unclassified,
}

impl Status {
    pub fn class(&self) -> StatusClass {
        match self {
            Status::Ok | Status::PacketNone | Status::ConnTimeout => StatusClass::FlowControl,
            Status::ConnClosed | Status::ForcedShutdown => StatusClass::Lifecycle,
            Status::AddrInUse
            | Status::AlreadyConnected
            | Status::NotListening
            | Status::InvalidAddress => StatusClass::CallerError,
            Status::Unreachable
            | Status::ConnRefused
            | Status::AccessDenied
            | Status::ConnResetByPeer
            | Status::Uninitialized => StatusClass::Environment,
            Status::PacketError | Status::Error => StatusClass::Unclassified,
        }
    }

    /// True for every outcome a caller should act on. `Ok` and `PacketNone`
    /// ("no data yet") are the only non-failures.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Status::Ok | Status::PacketNone)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::PacketNone => "packet_none",
            Status::PacketError => "packet_error",
            Status::ConnTimeout => "conn_timeout",
            Status::ConnClosed => "conn_closed",
            Status::ForcedShutdown => "forced_shutdown",
            Status::AddrInUse => "addr_in_use",
            Status::Uninitialized => "uninitialized",
            Status::NotListening => "not_listening",
            Status::Unreachable => "unreachable",
            Status::InvalidAddress => "invalid_address",
            Status::AlreadyConnected => "already_connected",
            Status::ConnRefused => "conn_refused",
            Status::AccessDenied => "access_denied",
            Status::ConnResetByPeer => "conn_reset_by_peer",
            Status::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crate-wide result type. Flow-control signals travel as `Err` too;
/// [`Status::is_failure`] tells them apart from real failures.
pub type NetResult<T> = Result<T, Status>;
