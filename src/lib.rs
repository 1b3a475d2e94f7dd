//! Portable socket abstraction layer.
//!
//! One creation/configuration/teardown surface for UDP and TCP endpoints,
//! a blocking-with-timeout vs non-blocking mode model, and a closed
//! [`Status`] taxonomy standing in for raw OS error codes. Each endpoint
//! owns exactly one OS socket; receive calls fill caller-allocated,
//! fixed-capacity [`Packet`] buffers with length framing and a trailing
//! terminator byte.
//!
//! ```no_run
//! use sockstack::{EndpointOptions, Packet, TcpEndpoint};
//!
//! # fn main() -> Result<(), sockstack::Status> {
//! let mut listener = TcpEndpoint::open(EndpointOptions::bound(0))?;
//! listener.listen(8)?;
//! let mut served = listener.accept()?;
//! let mut packet: Packet = Packet::new();
//! served.recv(&mut packet)?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

mod backend;
mod classify;
mod config;
mod diag;
mod dns;
mod mode;
mod packet;
mod status;
mod tcp;
mod udp;

pub use backend::BackendKind;
pub use config::EndpointOptions;
pub use diag::{DiagnosticSink, LogSink, MemorySink, NullSink};
pub use dns::dns_ipv4;
pub use mode::Mode;
pub use packet::{Packet, TERMINATOR};
pub use status::{NetResult, Status, StatusClass};
pub use tcp::{TcpEndpoint, TcpState};
pub use udp::UdpEndpoint;

/// Error from [`init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// `init` already ran; the first sink stays installed.
    AlreadyInitialized,
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::AlreadyInitialized => f.write_str("socket layer already initialized"),
        }
    }
}

impl std::error::Error for InitError {}

/// One-time process setup: installs the diagnostic sink that endpoints
/// fall back to when their options carry no override. Endpoints created
/// before `init` use [`LogSink`].
pub fn init(sink: Arc<dyn DiagnosticSink>) -> Result<(), InitError> {
    if !diag::install_process_sink(sink.clone()) {
        return Err(InitError::AlreadyInitialized);
    }
    sink.report(log::Level::Info, format_args!("socket layer initialized"));
    Ok(())
}

/// Symmetric teardown: clears the process sink. Sockets still open are
/// the OS's to reclaim at process exit.
pub fn shutdown() {
    diag::clear_process_sink();
}
