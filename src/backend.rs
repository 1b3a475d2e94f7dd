use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

pub mod socket2;

#[cfg(unix)]
pub mod sys;

use self::socket2::Socket2Backend;
#[cfg(unix)]
use self::sys::SysBackend;

/// Which OS-socket implementation an endpoint runs on. The two are
/// interchangeable behind [`OsSocket`]; everything above the seam (framing,
/// classification, lifecycle) is backend-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Portable path over `socket2` + std sockets. The default.
    Socket2,
    /// Raw file-descriptor path over `nix` syscall wrappers.
    #[cfg(unix)]
    Sys,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Proto {
    Udp,
    Tcp,
}

/// One OS socket resource. Methods return raw `io::Error`; classification
/// into [`crate::Status`] happens in the endpoint layer so both backends
/// share one taxonomy.
pub(crate) trait OsSocket: Send + fmt::Debug {
    fn local_addr(&self) -> io::Result<SocketAddr>;
    fn peer_addr(&self) -> io::Result<SocketAddr>;
    fn set_nonblocking(&mut self, on: bool) -> io::Result<()>;
    /// Arms both receive and send timeouts; `None` clears them.
    fn set_timeouts(&mut self, timeout: Option<Duration>) -> io::Result<()>;
    fn bind(&mut self, addr: SocketAddr) -> io::Result<()>;
    fn listen(&mut self, backlog: u32) -> io::Result<()>;
    fn accept(&mut self) -> io::Result<(Box<dyn OsSocket>, SocketAddr)>;
    fn connect(&mut self, addr: SocketAddr) -> io::Result<()>;
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> io::Result<usize>;
    fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

pub(crate) fn open(kind: BackendKind, proto: Proto) -> io::Result<Box<dyn OsSocket>> {
    match kind {
        BackendKind::Socket2 => Ok(Box::new(Socket2Backend::open(proto)?)),
        #[cfg(unix)]
        BackendKind::Sys => Ok(Box::new(SysBackend::open(proto)?)),
    }
}

/// Synthesize the error the OS would report, so both backends feed the
/// classifier the same codes.
pub(crate) fn os_err(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}
