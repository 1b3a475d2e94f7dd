use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use crate::backend::{self, OsSocket, Proto};
use crate::classify::{classify_connect, classify_io};
use crate::config::EndpointOptions;
use crate::diag::{self, DiagnosticSink};
use crate::mode::Mode;
use crate::packet::Packet;
use crate::status::{NetResult, Status};

/// Connectionless endpoint. No peer is tracked; every received datagram
/// carries its sender in the packet instead. Dropping the endpoint
/// releases the OS socket, but callers that care about the close outcome
/// use [`close`](UdpEndpoint::close).
pub struct UdpEndpoint {
    socket: Option<Box<dyn OsSocket>>,
    mode: Mode,
    bound_port: u16,
    diag: Arc<dyn DiagnosticSink>,
}

impl UdpEndpoint {
    pub fn open(options: EndpointOptions) -> NetResult<UdpEndpoint> {
        let diag = options.diag.unwrap_or_else(diag::process_sink);
        let socket = match backend::open(options.backend, Proto::Udp) {
            Ok(socket) => socket,
            Err(err) => {
                diag.report(log::Level::Error, format_args!("udp open: {err}"));
                return Err(Status::Uninitialized);
            }
        };
        let mut endpoint = UdpEndpoint {
            socket: Some(socket),
            mode: Mode::default(),
            bound_port: 0,
            diag,
        };
        endpoint.set_mode(options.mode)?;
        if let Some(port) = options.port {
            endpoint.bind_any(port)?;
        }
        Ok(endpoint)
    }

    /// The locally bound port, 0 if never bound. Binding to port 0 reports
    /// the port the OS picked.
    pub fn bound_port(&self) -> u16 {
        self.bound_port
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Reconfigure blocking behavior; takes effect on the OS socket
    /// immediately and governs every later call.
    pub fn set_mode(&mut self, mode: Mode) -> NetResult<()> {
        let socket = self.socket_mut()?;
        let result = socket
            .set_nonblocking(mode.is_non_blocking())
            .and_then(|_| socket.set_timeouts(mode.timeout()));
        match result {
            Ok(()) => {
                self.mode = mode;
                Ok(())
            }
            Err(err) => Err(classify_io("set_mode", &err, mode, &*self.diag)),
        }
    }

    /// Fire-and-forget datagram send.
    pub fn send_to(&mut self, dest: SocketAddrV4, bytes: &[u8]) -> NetResult<usize> {
        let mode = self.mode;
        let socket = self.socket_mut()?;
        let result = socket.send_to(bytes, SocketAddr::V4(dest));
        match result {
            Ok(n) => Ok(n),
            Err(err) => Err(classify_io("send_to", &err, mode, &*self.diag)),
        }
    }

    /// Receive one datagram into `packet`, recording its sender. Oversized
    /// datagrams truncate to the packet's payload window. A zero-length
    /// read reports `ForcedShutdown`: UDP has no graceful close, so an
    /// empty datagram is treated as the remote end going away.
    pub fn recv_from<const C: usize>(&mut self, packet: &mut Packet<C>) -> NetResult<usize> {
        let mode = self.mode;
        let socket = self.socket_mut()?;
        let result = socket.recv_from(packet.writable());
        match result {
            Ok((0, _)) => Err(Status::ForcedShutdown),
            Ok((n, from)) => {
                let sender = match from {
                    SocketAddr::V4(v4) => Some(v4),
                    SocketAddr::V6(_) => None,
                };
                packet.commit(n, sender);
                Ok(n)
            }
            Err(err) => Err(classify_io("recv_from", &err, mode, &*self.diag)),
        }
    }

    /// Release the OS socket. The endpoint reports `Uninitialized` for
    /// every operation afterwards, including a second close.
    pub fn close(&mut self) -> Status {
        match self.socket.take() {
            Some(_) => Status::Ok,
            None => Status::Uninitialized,
        }
    }

    fn bind_any(&mut self, port: u16) -> NetResult<()> {
        let mode = self.mode;
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        let socket = self.socket_mut()?;
        let result = socket.bind(addr).and_then(|_| socket.local_addr());
        match result {
            Ok(local) => {
                self.bound_port = local.port();
                Ok(())
            }
            Err(err) => Err(classify_connect("bind", &err, mode, &*self.diag)),
        }
    }

    fn socket_mut(&mut self) -> NetResult<&mut dyn OsSocket> {
        match self.socket.as_deref_mut() {
            Some(socket) => Ok(socket),
            None => Err(Status::Uninitialized),
        }
    }
}
