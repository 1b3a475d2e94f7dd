use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use crate::backend::{self, OsSocket, Proto};
use crate::classify::{classify_accept, classify_connect, classify_io};
use crate::config::EndpointOptions;
use crate::diag::{self, DiagnosticSink};
use crate::mode::Mode;
use crate::packet::Packet;
use crate::status::{NetResult, Status};

/// Where a TCP endpoint is in its lifecycle. `Closed` covers both an
/// explicit [`close`](TcpEndpoint::close) and a connection finished by the
/// peer; either way the endpoint refuses further I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpState {
    Unbound,
    Bound,
    Listening,
    Connected,
    Closed,
}

/// Connection-oriented endpoint: listener or stream, depending on which
/// lifecycle calls the caller makes. Owns exactly one OS socket.
pub struct TcpEndpoint {
    socket: Option<Box<dyn OsSocket>>,
    state: TcpState,
    mode: Mode,
    bound_port: u16,
    peer: Option<SocketAddrV4>,
    diag: Arc<dyn DiagnosticSink>,
}

impl TcpEndpoint {
    pub fn open(options: EndpointOptions) -> NetResult<TcpEndpoint> {
        let diag = options.diag.unwrap_or_else(diag::process_sink);
        let socket = match backend::open(options.backend, Proto::Tcp) {
            Ok(socket) => socket,
            Err(err) => {
                diag.report(log::Level::Error, format_args!("tcp open: {err}"));
                return Err(Status::Uninitialized);
            }
        };
        let mut endpoint = TcpEndpoint {
            socket: Some(socket),
            state: TcpState::Unbound,
            mode: Mode::default(),
            bound_port: 0,
            peer: None,
            diag,
        };
        endpoint.set_mode(options.mode)?;
        if let Some(port) = options.port {
            endpoint.bind_any(port)?;
        }
        Ok(endpoint)
    }

    pub fn state(&self) -> TcpState {
        self.state
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The locally bound port, 0 if never bound.
    pub fn bound_port(&self) -> u16 {
        self.bound_port
    }

    /// The remote address once connected or accepted.
    pub fn peer_addr(&self) -> Option<SocketAddrV4> {
        self.peer
    }

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

    /// Start serving. `backlog` caps queued-but-unaccepted connections.
    pub fn listen(&mut self, backlog: u32) -> NetResult<()> {
        let mode = self.mode;
        let socket = self.socket_mut()?;
        let result = socket.listen(backlog).and_then(|_| socket.local_addr());
        match result {
            Ok(local) => {
                // the OS binds an ephemeral port when listen is called on
                // an unbound socket
                self.bound_port = local.port();
                self.state = TcpState::Listening;
                Ok(())
            }
            Err(err) => Err(classify_accept("listen", &err, mode, &*self.diag)),
        }
    }

    /// Take one queued connection, producing a fresh `Connected` endpoint
    /// with default blocking mode and the peer recorded. Under non-blocking
    /// mode an empty queue reports `PacketNone`; under a blocking timeout,
    /// `ConnTimeout`.
    pub fn accept(&mut self) -> NetResult<TcpEndpoint> {
        let mode = self.mode;
        let listener_port = self.bound_port;
        let diag = self.diag.clone();
        let socket = self.socket_mut()?;
        let result = socket.accept();
        match result {
            Ok((served, peer)) => {
                let peer = match peer {
                    SocketAddr::V4(v4) => Some(v4),
                    SocketAddr::V6(_) => None,
                };
                let mut accepted = TcpEndpoint {
                    socket: Some(served),
                    state: TcpState::Connected,
                    mode: Mode::default(),
                    bound_port: listener_port,
                    peer,
                    diag,
                };
                accepted.set_mode(Mode::default())?;
                Ok(accepted)
            }
            Err(err) => Err(classify_accept("accept", &err, mode, &*diag)),
        }
    }

    /// Establish an outbound connection. A non-blocking attempt that cannot
    /// finish immediately reports `PacketNone`; calling `connect` again
    /// re-polls it and succeeds once the handshake is done. A blocking
    /// attempt that exhausts its timeout reports `ConnTimeout`. `connect`
    /// on an endpoint that is already connected, or listening, reports
    /// `AlreadyConnected`.
    pub fn connect(&mut self, peer: SocketAddrV4) -> NetResult<()> {
        let mode = self.mode;
        // only these states can carry a pending outbound attempt; the OS
        // also reports EISCONN for connect on a listening socket
        let pending_attempt = matches!(self.state, TcpState::Unbound | TcpState::Bound);
        let socket = self.socket_mut()?;
        let result = socket.connect(SocketAddr::V4(peer));
        match result {
            Ok(()) => {
                self.state = TcpState::Connected;
                self.peer = Some(peer);
                Ok(())
            }
            Err(err) => {
                let status = classify_connect("connect", &err, mode, &*self.diag);
                if status == Status::AlreadyConnected && pending_attempt {
                    // the attempt begun by an earlier non-blocking connect
                    // finished between polls
                    self.state = TcpState::Connected;
                    self.peer = Some(peer);
                    return Ok(());
                }
                Err(status)
            }
        }
    }

    pub fn send(&mut self, bytes: &[u8]) -> NetResult<usize> {
        let mode = self.mode;
        let socket = self.socket_mut()?;
        let result = socket.send(bytes);
        match result {
            Ok(n) => Ok(n),
            Err(err) => Err(classify_io("send", &err, mode, &*self.diag)),
        }
    }

    /// Receive into `packet`. A zero-byte read is the peer's graceful
    /// close: reported as `ConnClosed` once, after which the endpoint
    /// refuses further I/O.
    pub fn recv<const C: usize>(&mut self, packet: &mut Packet<C>) -> NetResult<usize> {
        let mode = self.mode;
        let socket = self.socket_mut()?;
        let result = socket.recv(packet.writable());
        match result {
            Ok(0) => {
                self.state = TcpState::Closed;
                Err(Status::ConnClosed)
            }
            Ok(n) => {
                packet.commit(n, None);
                Ok(n)
            }
            Err(err) => Err(classify_io("recv", &err, mode, &*self.diag)),
        }
    }

    /// Release the OS socket. Everything afterwards, a second close
    /// included, reports `Uninitialized`.
    pub fn close(&mut self) -> Status {
        self.state = TcpState::Closed;
        self.peer = None;
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
                self.state = TcpState::Bound;
                Ok(())
            }
            Err(err) => Err(classify_connect("bind", &err, mode, &*self.diag)),
        }
    }

    fn socket_mut(&mut self) -> NetResult<&mut dyn OsSocket> {
        if self.state == TcpState::Closed {
            return Err(Status::Uninitialized);
        }
        match self.socket.as_deref_mut() {
            Some(socket) => Ok(socket),
            None => Err(Status::Uninitialized),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddrV4};
    use std::time::Duration;

    use crate::config::EndpointOptions;
    use crate::mode::Mode;
    use crate::packet::Packet;
    use crate::status::Status;

    use super::{TcpEndpoint, TcpState};

    fn target_of(listener: &TcpEndpoint) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, listener.bound_port())
    }

    fn serving_pair() -> (TcpEndpoint, TcpEndpoint, TcpEndpoint) {
        let mut listener = TcpEndpoint::open(EndpointOptions::bound(0)).expect("Should open");
        listener.listen(1).expect("Should listen");
        let mut client = TcpEndpoint::open(EndpointOptions::unbound()).expect("Should open");
        client.connect(target_of(&listener)).expect("Should connect");
        let served = listener.accept().expect("Should accept");
        (listener, client, served)
    }

    #[test]
    fn lifecycle_states_follow_the_calls() {
        let mut listener = TcpEndpoint::open(EndpointOptions::bound(0)).expect("Should open");
        assert_eq!(listener.state(), TcpState::Bound);
        assert_ne!(listener.bound_port(), 0);

        listener.listen(1).expect("Should listen");
        assert_eq!(listener.state(), TcpState::Listening);

        let mut client = TcpEndpoint::open(EndpointOptions::unbound()).expect("Should open");
        assert_eq!(client.state(), TcpState::Unbound);
        client.connect(target_of(&listener)).expect("Should connect");
        assert_eq!(client.state(), TcpState::Connected);
        assert_eq!(client.peer_addr(), Some(target_of(&listener)));

        let served = listener.accept().expect("Should accept");
        assert_eq!(served.state(), TcpState::Connected);
        assert_eq!(served.bound_port(), listener.bound_port());
        assert!(served.peer_addr().is_some());
    }

    #[test]
    fn ping_round_trip() {
        let (_listener, mut client, mut served) = serving_pair();
        assert_eq!(client.send(b"ping"), Ok(4));

        let mut packet: Packet = Packet::new();
        assert_eq!(served.recv(&mut packet), Ok(4));
        assert_eq!(packet.bytes(), b"ping");
        assert!(packet.terminated());
        assert_eq!(packet.sender(), None);
    }

    #[test]
    fn accept_without_listen_is_not_listening() {
        let mut endpoint = TcpEndpoint::open(EndpointOptions::bound(0)).expect("Should open");
        assert_eq!(endpoint.accept().err(), Some(Status::NotListening));
    }

    #[test]
    fn connect_on_a_listening_endpoint_is_already_connected() {
        let mut listener = TcpEndpoint::open(EndpointOptions::bound(0)).expect("Should open");
        listener.listen(1).expect("Should listen");

        let target = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9);
        assert_eq!(listener.connect(target), Err(Status::AlreadyConnected));
        assert_eq!(listener.state(), TcpState::Listening);
        assert_eq!(listener.peer_addr(), None);
    }

    #[cfg(unix)]
    #[test]
    fn connect_on_a_listening_raw_endpoint_is_already_connected() {
        use crate::backend::BackendKind;

        let mut listener =
            TcpEndpoint::open(EndpointOptions::bound(0).with_backend(BackendKind::Sys))
                .expect("Should open");
        listener.listen(1).expect("Should listen");

        let target = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9);
        assert_eq!(listener.connect(target), Err(Status::AlreadyConnected));
        assert_eq!(listener.state(), TcpState::Listening);
        assert_eq!(listener.peer_addr(), None);
    }

    #[test]
    fn connect_to_a_dead_port_is_refused() {
        // bound but never listening, so the OS resets the handshake
        let parked = TcpEndpoint::open(EndpointOptions::bound(0)).expect("Should open");
        let mut client = TcpEndpoint::open(EndpointOptions::unbound()).expect("Should open");
        assert_eq!(client.connect(target_of(&parked)), Err(Status::ConnRefused));
    }

    #[test]
    fn send_before_connect_is_uninitialized() {
        let mut endpoint = TcpEndpoint::open(EndpointOptions::unbound()).expect("Should open");
        assert_eq!(endpoint.send(b"x"), Err(Status::Uninitialized));
    }

    #[test]
    fn non_blocking_connect_repolls_to_completion() {
        let mut listener = TcpEndpoint::open(EndpointOptions::bound(0)).expect("Should open");
        listener.listen(4).expect("Should listen");
        let target = target_of(&listener);

        let mut client =
            TcpEndpoint::open(EndpointOptions::unbound().with_mode(Mode::non_blocking()))
                .expect("Should open");
        let mut result = client.connect(target);
        let mut tries = 0;
        while result == Err(Status::PacketNone) && tries < 200 {
            std::thread::sleep(Duration::from_millis(5));
            result = client.connect(target);
            tries += 1;
        }
        result.expect("Should connect");
        assert_eq!(client.state(), TcpState::Connected);

        assert_eq!(client.connect(target), Err(Status::AlreadyConnected));
    }

    #[test]
    fn graceful_peer_close_reads_as_conn_closed_once() {
        let (_listener, mut client, mut served) = serving_pair();
        assert_eq!(client.close(), Status::Ok);

        let mut packet: Packet = Packet::new();
        assert_eq!(served.recv(&mut packet), Err(Status::ConnClosed));
        assert_eq!(served.state(), TcpState::Closed);
        // reported once; afterwards the endpoint counts as dead
        assert_eq!(served.recv(&mut packet), Err(Status::Uninitialized));
        assert_eq!(served.send(b"late"), Err(Status::Uninitialized));
    }

    #[test]
    fn close_then_use_is_uninitialized() {
        let mut endpoint = TcpEndpoint::open(EndpointOptions::bound(0)).expect("Should open");
        assert_eq!(endpoint.close(), Status::Ok);
        assert_eq!(endpoint.state(), TcpState::Closed);
        assert_eq!(endpoint.close(), Status::Uninitialized);

        let mut packet: Packet = Packet::new();
        assert_eq!(endpoint.recv(&mut packet), Err(Status::Uninitialized));
        assert_eq!(endpoint.listen(1), Err(Status::Uninitialized));
    }
}
