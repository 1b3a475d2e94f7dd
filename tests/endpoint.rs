//! End-to-end tests over the public endpoint surface: real sockets on
//! loopback, both protocols, both blocking interpretations.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use sockstack::{
    dns_ipv4, init, shutdown, EndpointOptions, InitError, MemorySink, Mode, Packet, Status,
    TcpEndpoint, UdpEndpoint,
};

#[cfg(unix)]
use sockstack::BackendKind;

fn init_logging() {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();
}

#[test]
fn tcp_ping_end_to_end() {
    init_logging();

    let mut listener = TcpEndpoint::open(EndpointOptions::bound(0)).expect("Should open listener");
    listener.listen(1).expect("Should listen");
    let target = SocketAddrV4::new(Ipv4Addr::LOCALHOST, listener.bound_port());

    let (done_send, done_recv) = channel::bounded(1);
    let client_thread = thread::spawn(move || {
        let mut client = TcpEndpoint::open(EndpointOptions::unbound()).expect("Should open client");
        client.connect(target).expect("Should connect");
        client.send(b"ping").expect("Should send");
        done_send.send(client.close()).expect("Should report");
    });

    let mut served = listener.accept().expect("Should accept");
    let mut packet: Packet = Packet::new();
    assert_eq!(served.recv(&mut packet), Ok(4));
    assert_eq!(packet.bytes(), b"ping");
    assert_eq!(packet.len(), 4);
    assert!(packet.terminated());

    assert_eq!(done_recv.recv().expect("Should finish"), Status::Ok);
    client_thread.join().expect("Should join");

    // both ends done; further receives are conn-closed or dead-resource
    let after = served.recv(&mut packet);
    assert!(matches!(
        after,
        Err(Status::ConnClosed) | Err(Status::Uninitialized)
    ));
    assert_eq!(served.close(), Status::Ok);
    assert_eq!(served.recv(&mut packet), Err(Status::Uninitialized));
    assert_eq!(listener.close(), Status::Ok);
}

#[test]
fn udp_pair_end_to_end() {
    init_logging();

    let mut a = UdpEndpoint::open(EndpointOptions::bound(0)).expect("Should open");
    let mut b = UdpEndpoint::open(EndpointOptions::bound(0)).expect("Should open");
    assert_ne!(a.bound_port(), b.bound_port());

    let payload = [42u8; 10];
    let dest = SocketAddrV4::new(Ipv4Addr::LOCALHOST, b.bound_port());
    assert_eq!(a.send_to(dest, &payload), Ok(10));

    let mut packet: Packet = Packet::new();
    assert_eq!(b.recv_from(&mut packet), Ok(10));
    assert_eq!(packet.bytes(), &payload[..]);
    assert_eq!(
        packet.sender(),
        Some(SocketAddrV4::new(Ipv4Addr::LOCALHOST, a.bound_port()))
    );

    assert_eq!(a.close(), Status::Ok);
    assert_eq!(b.close(), Status::Ok);
}

#[test]
fn tcp_round_trip_preserves_payloads_within_the_window() {
    init_logging();

    let mut listener = TcpEndpoint::open(EndpointOptions::bound(0)).expect("Should open");
    listener.listen(1).expect("Should listen");
    let target = SocketAddrV4::new(Ipv4Addr::LOCALHOST, listener.bound_port());
    let mut client = TcpEndpoint::open(EndpointOptions::unbound()).expect("Should open");
    client.connect(target).expect("Should connect");
    let mut served = listener.accept().expect("Should accept");

    for len in [1usize, 2, 32, 63] {
        let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
        assert_eq!(client.send(&payload), Ok(len));

        let mut packet: Packet<64> = Packet::new();
        assert_eq!(served.recv(&mut packet), Ok(len));
        assert_eq!(packet.bytes(), &payload[..]);
        assert!(packet.len() <= 63);
        assert!(packet.terminated());
    }
}

#[test]
fn not_ready_reads_per_mode() {
    init_logging();

    // non-blocking: returns immediately with PacketNone, never ConnTimeout
    let mut nb = UdpEndpoint::open(EndpointOptions::bound(0).with_mode(Mode::non_blocking()))
        .expect("Should open");
    let mut packet: Packet = Packet::new();
    let started = Instant::now();
    assert_eq!(nb.recv_from(&mut packet), Err(Status::PacketNone));
    assert!(started.elapsed() < Duration::from_millis(50));

    // blocking with a budget: ConnTimeout, and not materially sooner
    let budget = Duration::from_millis(100);
    let mut blocking =
        UdpEndpoint::open(EndpointOptions::bound(0).with_mode(Mode::blocking_with_timeout(budget)))
            .expect("Should open");
    let started = Instant::now();
    assert_eq!(blocking.recv_from(&mut packet), Err(Status::ConnTimeout));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(90), "returned after {elapsed:?}");
}

#[test]
fn non_blocking_accept_with_empty_queue_is_packet_none() {
    let mut listener =
        TcpEndpoint::open(EndpointOptions::bound(0).with_mode(Mode::non_blocking()))
            .expect("Should open");
    listener.listen(1).expect("Should listen");
    assert_eq!(listener.accept().err(), Some(Status::PacketNone));
}

#[test]
fn accept_budget_elapses_to_conn_timeout() {
    let mut listener = TcpEndpoint::open(
        EndpointOptions::bound(0).with_mode(Mode::blocking_with_timeout(Duration::from_millis(80))),
    )
    .expect("Should open");
    listener.listen(1).expect("Should listen");
    assert_eq!(listener.accept().err(), Some(Status::ConnTimeout));
}

#[test]
fn address_equality_is_field_exact() {
    let a = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 8080);
    let b = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 8080);
    let other_ip = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 2), 8080);
    let other_port = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 8081);

    assert_eq!(a, a);
    assert_eq!(a, b);
    assert_eq!(b, a);
    assert_ne!(a, other_ip);
    assert_ne!(a, other_port);
}

#[test]
fn init_installs_once_and_shutdown_clears() {
    let sink = Arc::new(MemorySink::new());
    init(sink.clone()).expect("Should initialize");
    assert!(sink.contains("socket layer initialized"));

    assert_eq!(
        init(Arc::new(MemorySink::new())).err(),
        Some(InitError::AlreadyInitialized)
    );

    shutdown();
    init(Arc::new(MemorySink::new())).expect("Should initialize again");
    shutdown();
}

#[test]
fn dns_resolves_localhost() {
    assert_eq!(dns_ipv4("localhost"), Ok(Ipv4Addr::LOCALHOST));
}

#[cfg(unix)]
#[test]
fn raw_backend_serves_the_same_contract() {
    init_logging();

    let mut a = UdpEndpoint::open(EndpointOptions::bound(0).with_backend(BackendKind::Sys))
        .expect("Should open");
    let mut b = UdpEndpoint::open(EndpointOptions::bound(0).with_backend(BackendKind::Sys))
        .expect("Should open");
    let dest = SocketAddrV4::new(Ipv4Addr::LOCALHOST, b.bound_port());
    assert_eq!(a.send_to(dest, b"datagram"), Ok(8));
    let mut packet: Packet = Packet::new();
    assert_eq!(b.recv_from(&mut packet), Ok(8));
    assert_eq!(packet.bytes(), b"datagram");
    assert_eq!(
        packet.sender(),
        Some(SocketAddrV4::new(Ipv4Addr::LOCALHOST, a.bound_port()))
    );

    let mut listener = TcpEndpoint::open(EndpointOptions::bound(0).with_backend(BackendKind::Sys))
        .expect("Should open");
    listener.listen(1).expect("Should listen");
    let target = SocketAddrV4::new(Ipv4Addr::LOCALHOST, listener.bound_port());

    let (done_send, done_recv) = channel::bounded(1);
    let client_thread = thread::spawn(move || {
        let mut client =
            TcpEndpoint::open(EndpointOptions::unbound().with_backend(BackendKind::Sys))
                .expect("Should open");
        client.connect(target).expect("Should connect");
        client.send(b"ping").expect("Should send");
        done_send.send(client.close()).expect("Should report");
    });

    let mut served = listener.accept().expect("Should accept");
    let mut packet: Packet = Packet::new();
    assert_eq!(served.recv(&mut packet), Ok(4));
    assert_eq!(packet.bytes(), b"ping");
    assert_eq!(done_recv.recv().expect("Should finish"), Status::Ok);
    client_thread.join().expect("Should join");
}
