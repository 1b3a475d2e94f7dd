use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::sys::socket::{
    accept, bind, connect, getpeername, getsockname, listen, recv, recvfrom, send, sendto,
    setsockopt, socket, sockopt, AddressFamily, MsgFlags, SockFlag, SockType, SockaddrIn,
};
use nix::sys::time::TimeVal;

use super::{os_err, OsSocket, Proto};

/// Raw-descriptor backend over the `nix` syscall wrappers. Role policing is
/// the kernel's job here: a `listen` on a datagram socket fails with the
/// same code the portable backend synthesizes.
#[derive(Debug)]
pub(crate) struct SysBackend {
    fd: OwnedFd,
    nonblocking: bool,
}

fn io_err(errno: Errno) -> io::Error {
    io::Error::from_raw_os_error(errno as i32)
}

fn sockaddr_in(addr: SocketAddr) -> io::Result<SockaddrIn> {
    match addr {
        SocketAddr::V4(v4) => Ok(SockaddrIn::from(v4)),
        SocketAddr::V6(_) => Err(os_err(libc::EAFNOSUPPORT)),
    }
}

fn to_std(addr: &SockaddrIn) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(addr.ip()), addr.port()))
}

fn timeval(timeout: Option<Duration>) -> TimeVal {
    match timeout {
        Some(d) => {
            let secs = d.as_secs() as libc::time_t;
            let mut micros = d.subsec_micros() as libc::suseconds_t;
            if secs == 0 && micros == 0 && !d.is_zero() {
                // a zero timeval clears the timeout at the OS level, which
                // is not what a tiny but non-zero budget asked for
                micros = 1;
            }
            TimeVal::new(secs, micros)
        }
        None => TimeVal::new(0, 0),
    }
}

impl SysBackend {
    pub(crate) fn open(proto: Proto) -> io::Result<SysBackend> {
        let ty = match proto {
            Proto::Udp => SockType::Datagram,
            Proto::Tcp => SockType::Stream,
        };
        let fd = socket(AddressFamily::Inet, ty, SockFlag::empty(), None).map_err(io_err)?;
        Ok(SysBackend {
            fd,
            nonblocking: false,
        })
    }

    fn msg_flags(&self) -> MsgFlags {
        if self.nonblocking {
            MsgFlags::MSG_DONTWAIT
        } else {
            MsgFlags::empty()
        }
    }
}

impl OsSocket for SysBackend {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        let addr: SockaddrIn = getsockname(self.fd.as_raw_fd()).map_err(io_err)?;
        Ok(to_std(&addr))
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        let addr: SockaddrIn = getpeername(self.fd.as_raw_fd()).map_err(io_err)?;
        Ok(to_std(&addr))
    }

    fn set_nonblocking(&mut self, on: bool) -> io::Result<()> {
        let raw = self.fd.as_raw_fd();
        let bits = fcntl(raw, FcntlArg::F_GETFL).map_err(io_err)?;
        let mut flags = OFlag::from_bits_truncate(bits);
        flags.set(OFlag::O_NONBLOCK, on);
        fcntl(raw, FcntlArg::F_SETFL(flags)).map_err(io_err)?;
        self.nonblocking = on;
        Ok(())
    }

    fn set_timeouts(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        let tv = timeval(timeout);
        setsockopt(&self.fd, sockopt::ReceiveTimeout, &tv).map_err(io_err)?;
        setsockopt(&self.fd, sockopt::SendTimeout, &tv).map_err(io_err)
    }

    fn bind(&mut self, addr: SocketAddr) -> io::Result<()> {
        bind(self.fd.as_raw_fd(), &sockaddr_in(addr)?).map_err(io_err)
    }

    fn listen(&mut self, backlog: u32) -> io::Result<()> {
        listen(&self.fd, backlog as usize).map_err(io_err)
    }

    fn accept(&mut self) -> io::Result<(Box<dyn OsSocket>, SocketAddr)> {
        let raw = accept(self.fd.as_raw_fd()).map_err(io_err)?;
        // the descriptor accept hands back is ours to close
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        let peer: SockaddrIn = getpeername(raw).map_err(io_err)?;
        let backend = SysBackend {
            fd,
            nonblocking: false,
        };
        Ok((Box::new(backend), to_std(&peer)))
    }

    fn connect(&mut self, addr: SocketAddr) -> io::Result<()> {
        connect(self.fd.as_raw_fd(), &sockaddr_in(addr)?).map_err(io_err)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        send(self.fd.as_raw_fd(), buf, self.msg_flags()).map_err(io_err)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        recv(self.fd.as_raw_fd(), buf, self.msg_flags()).map_err(io_err)
    }

    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        sendto(self.fd.as_raw_fd(), buf, &sockaddr_in(addr)?, self.msg_flags()).map_err(io_err)
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let (n, from) = recvfrom::<SockaddrIn>(self.fd.as_raw_fd(), buf).map_err(io_err)?;
        let from = from
            .map(|a| to_std(&a))
            .unwrap_or_else(|| SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)));
        Ok((n, from))
    }
}
