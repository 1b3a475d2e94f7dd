use std::io::{self, Read, Write};
use std::mem;
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::time::Duration;

use socket2::{Domain, SockRef, Socket, Type};

use super::{os_err, OsSocket, Proto};

/// Portable backend: sockets are created through `socket2`, then converted
/// into the matching std type once their role is fixed. Conversions keep
/// the same descriptor, so flags configured before a promotion survive it.
#[derive(Debug)]
pub(crate) struct Socket2Backend {
    role: Role,
}

#[derive(Debug)]
enum Role {
    Udp(UdpSocket),
    /// TCP socket that has not committed to listening or connecting yet.
    TcpRaw(Socket),
    Listener(TcpListener),
    Stream(TcpStream),
    /// `mem::replace` placeholder while a promotion is in flight; never
    /// observable between calls.
    Detached,
}

impl Socket2Backend {
    pub(crate) fn open(proto: Proto) -> io::Result<Socket2Backend> {
        let role = match proto {
            Proto::Udp => {
                let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
                Role::Udp(socket.into())
            }
            Proto::Tcp => Role::TcpRaw(Socket::new(Domain::IPV4, Type::STREAM, None)?),
        };
        Ok(Socket2Backend { role })
    }
}

impl OsSocket for Socket2Backend {
    fn local_addr(&self) -> io::Result<SocketAddr> {
        match &self.role {
            Role::Udp(socket) => socket.local_addr(),
            Role::TcpRaw(socket) => socket
                .local_addr()?
                .as_socket()
                .ok_or_else(|| os_err(libc::EAFNOSUPPORT)),
            Role::Listener(listener) => listener.local_addr(),
            Role::Stream(stream) => stream.local_addr(),
            Role::Detached => Err(os_err(libc::EBADF)),
        }
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        match &self.role {
            Role::Udp(socket) => socket.peer_addr(),
            Role::TcpRaw(socket) => socket
                .peer_addr()?
                .as_socket()
                .ok_or_else(|| os_err(libc::EAFNOSUPPORT)),
            Role::Listener(_) => Err(os_err(libc::ENOTCONN)),
            Role::Stream(stream) => stream.peer_addr(),
            Role::Detached => Err(os_err(libc::EBADF)),
        }
    }

    fn set_nonblocking(&mut self, on: bool) -> io::Result<()> {
        match &self.role {
            Role::Udp(socket) => socket.set_nonblocking(on),
            Role::TcpRaw(socket) => socket.set_nonblocking(on),
            Role::Listener(listener) => listener.set_nonblocking(on),
            Role::Stream(stream) => stream.set_nonblocking(on),
            Role::Detached => Err(os_err(libc::EBADF)),
        }
    }

    fn set_timeouts(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        match &self.role {
            Role::Udp(socket) => {
                socket.set_read_timeout(timeout)?;
                socket.set_write_timeout(timeout)
            }
            Role::TcpRaw(socket) => {
                socket.set_read_timeout(timeout)?;
                socket.set_write_timeout(timeout)
            }
            Role::Listener(listener) => {
                // std listeners expose no timeout setters; the receive
                // timeout still governs accept at the OS level
                let sock = SockRef::from(listener);
                sock.set_read_timeout(timeout)?;
                sock.set_write_timeout(timeout)
            }
            Role::Stream(stream) => {
                stream.set_read_timeout(timeout)?;
                stream.set_write_timeout(timeout)
            }
            Role::Detached => Err(os_err(libc::EBADF)),
        }
    }

    fn bind(&mut self, addr: SocketAddr) -> io::Result<()> {
        match &self.role {
            Role::Udp(socket) => SockRef::from(socket).bind(&addr.into()),
            Role::TcpRaw(socket) => socket.bind(&addr.into()),
            Role::Listener(_) | Role::Stream(_) => Err(os_err(libc::EINVAL)),
            Role::Detached => Err(os_err(libc::EBADF)),
        }
    }

    fn listen(&mut self, backlog: u32) -> io::Result<()> {
        let backlog = backlog.min(i32::MAX as u32) as i32;
        match mem::replace(&mut self.role, Role::Detached) {
            Role::TcpRaw(socket) => match socket.listen(backlog) {
                Ok(()) => {
                    self.role = Role::Listener(socket.into());
                    Ok(())
                }
                Err(err) => {
                    self.role = Role::TcpRaw(socket);
                    Err(err)
                }
            },
            Role::Listener(listener) => {
                // a second listen adjusts the backlog
                let result = SockRef::from(&listener).listen(backlog);
                self.role = Role::Listener(listener);
                result
            }
            Role::Udp(socket) => {
                self.role = Role::Udp(socket);
                Err(os_err(libc::EOPNOTSUPP))
            }
            other => {
                self.role = other;
                Err(os_err(libc::EINVAL))
            }
        }
    }

    fn accept(&mut self) -> io::Result<(Box<dyn OsSocket>, SocketAddr)> {
        match &self.role {
            Role::Listener(listener) => {
                let (stream, peer) = listener.accept()?;
                let backend = Socket2Backend {
                    role: Role::Stream(stream),
                };
                Ok((Box::new(backend), peer))
            }
            Role::Udp(_) => Err(os_err(libc::EOPNOTSUPP)),
            Role::Detached => Err(os_err(libc::EBADF)),
            _ => Err(os_err(libc::EINVAL)),
        }
    }

    fn connect(&mut self, addr: SocketAddr) -> io::Result<()> {
        match mem::replace(&mut self.role, Role::Detached) {
            Role::TcpRaw(socket) => match socket.connect(&addr.into()) {
                Ok(()) => {
                    self.role = Role::Stream(socket.into());
                    Ok(())
                }
                Err(err) if err.raw_os_error() == Some(libc::EISCONN) => {
                    // a re-polled non-blocking attempt finished earlier;
                    // promote and let the caller interpret the code
                    self.role = Role::Stream(socket.into());
                    Err(err)
                }
                Err(err) => {
                    self.role = Role::TcpRaw(socket);
                    Err(err)
                }
            },
            Role::Stream(stream) => {
                let result = SockRef::from(&stream).connect(&addr.into());
                self.role = Role::Stream(stream);
                result
            }
            Role::Udp(socket) => {
                let result = socket.connect(addr);
                self.role = Role::Udp(socket);
                result
            }
            Role::Listener(listener) => {
                // the OS reports EISCONN for connect on a listening socket
                self.role = Role::Listener(listener);
                Err(os_err(libc::EISCONN))
            }
            Role::Detached => Err(os_err(libc::EBADF)),
        }
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.role {
            Role::Stream(stream) => stream.write(buf),
            Role::Udp(socket) => socket.send(buf),
            Role::TcpRaw(_) | Role::Listener(_) => Err(os_err(libc::ENOTCONN)),
            Role::Detached => Err(os_err(libc::EBADF)),
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.role {
            Role::Stream(stream) => stream.read(buf),
            Role::Udp(socket) => socket.recv(buf),
            Role::TcpRaw(_) | Role::Listener(_) => Err(os_err(libc::ENOTCONN)),
            Role::Detached => Err(os_err(libc::EBADF)),
        }
    }

    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        match &self.role {
            Role::Udp(socket) => socket.send_to(buf, addr),
            Role::Detached => Err(os_err(libc::EBADF)),
            _ => Err(os_err(libc::EOPNOTSUPP)),
        }
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        match &self.role {
            Role::Udp(socket) => socket.recv_from(buf),
            Role::Detached => Err(os_err(libc::EBADF)),
            _ => Err(os_err(libc::EOPNOTSUPP)),
        }
    }
}
