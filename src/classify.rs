//! Classification of OS socket errors into [`Status`] values.
//!
//! Three separate tables, one per operation family, because the same code
//! reads differently per call: "would block" is "attempt in progress" for
//! connect, "nothing to read" or "budget elapsed" for receive. Each table
//! is total; codes outside it are reported once through the sink and fall
//! to the family's catch-all.

use std::io;

use crate::diag::DiagnosticSink;
use crate::mode::Mode;
use crate::status::Status;

/// Failed `connect` (also covers `bind`, which draws on the same code
/// set). The would-block family reads through the endpoint mode: "attempt
/// in progress, re-poll" when non-blocking, a spent budget under a blocking
/// timeout (an armed send timeout makes a blocking connect fail with
/// EINPROGRESS at expiry).
pub(crate) fn classify_connect(
    op: &str,
    err: &io::Error,
    mode: Mode,
    diag: &dyn DiagnosticSink,
) -> Status {
    if let Some(code) = err.raw_os_error() {
        return match code {
            code if code == libc::EACCES || code == libc::EPERM => Status::AccessDenied,
            libc::ENOTSOCK | libc::EBADF => Status::Uninitialized,
            libc::EADDRINUSE => Status::AddrInUse,
            libc::EFAULT | libc::EAFNOSUPPORT | libc::EADDRNOTAVAIL => Status::InvalidAddress,
            libc::ECONNREFUSED => Status::ConnRefused,
            libc::EISCONN => Status::AlreadyConnected,
            libc::ENETUNREACH | libc::EHOSTUNREACH => Status::Unreachable,
            libc::ETIMEDOUT => Status::ConnTimeout,
            libc::EALREADY | libc::EINPROGRESS => mode.not_ready_status(),
            code if code == libc::EAGAIN || code == libc::EWOULDBLOCK => mode.not_ready_status(),
            _ => unmapped(op, err, Status::Error, diag),
        };
    }
    match err.kind() {
        io::ErrorKind::PermissionDenied => Status::AccessDenied,
        io::ErrorKind::AddrInUse => Status::AddrInUse,
        io::ErrorKind::AddrNotAvailable | io::ErrorKind::InvalidInput => Status::InvalidAddress,
        io::ErrorKind::ConnectionRefused => Status::ConnRefused,
        io::ErrorKind::TimedOut => Status::ConnTimeout,
        io::ErrorKind::WouldBlock => mode.not_ready_status(),
        _ => unmapped(op, err, Status::Error, diag),
    }
}

/// Failed `send`/`receive` (both protocols). Would-block reads through the
/// endpoint mode; everything unclassified funnels to `PacketError`.
pub(crate) fn classify_io(op: &str, err: &io::Error, mode: Mode, diag: &dyn DiagnosticSink) -> Status {
    if let Some(code) = err.raw_os_error() {
        return match code {
            libc::EACCES => Status::AccessDenied,
            libc::ENOTSOCK | libc::EBADF | libc::EFAULT | libc::ENOTCONN => Status::Uninitialized,
            libc::ECONNRESET => Status::ConnResetByPeer,
            libc::ECONNREFUSED => Status::ConnRefused,
            libc::EINVAL => Status::InvalidAddress,
            libc::ETIMEDOUT => Status::ConnTimeout,
            code if code == libc::EAGAIN || code == libc::EWOULDBLOCK => mode.not_ready_status(),
            _ => unmapped(op, err, Status::PacketError, diag),
        };
    }
    match err.kind() {
        io::ErrorKind::PermissionDenied => Status::AccessDenied,
        io::ErrorKind::NotConnected => Status::Uninitialized,
        io::ErrorKind::ConnectionReset => Status::ConnResetByPeer,
        io::ErrorKind::ConnectionRefused => Status::ConnRefused,
        io::ErrorKind::InvalidInput => Status::InvalidAddress,
        io::ErrorKind::TimedOut => Status::ConnTimeout,
        io::ErrorKind::WouldBlock => mode.not_ready_status(),
        _ => unmapped(op, err, Status::PacketError, diag),
    }
}

/// Failed `listen`/`accept`. Aborted handshakes surface as `ConnRefused`;
/// descriptor/buffer exhaustion is mapped but still reported, it usually
/// means the process is leaking endpoints.
pub(crate) fn classify_accept(
    op: &str,
    err: &io::Error,
    mode: Mode,
    diag: &dyn DiagnosticSink,
) -> Status {
    if let Some(code) = err.raw_os_error() {
        return match code {
            libc::EOPNOTSUPP | libc::ENOTSOCK | libc::EBADF => Status::Uninitialized,
            libc::EADDRINUSE => Status::AddrInUse,
            code if code == libc::EACCES || code == libc::EPERM => Status::AccessDenied,
            libc::ECONNABORTED => Status::ConnRefused,
            libc::EINVAL => Status::NotListening,
            libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM => {
                diag.report(
                    log::Level::Error,
                    format_args!("{op}: resource exhaustion, os error {code}"),
                );
                Status::Error
            }
            code if code == libc::EAGAIN || code == libc::EWOULDBLOCK => mode.not_ready_status(),
            _ => unmapped(op, err, Status::Error, diag),
        };
    }
    match err.kind() {
        io::ErrorKind::Unsupported => Status::Uninitialized,
        io::ErrorKind::AddrInUse => Status::AddrInUse,
        io::ErrorKind::PermissionDenied => Status::AccessDenied,
        io::ErrorKind::ConnectionAborted => Status::ConnRefused,
        io::ErrorKind::InvalidInput => Status::NotListening,
        io::ErrorKind::TimedOut => Status::ConnTimeout,
        io::ErrorKind::WouldBlock => mode.not_ready_status(),
        _ => unmapped(op, err, Status::Error, diag),
    }
}

fn unmapped(op: &str, err: &io::Error, fallback: Status, diag: &dyn DiagnosticSink) -> Status {
    match err.raw_os_error() {
        Some(code) => diag.report(
            log::Level::Warn,
            format_args!("{op}: unmapped os error {code}"),
        ),
        None => diag.report(log::Level::Warn, format_args!("{op}: unmapped error '{err}'")),
    }
    fallback
}
