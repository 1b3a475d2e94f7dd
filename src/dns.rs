use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};

use crate::diag;
use crate::status::{NetResult, Status};

/// Resolve a hostname to its first IPv4 address. No usable result reports
/// through the process sink and comes back as `Error`; the raw resolver
/// failure never crosses the boundary.
pub fn dns_ipv4(host: &str) -> NetResult<Ipv4Addr> {
    let addrs = match (host, 0u16).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(err) => {
            diag::process_sink().report(
                log::Level::Warn,
                format_args!("dns lookup '{host}' failed: {err}"),
            );
            return Err(Status::Error);
        }
    };
    for addr in addrs {
        if let SocketAddr::V4(v4) = addr {
            return Ok(*v4.ip());
        }
    }
    diag::process_sink().report(
        log::Level::Warn,
        format_args!("dns lookup '{host}': no ipv4 address"),
    );
    Err(Status::Error)
}
