//! Socket options recognized by [`super::BasicSocket::set_option`].
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use crate::error::{Error, ErrorKind, Result};

/// An option settable on a [`super::BasicSocket`] or a layer above it.
/// Family-dispatched options (`Ttl`, `MulticastLoop`, `MulticastTtl`,
/// `PathMtuDiscover`, `RcvError`) are applied at the v4 or v6 level
/// automatically: the v4 call is tried first and the v6 call is tried if it
/// fails, so a single option works regardless of the socket's family.
#[derive(Debug, Clone, Copy)]
pub enum SocketOption {
    NoDelay(bool),
    KeepAlive(bool),
    KeepIdle(Duration),
    KeepIntvl(Duration),
    KeepCount(u32),
    SndBuffer(usize),
    RcvBuffer(usize),
    TimeStamp(bool),
    ReuseAddr(bool),
    ReusePort(bool),
    Broadcast(bool),
    AuxData(bool),
    Ttl(u32),
    MulticastLoop(bool),
    MulticastTtl(u32),
    PathMtuDiscover(bool),
    RcvError(bool),
}

pub(crate) fn apply(sock: &socket2::Socket, opt: SocketOption) -> Result<()> {
    use SocketOption::*;
    match opt {
        NoDelay(v) => sock.set_nodelay(v),
        KeepAlive(v) => {
            let params = socket2::TcpKeepalive::new();
            if v {
                sock.set_tcp_keepalive(&params)
            } else {
                Ok(())
            }
        }
        KeepIdle(d) => sock.set_tcp_keepalive(&socket2::TcpKeepalive::new().with_time(d)),
        KeepIntvl(d) => sock.set_tcp_keepalive(&socket2::TcpKeepalive::new().with_interval(d)),
        KeepCount(n) => sock.set_tcp_keepalive(&socket2::TcpKeepalive::new().with_retries(n)),
        SndBuffer(n) => sock.set_send_buffer_size(n),
        RcvBuffer(n) => sock.set_recv_buffer_size(n),
        // SO_TIMESTAMP: no portable accessor on `socket2`; set directly below.
        TimeStamp(v) => return set_bool_sockopt(sock, libc::SOL_SOCKET, libc::SO_TIMESTAMP, v),
        ReuseAddr(v) => sock.set_reuse_address(v),
        #[cfg(unix)]
        ReusePort(v) => sock.set_reuse_port(v),
        #[cfg(not(unix))]
        ReusePort(_v) => return Ok(()),
        Broadcast(v) => sock.set_broadcast(v),
        // SO_TIMESTAMPNS / extended error auxiliary data: best-effort, Linux-only.
        AuxData(v) => return set_bool_sockopt(sock, libc::SOL_SOCKET, libc::SO_TIMESTAMPNS, v),
        Ttl(v) => sock
            .set_ttl(v)
            .or_else(|_| sock.set_unicast_hops_v6(v)),
        MulticastLoop(v) => sock.set_multicast_loop_v4(v).or_else(|_| sock.set_multicast_loop_v6(v)),
        MulticastTtl(v) => sock
            .set_multicast_ttl_v4(v)
            .or_else(|_| sock.set_multicast_hops_v6(v)),
        // IP_MTU_DISCOVER: best-effort, Linux-only; other platforms no-op.
        PathMtuDiscover(v) => return set_pmtu_discover(sock, v),
        // IP_RECVERR / IPV6_RECVERR: best-effort, Linux-only.
        RcvError(v) => set_bool_sockopt(sock, libc::IPPROTO_IP, libc::IP_RECVERR, v)
            .or_else(|_| set_bool_sockopt(sock, libc::IPPROTO_IPV6, libc::IPV6_RECVERR, v)),
    }
    .map_err(|e| Error::new(ErrorKind::OperationFailed, e.to_string()))
}

/// Raw `setsockopt` for a boolean-valued option `socket2` doesn't expose.
fn set_bool_sockopt(sock: &socket2::Socket, level: libc::c_int, name: libc::c_int, v: bool) -> std::io::Result<()> {
    let val: libc::c_int = v as libc::c_int;
    let ret = unsafe {
        libc::setsockopt(
            sock.as_raw_fd(),
            level,
            name,
            &val as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(target_os = "linux")]
fn set_pmtu_discover(sock: &socket2::Socket, v: bool) -> std::io::Result<()> {
    let val: libc::c_int = if v { libc::IP_PMTUDISC_DO } else { libc::IP_PMTUDISC_WANT };
    let ret = unsafe {
        libc::setsockopt(
            sock.as_raw_fd(),
            libc::IPPROTO_IP,
            libc::IP_MTU_DISCOVER,
            &val as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(target_os = "linux"))]
fn set_pmtu_discover(_sock: &socket2::Socket, _v: bool) -> std::io::Result<()> {
    Ok(())
}
