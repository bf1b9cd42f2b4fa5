//! Raw `IPPROTO_PIM` socket transport: opens a raw IPv4 socket bound for
//! egress on the configured interface and sends datagrams to the
//! well-known ALL-PIM-ROUTERS group, `224.0.0.13`.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use anyhow::Context;
use nix::errno::Errno;
use nix::sys::socket::{sendto, setsockopt, sockopt, MsgFlags, SockaddrIn};

use crate::error::{PimcResult, ResultExt, SystemError};
use crate::net::IPv4Address;

/// IP protocol number for PIM, RFC 7761 §4.9.
const IPPROTO_PIM: i32 = 103;

/// All-PIM-Routers, the fixed destination for every message this emitter
/// sends.
const ALL_PIM_ROUTERS: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 13);

/// An open raw socket transmitting PIM-SM v2 datagrams for one interface.
/// Released on drop.
pub struct PimTransport {
    fd: OwnedFd,
    dest: SockaddrIn,
}

impl PimTransport {
    /// Opens the raw socket and configures it for egress on `intf_addr`:
    /// PIM Hello/Join-Prune traffic is link-local (TTL 1) and must never be
    /// looped back to this host's own receive path.
    pub fn open(intf_addr: IPv4Address) -> PimcResult<Self> {
        let raw = unsafe { nix::libc::socket(nix::libc::AF_INET, nix::libc::SOCK_RAW, IPPROTO_PIM) };
        if raw < 0 {
            return Err(Errno::last())
                .context("unable to open raw PIM socket")
                .typ(SystemError::Resource);
        }
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let egress: Ipv4Addr = intf_addr.into();
        setsockopt(&fd, sockopt::IpMulticastIf, &egress)
            .context("unable to bind PIM socket egress interface")
            .typ(SystemError::Resource)?;
        setsockopt(&fd, sockopt::IpMulticastTtl, &1u8)
            .context("unable to set PIM socket TTL")
            .typ(SystemError::Resource)?;
        setsockopt(&fd, sockopt::IpMulticastLoop, &false)
            .context("unable to disable PIM socket multicast loopback")
            .typ(SystemError::Resource)?;

        let dest = SockaddrIn::from(SocketAddrV4::new(ALL_PIM_ROUTERS, 0));
        Ok(PimTransport { fd, dest })
    }

    /// Sends one complete PIM payload. Partial writes are not meaningful at
    /// this layer: either the whole datagram goes out or this returns an
    /// error.
    pub fn send(&self, payload: &[u8]) -> PimcResult<()> {
        sendto(self.fd.as_raw_fd(), payload, &self.dest, MsgFlags::empty())
            .context("PIM sendto failed")
            .typ(SystemError::Transmit)?;
        Ok(())
    }
}
