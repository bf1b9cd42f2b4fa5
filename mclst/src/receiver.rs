//! Non-blocking multicast receive loop, grounded on
//! `apps/mclst/ReceiverBase.hpp`/`Receiver.hpp`/`IPRawReceiver.hpp`.
//!
//! The original's CRTP `ReceiverBase<RP, Limit>` hierarchy collapses here
//! into one shared loop plus a two-variant [`Kind`] enum that only differs
//! in how a packet's sender/payload are pulled out of what the socket
//! handed back: a plain `SOCK_DGRAM` gets the sender from `recvfrom`'s
//! address and treats the whole datagram as payload, while the wildcard-port
//! `SOCK_RAW`/`IPPROTO_UDP` variant parses the IPv4 and UDP headers itself
//! and filters out anything not addressed to the configured group.
//!
//! Ancillary TTL (`IP_RECVTTL`) and arrival-interface (`IP_PKTINFO`) data
//! is requested and decoded the same way for both variants, matching the
//! original's single shared `configure()`/`receive()`.

use std::io;
use std::net::Ipv4Addr;
use std::num::NonZeroUsize;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use nix::errno::Errno;
use nix::libc;
use nix::sys::socket::{setsockopt, sockopt};
use polling::{Event, Events, Poller};

use pimc_core::error::{PimcResult, ResultExt, SystemError};
use pimc_core::net::IPv4Address;

use crate::beacon::{self, Dissected};
use crate::config::Config;
use crate::output::OutputHandler;
use crate::packet::{PacketInfo, PacketStatus, BUFFER_SIZE};
use crate::stats::RxStats;
use crate::timer::Timer;

/// Which socket-level strategy is in use: a plain joined `SOCK_DGRAM`, or
/// the wildcard-port raw `IPPROTO_UDP` variant that filters in user space.
enum Kind {
    Udp,
    Raw,
}

/// Opens, configures, and joins the receive socket for `cfg`.
fn open_socket(cfg: &Config) -> PimcResult<(OwnedFd, Kind)> {
    let kind = if cfg.wildcard { Kind::Raw } else { Kind::Udp };

    let (domain, ty, proto) = match kind {
        Kind::Udp => (libc::AF_INET, libc::SOCK_DGRAM, 0),
        Kind::Raw => (libc::AF_INET, libc::SOCK_RAW, libc::IPPROTO_UDP),
    };
    let raw = unsafe { libc::socket(domain, ty, proto) };
    if raw < 0 {
        return Err(Errno::last())
            .context("unable to create receive socket")
            .typ(SystemError::Resource);
    }
    let fd = unsafe { OwnedFd::from_raw_fd(raw) };

    let flags = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFL) };
    if flags == -1 {
        return Err(Errno::last())
            .context("fcntl() failed to get socket flags")
            .typ(SystemError::Resource);
    }
    if unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFL, flags | libc::O_NONBLOCK) } == -1 {
        return Err(Errno::last())
            .context("fcntl() failed to make socket non-blocking")
            .typ(SystemError::Resource);
    }

    setsockopt(&fd, sockopt::ReuseAddr, &true)
        .context("cannot enable UDP port reuse")
        .typ(SystemError::Resource)?;

    let bufsize: libc::c_int = BUFFER_SIZE as libc::c_int;
    unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &bufsize as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }

    let one: libc::c_int = 1;
    if unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::IPPROTO_IP,
            libc::IP_RECVTTL,
            &one as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    } == -1
    {
        return Err(Errno::last())
            .context("cannot enable receiving TTL")
            .typ(SystemError::Resource);
    }
    if unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::IPPROTO_IP,
            libc::IP_PKTINFO,
            &one as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    } == -1
    {
        return Err(Errno::last())
            .context("cannot enable receiving the arrival interface")
            .typ(SystemError::Resource);
    }

    let mut src: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    src.sin_family = libc::AF_INET as libc::sa_family_t;
    src.sin_port = cfg.dport.to_be();
    src.sin_addr.s_addr = libc::INADDR_ANY.to_be();
    let rc = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            &src as *const _ as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };
    if rc == -1 {
        return Err(Errno::last())
            .with_context(|| format!("cannot bind socket to UDP port {}", cfg.dport))
            .typ(SystemError::Resource);
    }

    if let Kind::Udp = kind {
        join_group(&fd, cfg)?;
    }

    Ok((fd, kind))
}

fn join_group(fd: &OwnedFd, cfg: &Config) -> PimcResult<()> {
    let intf_addr: Ipv4Addr = cfg
        .intf
        .ipv4addr
        .expect("Config::from_cli guarantees an IPv4 address on the chosen interface")
        .into();
    let group: Ipv4Addr = cfg.group.into();

    if cfg.is_ssm() {
        let source: Ipv4Addr = cfg.source.into();
        let mreq = libc::ip_mreq_source {
            imr_multiaddr: libc::in_addr { s_addr: u32::from(group).to_be() },
            imr_sourceaddr: libc::in_addr { s_addr: u32::from(source).to_be() },
            imr_interface: libc::in_addr { s_addr: u32::from(intf_addr).to_be() },
        };
        let rc = unsafe {
            libc::setsockopt(
                fd.as_raw_fd(),
                libc::IPPROTO_IP,
                libc::IP_ADD_SOURCE_MEMBERSHIP,
                &mreq as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::ip_mreq_source>() as libc::socklen_t,
            )
        };
        if rc == -1 {
            return Err(Errno::last())
                .with_context(|| {
                    format!("failed to join ({}, {}) on {}", cfg.source, cfg.group, cfg.intf.name)
                })
                .typ(SystemError::Resource);
        }
    } else {
        let mreq = libc::ip_mreq {
            imr_multiaddr: libc::in_addr { s_addr: u32::from(group).to_be() },
            imr_interface: libc::in_addr { s_addr: u32::from(intf_addr).to_be() },
        };
        let rc = unsafe {
            libc::setsockopt(
                fd.as_raw_fd(),
                libc::IPPROTO_IP,
                libc::IP_ADD_MEMBERSHIP,
                &mreq as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::ip_mreq>() as libc::socklen_t,
            )
        };
        if rc == -1 {
            return Err(Errno::last())
                .with_context(|| format!("failed to join (*, {}) on {}", cfg.group, cfg.intf.name))
                .typ(SystemError::Resource);
        }
    }
    Ok(())
}

/// The ancillary data recovered from one `recvmsg` call.
struct Ancillary {
    ttl: i16,
    if_index: u32,
}

/// Receives one datagram, filling `buf` and recovering ancillary TTL and
/// arrival-interface data via `recvmsg`'s control messages. Returns the
/// sender address and the number of bytes received.
fn recv_one(fd: &OwnedFd, buf: &mut [u8]) -> PimcResult<(libc::sockaddr_in, usize, Ancillary)> {
    let mut sender: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    let mut iov = libc::iovec {
        iov_base: buf.as_mut_ptr() as *mut libc::c_void,
        iov_len: buf.len(),
    };
    const CMSG_BUF_LEN: usize = 256;
    let mut cmsg_buf = [0u8; CMSG_BUF_LEN];
    let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
    msg.msg_name = &mut sender as *mut _ as *mut libc::c_void;
    msg.msg_namelen = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = cmsg_buf.as_mut_ptr() as *mut libc::c_void;
    msg.msg_controllen = CMSG_BUF_LEN as _;

    let rsz = unsafe { libc::recvmsg(fd.as_raw_fd(), &mut msg, 0) };
    if rsz < 0 {
        return Err(Errno::last()).context("recvmsg() failed").typ(SystemError::Resource);
    }

    let mut ancillary = Ancillary { ttl: -1, if_index: 0 };
    let mut cmsgp = unsafe { libc::CMSG_FIRSTHDR(&msg) };
    while !cmsgp.is_null() {
        let c = unsafe { &*cmsgp };
        if c.cmsg_level == libc::IPPROTO_IP
            && (c.cmsg_type == libc::IP_TTL || c.cmsg_type == libc::IP_RECVTTL)
        {
            let data = unsafe { libc::CMSG_DATA(cmsgp) as *const libc::c_int };
            ancillary.ttl = unsafe { *data as i16 };
        } else if c.cmsg_level == libc::IPPROTO_IP && c.cmsg_type == libc::IP_PKTINFO {
            let data = unsafe { libc::CMSG_DATA(cmsgp) as *const libc::in_pktinfo };
            ancillary.if_index = unsafe { (*data).ipi_ifindex as u32 };
        }
        cmsgp = unsafe { libc::CMSG_NXTHDR(&msg, cmsgp) };
    }

    Ok((sender, rsz as usize, ancillary))
}

/// Parses just enough of an IPv4 + UDP header to recover source/dest
/// addresses and ports, for the raw-socket variant. Returns `None` if the
/// buffer is too short or not actually UDP.
fn parse_ip_udp(data: &[u8]) -> Option<(IPv4Address, u16, IPv4Address, u16, &[u8])> {
    if data.len() < 20 {
        return None;
    }
    let ihl = ((data[0] & 0x0F) as usize) * 4;
    if data.len() < ihl + 8 {
        return None;
    }
    let protocol = data[9];
    if protocol != libc::IPPROTO_UDP as u8 {
        return None;
    }
    let src = IPv4Address::from_value(u32::from_be_bytes(data[12..16].try_into().unwrap()));
    let dst = IPv4Address::from_value(u32::from_be_bytes(data[16..20].try_into().unwrap()));

    let udp = &data[ihl..];
    let sport = u16::from_be_bytes(udp[0..2].try_into().unwrap());
    let dport = u16::from_be_bytes(udp[2..4].try_into().unwrap());
    let udp_len = u16::from_be_bytes(udp[4..6].try_into().unwrap()) as usize;
    if udp_len < 8 || udp.len() < udp_len {
        return None;
    }
    Some((src, sport, dst, dport, &udp[8..udp_len]))
}

/// Dissects the mclst beacon payload, if any, populating `pkt.beacon` and
/// returning a warning string if a magic-matched header turned out
/// truncated.
fn dissect_beacon(pkt: &mut PacketInfo) -> Option<String> {
    match beacon::dissect(&pkt.payload) {
        Dissected::NotABeacon => None,
        Dissected::Beacon(hdr, msg) => {
            pkt.beacon = Some((hdr, msg.to_vec()));
            None
        }
        Dissected::Truncated(hdr, remaining) => Some(format!(
            "{}:{}->{}:{}: in message #{} length is {}, but the remaining length is {}",
            pkt.source, pkt.sport, pkt.group, pkt.dport, hdr.seq, hdr.data_len, remaining
        )),
    }
}

/// Waits up to `timeout` for `fd` to become readable, retrying on `EINTR`.
/// A fresh [`Poller`] is created per call, matching `wait_fds()`'s
/// original shape: the registration is one-shot so there is nothing to
/// re-arm between calls.
fn wait_readable(fd: &OwnedFd, timeout: Option<Duration>) -> PimcResult<bool> {
    let poller = Poller::new().context("unable to create poller").typ(SystemError::Resource)?;
    unsafe {
        poller
            .add(fd.as_raw_fd(), Event::readable(0))
            .context("unable to register socket with poller")
            .typ(SystemError::Resource)?;
    }
    let mut events = Events::with_capacity(NonZeroUsize::new(1).unwrap());
    loop {
        match poller.wait(&mut events, timeout) {
            Ok(0) => return Ok(false),
            Ok(_) => return Ok(true),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("poller wait failed").typ(SystemError::Resource),
        }
    }
}

/// Runs the receive loop until `stop` is observed or the count limit (if
/// any) is reached, then prints the final flow-statistics table.
pub fn run(cfg: &Config, oh: &OutputHandler, stop: &AtomicBool) -> PimcResult<()> {
    let (fd, kind) = open_socket(cfg)?;

    let timeout = Duration::from_secs(cfg.timeout_sec as u64);
    let mut timer = Timer::new(timeout);
    let mut stats = RxStats::new();
    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut pkt = PacketInfo::new(cfg.group);
    let mut received: u64 = 0;
    let start_ns = timer.timestamp();

    'outer: loop {
        let readable = wait_readable(&fd, Some(timeout))?;
        timer.save();

        if !readable {
            if timer.timed_out() {
                oh.show_timeout(timer.timestamp());
                timer.reset();
            }
            if stop.load(Ordering::SeqCst) {
                break;
            }
            continue;
        }

        pkt.reset();
        let status = match recv_one(&fd, &mut buf) {
            Ok((sender, rsz, ancillary)) => {
                pkt.timestamp = timer.timestamp();
                pkt.ttl = ancillary.ttl;
                pkt.if_index = ancillary.if_index;

                let status = match kind {
                    Kind::Udp => {
                        pkt.source = IPv4Address::from_nl(sender.sin_addr.s_addr);
                        pkt.sport = u16::from_be(sender.sin_port);
                        pkt.dport = cfg.dport;
                        pkt.payload = buf[..rsz].to_vec();
                        if let Some(warning) = dissect_beacon(&mut pkt) {
                            oh.warning_ts(pkt.timestamp, &warning);
                            PacketStatus::AcceptedNoShow
                        } else {
                            PacketStatus::AcceptedShow
                        }
                    }
                    Kind::Raw => match parse_ip_udp(&buf[..rsz]) {
                        Some((src, sport, dst, dport, payload)) if dst == cfg.group => {
                            pkt.source = src;
                            pkt.sport = sport;
                            pkt.dport = dport;
                            pkt.payload = payload.to_vec();
                            if let Some(warning) = dissect_beacon(&mut pkt) {
                                oh.warning_ts(pkt.timestamp, &warning);
                                PacketStatus::AcceptedNoShow
                            } else {
                                PacketStatus::AcceptedShow
                            }
                        }
                        Some(_) => PacketStatus::Filtered,
                        None => PacketStatus::Filtered,
                    },
                };
                status
            }
            Err(e) => return Err(e),
        };

        match status {
            PacketStatus::Filtered => {}
            PacketStatus::AcceptedNoShow => {
                timer.reset();
            }
            PacketStatus::AcceptedShow => {
                timer.reset();
                oh.show_received_packet(&pkt);
                stats.update(pkt.source, pkt.sport, pkt.dport, pkt.payload.len() as u64);
                received += 1;
                if cfg.count != 0 && received >= cfg.count {
                    break 'outer;
                }
            }
        }

        if stop.load(Ordering::SeqCst) {
            break;
        }
    }

    let duration_ns = timer.timestamp().saturating_sub(start_ns).max(1);
    oh.show_rx_stats(&stats, duration_ns, stop.load(Ordering::SeqCst));
    Ok(())
}
