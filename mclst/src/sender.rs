//! The beacon sender (`-s|--sender`), grounded on `apps/mclst/Sender.hpp`/
//! `MclstBase.hpp`: opens the send-side socket once, then emits one beacon
//! datagram per second until stopped or `cfg.count` is reached.

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use nix::errno::Errno;
use nix::libc;
use nix::sys::socket::{sendto, setsockopt, sockopt, MsgFlags, SockaddrIn};

use pimc_core::error::{PimcResult, ResultExt, SystemError};

use crate::beacon;
use crate::config::Config;
use crate::output::OutputHandler;
use crate::timer::host_nanos;

/// One beacon datagram per second, matching the fixed pacing of the
/// scheduler described for the PIM emitter's refresh timers.
const SEND_PERIOD: Duration = Duration::from_secs(1);

fn open_socket(cfg: &Config) -> PimcResult<OwnedFd> {
    let raw = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
    if raw < 0 {
        return Err(Errno::last())
            .context("unable to create send socket")
            .typ(SystemError::Resource);
    }
    let fd = unsafe { OwnedFd::from_raw_fd(raw) };

    let intf_addr: std::net::Ipv4Addr = cfg
        .intf
        .ipv4addr
        .expect("Config::from_cli guarantees an IPv4 address on the chosen interface")
        .into();
    setsockopt(&fd, sockopt::IpMulticastIf, &intf_addr)
        .context("unable to bind send socket egress interface")
        .typ(SystemError::Resource)?;
    setsockopt(&fd, sockopt::IpMulticastTtl, &(cfg.ttl as u8))
        .context("unable to set send socket TTL")
        .typ(SystemError::Resource)?;

    Ok(fd)
}

/// Runs the send loop until `stop` is observed or `cfg.count` beacons have
/// gone out, then prints the final send count.
pub fn run(cfg: &Config, oh: &OutputHandler, stop: &AtomicBool) -> PimcResult<()> {
    let fd = open_socket(cfg)?;
    let dest = SockaddrIn::from(std::net::SocketAddrV4::new(cfg.group.into(), cfg.dport));

    let mut seq: u64 = 0;
    loop {
        let now = Instant::now();
        let payload = beacon::encode(seq, host_nanos(), &[]);
        sendto(fd.as_raw_fd(), &payload, &dest, MsgFlags::empty())
            .context("sendto() failed")
            .typ(SystemError::Transmit)?;
        oh.show_sent_packet(host_nanos(), seq);
        seq += 1;

        if cfg.count != 0 && seq >= cfg.count {
            break;
        }
        if stop.load(Ordering::SeqCst) {
            break;
        }

        let elapsed = now.elapsed();
        if elapsed < SEND_PERIOD {
            thread::sleep(SEND_PERIOD - elapsed);
        }
        if stop.load(Ordering::SeqCst) {
            break;
        }
    }

    oh.show_tx_stats(seq, stop.load(Ordering::SeqCst));
    Ok(())
}
