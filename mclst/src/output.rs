//! Console output: timestamped packet/timeout lines, the hex/ASCII payload
//! dump, and the final flow-statistics table, grounded on
//! `apps/mclst/OutputHandler.hpp`.
//!
//! The color escape sequences are emitted only when [`Config::colors`] is
//! set (itself only true when stdout/stderr are both a TTY and
//! `--no-colors` was not given).

use itertools::Itertools;
use nix::libc;

use crate::config::Config;
use crate::packet::PacketInfo;
use crate::stats::RxStats;

const RED_BRIGHT: &str = "\x1b[91m";
const YELLOW_BRIGHT: &str = "\x1b[93m";
const YELLOW: &str = "\x1b[33m";
const GREEN_BRIGHT: &str = "\x1b[92m";
const BLUE_BRIGHT: &str = "\x1b[94m";
const WHITE_BRIGHT: &str = "\x1b[97m";
const RESET: &str = "\x1b[0m";

/// Prints to stdout/stderr by building the whole line into a `String`
/// first, then writing it once.
pub struct OutputHandler<'a> {
    cfg: &'a Config,
}

impl<'a> OutputHandler<'a> {
    pub fn new(cfg: &'a Config) -> Self {
        OutputHandler { cfg }
    }

    fn colored(&self, color: &str, body: &str) -> String {
        if self.cfg.colors {
            format!("{color}{body}{RESET}")
        } else {
            body.to_string()
        }
    }

    pub fn warning(&self, message: &str) {
        eprintln!("{}", self.colored(RED_BRIGHT, &format!("warning: {message}")));
    }

    pub fn warning_ts(&self, ts: u64, message: &str) {
        println!(
            "{}",
            self.colored(RED_BRIGHT, &format!("{} warning: {message}", format_timestamp(ts)))
        );
    }

    pub fn show_timeout(&self, ts: u64) {
        println!("{}", self.colored(WHITE_BRIGHT, &format!("{} timeout", format_timestamp(ts))));
    }

    pub fn show_received_packet(&self, pkt: &PacketInfo) {
        let mut body = format!(
            "{} {}, {}:{}->{}:{}, TTL {}, UDP size {}",
            format_timestamp(pkt.timestamp),
            format_intf(pkt.if_index),
            pkt.source,
            pkt.sport,
            pkt.group,
            pkt.dport,
            format_ttl(pkt.ttl),
            pkt.payload.len(),
        );

        if let Some((hdr, msg)) = &pkt.beacon {
            let delta = pkt.timestamp as i128 - hdr.time_ns as i128;
            let msg = String::from_utf8_lossy(msg);
            body.push('\n');
            let beacon_line = format!(
                "{:<15} mclst pkt #{}, {}, delta {}ns, {}",
                ' ',
                hdr.seq,
                format_beacon_time(hdr.time_ns),
                delta,
                msg,
            );
            body.push_str(&if self.cfg.colors {
                format!("{BLUE_BRIGHT}{beacon_line}{RESET}")
            } else {
                beacon_line
            });
        }

        if self.cfg.show_payload {
            body.push('\n');
            let dump = format_hex_ascii(&pkt.payload);
            body.push_str(&if self.cfg.colors {
                format!("{YELLOW}{dump}{RESET}")
            } else {
                dump
            });
        }

        println!("{}", self.colored(YELLOW_BRIGHT, &body));
    }

    pub fn show_sent_packet(&self, ts: u64, seq: u64) {
        let body = format!(
            "{} sent packet to {}:{}, seq #{seq}",
            format_timestamp(ts),
            self.cfg.group,
            self.cfg.dport
        );
        println!("{}", self.colored(GREEN_BRIGHT, &body));
    }

    pub fn show_rx_stats(&self, stats: &RxStats, duration_ns: u64, stopped: bool) {
        if stopped {
            println!();
        }
        println!();

        let dest = if self.cfg.wildcard {
            format!("{}:*", self.cfg.group)
        } else {
            format!("{}:{}", self.cfg.group, self.cfg.dport)
        };

        if stats.is_empty() {
            println!("No traffic received for {dest} in {} sec", format_duration(duration_ns));
            return;
        }

        struct Row {
            source_port: String,
            dport: String,
            pkts: String,
            bytes: String,
            aps: String,
            rate: String,
        }

        let rows: Vec<Row> = stats
            .iter()
            .map(|(source, sport, dport, fs)| {
                let bits_per_sec =
                    (fs.bytes() * 8) as f64 * 1_000_000_000.0 / duration_ns.max(1) as f64;
                Row {
                    source_port: format!("{source}:{sport}"),
                    dport: dport.to_string(),
                    pkts: fs.pkts().to_string(),
                    bytes: fs.bytes().to_string(),
                    aps: format!("{:.2}", fs.aps()),
                    rate: format_rate(bits_per_sec),
                }
            })
            .collect();

        let headers = ["Source", "DPort", "Pkts", "Bytes", "APS", "Rate"];
        let widths = [
            rows.iter().map(|r| r.source_port.len()).chain([headers[0].len()]).max().unwrap(),
            rows.iter().map(|r| r.dport.len()).chain([headers[1].len()]).max().unwrap(),
            rows.iter().map(|r| r.pkts.len()).chain([headers[2].len()]).max().unwrap(),
            rows.iter().map(|r| r.bytes.len()).chain([headers[3].len()]).max().unwrap(),
            rows.iter().map(|r| r.aps.len()).chain([headers[4].len()]).max().unwrap(),
            rows.iter().map(|r| r.rate.len()).chain([headers[5].len()]).max().unwrap(),
        ];

        println!("Traffic received for {dest} in {} sec\n", format_duration(duration_ns));
        println!(
            "{:<w0$} {:<w1$} {:>w2$} {:>w3$} {:>w4$} {:>w5$}",
            headers[0],
            headers[1],
            headers[2],
            headers[3],
            headers[4],
            headers[5],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
            w4 = widths[4],
            w5 = widths[5],
        );
        let sep_width = widths.iter().copied().max().unwrap_or(0);
        let sep: String = std::iter::repeat('=').take(sep_width).collect();
        println!(
            "{:<w0$} {:<w1$} {:>w2$} {:>w3$} {:>w4$} {:>w5$}",
            &sep[..widths[0].min(sep_width)],
            &sep[..widths[1].min(sep_width)],
            &sep[..widths[2].min(sep_width)],
            &sep[..widths[3].min(sep_width)],
            &sep[..widths[4].min(sep_width)],
            &sep[..widths[5].min(sep_width)],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
            w4 = widths[4],
            w5 = widths[5],
        );
        for row in &rows {
            println!(
                "{:<w0$} {:<w1$} {:>w2$} {:>w3$} {:>w4$} {:>w5$}",
                row.source_port,
                row.dport,
                row.pkts,
                row.bytes,
                row.aps,
                row.rate,
                w0 = widths[0],
                w1 = widths[1],
                w2 = widths[2],
                w3 = widths[3],
                w4 = widths[4],
                w5 = widths[5],
            );
        }
    }

    pub fn show_tx_stats(&self, count: u64, stopped: bool) {
        if stopped {
            println!();
        }
        println!("Sent {count} packets");
    }
}

fn format_intf(if_index: u32) -> String {
    if if_index == 0 {
        "N/A".to_string()
    } else {
        format!("#{if_index}")
    }
}

fn format_ttl(ttl: i16) -> String {
    if ttl == -1 {
        "N/A".to_string()
    } else {
        ttl.to_string()
    }
}

/// Breaks `secs` (seconds since the Unix epoch) down into the host's local
/// time, the way `OutputHandler.hpp` renders every timestamp through
/// `localtime_r`. `secs` is a wall-clock instant, not a duration, so the
/// offset applied is whatever the host's current timezone/DST rule says for
/// that second.
fn local_broken_down(secs: i64) -> libc::tm {
    let t: libc::time_t = secs as libc::time_t;
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    unsafe {
        libc::localtime_r(&t, &mut tm);
    }
    tm
}

/// `HH:MM:SS.nnnnnn` in local wall-clock time, truncating (not rounding)
/// the sub-second digits to microsecond precision. See the Open Questions
/// in DESIGN.md for why this crate truncates where the original rounded
/// half-up.
fn format_timestamp(ts_ns: u64) -> String {
    let secs = (ts_ns / 1_000_000_000) as i64;
    let micros = (ts_ns % 1_000_000_000) / 1_000;
    let tm = local_broken_down(secs);
    format!("{:02}:{:02}:{:02}.{micros:06}", tm.tm_hour, tm.tm_min, tm.tm_sec)
}

/// `YYYY-MM-DD HH:MM:SS.nnnnnnnnn`, full nanosecond precision, for a
/// beacon's embedded remote timestamp, rendered in this host's local time
/// (the original never translates a remote timestamp into the remote's own
/// zone either — it runs the same `localtime_r` call the receiving host
/// uses for its own clock).
fn format_beacon_time(ts_ns: u64) -> String {
    let secs = (ts_ns / 1_000_000_000) as i64;
    let nanos = ts_ns % 1_000_000_000;
    let tm = local_broken_down(secs);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{nanos:09}",
        tm.tm_year + 1900,
        tm.tm_mon + 1,
        tm.tm_mday,
        tm.tm_hour,
        tm.tm_min,
        tm.tm_sec,
    )
}

fn format_duration(ns: u64) -> String {
    let secs = ns / 1_000_000_000;
    let micros = (ns % 1_000_000_000) / 1_000;
    format!("{secs}.{micros:06}")
}

fn format_rate(bits_per_sec: f64) -> String {
    if bits_per_sec < 1_000.0 {
        format!("{bits_per_sec:.2}bps")
    } else if bits_per_sec < 1_000_000.0 {
        format!("{:.2}Kbps", bits_per_sec / 1_000.0)
    } else if bits_per_sec < 1_000_000_000.0 {
        format!("{:.2}Mbps", bits_per_sec / 1_000_000.0)
    } else {
        format!("{:.2}Gbps", bits_per_sec / 1_000_000_000.0)
    }
}

/// A `tcpdump -XX`-style two-column hex/ASCII dump, 16 bytes per line.
fn format_hex_ascii(data: &[u8]) -> String {
    data.chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            let hex = chunk.iter().map(|b| format!("{b:02x}")).join(" ");
            let ascii: String = chunk
                .iter()
                .map(|&b| if (0x20..0x7f).contains(&b) { b as char } else { '.' })
                .collect();
            format!("{:#06x}:  {:<47}  {}", i * 16, hex, ascii)
        })
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_ascii_dump_renders_printable_and_non_printable_bytes() {
        let dump = format_hex_ascii(b"hi\x01");
        assert!(dump.contains("68 69 01"));
        assert!(dump.ends_with("hi."));
    }

    #[test]
    fn rate_formatting_picks_the_right_unit() {
        assert_eq!(format_rate(500.0), "500.00bps");
        assert_eq!(format_rate(1_500.0), "1.50Kbps");
        assert_eq!(format_rate(2_500_000.0), "2.50Mbps");
        assert_eq!(format_rate(3_500_000_000.0), "3.50Gbps");
    }

    #[test]
    fn timestamp_formats_hms_and_micros() {
        // Pin the zone so the localtime_r-based rendering is deterministic
        // regardless of the host running this test.
        std::env::set_var("TZ", "UTC");
        unsafe {
            libc::tzset();
        }
        assert_eq!(format_timestamp(3_661_123_456_000), "01:01:01.123456");
    }
}
