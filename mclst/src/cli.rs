//! Command-line surface for `mclst`, per §6: a `group[:port]` positional
//! plus the listed flags. `clap` derive validates syntax and ranges;
//! cross-field rules (wildcard vs. sender, sender requires a port) are
//! checked in [`crate::config`] once the interface table is available.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "mclst",
    about = "Multicast listener/sender reporting per-flow UDP statistics",
    disable_version_flag = true
)]
pub struct Cli {
    /// The multicast group to join, optionally with a destination port
    /// (`group:port`). Omitting the port subscribes to all UDP ports on
    /// that group; this is only valid for a receiver, not `--sender`.
    #[arg(required_unless_present = "version")]
    pub group: Option<String>,

    /// The host interface on which to receive/send multicast, by name or
    /// by its IPv4 address.
    #[arg(short = 'i', long = "interface", required_unless_present = "version")]
    pub interface: Option<String>,

    /// Indicates that the subscription should be source specific
    /// (`IP_ADD_SOURCE_MEMBERSHIP`).
    #[arg(short = 'S', long = "source")]
    pub source: Option<String>,

    /// Timeout in seconds before reporting silence; 1-600.
    #[arg(short = 't', long = "timeout", default_value_t = 5)]
    pub timeout: u32,

    /// Show the payload of received traffic as split hex/ASCII, similar to
    /// `tcpdump -XX`.
    #[arg(short = 'X', long = "hex-ascii")]
    pub hex_ascii: bool,

    /// Send multicast traffic instead of receiving it.
    #[arg(short = 's', long = "sender")]
    pub sender: bool,

    /// TTL of sent traffic; only valid with `--sender`.
    #[arg(long = "ttl", default_value_t = 255)]
    pub ttl: u32,

    /// Number of packets to receive or send before stopping; 0 means no
    /// limit.
    #[arg(short = 'c', long = "count", default_value_t = 0)]
    pub count: u64,

    /// Disable colored output.
    #[arg(long = "no-colors")]
    pub no_colors: bool,

    /// Print the resolved configuration and exit.
    #[arg(long = "show-config")]
    pub show_config: bool,

    /// Show version and exit.
    #[arg(short = 'v', long = "version")]
    pub version: bool,
}
