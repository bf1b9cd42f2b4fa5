//! Validated `mclst` configuration, assembled from [`crate::cli::Cli`] plus
//! a loaded [`IntfTable`], grounded on `apps/mclst/Config.cpp`'s
//! `fromArgs`: parse the positional `group[:port]`, resolve the interface,
//! validate the source/timeout/ttl/count options and the sender/wildcard
//! cross-field rules.

use anyhow::{anyhow, Context};
use pimc_core::error::{PimcResult, ResultExt, SystemError};
use pimc_core::net::{IPv4Address, IntfInfo, IntfTable};

use crate::cli::Cli;

/// A fully validated, immutable run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub group: IPv4Address,
    pub dport: u16,
    pub wildcard: bool,
    pub intf: IntfInfo,
    /// The default address means a (*,G) subscription; otherwise (S,G).
    pub source: IPv4Address,
    pub timeout_sec: u32,
    pub sender: bool,
    pub ttl: u32,
    pub count: u64,
    pub show_payload: bool,
    pub colors: bool,
    pub show_config: bool,
}

/// Splits a `group[:port]` positional into its address, port, and whether
/// the port was wildcarded.
fn parse_group_port(spec: &str) -> PimcResult<(IPv4Address, u16, bool)> {
    if let Some((grp, port)) = spec.split_once(':') {
        let group: IPv4Address = grp
            .parse()
            .map_err(|_| anyhow!("invalid multicast group {grp:?}"))
            .typ(SystemError::Config)?;
        let dport: u16 = port
            .parse()
            .map_err(|_| anyhow!("invalid destination UDP port {port:?}"))
            .typ(SystemError::Config)?;
        if dport == 0 {
            return Err(anyhow!("destination UDP port may not be 0")).typ(SystemError::Config);
        }
        Ok((group, dport, false))
    } else {
        let group: IPv4Address = spec
            .parse()
            .map_err(|_| anyhow!("invalid multicast group/port {spec:?}"))
            .typ(SystemError::Config)?;
        Ok((group, 0, true))
    }
}

fn parse_source(spec: &Option<String>) -> PimcResult<IPv4Address> {
    let Some(spec) = spec else {
        return Ok(IPv4Address::DEFAULT);
    };
    let addr: IPv4Address = spec
        .parse()
        .map_err(|_| anyhow!("invalid source address {spec:?}"))
        .typ(SystemError::Config)?;
    if addr.is_mcast() {
        return Err(anyhow!("source address may not be multicast ({addr})"))
            .typ(SystemError::Config);
    }
    if addr.is_default() {
        return Err(anyhow!("source address may not be default ({addr})"))
            .typ(SystemError::Config);
    }
    if addr.is_local_broadcast() {
        return Err(anyhow!("source address may not be broadcast ({addr})"))
            .typ(SystemError::Config);
    }
    Ok(addr)
}

impl Config {
    /// Validates `cli` against the host's interface table and assembles a
    /// `Config`. `intf_table` is consumed so the chosen `IntfInfo` can be
    /// owned by the result without a lifetime.
    pub fn from_cli(cli: &Cli, intf_table: &IntfTable) -> PimcResult<Self> {
        let group_spec = cli
            .group
            .as_deref()
            .ok_or_else(|| anyhow!("no group and destination port specified"))
            .typ(SystemError::Config)?;
        let (group, dport, wildcard) = parse_group_port(group_spec)?;

        let intf_name = cli
            .interface
            .as_deref()
            .ok_or_else(|| anyhow!("interface is required"))
            .typ(SystemError::Config)?;
        let intf = intf_table
            .resolve(intf_name)
            .ok_or_else(|| anyhow!("unknown interface '{intf_name}'"))
            .typ(SystemError::Config)?;
        let intf = intf.clone();
        if intf.ipv4addr.is_none() {
            return Err(anyhow!("interface {} has no IPv4 address", intf.name))
                .typ(SystemError::Config);
        }

        let source = parse_source(&cli.source)?;

        if !(1..=600).contains(&cli.timeout) {
            return Err(anyhow!(
                "invalid timeout of {} seconds, valid range is 1-600",
                cli.timeout
            ))
            .typ(SystemError::Config);
        }

        if cli.sender && wildcard {
            return Err(anyhow!(
                "the destination port must be specified with the option -s|--sender"
            ))
            .typ(SystemError::Config);
        }
        if !cli.sender && cli.ttl != 255 {
            return Err(anyhow!(
                "the option --ttl may only be specified with the option -s|--sender"
            ))
            .typ(SystemError::Config);
        }
        if !(1..=255).contains(&cli.ttl) {
            return Err(anyhow!(
                "invalid TTL value {}, valid range is 1-255",
                cli.ttl
            ))
            .typ(SystemError::Config);
        }

        let colors = !cli.no_colors && is_stdio_tty();

        Ok(Config {
            group,
            dport,
            wildcard,
            intf,
            source,
            timeout_sec: cli.timeout,
            sender: cli.sender,
            ttl: cli.ttl,
            count: cli.count,
            show_payload: cli.hex_ascii,
            colors,
            show_config: cli.show_config,
        })
    }

    pub fn is_ssm(&self) -> bool {
        !self.source.is_default()
    }
}

fn is_stdio_tty() -> bool {
    use nix::unistd::isatty;
    use std::os::fd::BorrowedFd;

    let stdout = unsafe { BorrowedFd::borrow_raw(1) };
    let stderr = unsafe { BorrowedFd::borrow_raw(2) };
    isatty(&stdout).unwrap_or(false) && isatty(&stderr).unwrap_or(false)
}

/// Prints the resolved configuration, for `--show-config`, grounded on
/// `Config::show()`.
pub fn show(cfg: &Config, intf_table: &IntfTable) -> PimcResult<()> {
    println!("group:      {}", cfg.group);
    if cfg.wildcard {
        println!("port:       * (all ports)");
    } else {
        println!("port:       {}", cfg.dport);
    }
    println!("interface:  {} ({})", cfg.intf.name, cfg.intf.ifindex);
    if let Some(addr) = cfg.intf.ipv4addr {
        println!("intf addr:  {addr}");
    }
    if cfg.is_ssm() {
        println!("source:     {} (SSM)", cfg.source);
    } else {
        println!("source:     * (any)");
    }
    println!("timeout:    {}s", cfg.timeout_sec);
    println!("mode:       {}", if cfg.sender { "sender" } else { "receiver" });
    if cfg.sender {
        println!("ttl:        {}", cfg.ttl);
    }
    println!("count:      {}", if cfg.count == 0 { "unlimited".to_string() } else { cfg.count.to_string() });
    println!("hex-ascii:  {}", cfg.show_payload);
    println!("colors:     {}", cfg.colors);
    println!();
    println!("available interfaces:");
    for info in intf_table.iter() {
        println!(
            "  {:<16} #{:<4} {}",
            info.name,
            info.ifindex,
            info.ipv4addr.map(|a| a.to_string()).unwrap_or_else(|| "-".into())
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> IntfTable {
        IntfTable::from_entries(vec![IntfInfo {
            name: "eth0".into(),
            ifindex: 2,
            ipv4addr: Some(IPv4Address::new(10, 0, 0, 2)),
        }])
    }

    fn base_cli() -> Cli {
        Cli {
            group: Some("239.1.2.3:5000".into()),
            interface: Some("eth0".into()),
            source: None,
            timeout: 5,
            hex_ascii: false,
            sender: false,
            ttl: 255,
            count: 0,
            no_colors: true,
            show_config: false,
            version: false,
        }
    }

    #[test]
    fn parses_group_and_port() {
        let cfg = Config::from_cli(&base_cli(), &table()).unwrap();
        assert_eq!(cfg.group, IPv4Address::new(239, 1, 2, 3));
        assert_eq!(cfg.dport, 5000);
        assert!(!cfg.wildcard);
    }

    #[test]
    fn wildcard_port_is_accepted_for_a_receiver() {
        let mut cli = base_cli();
        cli.group = Some("239.1.2.3".into());
        let cfg = Config::from_cli(&cli, &table()).unwrap();
        assert!(cfg.wildcard);
        assert_eq!(cfg.dport, 0);
    }

    #[test]
    fn sender_requires_explicit_port() {
        let mut cli = base_cli();
        cli.group = Some("239.1.2.3".into());
        cli.sender = true;
        assert!(Config::from_cli(&cli, &table()).is_err());
    }

    #[test]
    fn unknown_interface_is_rejected() {
        let mut cli = base_cli();
        cli.interface = Some("nope0".into());
        assert!(Config::from_cli(&cli, &table()).is_err());
    }

    #[test]
    fn ttl_without_sender_is_rejected() {
        let mut cli = base_cli();
        cli.ttl = 64;
        assert!(Config::from_cli(&cli, &table()).is_err());
    }

    #[test]
    fn timeout_out_of_range_is_rejected() {
        let mut cli = base_cli();
        cli.timeout = 0;
        assert!(Config::from_cli(&cli, &table()).is_err());
        cli.timeout = 601;
        assert!(Config::from_cli(&cli, &table()).is_err());
    }

    #[test]
    fn source_must_be_unicast() {
        let mut cli = base_cli();
        cli.source = Some("239.1.2.3".into());
        assert!(Config::from_cli(&cli, &table()).is_err());
    }
}
