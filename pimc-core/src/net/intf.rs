//! Host interface table, grounded on `lib/pimc/net/IntfTable.hpp`: a
//! read-only, once-built index of the host's network interfaces by name and
//! by index.

use std::collections::HashMap;

use anyhow::Context;

use super::address::IPv4Address;
use crate::error::{PimcResult, ResultExt, SystemError};

/// A single host interface: its name, kernel ifindex, and IPv4 address if
/// any is configured on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntfInfo {
    pub name: String,
    pub ifindex: u32,
    pub ipv4addr: Option<IPv4Address>,
}

/// A read-only table of the host's interfaces, indexed both by name and by
/// ifindex. Built once at startup; immutable thereafter.
#[derive(Debug, Clone, Default)]
pub struct IntfTable {
    by_name: HashMap<String, IntfInfo>,
    by_index: HashMap<u32, String>,
}

impl IntfTable {
    /// Queries the running host for its interfaces via `getifaddrs(3)`.
    pub fn load() -> PimcResult<Self> {
        let addrs = nix::ifaddrs::getifaddrs()
            .context("unable to query host interfaces")
            .typ(SystemError::Resource)?;

        let mut by_name: HashMap<String, IntfInfo> = HashMap::new();

        for ifaddr in addrs {
            let ifindex = nix::net::if_::if_nametoindex(ifaddr.interface_name.as_str())
                .unwrap_or(0);
            if ifindex == 0 {
                continue;
            }

            let ipv4addr = ifaddr
                .address
                .as_ref()
                .and_then(|a| a.as_sockaddr_in())
                .map(|sin| IPv4Address::from(std::net::Ipv4Addr::from(sin.ip())));

            let entry = by_name
                .entry(ifaddr.interface_name.clone())
                .or_insert_with(|| IntfInfo {
                    name: ifaddr.interface_name.clone(),
                    ifindex,
                    ipv4addr: None,
                });

            if entry.ipv4addr.is_none() {
                entry.ipv4addr = ipv4addr;
            }
        }

        let by_index = by_name
            .values()
            .map(|info| (info.ifindex, info.name.clone()))
            .collect();

        Ok(IntfTable { by_name, by_index })
    }

    /// Builds a table from an explicit list, for tests and for callers that
    /// already have interface data (e.g. from a mocked environment).
    pub fn from_entries(entries: Vec<IntfInfo>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_index = HashMap::new();
        for info in entries {
            by_index.insert(info.ifindex, info.name.clone());
            by_name.insert(info.name.clone(), info);
        }
        IntfTable { by_name, by_index }
    }

    pub fn by_name(&self, name: &str) -> Option<&IntfInfo> {
        self.by_name.get(name)
    }

    pub fn by_index(&self, ifindex: u32) -> Option<&IntfInfo> {
        let name = self.by_index.get(&ifindex)?;
        self.by_name.get(name)
    }

    /// Resolves a CLI-style interface argument: either an interface name or
    /// a dotted-decimal IPv4 address configured on one of the interfaces.
    pub fn resolve(&self, name_or_addr: &str) -> Option<&IntfInfo> {
        if let Some(info) = self.by_name(name_or_addr) {
            return Some(info);
        }
        let addr: IPv4Address = name_or_addr.parse().ok()?;
        self.by_name.values().find(|info| info.ipv4addr == Some(addr))
    }

    pub fn iter(&self) -> impl Iterator<Item = &IntfInfo> {
        self.by_name.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IntfTable {
        IntfTable::from_entries(vec![
            IntfInfo {
                name: "eth0".into(),
                ifindex: 2,
                ipv4addr: Some(IPv4Address::new(10, 0, 0, 2)),
            },
            IntfInfo {
                name: "lo".into(),
                ifindex: 1,
                ipv4addr: Some(IPv4Address::new(127, 0, 0, 1)),
            },
        ])
    }

    #[test]
    fn looks_up_by_name_and_index() {
        let t = sample();
        assert_eq!(t.by_name("eth0").unwrap().ifindex, 2);
        assert_eq!(t.by_index(1).unwrap().name, "lo");
        assert!(t.by_name("nope").is_none());
    }

    #[test]
    fn resolves_by_name_or_address() {
        let t = sample();
        assert_eq!(t.resolve("eth0").unwrap().name, "eth0");
        assert_eq!(t.resolve("10.0.0.2").unwrap().name, "eth0");
        assert!(t.resolve("10.0.0.9").is_none());
    }
}
