//! Per-flow receive statistics, grounded on `apps/mclst/RxStats.hpp`.
//!
//! Differs from the C++ original in one respect: iteration order is
//! insertion order (a `Vec` of flow ids alongside the map), not the
//! `std::set`-sorted order the original used, since display should
//! reflect the order flows were first observed.

use std::collections::HashMap;

use pimc_core::net::IPv4Address;

/// Packs a flow's `(source, sport, dport)` triple into a 64-bit id:
/// `(dport << 48) | (source << 16) | sport`.
pub const fn flow_id(source: IPv4Address, sport: u16, dport: u16) -> u64 {
    ((dport as u64) << 48) | ((source.value() as u64) << 16) | (sport as u64)
}

pub const fn flow_source(id: u64) -> IPv4Address {
    IPv4Address::from_value(((id >> 16) & 0xFFFF_FFFF) as u32)
}

pub const fn flow_sport(id: u64) -> u16 {
    (id & 0xFFFF) as u16
}

pub const fn flow_dport(id: u64) -> u16 {
    ((id >> 48) & 0xFFFF) as u16
}

/// Ethernet MAC header (12, excl. VLAN) + IPv4 header (20) + UDP header (8)
/// + FCS (4) = 44 bytes of framing added to every packet's UDP payload size.
const FRAMING_BYTES: u64 = 12 + 20 + 8 + 4;

/// Packet/byte counters for one flow. `bytes` includes the framing
/// overhead of every counted packet, not just UDP payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowStats {
    pkts: u64,
    bytes: u64,
}

impl FlowStats {
    fn new(udp_payload_bytes: u64) -> Self {
        FlowStats {
            pkts: 1,
            bytes: FRAMING_BYTES + udp_payload_bytes,
        }
    }

    fn add(&mut self, udp_payload_bytes: u64) {
        self.pkts += 1;
        self.bytes += FRAMING_BYTES + udp_payload_bytes;
    }

    pub fn pkts(&self) -> u64 {
        self.pkts
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Average packet size in bytes, including framing.
    pub fn aps(&self) -> f64 {
        self.bytes as f64 / self.pkts as f64
    }
}

/// Insertion-ordered per-flow statistics accumulated over one run, plus the
/// wall-clock duration of the observation window.
#[derive(Debug, Default)]
pub struct RxStats {
    by_id: HashMap<u64, FlowStats>,
    order: Vec<u64>,
}

impl RxStats {
    pub fn new() -> Self {
        RxStats::default()
    }

    /// Records one received packet for the flow `(source, sport, dport)`.
    pub fn update(&mut self, source: IPv4Address, sport: u16, dport: u16, udp_payload_bytes: u64) {
        let id = flow_id(source, sport, dport);
        match self.by_id.get_mut(&id) {
            Some(fs) => fs.add(udp_payload_bytes),
            None => {
                self.by_id.insert(id, FlowStats::new(udp_payload_bytes));
                self.order.push(id);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Iterates flows in the order they were first observed.
    pub fn iter(&self) -> impl Iterator<Item = (IPv4Address, u16, u16, &FlowStats)> {
        self.order.iter().map(move |&id| {
            (
                flow_source(id),
                flow_sport(id),
                flow_dport(id),
                self.by_id.get(&id).expect("flow id in order must be in map"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_id_packs_and_unpacks() {
        let src = IPv4Address::new(192, 0, 2, 10);
        let id = flow_id(src, 5555, 12345);
        assert_eq!(flow_source(id), src);
        assert_eq!(flow_sport(id), 5555);
        assert_eq!(flow_dport(id), 12345);
    }

    #[test]
    fn framing_adds_exactly_44_bytes_per_packet() {
        let src = IPv4Address::new(10, 0, 0, 1);
        let mut stats = RxStats::new();
        stats.update(src, 1, 2, 100);
        stats.update(src, 1, 2, 200);
        let (_, _, _, fs) = stats.iter().next().unwrap();
        assert_eq!(fs.pkts(), 2);
        assert_eq!(fs.bytes(), 2 * 44 + 100 + 200);
    }

    #[test]
    fn iteration_order_is_insertion_order() {
        let mut stats = RxStats::new();
        let a = IPv4Address::new(10, 0, 0, 3);
        let b = IPv4Address::new(10, 0, 0, 1);
        stats.update(b, 1, 9, 10);
        stats.update(a, 1, 9, 10);
        stats.update(b, 1, 9, 10);
        let sources: Vec<_> = stats.iter().map(|(s, _, _, _)| s).collect();
        assert_eq!(sources, vec![b, a]);
    }
}
