//! Per-packet metadata handed from a receiver to the output/stats layer,
//! grounded on `apps/mclst/PacketInfo.hpp`.

use pimc_core::net::IPv4Address;

use crate::beacon::BeaconHeader;

/// Large enough to hold the payload of the largest completely reassembled
/// IP/UDP datagram this tool is expected to see.
pub const BUFFER_SIZE: usize = 65536;

/// One received packet, everything the output layer needs to print a line
/// and (if it classifies as [`PacketStatus::AcceptedShow`]) feed the flow
/// statistics.
pub struct PacketInfo {
    pub timestamp: u64,
    pub source: IPv4Address,
    pub sport: u16,
    pub group: IPv4Address,
    pub dport: u16,
    /// Index of the interface the packet arrived on; 0 if unknown.
    pub if_index: u32,
    /// -1 if the TTL could not be determined.
    pub ttl: i16,
    pub payload: Vec<u8>,
    pub beacon: Option<(BeaconHeader, Vec<u8>)>,
}

impl PacketInfo {
    pub fn new(group: IPv4Address) -> Self {
        PacketInfo {
            timestamp: 0,
            source: IPv4Address::DEFAULT,
            sport: 0,
            group,
            dport: 0,
            if_index: 0,
            ttl: -1,
            payload: Vec::new(),
            beacon: None,
        }
    }

    pub fn reset(&mut self) {
        self.timestamp = 0;
        self.if_index = 0;
        self.ttl = -1;
        self.beacon = None;
        self.payload.clear();
    }
}

/// Whether a received datagram should reset the timeout window and/or be
/// counted/shown, per §4.6 and §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketStatus {
    /// Only the raw-socket provider produces this: traffic not destined for
    /// the configured group, dropped before it can reset the timer.
    Filtered,
    /// Accepted (resets the timer) but not shown: dissection produced a
    /// warning instead of usable data.
    AcceptedNoShow,
    /// Accepted, shown, and counted in the flow statistics.
    AcceptedShow,
}
