//! Materializes complete PIM datagram payloads from the wire codec: the
//! Hello packet sent every `helloPeriod`, and the Update packets driven by
//! the Join/Prune plan.

use crate::plan::Update;
use crate::wire::{encode_hello_body, encode_joinprune_body, finalize_packet, PimMessageType};

/// An owned, immutable Hello datagram payload, checksummed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloPacket(Vec<u8>);

impl HelloPacket {
    pub fn build(holdtime: u16, dr_priority: u32, generation_id: u32) -> Self {
        let body = encode_hello_body(holdtime, dr_priority, generation_id);
        HelloPacket(finalize_packet(PimMessageType::Hello, &body))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// An owned, immutable Join/Prune datagram payload, checksummed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePacket(Vec<u8>);

impl UpdatePacket {
    pub fn build(update: &Update) -> Self {
        let body = encode_joinprune_body(update);
        UpdatePacket(finalize_packet(PimMessageType::JoinPrune, &body))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::IPv4Address;
    use crate::plan::{GroupUpdate, SourceEntry};
    use crate::wire::{checksum, SourceFlags};

    #[test]
    fn hello_packet_checksums_to_zero() {
        let pkt = HelloPacket::build(105, 1, 0xCAFEBABE);
        assert_eq!(checksum(pkt.as_bytes()), 0);
        assert_eq!(pkt.as_bytes()[0] >> 4, 2);
        assert_eq!(pkt.as_bytes()[0] & 0x0F, 0);
    }

    #[test]
    fn update_packet_checksums_to_zero() {
        let update = Update {
            upstream: IPv4Address::new(10, 0, 0, 1),
            holdtime: 210,
            groups: vec![GroupUpdate {
                group: IPv4Address::new(239, 1, 2, 3),
                joined: vec![SourceEntry {
                    addr: IPv4Address::new(192, 0, 2, 10),
                    flags: SourceFlags::rp_entry(),
                }],
                pruned: vec![],
            }],
        };
        let pkt = UpdatePacket::build(&update);
        assert_eq!(checksum(pkt.as_bytes()), 0);
        assert_eq!(pkt.as_bytes()[0] & 0x0F, 3);
        assert_eq!(pkt.as_bytes().len(), 4 + update.serialized_len());
    }
}
