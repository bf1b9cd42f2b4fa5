//! Serializes a Join/Prune plan [`Update`](crate::plan::Update) into the
//! message body described in §4.1: `encoded_unicast_upstream(6) |
//! reserved(1) | num_groups(1) | holdtime(2)`, followed by each group's
//! record.

use crate::plan::Update;
use crate::wire::{EncodedGroupAddr, EncodedSourceAddr, EncodedUnicastAddr};

/// Encodes the Join/Prune body for `update`.
pub fn encode_joinprune_body(update: &Update) -> Vec<u8> {
    let mut buf = Vec::with_capacity(update.serialized_len());

    buf.extend_from_slice(&EncodedUnicastAddr(update.upstream).encode());
    buf.push(0); // reserved
    buf.push(update.groups.len() as u8);
    buf.extend_from_slice(&update.holdtime.to_be_bytes());

    for group in &update.groups {
        buf.extend_from_slice(&EncodedGroupAddr(group.group).encode());
        buf.extend_from_slice(&(group.joined.len() as u16).to_be_bytes());
        buf.extend_from_slice(&(group.pruned.len() as u16).to_be_bytes());
        for source in &group.joined {
            buf.extend_from_slice(
                &EncodedSourceAddr {
                    addr: source.addr,
                    flags: source.flags,
                }
                .encode(),
            );
        }
        for source in &group.pruned {
            buf.extend_from_slice(
                &EncodedSourceAddr {
                    addr: source.addr,
                    flags: source.flags,
                }
                .encode(),
            );
        }
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::IPv4Address;
    use crate::plan::{GroupUpdate, SourceEntry};
    use crate::wire::SourceFlags;

    #[test]
    fn encodes_body_length_matching_update_serialized_len() {
        let update = Update {
            upstream: IPv4Address::new(10, 0, 0, 1),
            holdtime: 210,
            groups: vec![GroupUpdate {
                group: IPv4Address::new(239, 1, 2, 3),
                joined: vec![SourceEntry {
                    addr: IPv4Address::new(192, 0, 2, 10),
                    flags: SourceFlags::rp_entry(),
                }],
                pruned: vec![SourceEntry {
                    addr: IPv4Address::new(198, 51, 100, 7),
                    flags: SourceFlags::rpt_pruned(),
                }],
            }],
        };
        let body = encode_joinprune_body(&update);
        assert_eq!(body.len(), update.serialized_len());
        assert_eq!(&body[0..6], &[1, 0, 10, 0, 0, 1]);
        assert_eq!(body[6], 0);
        assert_eq!(body[7], 1);
        assert_eq!(&body[8..10], &210u16.to_be_bytes());
    }
}
