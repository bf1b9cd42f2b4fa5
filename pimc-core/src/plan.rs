//! The Join/Prune plan builder: a pure function from validated
//! configuration to the ordered `Update` lists sent on the wire, and their
//! shutdown-time inverse.
//!
//! Grounded on the group-record construction and message-splitting
//! behavior of `apps/pimc/config/MulticastConfigLoader.hpp` and the
//! `PIMSMv2JPEncoder` usage in the original sources.

use crate::config::{GroupConfig, JPConfig, PIMSMConfig};
use crate::net::IPv4Address;
use crate::wire::SourceFlags;

/// One source entry in a group record: an address plus its R/W/S flags.
/// `Update`'s `joined` and `pruned` lists are both built from this shape —
/// the data model names them `JoinedSource`/`PrunedSource`, but since an
/// entry's meaning comes entirely from which list it sits in, one struct
/// serves both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceEntry {
    pub addr: IPv4Address,
    pub flags: SourceFlags,
}

pub type JoinedSource = SourceEntry;
pub type PrunedSource = SourceEntry;

/// The Join/Prune record for one group within an `Update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupUpdate {
    pub group: IPv4Address,
    pub joined: Vec<JoinedSource>,
    pub pruned: Vec<PrunedSource>,
}

impl GroupUpdate {
    /// The serialized length of this group's record: `encoded_group(8) +
    /// num_joined(2) + num_pruned(2) + 8 bytes per source`.
    pub fn serialized_len(&self) -> usize {
        GROUP_FIXED_BYTES + SOURCE_BYTES * (self.joined.len() + self.pruned.len())
    }
}

/// A single on-wire Join/Prune message body, targeting one upstream
/// neighbor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub upstream: IPv4Address,
    pub holdtime: u16,
    pub groups: Vec<GroupUpdate>,
}

impl Update {
    /// The serialized length of the whole message: the 10-byte fixed
    /// prefix plus each group's record.
    pub fn serialized_len(&self) -> usize {
        FIXED_BODY_BYTES + self.groups.iter().map(GroupUpdate::serialized_len).sum::<usize>()
    }

    /// Builds the shutdown-time inverse of this update: every Join becomes
    /// a Prune and vice versa, per group, with ordering preserved.
    pub fn inverse(&self) -> Update {
        Update {
            upstream: self.upstream,
            holdtime: self.holdtime,
            groups: self
                .groups
                .iter()
                .map(|g| GroupUpdate {
                    group: g.group,
                    joined: g.pruned.clone(),
                    pruned: g.joined.clone(),
                })
                .collect(),
        }
    }
}

/// Fixed body prefix: encoded unicast upstream (6) + reserved (1) +
/// num_groups (1) + holdtime (2).
pub const FIXED_BODY_BYTES: usize = 10;
/// Per-group fixed overhead: encoded group (8) + num_joined/num_pruned (4).
pub const GROUP_FIXED_BYTES: usize = 12;
/// Per-source encoded size.
pub const SOURCE_BYTES: usize = 8;
/// The ceiling on a single Join/Prune message's serialized length.
pub const MAX_MESSAGE_BYTES: usize = 1400;

/// Builds a group's natural record from its configuration: an RP entry (if
/// any) first among the joined sources, then SPT-joined sources; pruned
/// sources in declaration order.
fn natural_record(group: &GroupConfig) -> GroupUpdate {
    let mut joined = Vec::new();
    let mut pruned = Vec::new();

    if let Some(rpt) = &group.rpt {
        joined.push(SourceEntry {
            addr: rpt.rp,
            flags: SourceFlags::rp_entry(),
        });
        for &s in &rpt.prunes {
            pruned.push(SourceEntry {
                addr: s,
                flags: SourceFlags::rpt_pruned(),
            });
        }
    }
    for &s in &group.spt {
        joined.push(SourceEntry {
            addr: s,
            flags: SourceFlags::spt_joined(),
        });
    }

    GroupUpdate {
        group: group.group,
        joined,
        pruned,
    }
}

enum Entry {
    Joined(JoinedSource),
    Pruned(PrunedSource),
}

/// Splits one oversized group record into consecutive chunks, each no
/// larger than `max_sources` total sources, preserving the natural order
/// (joined sources, then pruned sources) so the RP entry — always first —
/// lands only in the first chunk.
fn split_record(record: GroupUpdate, max_sources: usize) -> Vec<GroupUpdate> {
    let group = record.group;
    let mut seq: Vec<Entry> = record.joined.into_iter().map(Entry::Joined).collect();
    seq.extend(record.pruned.into_iter().map(Entry::Pruned));

    let mut out = Vec::new();
    let mut iter = seq.into_iter();
    loop {
        let mut joined = Vec::new();
        let mut pruned = Vec::new();
        for _ in 0..max_sources {
            match iter.next() {
                Some(Entry::Joined(e)) => joined.push(e),
                Some(Entry::Pruned(e)) => pruned.push(e),
                None => break,
            }
        }
        if joined.is_empty() && pruned.is_empty() {
            break;
        }
        out.push(GroupUpdate {
            group,
            joined,
            pruned,
        });
    }
    out
}

/// Packs validated configuration into the ordered list of `Update`s sent
/// to the single configured neighbor, per the packing algorithm: groups are
/// admitted whole when they fit, oversized groups are split, and
/// configuration order is preserved throughout.
pub fn build_updates(config: &JPConfig, pimsm: &PIMSMConfig) -> Vec<Update> {
    let max_sources_alone = (MAX_MESSAGE_BYTES - FIXED_BODY_BYTES - GROUP_FIXED_BYTES) / SOURCE_BYTES;

    let mut updates = Vec::new();
    let mut current: Vec<GroupUpdate> = Vec::new();
    let mut current_bytes = FIXED_BODY_BYTES;

    let seal = |groups: Vec<GroupUpdate>, updates: &mut Vec<Update>| {
        if !groups.is_empty() {
            updates.push(Update {
                upstream: pimsm.neighbor,
                holdtime: pimsm.jp_holdtime.as_secs() as u16,
                groups,
            });
        }
    };

    for group in config.groups() {
        let record = natural_record(group);
        let len = record.serialized_len();

        if len > MAX_MESSAGE_BYTES - FIXED_BODY_BYTES {
            if !current.is_empty() {
                seal(std::mem::take(&mut current), &mut updates);
                current_bytes = FIXED_BODY_BYTES;
            }
            for chunk in split_record(record, max_sources_alone) {
                updates.push(Update {
                    upstream: pimsm.neighbor,
                    holdtime: pimsm.jp_holdtime.as_secs() as u16,
                    groups: vec![chunk],
                });
            }
            continue;
        }

        if current_bytes + len > MAX_MESSAGE_BYTES {
            seal(std::mem::take(&mut current), &mut updates);
            current_bytes = FIXED_BODY_BYTES;
        }
        current_bytes += len;
        current.push(record);
    }
    seal(current, &mut updates);

    updates
}

/// Builds the shutdown-time inverse of a plan: one inverse update per
/// update, same order.
pub fn inverse_updates(updates: &[Update]) -> Vec<Update> {
    updates.iter().map(Update::inverse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RptConfig;
    use std::time::Duration;

    fn addr(a: u8, b: u8, c: u8, d: u8) -> IPv4Address {
        IPv4Address::new(a, b, c, d)
    }

    fn pimsm() -> PIMSMConfig {
        PIMSMConfig {
            neighbor: addr(10, 0, 0, 1),
            intf_addr: addr(10, 0, 0, 2),
            hello_period: Duration::from_secs(30),
            hello_holdtime: Duration::from_secs(105),
            jp_period: Duration::from_secs(60),
            jp_holdtime: Duration::from_secs(210),
            dr_priority: 1,
            generation_id: 42,
        }
    }

    /// S1 — single (*,G) with one RPT prune.
    #[test]
    fn single_group_with_rpt_prune() {
        let g = GroupConfig::new(
            addr(239, 1, 2, 3),
            Some(RptConfig {
                rp: addr(192, 0, 2, 10),
                prunes: vec![addr(198, 51, 100, 7)],
            }),
            vec![],
        );
        let cfg = JPConfig::build(vec![g]).unwrap();
        let updates = build_updates(&cfg, &pimsm());

        assert_eq!(updates.len(), 1);
        let u = &updates[0];
        assert_eq!(u.groups.len(), 1);
        assert_eq!(u.groups[0].joined, vec![SourceEntry {
            addr: addr(192, 0, 2, 10),
            flags: SourceFlags::rp_entry(),
        }]);
        assert_eq!(u.groups[0].pruned, vec![SourceEntry {
            addr: addr(198, 51, 100, 7),
            flags: SourceFlags::rpt_pruned(),
        }]);
        assert_eq!(u.serialized_len(), 38);

        let inv = u.inverse();
        assert_eq!(inv.groups[0].pruned[0].addr, addr(192, 0, 2, 10));
        assert_eq!(inv.groups[0].joined[0].addr, addr(198, 51, 100, 7));
    }

    /// S2 — two groups share one message.
    #[test]
    fn two_groups_share_one_message() {
        let g1 = GroupConfig::new(addr(239, 1, 1, 1), None, vec![addr(10, 1, 0, 1)]);
        let g2 = GroupConfig::new(addr(239, 1, 1, 2), None, vec![addr(10, 1, 0, 2)]);
        let cfg = JPConfig::build(vec![g1, g2]).unwrap();
        let updates = build_updates(&cfg, &pimsm());

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].groups.len(), 2);
        assert_eq!(updates[0].groups[0].group, addr(239, 1, 1, 1));
        assert_eq!(updates[0].groups[1].group, addr(239, 1, 1, 2));
        assert_eq!(updates[0].serialized_len(), 50);
    }

    /// S4 — packing boundary: many small groups spill into a second update.
    #[test]
    fn packing_boundary_spills_into_next_update() {
        let mut groups = Vec::new();
        for i in 0..200u32 {
            let src = IPv4Address::from_value(0x0A00_0000 + i);
            let grp = IPv4Address::from_value(0xEF00_0000 + i);
            groups.push(GroupConfig::new(grp, None, vec![src]));
        }
        let cfg = JPConfig::build(groups).unwrap();
        let updates = build_updates(&cfg, &pimsm());

        assert!(updates.len() > 1);
        for u in &updates {
            assert!(u.serialized_len() <= MAX_MESSAGE_BYTES);
        }
        let total_groups: usize = updates.iter().map(|u| u.groups.len()).sum();
        assert_eq!(total_groups, 200);

        let all_groups: Vec<IPv4Address> = updates
            .iter()
            .flat_map(|u| u.groups.iter().map(|g| g.group))
            .collect();
        let expected: Vec<IPv4Address> = (0..200u32)
            .map(|i| IPv4Address::from_value(0xEF00_0000 + i))
            .collect();
        assert_eq!(all_groups, expected);
    }

    #[test]
    fn oversized_group_splits_with_rp_entry_only_in_first_chunk() {
        let prunes: Vec<IPv4Address> = (0..180u32)
            .map(|i| IPv4Address::from_value(0x0A00_0000 + i))
            .collect();
        let g = GroupConfig::new(
            addr(239, 9, 9, 9),
            Some(RptConfig {
                rp: addr(192, 0, 2, 1),
                prunes,
            }),
            vec![],
        );
        let cfg = JPConfig::build(vec![g]).unwrap();
        let updates = build_updates(&cfg, &pimsm());

        assert!(updates.len() >= 2, "180 prunes plus RP entry should split");
        let rp_occurrences: usize = updates
            .iter()
            .flat_map(|u| u.groups.iter())
            .filter(|g| g.joined.iter().any(|s| s.flags == SourceFlags::rp_entry()))
            .count();
        assert_eq!(rp_occurrences, 1);
        for u in &updates {
            assert_eq!(u.groups.len(), 1);
            assert_eq!(u.groups[0].group, addr(239, 9, 9, 9));
        }
    }

    #[test]
    fn inverse_of_inverse_is_identity() {
        let g = GroupConfig::new(
            addr(239, 1, 2, 3),
            Some(RptConfig {
                rp: addr(192, 0, 2, 10),
                prunes: vec![addr(198, 51, 100, 7)],
            }),
            vec![addr(198, 51, 100, 8)],
        );
        let cfg = JPConfig::build(vec![g]).unwrap();
        let updates = build_updates(&cfg, &pimsm());
        let u = &updates[0];
        assert_eq!(&u.inverse().inverse(), u);
    }
}
