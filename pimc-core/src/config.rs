//! Validated Join/Prune configuration: `GroupConfig`, `JPConfig` and
//! `PIMSMConfig`, plus the semantic invariants from the data model.
//!
//! Grounded on `apps/pimc/config/MulticastConfigLoader.hpp`'s
//! `GroupConfigBuilderBase` (duplicate-source rejection, the
//! `MaxPruneSGrptLen` cap) and `PIMSMConfig.hpp`/`PIMCConfig.hpp` (the
//! session parameters). YAML parsing itself is a concern of the `pimc`
//! binary crate; this module only owns the values once they are parsed and
//! the rules that make a set of values valid.

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;

use crate::net::IPv4Address;

/// Per §4.2: the protocol-parameter cap on how many sources may be pruned
/// off the shared tree for a single group.
pub const MAX_PRUNE_SGRPT_LEN: usize = 180;

/// One semantic violation of the configuration invariants, carrying enough
/// context for a caller to report it against its own source locations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("group {group} is not a multicast address")]
    GroupNotMulticast { group: IPv4Address },
    #[error("RP {rp} for group {group} is not a valid unicast address")]
    RpNotUnicast { group: IPv4Address, rp: IPv4Address },
    #[error("group {group} has neither a Join(*,G) nor any Join(S,G) entries")]
    GroupHasNoJoins { group: IPv4Address },
    #[error("source {source} appears more than once for group {group}")]
    DuplicateSource {
        group: IPv4Address,
        source: IPv4Address,
    },
    #[error(
        "group {group} prunes {count} sources, exceeding the MaxPruneSGrptLen limit of {limit}"
    )]
    TooManyPrunes {
        group: IPv4Address,
        count: usize,
        limit: usize,
    },
    #[error("group {group} is declared more than once")]
    DuplicateGroup { group: IPv4Address },
    #[error("neighbor address {0} is not a valid unicast address")]
    NeighborNotUnicast(IPv4Address),
    #[error("interface address {0} is not a valid unicast address")]
    IntfAddrNotUnicast(IPv4Address),
}

/// Presence means Join(*,G); `prunes` is the set of sources to suppress
/// on the shared tree, i.e. Prune(S,G,rpt).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RptConfig {
    pub rp: IPv4Address,
    pub prunes: Vec<IPv4Address>,
}

/// The full Join/Prune configuration for one multicast group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupConfig {
    pub group: IPv4Address,
    pub rpt: Option<RptConfig>,
    pub spt: Vec<IPv4Address>,
}

impl GroupConfig {
    pub fn new(group: IPv4Address, rpt: Option<RptConfig>, spt: Vec<IPv4Address>) -> Self {
        GroupConfig { group, rpt, spt }
    }

    /// Validates this group's invariants in isolation, appending any
    /// violations to `errors`. Does not check cross-group uniqueness; that
    /// is `JPConfig::build`'s job.
    fn validate(&self, errors: &mut Vec<ConfigError>) {
        if !self.group.is_mcast() {
            errors.push(ConfigError::GroupNotMulticast { group: self.group });
        }

        if let Some(rpt) = &self.rpt {
            if !rpt.rp.is_unicast() {
                errors.push(ConfigError::RpNotUnicast {
                    group: self.group,
                    rp: rpt.rp,
                });
            }
            if rpt.prunes.len() > MAX_PRUNE_SGRPT_LEN {
                errors.push(ConfigError::TooManyPrunes {
                    group: self.group,
                    count: rpt.prunes.len(),
                    limit: MAX_PRUNE_SGRPT_LEN,
                });
            }
        }

        if self.rpt.is_none() && self.spt.is_empty() {
            errors.push(ConfigError::GroupHasNoJoins { group: self.group });
        }

        let mut seen: HashSet<IPv4Address> = HashSet::new();
        let mut note_dup = |errors: &mut Vec<ConfigError>, source: IPv4Address| {
            if !seen.insert(source) {
                errors.push(ConfigError::DuplicateSource {
                    group: self.group,
                    source,
                });
            }
        };
        if let Some(rpt) = &self.rpt {
            note_dup(errors, rpt.rp);
            for &s in &rpt.prunes {
                note_dup(errors, s);
            }
        }
        for &s in &self.spt {
            note_dup(errors, s);
        }
    }
}

/// An ordered sequence of `GroupConfig` with unique group addresses,
/// first-declaration order preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JPConfig {
    groups: Vec<GroupConfig>,
}

impl JPConfig {
    /// Validates and assembles a `JPConfig` from groups in declaration
    /// order. Returns every violation found, rather than stopping at the
    /// first one, the way the YAML builder accumulates errors across a
    /// whole file.
    pub fn build(groups: Vec<GroupConfig>) -> Result<Self, Vec<ConfigError>> {
        let mut errors = Vec::new();
        let mut seen_groups: HashSet<IPv4Address> = HashSet::new();

        for g in &groups {
            if !seen_groups.insert(g.group) {
                errors.push(ConfigError::DuplicateGroup { group: g.group });
            }
            g.validate(&mut errors);
        }

        if errors.is_empty() {
            Ok(JPConfig { groups })
        } else {
            Err(errors)
        }
    }

    pub fn groups(&self) -> &[GroupConfig] {
        &self.groups
    }
}

/// Session-wide parameters for the single upstream neighbor this emitter
/// drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PIMSMConfig {
    pub neighbor: IPv4Address,
    pub intf_addr: IPv4Address,
    pub hello_period: Duration,
    pub hello_holdtime: Duration,
    pub jp_period: Duration,
    pub jp_holdtime: Duration,
    pub dr_priority: u32,
    pub generation_id: u32,
}

impl PIMSMConfig {
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();
        if !self.neighbor.is_unicast() {
            errors.push(ConfigError::NeighborNotUnicast(self.neighbor));
        }
        if !self.intf_addr.is_unicast() {
            errors.push(ConfigError::IntfAddrNotUnicast(self.intf_addr));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Draws the process-lifetime Generation ID: a random 32-bit nonce
/// neighbors use to detect a restart.
pub fn random_generation_id() -> u32 {
    rand::random()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(a: u8, b: u8, c: u8, d: u8) -> IPv4Address {
        IPv4Address::new(a, b, c, d)
    }

    #[test]
    fn accepts_a_well_formed_single_group() {
        let g = GroupConfig::new(
            addr(239, 1, 2, 3),
            Some(RptConfig {
                rp: addr(192, 0, 2, 10),
                prunes: vec![addr(198, 51, 100, 7)],
            }),
            vec![],
        );
        assert!(JPConfig::build(vec![g]).is_ok());
    }

    #[test]
    fn rejects_non_multicast_group() {
        let g = GroupConfig::new(addr(10, 0, 0, 0), None, vec![addr(10, 0, 0, 5)]);
        let errs = JPConfig::build(vec![g]).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, ConfigError::GroupNotMulticast { .. })));
    }

    #[test]
    fn rejects_group_with_neither_rpt_nor_spt() {
        let g = GroupConfig::new(addr(239, 1, 2, 3), None, vec![]);
        let errs = JPConfig::build(vec![g]).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, ConfigError::GroupHasNoJoins { .. })));
    }

    #[test]
    fn rejects_source_overlap_between_rpt_prunes_and_spt() {
        let g = GroupConfig::new(
            addr(239, 1, 2, 3),
            Some(RptConfig {
                rp: addr(192, 0, 2, 10),
                prunes: vec![addr(198, 51, 100, 7)],
            }),
            vec![addr(198, 51, 100, 7)],
        );
        let errs = JPConfig::build(vec![g]).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, ConfigError::DuplicateSource { .. })));
    }

    #[test]
    fn rejects_too_many_prunes() {
        let prunes: Vec<IPv4Address> = (0..=MAX_PRUNE_SGRPT_LEN)
            .map(|i| IPv4Address::from_value(0x0A00_0000 + i as u32))
            .collect();
        let g = GroupConfig::new(
            addr(239, 1, 2, 3),
            Some(RptConfig {
                rp: addr(192, 0, 2, 10),
                prunes,
            }),
            vec![],
        );
        let errs = JPConfig::build(vec![g]).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, ConfigError::TooManyPrunes { .. })));
    }

    #[test]
    fn rejects_duplicate_group_declaration() {
        let g1 = GroupConfig::new(addr(239, 1, 2, 3), None, vec![addr(10, 0, 0, 1)]);
        let g2 = GroupConfig::new(addr(239, 1, 2, 3), None, vec![addr(10, 0, 0, 2)]);
        let errs = JPConfig::build(vec![g1, g2]).unwrap_err();
        assert!(errs
            .iter()
            .any(|e| matches!(e, ConfigError::DuplicateGroup { .. })));
    }

    #[test]
    fn preserves_declaration_order() {
        let g1 = GroupConfig::new(addr(239, 1, 2, 1), None, vec![addr(10, 0, 0, 1)]);
        let g2 = GroupConfig::new(addr(239, 1, 2, 2), None, vec![addr(10, 0, 0, 2)]);
        let cfg = JPConfig::build(vec![g1.clone(), g2.clone()]).unwrap();
        assert_eq!(cfg.groups(), &[g1, g2]);
    }

    #[test]
    fn session_params_require_unicast_neighbor_and_intf() {
        let cfg = PIMSMConfig {
            neighbor: IPv4Address::new(224, 0, 0, 13),
            intf_addr: addr(10, 0, 0, 2),
            hello_period: Duration::from_secs(30),
            hello_holdtime: Duration::from_secs(105),
            jp_period: Duration::from_secs(60),
            jp_holdtime: Duration::from_secs(210),
            dr_priority: 1,
            generation_id: 42,
        };
        assert!(cfg.validate().is_err());
    }
}
