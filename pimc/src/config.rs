//! Configuration for `pimc`.
//!
//! A configuration names the single upstream PIM neighbor this emitter
//! drives, the multicast groups to join or prune, and optionally a log
//! file sink. Unknown keys at any level are rejected; `serde_yaml`'s error
//! carries the offending line and column.
//!
//! ```rust
//! # use pimc::config::Config;
//! # let yaml = "
//! PIM-SM:
//!   neighbor: 10.0.0.1
//!   intfAddr: 10.0.0.2
//!   helloPeriod: 30s
//!   helloHoldtime: 105s
//!   jpPeriod: 60s
//!   jpHoldtime: 210s
//!   drPriority: 1
//! Multicast:
//!   239.1.2.3:
//!     Join*:
//!       RP: 192.0.2.10
//!       Prune:
//!         - 198.51.100.7
//! Logging:
//!   level: info
//! # ";
//! # serde_yaml::from_str::<Config>(yaml).unwrap();
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use pimc_core::config::{random_generation_id, ConfigError, GroupConfig, JPConfig, PIMSMConfig, RptConfig};
use pimc_core::error::{PimcResult, ResultExt, SystemError};
use pimc_core::net::IPv4Address;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(rename = "PIM-SM")]
    pub pim_sm: PimSmYaml,
    /// Kept as a raw, order-preserving YAML mapping rather than
    /// `BTreeMap<String, GroupYaml>`: groups must reach the plan builder in
    /// the order they were declared, the same arrival order the original
    /// loader preserves by appending to a `Vec` as it walks the document;
    /// a `BTreeMap` would silently resort them lexicographically instead.
    /// Each value is deserialized into `GroupYaml` individually in
    /// `build_pim_config`.
    #[serde(default, rename = "Multicast")]
    pub multicast: serde_yaml::Mapping,
    #[serde(default, rename = "Logging")]
    pub logging: Option<LoggingYaml>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PimSmYaml {
    pub neighbor: String,
    #[serde(rename = "intfAddr")]
    pub intf_addr: String,
    #[serde(rename = "helloPeriod", with = "humantime_serde")]
    pub hello_period: Duration,
    #[serde(rename = "helloHoldtime", with = "humantime_serde")]
    pub hello_holdtime: Duration,
    #[serde(rename = "jpPeriod", with = "humantime_serde")]
    pub jp_period: Duration,
    #[serde(rename = "jpHoldtime", with = "humantime_serde")]
    pub jp_holdtime: Duration,
    #[serde(rename = "drPriority")]
    pub dr_priority: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct GroupYaml {
    #[serde(rename = "Join*")]
    pub join_star: Option<JoinStarYaml>,
    #[serde(rename = "Join", default)]
    pub join: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct JoinStarYaml {
    #[serde(rename = "RP")]
    pub rp: String,
    #[serde(rename = "Prune", default)]
    pub prune: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LoggingYaml {
    pub level: String,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Reads and parses the YAML file at `path`. Structural errors (unknown
/// keys, malformed scalars) surface `serde_yaml`'s own line/column-tagged
/// message.
pub fn load_yaml(path: &std::path::Path) -> PimcResult<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("unable to read configuration file {}", path.display()))
        .typ(SystemError::Config)?;
    serde_yaml::from_str(&text)
        .with_context(|| format!("invalid configuration in {}", path.display()))
        .typ(SystemError::Config)
}

fn parse_addr(field: &str, s: &str) -> Result<IPv4Address, anyhow::Error> {
    s.parse()
        .map_err(|_| anyhow!("{field}: {s:?} is not a valid IPv4 address"))
}

/// Converts the parsed YAML into the validated `pimc-core` configuration
/// types, drawing a fresh random Generation ID (never read from the file).
pub fn build_pim_config(yaml: &Config) -> PimcResult<(PIMSMConfig, JPConfig)> {
    let pimsm = PIMSMConfig {
        neighbor: parse_addr("PIM-SM.neighbor", &yaml.pim_sm.neighbor).typ(SystemError::Config)?,
        intf_addr: parse_addr("PIM-SM.intfAddr", &yaml.pim_sm.intf_addr).typ(SystemError::Config)?,
        hello_period: yaml.pim_sm.hello_period,
        hello_holdtime: yaml.pim_sm.hello_holdtime,
        jp_period: yaml.pim_sm.jp_period,
        jp_holdtime: yaml.pim_sm.jp_holdtime,
        dr_priority: yaml.pim_sm.dr_priority,
        generation_id: random_generation_id(),
    };
    pimsm
        .validate()
        .map_err(config_errors_to_anyhow)
        .typ(SystemError::Config)?;

    let mut groups = Vec::with_capacity(yaml.multicast.len());
    for (key, value) in &yaml.multicast {
        let group_str = key
            .as_str()
            .ok_or_else(|| anyhow!("Multicast group keys must be strings, got {key:?}"))
            .typ(SystemError::Config)?;
        let group = parse_addr("Multicast group", group_str).typ(SystemError::Config)?;

        let group_yaml: GroupYaml = serde_yaml::from_value(value.clone())
            .with_context(|| format!("invalid configuration for group {group_str}"))
            .typ(SystemError::Config)?;

        let rpt = match &group_yaml.join_star {
            Some(js) => {
                let rp = parse_addr("Join*.RP", &js.rp).typ(SystemError::Config)?;
                let mut prunes = Vec::with_capacity(js.prune.len());
                for s in &js.prune {
                    prunes.push(parse_addr("Join*.Prune", s).typ(SystemError::Config)?);
                }
                Some(RptConfig { rp, prunes })
            }
            None => None,
        };

        let mut spt = Vec::with_capacity(group_yaml.join.len());
        for s in &group_yaml.join {
            spt.push(parse_addr("Join", s).typ(SystemError::Config)?);
        }

        groups.push(GroupConfig::new(group, rpt, spt));
    }

    let jp_config = JPConfig::build(groups)
        .map_err(config_errors_to_anyhow)
        .typ(SystemError::Config)?;

    Ok((pimsm, jp_config))
}

fn config_errors_to_anyhow(errors: Vec<ConfigError>) -> anyhow::Error {
    let joined = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    anyhow!("{joined}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let yaml = r#"
PIM-SM:
  neighbor: 10.0.0.1
  intfAddr: 10.0.0.2
  helloPeriod: 30s
  helloHoldtime: 105s
  jpPeriod: 60s
  jpHoldtime: 210s
  drPriority: 1
Multicast:
  239.1.2.3:
    Join*:
      RP: 192.0.2.10
      Prune:
        - 198.51.100.7
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        let (pimsm, jp) = build_pim_config(&cfg).unwrap();
        assert_eq!(pimsm.neighbor, IPv4Address::new(10, 0, 0, 1));
        assert_eq!(jp.groups().len(), 1);
    }

    #[test]
    fn rejects_unknown_top_level_key() {
        let yaml = r#"
PIM-SM:
  neighbor: 10.0.0.1
  intfAddr: 10.0.0.2
  helloPeriod: 30s
  helloHoldtime: 105s
  jpPeriod: 60s
  jpHoldtime: 210s
  drPriority: 1
Bogus: {}
"#;
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    /// Groups must reach the plan builder in declaration order, not sorted
    /// by their lexical YAML key (`239.1.10.4` < `239.1.2.3` as strings).
    #[test]
    fn preserves_multicast_group_declaration_order() {
        let yaml = r#"
PIM-SM:
  neighbor: 10.0.0.1
  intfAddr: 10.0.0.2
  helloPeriod: 30s
  helloHoldtime: 105s
  jpPeriod: 60s
  jpHoldtime: 210s
  drPriority: 1
Multicast:
  239.1.2.3:
    Join:
      - 10.0.0.1
  239.1.10.4:
    Join:
      - 10.0.0.2
  239.1.9.5:
    Join:
      - 10.0.0.3
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        let (_, jp) = build_pim_config(&cfg).unwrap();
        let order: Vec<IPv4Address> = jp.groups().iter().map(|g| g.group).collect();
        assert_eq!(
            order,
            vec![
                IPv4Address::new(239, 1, 2, 3),
                IPv4Address::new(239, 1, 10, 4),
                IPv4Address::new(239, 1, 9, 5),
            ]
        );
    }
}
