//! Logging setup: a console sink via `pretty_env_logger`, or — when the
//! configuration names a directory — an append-only file sink named
//! `pimc-YYYYMMDD-HHMMSS.log`.

use std::fs::OpenOptions;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use env_logger::Target;
use log::LevelFilter;
use pimc_core::error::{PimcResult, ResultExt, SystemError};

/// Initializes the global logger. `level` is an `env_logger`-style filter
/// string (`RUST_LOG` syntax); `dir`, if given, redirects output to a
/// timestamped file in that directory instead of stderr.
pub fn init(level: &str, dir: Option<&Path>) -> PimcResult<()> {
    let mut builder = pretty_env_logger::formatted_builder();
    builder
        .parse_filters(level)
        .filter_module("polling", LevelFilter::Off)
        .format_timestamp_secs();

    if let Some(dir) = dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("unable to create log directory {}", dir.display()))
            .typ(SystemError::Config)?;
        let path = dir.join(format!("pimc-{}.log", timestamp_for_filename()));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("unable to open log file {}", path.display()))
            .typ(SystemError::Config)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder
        .try_init()
        .context("logger already initialized")
        .typ(SystemError::Config)?;
    log_panics::init();
    Ok(())
}

/// Renders the current wall-clock time as `YYYYMMDD-HHMMSS` in UTC, without
/// pulling in a calendar dependency for one filename.
fn timestamp_for_filename() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let (y, mo, d, h, mi, s) = civil_from_unix_secs(secs);
    format!("{y:04}{mo:02}{d:02}-{h:02}{mi:02}{s:02}")
}

/// Howard Hinnant's `civil_from_days` algorithm, adapted to also split out
/// the time-of-day component.
fn civil_from_unix_secs(secs: u64) -> (i64, u32, u32, u32, u32, u32) {
    let days = secs / 86_400;
    let time_of_day = secs % 86_400;
    let (h, mi, s) = (time_of_day / 3600, (time_of_day / 60) % 60, time_of_day % 60);

    let z = days as i64 + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let y = if m <= 2 { y + 1 } else { y };

    (y, m, d, h as u32, mi as u32, s as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_converts_to_1970_01_01() {
        assert_eq!(civil_from_unix_secs(0), (1970, 1, 1, 0, 0, 0));
    }

    #[test]
    fn known_timestamp_round_trips() {
        // 2024-03-05 12:34:56 UTC
        assert_eq!(civil_from_unix_secs(1_709_642_096), (2024, 3, 5, 12, 34, 56));
    }
}
