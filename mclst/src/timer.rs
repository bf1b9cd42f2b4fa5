//! Wall-clock timeout bookkeeping independent of the poller, grounded on
//! `apps/mclst/Timer.hpp`.
//!
//! The poller (`select`/`polling::Poller::wait`) reports readiness with its
//! own timeout, but a raw-socket receiver sees every UDP packet on the host
//! and must not treat unrelated traffic as a keep-alive. This timer tracks
//! its own `start`/`timestamp` pair in host-time nanoseconds, reset only on
//! an accepted, shown packet.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Host wall-clock time in nanoseconds since the Unix epoch.
pub fn host_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Tracks whether `timeout_sec` seconds have elapsed since the last
/// accepted packet, independent of how often the poller itself wakes up.
pub struct Timer {
    start_ns: u64,
    timestamp_ns: u64,
    timeout_ns: u64,
}

impl Timer {
    pub fn new(timeout: Duration) -> Self {
        let now = host_nanos();
        Timer {
            start_ns: now,
            timestamp_ns: now,
            timeout_ns: timeout.as_nanos() as u64,
        }
    }

    /// Records the host time closest to the poller's return; call this
    /// immediately after every `wait()` call, whether or not it reported
    /// readiness.
    pub fn save(&mut self) {
        self.timestamp_ns = host_nanos();
    }

    /// Call after accepting a packet of interest, or right after reporting
    /// a timeout, to restart the window.
    pub fn reset(&mut self) {
        self.start_ns = self.timestamp_ns;
    }

    pub fn timed_out(&self) -> bool {
        self.timestamp_ns - self.start_ns >= self.timeout_ns
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn does_not_time_out_before_the_threshold() {
        let mut t = Timer::new(Duration::from_secs(5));
        t.timestamp_ns = t.start_ns + Duration::from_secs(4).as_nanos() as u64;
        assert!(!t.timed_out());
    }

    #[test]
    fn times_out_at_the_threshold() {
        let mut t = Timer::new(Duration::from_secs(5));
        t.timestamp_ns = t.start_ns + Duration::from_secs(5).as_nanos() as u64;
        assert!(t.timed_out());
    }

    #[test]
    fn reset_rebases_the_window_on_the_last_saved_timestamp() {
        let mut t = Timer::new(Duration::from_secs(5));
        t.timestamp_ns = t.start_ns + Duration::from_secs(5).as_nanos() as u64;
        assert!(t.timed_out());
        t.reset();
        assert!(!t.timed_out());
        assert_eq!(t.start_ns, t.timestamp_ns);
    }
}
