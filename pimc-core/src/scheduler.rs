//! The fixed-slot periodic scheduler driving Hello and Join/Prune Update
//! refreshes, and the goodbye sequence run on shutdown.
//!
//! Grounded on `apps/pimc/scheduler/IPv4Exec.cpp`'s `while (not stopped) {
//! ... sleep(100ms); }` loop and the `ready()`/`fire()` contract shared by
//! `IPv4HelloEvent.hpp`/`IPv4JPUpdateEvent.hpp`/`IPv4GoodbyeEvent.hpp`. The
//! source's compile-time `EventQueue` tuple collapses here into a small
//! sum type dispatched in a fixed order, per the design notes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::PimcResult;
use crate::packet::{HelloPacket, UpdatePacket};
use crate::plan::Update;
use crate::transport::PimTransport;

/// The coarse pacing constant: caps jitter at ±100 ms.
const TICK: Duration = Duration::from_millis(100);

/// Parameters for the Hello refresh.
pub struct HelloParams {
    pub period: Duration,
    pub holdtime: u16,
    pub dr_priority: u32,
    pub generation_id: u32,
}

struct HelloEmitter {
    params: HelloParams,
    next_fire: Option<Instant>,
}

impl HelloEmitter {
    fn new(params: HelloParams) -> Self {
        HelloEmitter {
            params,
            next_fire: None,
        }
    }

    /// Fires immediately on the first tick, then every `period`.
    fn ready(&self, now: Instant) -> bool {
        self.next_fire.map_or(true, |t| now >= t)
    }

    fn fire(&mut self, now: Instant, transport: &PimTransport) -> PimcResult<()> {
        let pkt = HelloPacket::build(
            self.params.holdtime,
            self.params.dr_priority,
            self.params.generation_id,
        );
        transport.send(pkt.as_bytes())?;
        self.next_fire = Some(now + self.params.period);
        debug!("sent Hello (holdtime={})", self.params.holdtime);
        Ok(())
    }
}

struct JpUpdateEmitter {
    period: Duration,
    updates: Vec<Update>,
    next_fire: Instant,
}

impl JpUpdateEmitter {
    /// First fires after `period`, so the startup tick always sends a
    /// Hello before the first Join/Prune refresh.
    fn new(period: Duration, updates: Vec<Update>, start: Instant) -> Self {
        JpUpdateEmitter {
            period,
            updates,
            next_fire: start + period,
        }
    }

    fn ready(&self, now: Instant) -> bool {
        now >= self.next_fire
    }

    fn fire(&mut self, now: Instant, transport: &PimTransport) -> PimcResult<()> {
        for update in &self.updates {
            let pkt = UpdatePacket::build(update);
            transport.send(pkt.as_bytes())?;
        }
        self.next_fire = now + self.period;
        debug!("sent {} Join/Prune update(s)", self.updates.len());
        Ok(())
    }
}

/// Drives the Hello and Join/Prune Update emitters in fixed order (Hello
/// before Join/Prune, within one tick), polling a stop flag between ticks,
/// and runs the goodbye sequence once stopped.
pub struct Scheduler {
    transport: PimTransport,
    hello: HelloEmitter,
    jp: JpUpdateEmitter,
    inverse_updates: Vec<Update>,
    stop: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(
        transport: PimTransport,
        hello_params: HelloParams,
        jp_period: Duration,
        updates: Vec<Update>,
        inverse_updates: Vec<Update>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let now = Instant::now();
        Scheduler {
            transport,
            hello: HelloEmitter::new(hello_params),
            jp: JpUpdateEmitter::new(jp_period, updates, now),
            inverse_updates,
            stop,
        }
    }

    /// Runs until the stop flag is observed, then withdraws the installed
    /// state and sends a holdtime-zero Hello before returning.
    pub fn run(mut self) -> PimcResult<()> {
        loop {
            let now = Instant::now();

            if self.hello.ready(now) {
                self.hello.fire(now, &self.transport)?;
            }
            if self.jp.ready(now) {
                self.jp.fire(now, &self.transport)?;
            }

            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            thread::sleep(TICK);
        }

        info!("stop requested, running goodbye sequence");
        self.goodbye()
    }

    /// Shutdown sequence per §4.5: inverse Join/Prune first, then a
    /// holdtime-zero Hello.
    fn goodbye(&self) -> PimcResult<()> {
        for update in &self.inverse_updates {
            let pkt = UpdatePacket::build(update);
            self.transport.send(pkt.as_bytes())?;
        }
        let goodbye_hello = HelloPacket::build(
            0,
            self.hello.params.dr_priority,
            self.hello.params.generation_id,
        );
        self.transport.send(goodbye_hello.as_bytes())?;
        if self.inverse_updates.is_empty() {
            warn!("goodbye sequence sent with no inverse updates to withdraw");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_emitter_fires_immediately_then_on_period() {
        let mut e = HelloEmitter::new(HelloParams {
            period: Duration::from_secs(30),
            holdtime: 105,
            dr_priority: 1,
            generation_id: 1,
        });
        let t0 = Instant::now();
        assert!(e.ready(t0));
        e.next_fire = Some(t0 + Duration::from_secs(30));
        assert!(!e.ready(t0 + Duration::from_secs(10)));
        assert!(e.ready(t0 + Duration::from_secs(30)));
    }

    #[test]
    fn jp_emitter_does_not_fire_before_first_period() {
        let t0 = Instant::now();
        let e = JpUpdateEmitter::new(Duration::from_secs(60), vec![], t0);
        assert!(!e.ready(t0));
        assert!(!e.ready(t0 + Duration::from_secs(59)));
        assert!(e.ready(t0 + Duration::from_secs(60)));
    }
}
