//! Sleep governor
//!
//! Picks a nap that ends a safe margin before the nearest of the next
//! scheduler deadline and the next transmit tick:
//!
//! ```text
//!   now              next sample        next send
//!    |----------------------|----------------|
//!    |<--- nap --->|<margin>|
//! ```
//!
//! Sleeping is skipped when the power policy forbids it, when either
//! deadline has already passed, and when the nap would be shorter than the
//! minimum worth taking.

use crate::config::PowerMode;
use crate::cycle::TransmitCycle;
use crate::scheduler::Scheduler;
use crate::time::Timestamp;
use crate::traits::Platform;

/// Why the governor did or did not sleep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepDecision {
    /// Power policy does not allow sleep
    PowerPolicy,
    /// The scheduler deadline has passed
    SampleDue,
    /// The transmit tick is over
    SendDue,
    /// Nap would be shorter than the minimum
    TooShort,
    /// Asked the platform to sleep for this long
    Slept {
        /// Requested nap (milliseconds)
        ms: u32,
        /// Whether the platform actually slept
        entered: bool,
    },
}

/// Derives safe nap durations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepGovernor {
    mode: PowerMode,
    min_sleep_ms: u32,
    last_slept: bool,
}

impl SleepGovernor {
    /// New governor
    pub const fn new(mode: PowerMode, min_sleep_ms: u32) -> Self {
        Self { mode, min_sleep_ms, last_slept: false }
    }

    /// Current power policy
    pub fn power_mode(&self) -> PowerMode {
        self.mode
    }

    /// Change the power policy
    pub fn set_power_mode(&mut self, mode: PowerMode) {
        self.mode = mode;
    }

    fn may_sleep<H: Platform + ?Sized>(&self, platform: &mut H) -> bool {
        match self.mode {
            PowerMode::Auto => platform.on_battery() == Some(true),
            PowerMode::Battery => true,
            PowerMode::Plugged => false,
        }
    }

    /// Nap length for the given deadlines, if one is worth taking.
    pub fn nap_ms(&self, scheduler: &Scheduler, cycle: &TransmitCycle, now: Timestamp) -> Result<u32, SleepDecision> {
        if scheduler.time_to_next(now) == 0 {
            return Err(SleepDecision::SampleDue);
        }
        if cycle.elapsed(now) >= cycle.interval_ms() as u64 {
            return Err(SleepDecision::SendDue);
        }
        let nap = scheduler.time_to_next(now).min(cycle.time_to_next(now));
        if nap < self.min_sleep_ms as u64 {
            return Err(SleepDecision::TooShort);
        }
        Ok((nap - self.min_sleep_ms as u64).min(u32::MAX as u64) as u32)
    }

    /// Sleep if policy and deadlines allow.
    pub fn maybe_sleep<H: Platform + ?Sized>(
        &mut self,
        scheduler: &Scheduler,
        cycle: &TransmitCycle,
        platform: &mut H,
        now: Timestamp,
    ) -> SleepDecision {
        if !self.may_sleep(platform) {
            return SleepDecision::PowerPolicy;
        }
        let ms = match self.nap_ms(scheduler, cycle, now) {
            Ok(ms) => ms,
            Err(decision) => return decision,
        };
        if self.last_slept {
            meas_debug!("Woke from sleep.");
            self.last_slept = false;
        }
        meas_debug!("Sleeping for {}ms", ms);
        let entered = platform.sleep_for(ms);
        self.last_slept = entered;
        SleepDecision::Slept { ms, entered }
    }
}
