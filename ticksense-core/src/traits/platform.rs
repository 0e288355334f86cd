//! Board services used by the sleep governor and synchronous reads

/// Battery probe, sleep and busy-wait hooks
pub trait Platform {
    /// Whether the node runs from battery, `None` if the probe failed.
    fn on_battery(&mut self) -> Option<bool> {
        None
    }

    /// Enter low power for up to `ms`. Returns whether the node slept.
    fn sleep_for(&mut self, _ms: u32) -> bool {
        false
    }

    /// Called repeatedly while a synchronous read waits on a sensor.
    fn tight_loop(&mut self) {}
}

/// A board that never sleeps.
impl Platform for () {}

impl<H: Platform + ?Sized> Platform for &mut H {
    fn on_battery(&mut self) -> Option<bool> {
        (**self).on_battery()
    }

    fn sleep_for(&mut self, ms: u32) -> bool {
        (**self).sleep_for(ms)
    }

    fn tight_loop(&mut self) {
        (**self).tight_loop()
    }
}
