//! Internal log macros
//!
//! Forward to the `log` crate when the `log` feature is enabled and expand
//! to nothing otherwise, so `no_std` builds carry no formatting code.

#[cfg(feature = "log")]
macro_rules! meas_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! meas_debug {
    ($($arg:tt)*) => {{}};
}

#[cfg(feature = "log")]
macro_rules! meas_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! meas_warn {
    ($($arg:tt)*) => {{}};
}

#[cfg(feature = "log")]
macro_rules! meas_error {
    ($($arg:tt)*) => { log::error!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! meas_error {
    ($($arg:tt)*) => {{}};
}
