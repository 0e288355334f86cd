//! Reference sensor drivers
//!
//! Concrete drivers normally live with the board support code. The pulse
//! counter is kept here because it is the one driver whose state is shared
//! with interrupt context.

pub mod pulse;

pub use pulse::PulseCounter;
