//! Table Sizes and Inline String Limits
//!
//! Everything in the measurement table is statically sized so the whole
//! node state fits in a fixed RAM budget.

/// Maximum number of measurement definitions in one table.
///
/// 25 slots cover a fully populated node (two current clamps, temperature
/// and humidity, light, sound, two pulse counters, battery, firmware
/// version and a dozen Modbus registers) with room to spare.
pub const MAX_MEASUREMENTS: usize = 25;

/// Maximum length of a measurement name in bytes.
///
/// Names travel in every uplink frame, so they are kept to four characters.
pub const MEASURE_NAME_LEN: usize = 4;

/// Maximum length of a text reading in bytes.
pub const VALUE_STR_LEN: usize = 22;
