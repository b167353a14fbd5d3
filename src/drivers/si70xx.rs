//! SI7021 / HTU21 temperature+humidity sensors (shared address 0x40).
//!
//! The two parts are electrically indistinguishable by address and speak
//! the same hold-master measurement protocol, so one driver serves both;
//! only discovery cares which is which (via the device-ID register).
//!
//! Each measure command needs conversion time before the next access;
//! skipping the settle produces garbage or bus errors, not a clean NACK.

use std::time::Duration;

use super::ReadingOutcome;
use crate::app::ports::RegisterBus;

/// Measure relative humidity, hold master mode.
pub const CMD_MEASURE_RH: u8 = 0xE5;
/// Measure temperature, hold master mode.
pub const CMD_MEASURE_TEMP: u8 = 0xE3;

/// Read both measurands. Output order is `[temperature, humidity]`,
/// matching the configured measurand order for this family.
pub fn read<B: RegisterBus + ?Sized>(bus: &mut B, addr: u8, settle: Duration) -> ReadingOutcome {
    let mut raw = [0u8; 2];

    bus.read_block(addr, CMD_MEASURE_RH, &mut raw)?;
    bus.settle(settle);
    let humidity = convert_humidity(raw[0], raw[1]);

    bus.read_block(addr, CMD_MEASURE_TEMP, &mut raw)?;
    bus.settle(settle);
    let temperature = convert_temperature(raw[0], raw[1]);

    Ok(vec![temperature, humidity])
}

/// RH% = (code * 125 / 65536) - 6
pub fn convert_humidity(hi: u8, lo: u8) -> f64 {
    let code = f64::from(u16::from(hi) * 256 + u16::from(lo));
    code * 125.0 / 65536.0 - 6.0
}

/// °C = (code * 175.72 / 65536) - 46.85
pub fn convert_temperature(hi: u8, lo: u8) -> f64 {
    let code = f64::from(u16::from(hi) * 256 + u16::from(lo));
    code * 175.72 / 65536.0 - 46.85
}
