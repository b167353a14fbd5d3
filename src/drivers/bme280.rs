//! BME280 temperature/humidity/pressure sensor (address 0x76 or 0x77).
//!
//! Single forced-mode conversion per tick at x1 oversampling: read the
//! factory trimming registers, kick a measurement, wait for it, then
//! burst-read the data block and apply the Bosch double-precision
//! compensation. The part self-clears back to sleep after a forced
//! conversion, so no mode teardown is needed.

use std::time::Duration;

use super::ReadingOutcome;
use crate::app::ports::RegisterBus;
use crate::error::ReadError;

/// First trimming block, 0x88..=0xA1.
pub const REG_CALIB_T_P: u8 = 0x88;
/// Second trimming block, 0xE1..=0xE7 (humidity coefficients).
pub const REG_CALIB_H: u8 = 0xE1;
/// Humidity oversampling control.
pub const REG_CTRL_HUM: u8 = 0xF2;
/// Temperature/pressure oversampling + power mode.
pub const REG_CTRL_MEAS: u8 = 0xF4;
/// Start of the 8-byte pressure/temperature/humidity data block.
pub const REG_DATA: u8 = 0xF7;

/// osrs_t = x1, osrs_p = x1, mode = forced.
const CTRL_MEAS_FORCED_X1: u8 = 0x25;
/// osrs_h = x1.
const CTRL_HUM_X1: u8 = 0x01;

/// Factory trimming coefficients, widened to f64 for the compensation.
struct Trimming {
    t1: f64,
    t2: f64,
    t3: f64,
    p1: f64,
    p2: f64,
    p3: f64,
    p4: f64,
    p5: f64,
    p6: f64,
    p7: f64,
    p8: f64,
    p9: f64,
    h1: f64,
    h2: f64,
    h3: f64,
    h4: f64,
    h5: f64,
    h6: f64,
}

impl Trimming {
    fn parse(b: &[u8; 26], e: &[u8; 7]) -> Self {
        let u16le = |lo: u8, hi: u8| f64::from(u16::from(lo) | (u16::from(hi) << 8));
        let i16le = |lo: u8, hi: u8| f64::from((u16::from(lo) | (u16::from(hi) << 8)) as i16);

        Self {
            t1: u16le(b[0], b[1]),
            t2: i16le(b[2], b[3]),
            t3: i16le(b[4], b[5]),
            p1: u16le(b[6], b[7]),
            p2: i16le(b[8], b[9]),
            p3: i16le(b[10], b[11]),
            p4: i16le(b[12], b[13]),
            p5: i16le(b[14], b[15]),
            p6: i16le(b[16], b[17]),
            p7: i16le(b[18], b[19]),
            p8: i16le(b[20], b[21]),
            p9: i16le(b[22], b[23]),
            // b[24] is 0xA0, reserved.
            h1: f64::from(b[25]),
            h2: i16le(e[0], e[1]),
            h3: f64::from(e[2]),
            // H4/H5 are 12-bit values sharing the nibble at 0xE5.
            h4: f64::from((i32::from(e[3] as i8) << 4) | i32::from(e[4] & 0x0F)),
            h5: f64::from((i32::from(e[5] as i8) << 4) | i32::from(e[4] >> 4)),
            h6: f64::from(e[6] as i8),
        }
    }
}

/// Read all three measurands. Output order is `[temperature, humidity,
/// pressure]` with pressure in hPa.
pub fn read<B: RegisterBus + ?Sized>(bus: &mut B, addr: u8, settle: Duration) -> ReadingOutcome {
    let mut b1 = [0u8; 26];
    bus.read_block(addr, REG_CALIB_T_P, &mut b1)?;
    let mut b2 = [0u8; 7];
    bus.read_block(addr, REG_CALIB_H, &mut b2)?;
    let trim = Trimming::parse(&b1, &b2);

    // ctrl_hum must be written before ctrl_meas to take effect.
    bus.write_block(addr, REG_CTRL_HUM, &[CTRL_HUM_X1])?;
    bus.write_block(addr, REG_CTRL_MEAS, &[CTRL_MEAS_FORCED_X1])?;
    bus.settle(settle);

    let mut d = [0u8; 8];
    bus.read_block(addr, REG_DATA, &mut d)?;

    let adc_p = (u32::from(d[0]) << 12) | (u32::from(d[1]) << 4) | (u32::from(d[2]) >> 4);
    let adc_t = (u32::from(d[3]) << 12) | (u32::from(d[4]) << 4) | (u32::from(d[5]) >> 4);
    let adc_h = (u32::from(d[6]) << 8) | u32::from(d[7]);

    let (temperature, t_fine) = compensate_temperature(f64::from(adc_t), &trim);
    let humidity = compensate_humidity(f64::from(adc_h), t_fine, &trim);
    let pressure_pa = compensate_pressure(f64::from(adc_p), t_fine, &trim).ok_or_else(|| {
        ReadError::SensorValueInvalid("pressure compensation divide by zero".into())
    })?;

    Ok(vec![temperature, humidity, pressure_pa / 100.0])
}

/// Returns (°C, t_fine). t_fine feeds the other two compensations.
fn compensate_temperature(adc_t: f64, c: &Trimming) -> (f64, f64) {
    let var1 = (adc_t / 16384.0 - c.t1 / 1024.0) * c.t2;
    let var2 = (adc_t / 131072.0 - c.t1 / 8192.0).powi(2) * c.t3;
    let t_fine = var1 + var2;
    (t_fine / 5120.0, t_fine)
}

/// Returns Pa, or None when the trimming degenerates (P1 = 0).
fn compensate_pressure(adc_p: f64, t_fine: f64, c: &Trimming) -> Option<f64> {
    let var1 = t_fine / 2.0 - 64000.0;
    let mut var2 = var1 * var1 * c.p6 / 32768.0;
    var2 += var1 * c.p5 * 2.0;
    var2 = var2 / 4.0 + c.p4 * 65536.0;
    let var1 = (c.p3 * var1 * var1 / 524288.0 + c.p2 * var1) / 524288.0;
    let var1 = (1.0 + var1 / 32768.0) * c.p1;
    if var1 == 0.0 {
        return None;
    }
    let p = 1048576.0 - adc_p;
    let p = (p - var2 / 4096.0) * 6250.0 / var1;
    let var1 = c.p9 * p * p / 2147483648.0;
    let var2 = p * c.p8 / 32768.0;
    Some(p + (var1 + var2 + c.p7) / 16.0)
}

/// Returns %RH clamped to 0..=100.
fn compensate_humidity(adc_h: f64, t_fine: f64, c: &Trimming) -> f64 {
    let h = t_fine - 76800.0;
    let h = (adc_h - (c.h4 * 64.0 + c.h5 / 16384.0 * h))
        * (c.h2 / 65536.0 * (1.0 + c.h6 / 67108864.0 * h * (1.0 + c.h3 / 67108864.0 * h)));
    let h = h * (1.0 - c.h1 * h / 524288.0);
    h.clamp(0.0, 100.0)
}
