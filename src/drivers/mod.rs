//! Device drivers, one per sensor family.
//!
//! Contract: given a sensor descriptor and a register bus (or the 1-Wire
//! sysfs directory), produce a [`ReadingOutcome`]. A driver failure is
//! all-or-nothing for the sensor: either every measurand has a fresh raw
//! value or a single [`ReadError`] covers the whole sensor for this tick.

pub mod bme280;
pub mod ds18b20;
pub mod si70xx;

use std::path::Path;
use std::time::Duration;

use crate::app::ports::{BusError, RegisterBus};
use crate::config::{Sensor, SensorId, SensorKind};
use crate::error::ReadError;

/// Raw values in the sensor's measurand order, or one error for the
/// whole sensor. Corrections are applied by the caller, never here.
pub type ReadingOutcome = Result<Vec<f64>, ReadError>;

/// Control address of the 8-channel I2C multiplexer.
pub const MUX_ADDR: u8 = 0x70;

/// Wait after a multiplexer channel switch before addressing devices.
pub const MUX_SETTLE: Duration = Duration::from_millis(100);

/// Default conversion settle for the SI7021/HTU21 measure commands.
/// Deployments with faster parts can lower this per sensor via
/// `settle_ms` in the config.
pub const SI70XX_DEFAULT_SETTLE_MS: u64 = 1500;

/// Default wait for a BME280 forced-mode conversion (x1 oversampling).
pub const BME280_DEFAULT_SETTLE_MS: u64 = 10;

/// Route the upstream side of the bus to one multiplexer channel.
pub fn select_channel<B: RegisterBus + ?Sized>(bus: &mut B, channel: u8) -> Result<(), BusError> {
    bus.write_byte(MUX_ADDR, 1 << channel)?;
    bus.settle(MUX_SETTLE);
    Ok(())
}

/// Dispatch one poll attempt to the driver matching the sensor's kind.
///
/// `bus` is `None` when no I2C resource was acquired at startup; an I2C
/// sensor polled in that state reports a bus error rather than touching
/// hardware that is not there.
pub fn read_sensor<B: RegisterBus>(
    sensor: &Sensor,
    bus: Option<&mut B>,
    w1_root: &Path,
) -> ReadingOutcome {
    match sensor.kind {
        SensorKind::Ds18b20 => {
            let SensorId::Device(id) = &sensor.id else {
                return Err(ReadError::SensorNotFound(format!(
                    "DS18B20 {}",
                    sensor.id
                )));
            };
            ds18b20::read(w1_root, id)
        }
        SensorKind::Si7021 | SensorKind::Htu21 | SensorKind::Bme280 => {
            let Some(bus) = bus else {
                return Err(ReadError::Bus("I2C bus not available".into()));
            };
            let &SensorId::Address(addr) = &sensor.id else {
                return Err(ReadError::Bus(format!(
                    "{} has no bus address",
                    sensor.kind
                )));
            };
            if let Some(channel) = sensor.channel {
                select_channel(bus, channel)?;
            }
            let settle = settle_for(sensor);
            match sensor.kind {
                SensorKind::Si7021 | SensorKind::Htu21 => si70xx::read(bus, addr, settle),
                SensorKind::Bme280 => bme280::read(bus, addr, settle),
                SensorKind::Ds18b20 => unreachable!(),
            }
        }
    }
}

fn settle_for(sensor: &Sensor) -> Duration {
    let default_ms = match sensor.kind {
        SensorKind::Si7021 | SensorKind::Htu21 => SI70XX_DEFAULT_SETTLE_MS,
        SensorKind::Bme280 => BME280_DEFAULT_SETTLE_MS,
        SensorKind::Ds18b20 => 0,
    };
    Duration::from_millis(sensor.settle_ms.unwrap_or(default_ms))
}


#[cfg(test)]
mod tests {
    use super::testutil::{BusOp, MockBus};
    use super::*;
    use crate::config::Measurand;

    fn i2c_sensor(kind: SensorKind, channel: Option<u8>) -> Sensor {
        Sensor {
            id: SensorId::Address(0x40),
            kind,
            enabled: 1,
            location: "i2c_1".into(),
            channel,
            settle_ms: Some(0),
            values: kind
                .default_measurands()
                .iter()
                .map(|m| Measurand {
                    measurand: (*m).to_string(),
                    correction: 0.0,
                })
                .collect(),
        }
    }

    #[test]
    fn i2c_sensor_without_bus_reports_bus_error() {
        let sensor = i2c_sensor(SensorKind::Si7021, None);
        let outcome = read_sensor::<MockBus>(&sensor, None, Path::new("/nonexistent"));
        assert_eq!(
            outcome,
            Err(ReadError::Bus("I2C bus not available".into()))
        );
    }

    #[test]
    fn channel_select_happens_before_the_first_register_access() {
        let mut bus = MockBus::new()
            .with_response(0x40, 0xE5, &[0x80, 0x00])
            .with_response(0x40, 0xE3, &[0x60, 0x00])
            .with_device(MUX_ADDR);
        let sensor = i2c_sensor(SensorKind::Si7021, Some(3));

        read_sensor(&sensor, Some(&mut bus), Path::new("/nonexistent")).unwrap();

        assert_eq!(
            bus.ops[0],
            BusOp::WriteByte {
                addr: MUX_ADDR,
                value: 1 << 3
            }
        );
        assert_eq!(bus.ops[1], BusOp::Settle { millis: 100 });
    }

    #[test]
    fn mux_nack_fails_the_whole_sensor() {
        // Mux absent: the select write NACKs before any device access.
        let mut bus = MockBus::new().with_response(0x40, 0xE5, &[0x80, 0x00]);
        let sensor = i2c_sensor(SensorKind::Si7021, Some(2));

        let outcome = read_sensor(&sensor, Some(&mut bus), Path::new("/nonexistent"));
        assert_eq!(
            outcome,
            Err(ReadError::Bus("no acknowledge from 0x70".into()))
        );
    }
}
