//! Register-bus adapter over an embedded-hal I2C peripheral.
//!
//! In production the peripheral is a `/dev/i2c-N` character device via
//! `linux-embedded-hal`; the adapter itself is generic over any
//! [`embedded_hal::i2c::I2c`] implementation. Settle delays are real
//! blocking sleeps here; sensors need the conversion time, and the poll
//! loop is the only caller of the bus.

use std::time::Duration;

use anyhow::Context;
use embedded_hal::i2c::{ErrorKind, I2c};
use linux_embedded_hal::I2cdev;

use crate::app::ports::{BusError, RegisterBus};

/// [`RegisterBus`] over any embedded-hal I2C peripheral.
pub struct I2cRegisterBus<T> {
    i2c: T,
}

impl I2cRegisterBus<I2cdev> {
    /// Open `/dev/i2c-<bus_num>`.
    pub fn open(bus_num: u8) -> anyhow::Result<Self> {
        let path = format!("/dev/i2c-{bus_num}");
        let i2c = I2cdev::new(&path).with_context(|| format!("cannot open {path}"))?;
        Ok(Self::new(i2c))
    }
}

impl<T: I2c> I2cRegisterBus<T> {
    pub fn new(i2c: T) -> Self {
        Self { i2c }
    }
}

fn map_err<E: embedded_hal::i2c::Error>(addr: u8, e: E) -> BusError {
    match e.kind() {
        ErrorKind::NoAcknowledge(_) => BusError::Nack { addr },
        _ => BusError::Io {
            detail: format!("{e:?}"),
        },
    }
}

impl<T: I2c> RegisterBus for I2cRegisterBus<T> {
    fn write_byte(&mut self, addr: u8, value: u8) -> Result<(), BusError> {
        self.i2c.write(addr, &[value]).map_err(|e| map_err(addr, e))
    }

    fn write_block(&mut self, addr: u8, command: u8, data: &[u8]) -> Result<(), BusError> {
        let mut frame = Vec::with_capacity(1 + data.len());
        frame.push(command);
        frame.extend_from_slice(data);
        self.i2c.write(addr, &frame).map_err(|e| map_err(addr, e))
    }

    fn read_block(&mut self, addr: u8, command: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.i2c
            .write_read(addr, &[command], buf)
            .map_err(|e| map_err(addr, e))
    }

    fn probe(&mut self, addr: u8) -> bool {
        // A one-byte read doubles as an address probe; devices that do
        // not exist simply NACK.
        let mut scratch = [0u8; 1];
        self.i2c.read(addr, &mut scratch).is_ok()
    }

    fn settle(&mut self, wait: Duration) {
        std::thread::sleep(wait);
    }
}
