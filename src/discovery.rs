//! One-shot hardware discovery (`--generate`).
//!
//! Scans the candidate I2C buses (with multiplexer channels when a mux
//! answers at 0x70) and the 1-Wire device directory, and synthesises a
//! ready-to-review config document. Every bus error is logged and that
//! bus/channel/address skipped; discovery never aborts early, it
//! returns whatever it found. It runs instead of the poll loop, never
//! during it.

use std::path::Path;
use std::time::Duration;

use log::{info, warn};

use crate::app::ports::RegisterBus;
use crate::config::{Measurand, MqttConfig, NodeConfig, Sensor, SensorId, SensorKind};
use crate::drivers::{MUX_ADDR, MUX_SETTLE};

/// Addresses worth identifying: 0x40 (SI7021/HTU21), 0x76/0x77 (BME280,
/// the latter with the address-select pin pulled high).
pub const KNOWN_ADDRS: [u8; 3] = [0x40, 0x76, 0x77];

/// Device-ID read: write 0xFA 0x0F, settle, read the 8-byte serial block.
const CMD_READ_ID: u8 = 0xFA;
const CMD_READ_ID_ARG: u8 = 0x0F;
const ID_SETTLE: Duration = Duration::from_millis(100);

/// First ID byte identifying an SI7021. Anything else (or a failed ID
/// read) defaults to HTU21, which has no reliable ID register.
pub const SI7021_ID: u8 = 0x15;

/// 1-Wire family-code prefix of the DS18B20.
pub const DS18B20_PREFIX: &str = "28-";

/// Where the kernel exposes enumerated 1-Wire devices.
pub const W1_DEVICES_DIR: &str = "/sys/bus/w1/devices";

/// Candidate register buses probed in generate mode.
pub const CANDIDATE_BUSES: [u8; 2] = [0, 1];

/// Scan one register bus: every mux channel when a multiplexer responds
/// at 0x70, the bare bus otherwise.
pub fn scan_register_bus<B: RegisterBus + ?Sized>(bus: &mut B, bus_num: u8) -> Vec<Sensor> {
    if bus.probe(MUX_ADDR) {
        info!("found I2C multiplexer on bus {bus_num}");
        (0..8)
            .flat_map(|channel| scan_channel(bus, bus_num, Some(channel)))
            .collect()
    } else {
        info!("scanning I2C bus {bus_num} directly (no multiplexer)");
        scan_channel(bus, bus_num, None)
    }
}

fn scan_channel<B: RegisterBus + ?Sized>(
    bus: &mut B,
    bus_num: u8,
    channel: Option<u8>,
) -> Vec<Sensor> {
    if let Some(ch) = channel {
        // Deselect everything first so a stuck channel cannot shadow
        // the one being scanned.
        let switch = |bus: &mut B| -> Result<(), crate::app::ports::BusError> {
            bus.write_byte(MUX_ADDR, 0)?;
            bus.settle(MUX_SETTLE);
            bus.write_byte(MUX_ADDR, 1 << ch)?;
            bus.settle(MUX_SETTLE);
            Ok(())
        };
        if let Err(e) = switch(bus) {
            warn!("bus {bus_num}: multiplexer switch to channel {ch} failed: {e}");
            return Vec::new();
        }
    }

    let mut found = Vec::new();
    for addr in KNOWN_ADDRS {
        if !bus.probe(addr) {
            continue;
        }
        let kind = match addr {
            0x40 => classify_0x40(bus),
            _ => SensorKind::Bme280,
        };
        let location = match channel {
            Some(ch) => format!("i2c_{bus_num}_ch{ch}"),
            None => format!("i2c_{bus_num}"),
        };
        info!("detected {kind} at 0x{addr:02x} ({location})");
        found.push(sensor_entry(kind, SensorId::Address(addr), location, channel));
    }
    found
}

/// SI7021 and HTU21 are electrically indistinguishable by address alone;
/// only the SI7021 answers the ID read with a recognisable first byte.
fn classify_0x40<B: RegisterBus + ?Sized>(bus: &mut B) -> SensorKind {
    let id = bus
        .write_block(0x40, CMD_READ_ID, &[CMD_READ_ID_ARG])
        .and_then(|()| {
            bus.settle(ID_SETTLE);
            let mut id = [0u8; 8];
            bus.read_block(0x40, 0x00, &mut id)?;
            Ok(id[0])
        });
    match id {
        Ok(SI7021_ID) => SensorKind::Si7021,
        Ok(_) => SensorKind::Htu21,
        Err(e) => {
            warn!("device-ID read at 0x40 failed ({e}), assuming HTU21");
            SensorKind::Htu21
        }
    }
}

/// Scan the 1-Wire device directory for DS18B20 family entries.
pub fn scan_w1(w1_root: &Path) -> Vec<Sensor> {
    let entries = match std::fs::read_dir(w1_root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("1-Wire directory {} not readable: {e}", w1_root.display());
            return Vec::new();
        }
    };

    let mut found: Vec<Sensor> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(DS18B20_PREFIX))
        .map(|name| {
            info!("detected DS18B20 probe {name}");
            let location = format!("wire1_{name}");
            sensor_entry(SensorKind::Ds18b20, SensorId::Device(name), location, None)
        })
        .collect();
    // read_dir order is filesystem-dependent; keep output stable.
    found.sort_by(|a, b| a.location.cmp(&b.location));
    found
}

fn sensor_entry(kind: SensorKind, id: SensorId, location: String, channel: Option<u8>) -> Sensor {
    Sensor {
        id,
        kind,
        enabled: 1,
        location,
        channel,
        settle_ms: None,
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

/// Assemble the full generated document. `open_bus` yields a register
/// bus per candidate bus index, or `None` when that bus does not exist
/// on this board (logged and skipped).
pub fn generate_config<B, F>(mut open_bus: F, w1_root: &Path, node: String) -> NodeConfig
where
    B: RegisterBus,
    F: FnMut(u8) -> Option<B>,
{
    let mut sensors = Vec::new();
    for bus_num in CANDIDATE_BUSES {
        match open_bus(bus_num) {
            Some(mut bus) => sensors.extend(scan_register_bus(&mut bus, bus_num)),
            None => info!("I2C bus {bus_num} not present, skipping"),
        }
    }
    sensors.extend(scan_w1(w1_root));

    NodeConfig {
        mqtt: MqttConfig {
            server: "localhost".into(),
            topic: "sensors/data".into(),
        },
        interval: 20,
        node,
        i2c_bus: 1,
        sensors,
    }
}
