//! Sensornode library.
//!
//! Polls environmental sensors (1-Wire DS18B20 probes; I2C SI7021/HTU21
//! and BME280, optionally behind an 8-channel multiplexer) on a fixed
//! drift-free cadence and publishes line-protocol payloads over MQTT.
//!
//! Exposes the core modules for integration testing: everything
//! hardware- or network-facing sits behind the port traits in
//! [`app::ports`], so the whole poll loop runs against mocks.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod discovery;
pub mod drivers;
pub mod error;
pub mod format;
pub mod schedule;

pub mod adapters;
