//! Driven adapters: concrete implementations of the port traits.

pub mod i2c;
pub mod mqtt;
