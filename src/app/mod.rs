//! Application core: port traits and the poll-loop service.

pub mod ports;
pub mod service;
