//! Unified error types for the sensor poller.
//!
//! A single closed taxonomy covers every way a per-sensor read can fail.
//! The wire protocol publishes the kind name and a detail string, so both
//! are explicit here; no reflected type names ever reach the payload.

use core::fmt;

/// Why one poll attempt for one sensor failed.
///
/// A failure is always all-or-nothing for the sensor: no partial set of
/// measurands is ever published alongside one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// The expected device path or bus address is absent.
    SensorNotFound(String),
    /// A protocol-level validity marker or plausibility check failed.
    SensorValueInvalid(String),
    /// A lower-level bus or I/O failure, carrying the underlying message.
    Bus(String),
}

impl ReadError {
    /// The `type` field of the error payload line.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::SensorNotFound(_) => "SensorNotFound",
            Self::SensorValueInvalid(_) => "SensorValueInvalid",
            Self::Bus(_) => "BusError",
        }
    }

    /// The `value` field of the error payload line.
    pub fn detail(&self) -> &str {
        match self {
            Self::SensorNotFound(d) | Self::SensorValueInvalid(d) | Self::Bus(d) => d,
        }
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind_name(), self.detail())
    }
}

impl std::error::Error for ReadError {}

impl From<crate::app::ports::BusError> for ReadError {
    fn from(e: crate::app::ports::BusError) -> Self {
        Self::Bus(e.to_string())
    }
}
