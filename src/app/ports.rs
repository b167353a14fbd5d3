//! Port traits: the boundary between the polling core and the outside
//! world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ PollService (domain)
//! ```
//!
//! Driven adapters (the Linux I2C device, the MQTT client, the dry-run
//! sink) implement these traits. The poll loop consumes them via
//! generics, so the core never touches `/dev` or a socket directly and
//! the whole loop runs against mocks in tests.

use core::fmt;
use std::time::Duration;

// ───────────────────────────────────────────────────────────────
// Register bus port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Addressable register bus with byte/block transfers at a 7-bit address.
///
/// All drivers and the discovery scan speak through this trait. Settle
/// delays are routed through [`RegisterBus::settle`] so that a mock bus
/// can count them instead of sleeping.
pub trait RegisterBus {
    /// Write a single byte to a device (no register). Used for the
    /// multiplexer channel-select sequence.
    fn write_byte(&mut self, addr: u8, value: u8) -> Result<(), BusError>;

    /// Write `command` followed by `data` to a device.
    fn write_block(&mut self, addr: u8, command: u8, data: &[u8]) -> Result<(), BusError>;

    /// Issue `command` and read `buf.len()` response bytes.
    fn read_block(&mut self, addr: u8, command: u8, buf: &mut [u8]) -> Result<(), BusError>;

    /// Whether a device answers at `addr` at all.
    fn probe(&mut self, addr: u8) -> bool;

    /// Mandatory conversion/settle wait between accesses.
    fn settle(&mut self, wait: Duration);
}

/// Failure at the register-bus boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// No acknowledge from the addressed device.
    Nack { addr: u8 },
    /// Any other transfer failure, with the underlying message.
    Io { detail: String },
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nack { addr } => write!(f, "no acknowledge from 0x{addr:02x}"),
            Self::Io { detail } => f.write_str(detail),
        }
    }
}

impl std::error::Error for BusError {}

// ───────────────────────────────────────────────────────────────
// Publisher port (driven adapter: domain → broker)
// ───────────────────────────────────────────────────────────────

/// Delivers one formatted payload line to the configured topic.
///
/// Implementations own the connection lifecycle; `shutdown` must flush
/// and disconnect cleanly. The dry-run implementation does nothing at
/// all; formatted lines are already printed by the poll loop itself.
pub trait LinePublisher {
    fn publish(&mut self, line: &str) -> Result<(), PublishError>;

    /// Flush pending messages and close the connection.
    fn shutdown(&mut self);
}

/// Failure handing a line to the transport client.
#[derive(Debug)]
pub struct PublishError {
    pub detail: String,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "publish failed: {}", self.detail)
    }
}

impl std::error::Error for PublishError {}

/// Dry-run sink: formatted lines are produced and printed but never
/// transmitted, and no network connection is ever opened.
pub struct NullPublisher;

impl LinePublisher for NullPublisher {
    fn publish(&mut self, _line: &str) -> Result<(), PublishError> {
        Ok(())
    }

    fn shutdown(&mut self) {}
}
