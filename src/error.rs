//! Unified error types for the RoomSense firmware.
//!
//! None of these are fatal to a wake cycle.  The core maps every variant
//! to a state-machine transition or a recorded degradation, and the
//! device always ends the cycle suspended.  All variants are `Copy` so
//! they can be collected in fixed-capacity reports without allocation.

use core::fmt;

use crate::power::buffer::BufferFull;
use crate::power::clock::NoClockAnchorYet;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The retained event buffer is at capacity; forces escalation.
    BufferFull,
    /// The broker did not confirm delivery; events stay buffered.
    PublishFailed,
    /// Network, time sync, or broker bring-up exceeded its timeout.
    ConnectTimedOut,
    /// The battery gauge could not be read this cycle.
    SensorRead(SensorReadError),
    /// An event was recorded before the first clock anchor existed.
    NoClockAnchorYet,
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
    /// Persistent storage failed.
    Storage(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferFull => write!(f, "event buffer full"),
            Self::PublishFailed => write!(f, "publish not confirmed"),
            Self::ConnectTimedOut => write!(f, "connect timed out"),
            Self::SensorRead(e) => write!(f, "sensor: {e}"),
            Self::NoClockAnchorYet => write!(f, "no clock anchor yet"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Storage(msg) => write!(f, "storage: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

impl From<BufferFull> for Error {
    fn from(_: BufferFull) -> Self {
        Self::BufferFull
    }
}

impl From<NoClockAnchorYet> for Error {
    fn from(_: NoClockAnchorYet) -> Self {
        Self::NoClockAnchorYet
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorReadError {
    /// The I2C transaction failed or was not acknowledged.
    Bus,
    /// The gauge answered but the CRC-8 check failed.
    Crc,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus => write!(f, "I2C bus error"),
            Self::Crc => write!(f, "CRC mismatch"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl core::error::Error for SensorReadError {}

impl From<SensorReadError> for Error {
    fn from(e: SensorReadError) -> Self {
        Self::SensorRead(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
